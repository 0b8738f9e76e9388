//! Traceability: the requirement points back to its source.

use super::text::{self, strip_terminal};
use super::{RawScore, Rubric};
use crate::domain::models::CriterionId;

const REFERENCE_MARKERS: &[&str] = &["source:", "ref:", "see section", "per section", "according to"];

pub struct Traceability;

/// `ABC-123` style identifiers.
fn has_identifier(text: &str) -> bool {
    text.split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ',' | ';' | ':'))
        .any(|token| {
            let token = token.trim_end_matches('.');
            token.split_once('-').is_some_and(|(prefix, number)| {
                prefix.len() >= 2
                    && prefix.chars().all(|c| c.is_ascii_uppercase())
                    && !number.is_empty()
                    && number.chars().all(|c| c.is_ascii_digit())
            })
        })
}

fn has_reference(text: &str) -> bool {
    has_identifier(text) || REFERENCE_MARKERS.iter().any(|m| text::contains_phrase(text, m))
}

impl Rubric for Traceability {
    fn criterion(&self) -> CriterionId {
        CriterionId::Traceability
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement can be traced to its origin: an identifier, a source \
         document or section, a stakeholder, or a parent requirement. Unreferenced but \
         otherwise self-explanatory requirements score in the middle of the range."
    }

    fn fix_instructions(&self) -> &'static str {
        "Add a reference to the origin of the requirement (source document, section, \
         stakeholder or identifier) using the supplied project context. Do not invent \
         references that the context does not support."
    }

    fn assess(&self, text: &str) -> RawScore {
        if has_reference(text) {
            RawScore {
                score: 0.9,
                rationale: "References its source.".to_string(),
            }
        } else {
            RawScore {
                score: 0.65,
                rationale: "No explicit source reference.".to_string(),
            }
        }
    }

    fn revise(&self, text: &str, project_context: Option<&str>) -> Option<String> {
        let source = project_context.map(str::trim).filter(|c| !c.is_empty())?;
        if has_reference(text) {
            return None;
        }
        Some(format!("{} (Source: {}).", strip_terminal(text), strip_terminal(source)))
    }
}
