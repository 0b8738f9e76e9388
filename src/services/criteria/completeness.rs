//! Completeness: subject, obligation and conditions are all stated.

use super::text::{self, is_modal, words};
use super::{clamp_score, RawScore, Rubric};
use crate::domain::models::CriterionId;

const PLACEHOLDERS: &[(&str, &str)] = &[
    ("to be determined", "the value defined in the project configuration"),
    ("tbd", "the value defined in the project configuration"),
    ("tbc", "the value defined in the project configuration"),
    ("etc.", ""),
    ("and so on", ""),
    ("...", ""),
];

const CONDITION_WORDS: &[&str] = &[
    "when", "if", "under", "during", "unless", "after", "before", "while", "upon",
];

const DEFAULT_CONDITION: &str = "under normal operating conditions";

pub struct Completeness;

struct Shape {
    has_modal: bool,
    subject_words: usize,
    predicate_words: usize,
    has_condition: bool,
}

fn shape(tokens: &[String]) -> Shape {
    let modal_at = tokens.iter().position(|w| is_modal(w));
    Shape {
        has_modal: modal_at.is_some(),
        subject_words: modal_at.unwrap_or(0),
        predicate_words: modal_at.map_or(0, |at| tokens.len() - at - 1),
        has_condition: tokens.iter().any(|w| CONDITION_WORDS.contains(&w.as_str())),
    }
}

fn placeholders(text: &str) -> Vec<&'static str> {
    PLACEHOLDERS
        .iter()
        .filter(|(term, _)| text::contains_phrase(text, term))
        .map(|(term, _)| *term)
        .collect()
}

impl Rubric for Completeness {
    fn criterion(&self) -> CriterionId {
        CriterionId::Completeness
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement states who or what is responsible, what must happen, \
         and under which conditions, without placeholders (TBD, etc., and so on). Score 1.0 \
         when nothing needed to implement it is left unstated."
    }

    fn fix_instructions(&self) -> &'static str {
        "Complete the requirement: name the responsible subject, state the full obligation, \
         add the triggering or operating condition if it is missing, and remove placeholders \
         such as TBD or etc. by stating the intended content. Do not add unrelated obligations."
    }

    fn assess(&self, text: &str) -> RawScore {
        let tokens = words(text);
        let shape = shape(&tokens);
        let missing = placeholders(text);

        if !shape.has_modal {
            return RawScore {
                score: 0.4,
                rationale: "No obligation is stated.".to_string(),
            };
        }

        let mut score: f64 = 0.8;
        let mut gaps = Vec::new();
        if shape.has_condition {
            score += 0.1;
        }
        if shape.subject_words == 0 {
            score -= 0.3;
            gaps.push("no subject".to_string());
        }
        if shape.predicate_words < 2 {
            score -= 0.3;
            gaps.push("obligation is truncated".to_string());
        }
        if !missing.is_empty() {
            score -= 0.3 * missing.len() as f64;
            gaps.push(format!("placeholders: {}", missing.join(", ")));
        }

        let rationale = if gaps.is_empty() {
            "Subject and obligation are stated.".to_string()
        } else {
            format!("Incomplete: {}.", gaps.join("; "))
        };
        RawScore {
            score: clamp_score(score).max(0.05),
            rationale,
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        let mut revised = text.to_string();
        for (term, substitute) in PLACEHOLDERS {
            revised = text::replace_phrase(&revised, term, substitute);
        }
        let tokens = words(&revised);
        let shape = shape(&tokens);
        if shape.has_modal && !shape.has_condition && shape.predicate_words < 2 {
            revised = text::append_clause(&revised, DEFAULT_CONDITION);
        }

        let revised = text::as_sentence(&revised);
        (revised != text::as_sentence(text)).then_some(revised)
    }
}
