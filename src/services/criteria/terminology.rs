//! Terminology: one name per concept, no informal vocabulary.

use super::text::{self, words};
use super::{clamp_score, RawScore, Rubric};
use crate::domain::models::CriterionId;

/// Interchangeable names for the system under specification.
const SYSTEM_TERMS: &[&str] = &[
    "system", "app", "application", "software", "platform", "tool", "product", "solution",
];

const INFORMAL: &[(&str, &str)] = &[
    ("lots of", "multiple"),
    ("stuff", "data"),
    ("things", "items"),
    ("thing", "item"),
    ("info", "information"),
    ("okay", "acceptable"),
    ("ok", "acceptable"),
];

pub struct Terminology;

fn system_terms(tokens: &[String]) -> Vec<&'static str> {
    let mut seen: Vec<(usize, &'static str)> = SYSTEM_TERMS
        .iter()
        .filter_map(|term| {
            tokens
                .iter()
                .position(|w| w == term)
                .map(|first| (first, *term))
        })
        .collect();
    seen.sort_unstable();
    seen.into_iter().map(|(_, term)| term).collect()
}

fn informal(text: &str) -> Vec<&'static str> {
    INFORMAL
        .iter()
        .filter(|(term, _)| text::contains_phrase(text, term))
        .map(|(term, _)| *term)
        .collect()
}

impl Rubric for Terminology {
    fn criterion(&self) -> CriterionId {
        CriterionId::Terminology
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement uses precise, consistent domain vocabulary: one name \
         per concept (not 'system' and 'app' for the same thing), no informal words (stuff, \
         things, ok), and terms a domain glossary would recognise."
    }

    fn fix_instructions(&self) -> &'static str {
        "Normalise the terminology of the requirement: use a single name for each concept, \
         replace informal words with precise domain terms, and keep the meaning unchanged."
    }

    fn assess(&self, text: &str) -> RawScore {
        let tokens = words(text);
        let names = system_terms(&tokens);
        let casual = informal(text);

        let mut score: f64 = 0.85;
        let mut issues = Vec::new();
        if names.len() > 1 {
            score -= 0.4;
            issues.push(format!("the system is called {}", names.join(" and ")));
        }
        if !casual.is_empty() {
            score -= 0.2 * casual.len() as f64;
            issues.push(format!("informal words: {}", casual.join(", ")));
        }

        let rationale = if issues.is_empty() {
            "Terminology is consistent.".to_string()
        } else {
            format!("Inconsistent terminology: {}.", issues.join("; "))
        };
        RawScore {
            score: clamp_score(score).max(0.1),
            rationale,
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        let names = system_terms(&words(text));
        let casual = informal(text);
        if names.len() <= 1 && casual.is_empty() {
            return None;
        }

        let mut revised = text.to_string();
        if let Some((canonical, others)) = names.split_first() {
            for other in others {
                revised = text::replace_phrase(&revised, other, canonical);
            }
        }
        for (term, precise) in INFORMAL {
            revised = text::replace_phrase(&revised, term, precise);
        }
        Some(text::as_sentence(&revised))
    }
}
