//! Clarity: the requirement uses no vague or subjective wording.

use super::text::{self, has_strong_modal, has_weak_modal, words};
use super::{clamp_score, RawScore, Rubric};
use crate::domain::models::CriterionId;

/// Predicates whose meaning depends on the reader, with a concrete rewrite.
const VAGUE_PREDICATES: &[(&str, &str)] = &[
    ("be fast", "respond to user requests"),
    ("be quick", "respond to user requests"),
    ("be responsive", "respond to user requests"),
    ("be user-friendly", "let a first-time user complete core tasks without assistance"),
    ("be easy to use", "let a first-time user complete core tasks without assistance"),
    ("be intuitive", "let a first-time user complete core tasks without assistance"),
    ("be reliable", "continue operating when a single component fails"),
    ("be robust", "continue operating when a single component fails"),
    ("be scalable", "support growth in concurrent users"),
    ("be secure", "restrict access to authenticated users"),
    ("be efficient", "stay within its allocated CPU and memory budget"),
];

/// Vague words and phrases with a more precise substitute.
const VAGUE_TERMS: &[(&str, &str)] = &[
    ("as soon as possible", "within 1 minute"),
    ("as needed", "on request"),
    ("if possible", ""),
    ("easy to use", "usable without assistance"),
    ("user-friendly", "usable without assistance"),
    ("intuitive", "usable without assistance"),
    ("fast", "responsive"),
    ("quick", "prompt"),
    ("quickly", "promptly"),
    ("slow", "delayed"),
    ("easy", "straightforward"),
    ("easily", "directly"),
    ("efficient", "resource-bounded"),
    ("efficiently", "within resource limits"),
    ("robust", "fault-tolerant"),
    ("reliable", "fault-tolerant"),
    ("scalable", "load-elastic"),
    ("flexible", "configurable"),
    ("seamless", "uninterrupted"),
    ("seamlessly", "without interruption"),
    ("appropriate", "specified"),
    ("adequate", "specified"),
    ("reasonable", "specified"),
    ("good", "acceptable"),
    ("several", "multiple"),
    ("some", "the specified"),
    ("many", "multiple"),
    ("modern", "current"),
    ("optimal", "configured"),
];

pub struct Clarity;

impl Clarity {
    fn vague_terms(text: &str) -> Vec<&'static str> {
        VAGUE_TERMS
            .iter()
            .filter(|(term, _)| text::contains_phrase(text, term))
            .map(|(term, _)| *term)
            .collect()
    }
}

impl Rubric for Clarity {
    fn criterion(&self) -> CriterionId {
        CriterionId::Clarity
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement has exactly one reasonable interpretation. Penalize \
         vague or subjective words (fast, easy, user-friendly, robust, appropriate), \
         undefined pronouns, and missing modal verbs. Score 1.0 when every term is concrete."
    }

    fn fix_instructions(&self) -> &'static str {
        "Rewrite the requirement so that every vague or subjective term is replaced by a \
         concrete, observable behaviour. Keep the original intent and subject. Use a single \
         modal verb (shall or must). Do not add new obligations."
    }

    fn assess(&self, text: &str) -> RawScore {
        let tokens = words(text);
        let vague = Self::vague_terms(text);

        if !vague.is_empty() {
            return RawScore {
                score: clamp_score(0.7 - 0.3 * vague.len() as f64).max(0.1),
                rationale: format!("Vague wording: {}.", vague.join(", ")),
            };
        }
        if has_strong_modal(&tokens) || has_weak_modal(&tokens) {
            RawScore {
                score: 0.9,
                rationale: "Wording is concrete.".to_string(),
            }
        } else {
            RawScore {
                score: 0.6,
                rationale: "No modal verb states what is required.".to_string(),
            }
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        let mut revised = text.to_string();
        for (predicate, rewrite) in VAGUE_PREDICATES {
            revised = text::replace_phrase(&revised, predicate, rewrite);
        }
        for (term, substitute) in VAGUE_TERMS {
            revised = text::replace_phrase(&revised, term, substitute);
        }
        let revised = text::as_sentence(&revised);
        (revised != text::as_sentence(text)).then_some(revised)
    }
}
