//! Feasibility: the requirement can be built and operated.

use super::text;
use super::{clamp_score, RawScore, Rubric};
use crate::domain::models::CriterionId;

/// Unattainable targets with an achievable counterpart.
const UNATTAINABLE: &[(&str, &str)] = &[
    ("zero downtime", "99.9% availability"),
    ("never fail", "recover from failures within 5 minutes"),
    ("never fails", "recovers from failures within 5 minutes"),
    ("100%", "99.9%"),
    ("instantly", "within 1 second"),
    ("instantaneous", "sub-second"),
    ("instant", "sub-second"),
    ("unlimited", "up to the configured capacity of"),
    ("infinite", "up to the configured capacity of"),
    ("all possible", "all specified"),
    ("any number of", "up to the configured number of"),
    ("zero latency", "sub-second latency"),
];

pub struct Feasibility;

fn unattainable(text: &str) -> Vec<&'static str> {
    UNATTAINABLE
        .iter()
        .filter(|(term, _)| text::contains_phrase(text, term))
        .map(|(term, _)| *term)
        .collect()
}

impl Rubric for Feasibility {
    fn criterion(&self) -> CriterionId {
        CriterionId::Feasibility
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement can realistically be implemented and operated with \
         current technology and reasonable cost. Penalize absolute targets (100%, zero \
         downtime, instant, unlimited) and obligations outside the system's control."
    }

    fn fix_instructions(&self) -> &'static str {
        "Replace unattainable targets in the requirement with realistic, achievable bounds \
         (for example 99.9% instead of 100%, within 1 second instead of instantly) while \
         keeping the original intent."
    }

    fn assess(&self, text: &str) -> RawScore {
        let found = unattainable(text);
        let rationale = if found.is_empty() {
            "Achievable with standard engineering.".to_string()
        } else {
            format!("Unattainable targets: {}.", found.join(", "))
        };
        RawScore {
            score: clamp_score(0.9 - 0.3 * found.len() as f64).max(0.1),
            rationale,
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        if unattainable(text).is_empty() {
            return None;
        }
        let mut revised = text.to_string();
        for (term, achievable) in UNATTAINABLE {
            revised = text::replace_phrase(&revised, term, achievable);
        }
        Some(text::as_sentence(&revised))
    }
}
