//! Measurability: the requirement carries a quantified acceptance bound.

use super::text::{self, has_number, has_quantity, words};
use super::{RawScore, Rubric};
use crate::domain::models::CriterionId;

const BOUND_WORDS: &[&str] = &["within", "least", "most", "maximum", "minimum", "under", "below", "above"];

/// Topic keywords and the measurable bound appended for that topic.
const TEMPLATES: &[(&[&str], &str)] = &[
    (
        &["respond", "response", "responsive", "latency", "fast", "quick", "load", "loads", "performance", "speed", "throughput"],
        "within 2 seconds at the 95th percentile",
    ),
    (
        &["available", "availability", "uptime", "downtime", "reliable", "reliability", "operating"],
        "with at least 99.9% monthly availability",
    ),
    (
        &["users", "concurrent", "scale", "scalable", "capacity", "volume", "growth"],
        "for at least 1,000 concurrent users",
    ),
];

const FALLBACK_TEMPLATE: &str = "in at least 95% of acceptance test runs";

pub struct Measurability;

impl Rubric for Measurability {
    fn criterion(&self) -> CriterionId {
        CriterionId::Measurability
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement contains a quantified acceptance bound: a number with \
         a unit (seconds, %, users, requests) and a direction (within, at least, at most). \
         Score close to 0.0 for purely qualitative statements."
    }

    fn fix_instructions(&self) -> &'static str {
        "Add a realistic, quantified acceptance bound to the requirement (a number, unit and \
         direction such as 'within 2 seconds at the 95th percentile'). Keep everything else \
         unchanged."
    }

    fn assess(&self, text: &str) -> RawScore {
        let tokens = words(text);
        if has_quantity(&tokens) {
            let bounded = tokens.iter().any(|w| BOUND_WORDS.contains(&w.as_str()));
            RawScore {
                score: if bounded { 0.9 } else { 0.85 },
                rationale: "States a quantified bound.".to_string(),
            }
        } else if has_number(&tokens) {
            RawScore {
                score: 0.5,
                rationale: "Mentions a number without a unit.".to_string(),
            }
        } else {
            RawScore {
                score: 0.3,
                rationale: "No quantified acceptance bound.".to_string(),
            }
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        let tokens = words(text);
        if has_quantity(&tokens) || text.trim().is_empty() {
            return None;
        }
        let bound = TEMPLATES
            .iter()
            .find(|(topic, _)| topic.iter().any(|k| text::contains_word(&tokens, k)))
            .map_or(FALLBACK_TEMPLATE, |(_, bound)| *bound);
        Some(text::append_clause(text, bound))
    }
}
