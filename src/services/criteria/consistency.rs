//! Consistency: the requirement does not contradict itself.

use super::text::{self, has_strong_modal, has_weak_modal, words, WEAK_MODALS};
use super::{clamp_score, RawScore, Rubric};
use crate::domain::models::CriterionId;

pub struct Consistency;

fn conflicts(tokens: &[String]) -> Vec<&'static str> {
    let mut found = Vec::new();
    if has_strong_modal(tokens) && has_weak_modal(tokens) {
        found.push("mixes binding and optional modal verbs");
    }
    if text::contains_word(tokens, "always") && text::contains_word(tokens, "never") {
        found.push("states both always and never");
    }
    if has_strong_modal(tokens)
        && (text::contains_word(tokens, "optional") || text::contains_word(tokens, "optionally"))
    {
        found.push("mandatory and optional at once");
    }
    found
}

impl Rubric for Consistency {
    fn criterion(&self) -> CriterionId {
        CriterionId::Consistency
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement is internally consistent: no statements that \
         contradict each other, no mix of mandatory and optional language for the same \
         obligation, and no conflicting constraints."
    }

    fn fix_instructions(&self) -> &'static str {
        "Resolve any internal contradiction in the requirement. Keep the stronger, binding \
         reading (shall or must) and remove wording that makes the obligation optional or \
         contradicts another part of the statement."
    }

    fn assess(&self, text: &str) -> RawScore {
        let found = conflicts(&words(text));
        let rationale = if found.is_empty() {
            "No internal contradictions.".to_string()
        } else {
            format!("Contradictory: {}.", found.join("; "))
        };
        RawScore {
            score: clamp_score(0.9 - 0.3 * found.len() as f64).max(0.1),
            rationale,
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        let tokens = words(text);
        if conflicts(&tokens).is_empty() {
            return None;
        }
        let strong = if text::contains_word(&tokens, "shall") { "shall" } else { "must" };
        let mut revised = text.to_string();
        if has_strong_modal(&tokens) {
            for weak in WEAK_MODALS {
                revised = text::replace_phrase(&revised, weak, strong);
            }
            revised = text::replace_phrase(&revised, "optionally", "");
            revised = text::replace_phrase(&revised, "optional", "");
        }
        if text::contains_word(&tokens, "always") && text::contains_word(&tokens, "never") {
            revised = text::replace_phrase(&revised, "always", "");
        }
        let revised = text::as_sentence(&revised);
        (revised != text::as_sentence(text)).then_some(revised)
    }
}
