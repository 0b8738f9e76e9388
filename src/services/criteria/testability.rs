//! Testability: an acceptance test can decide pass or fail.

use super::text::{self, has_strong_modal, has_weak_modal, words, STRONG_MODALS, WEAK_MODALS};
use super::{clamp_score, RawScore, Rubric};
use crate::domain::models::CriterionId;

/// Absolutes that no finite test run can confirm, with a bounded rewrite.
const UNBOUNDED: &[(&str, &str)] = &[
    ("always", ""),
    ("completely", ""),
    ("fully", ""),
    ("totally", ""),
    ("never", "not"),
    ("forever", "for the configured retention period"),
];

pub struct Testability;

impl Rubric for Testability {
    fn criterion(&self) -> CriterionId {
        CriterionId::Testability
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether a tester could write an acceptance test whose outcome decides whether \
         the requirement is met. Penalize weak modal verbs (should, may, could), absolutes \
         that cannot be verified in finite time (always, never, forever), and statements \
         without an observable outcome."
    }

    fn fix_instructions(&self) -> &'static str {
        "Rewrite the requirement as a binding, verifiable statement: use 'shall' or 'must', \
         replace unverifiable absolutes with bounded conditions, and make the expected \
         observable outcome explicit. Keep the original intent."
    }

    fn assess(&self, text: &str) -> RawScore {
        let tokens = words(text);
        let unbounded: Vec<&str> = UNBOUNDED
            .iter()
            .filter(|(term, _)| text::contains_word(&tokens, term))
            .map(|(term, _)| *term)
            .collect();

        let (base, mut rationale) = if has_strong_modal(&tokens) {
            (0.85, "Binding, observable statement.".to_string())
        } else if has_weak_modal(&tokens) {
            (0.5, "Weak modal verb leaves the obligation optional.".to_string())
        } else {
            (0.3, "No modal verb; nothing binding to test.".to_string())
        };
        if !unbounded.is_empty() {
            rationale = format!("{rationale} Unverifiable absolutes: {}.", unbounded.join(", "));
        }

        RawScore {
            score: clamp_score(base - 0.2 * unbounded.len() as f64).max(0.05),
            rationale,
        }
    }

    fn revise(&self, text: &str, _project_context: Option<&str>) -> Option<String> {
        let tokens = words(text);
        let mut revised = text.to_string();

        if !has_strong_modal(&tokens) {
            match WEAK_MODALS.iter().find(|m| text::contains_word(&tokens, m)) {
                Some(weak) => revised = text::replace_phrase(&revised, weak, STRONG_MODALS[0]),
                None => {
                    let body = text::strip_terminal(&revised);
                    let mut chars = body.chars();
                    let lowered: String = match chars.next() {
                        Some(first) => first.to_lowercase().chain(chars).collect(),
                        None => return None,
                    };
                    revised = format!("The system shall support {lowered}");
                }
            }
        }
        for (term, bounded) in UNBOUNDED {
            revised = text::replace_phrase(&revised, term, bounded);
        }

        let revised = text::as_sentence(&revised);
        (revised != text::as_sentence(text)).then_some(revised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_modal_is_strengthened() {
        let text = "Users should be able to reset their password.";
        assert!(Testability.assess(text).score < 0.75);
        let revised = Testability.revise(text, None).unwrap();
        assert_eq!(revised, "Users shall be able to reset their password.");
        assert!(Testability.assess(&revised).score >= 0.75);
    }

    #[test]
    fn absolutes_are_bounded() {
        let revised = Testability.revise("The service must never lose data.", None).unwrap();
        assert_eq!(revised, "The service must not lose data.");
    }

    #[test]
    fn statement_without_modal_gets_one() {
        let revised = Testability.revise("Exporting reports to PDF.", None).unwrap();
        assert_eq!(revised, "The system shall support exporting reports to PDF.");
    }
}
