//! Atomicity: one requirement states exactly one obligation.
//!
//! This is the only criterion that repairs by splitting. A compound text is
//! never revised in place.

use super::text::obligations;
use super::{Rubric, RawScore};
use crate::domain::models::{CriterionId, SplitChild};

const ATOMIC_SCORE: f64 = 0.9;
const COMPOUND_SCORE: f64 = 0.2;

pub struct Atomicity;

impl Rubric for Atomicity {
    fn criterion(&self) -> CriterionId {
        CriterionId::Atomicity
    }

    fn scoring_rubric(&self) -> &'static str {
        "Judge whether the requirement states exactly one obligation. A requirement that \
         bundles several independent obligations (joined by 'and', listed in separate \
         sentences, or otherwise separable) is not atomic. Score 1.0 for a single obligation \
         and close to 0.0 for several unrelated ones."
    }

    fn fix_instructions(&self) -> &'static str {
        "If the requirement bundles independent obligations, split it into the smallest set \
         of self-contained requirements, each with its own subject and modal verb, and give \
         a rationale for each child. Return a split with at least two children. If it cannot \
         be split, return a revision that states a single obligation."
    }

    fn assess(&self, text: &str) -> RawScore {
        let count = obligations(text).len();
        if count <= 1 {
            RawScore {
                score: ATOMIC_SCORE,
                rationale: "States a single obligation.".to_string(),
            }
        } else {
            RawScore {
                score: COMPOUND_SCORE,
                rationale: format!("Bundles {count} independent obligations."),
            }
        }
    }

    fn revise(&self, _text: &str, _project_context: Option<&str>) -> Option<String> {
        None
    }

    fn split(&self, text: &str) -> Option<Vec<SplitChild>> {
        let clauses = obligations(text);
        if clauses.len() < 2 {
            return None;
        }
        let total = clauses.len();
        Some(
            clauses
                .into_iter()
                .enumerate()
                .map(|(i, clause)| {
                    SplitChild::new(
                        clause,
                        format!("Obligation {} of {total} separated from a compound requirement.", i + 1),
                    )
                })
                .collect(),
        )
    }
}
