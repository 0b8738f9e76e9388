//! The ten requirement quality criteria.
//!
//! Each criterion owns a [`Rubric`]: the instructions a model-backed
//! capability is given for scoring and fixing, and a deterministic heuristic
//! used by the offline capability. [`rubric`] is the lookup table from
//! [`CriterionId`] to its rubric; the exhaustive `match` means a new
//! criterion does not compile until it has one.
//!
//! | Tier     | Criteria                                              |
//! |----------|-------------------------------------------------------|
//! | Gating   | atomicity, clarity, testability                       |
//! | Priority | completeness, measurability, consistency, feasibility |
//! | Polish   | conciseness, terminology, traceability                |
//!
//! [`RubricEvaluator`] and [`RubricFixer`] bind a rubric to the scoring and
//! synthesis capabilities and validate what comes back. [`CriterionSuite`]
//! holds one of each per criterion for the orchestrator.

pub mod atomicity;
pub mod clarity;
pub mod completeness;
pub mod conciseness;
pub mod consistency;
pub mod feasibility;
pub mod measurability;
pub mod suite;
pub mod terminology;
pub mod testability;
pub mod text;
pub mod traceability;

pub use suite::{CriterionSuite, RubricEvaluator, RubricFixer};

use crate::domain::models::{CriterionId, SplitChild};
use crate::domain::ports::RawScore;

/// Prompts and heuristics for one criterion.
pub trait Rubric: Send + Sync {
    fn criterion(&self) -> CriterionId;

    /// What a scoring model is asked to judge.
    fn scoring_rubric(&self) -> &'static str;

    /// How a synthesis model is asked to revise a failing text.
    fn fix_instructions(&self) -> &'static str;

    /// Deterministic score in `[0, 1]` with a one-line rationale.
    fn assess(&self, text: &str) -> RawScore;

    /// Deterministic revision, or `None` when the heuristic has nothing to offer.
    fn revise(&self, text: &str, project_context: Option<&str>) -> Option<String>;

    /// Deterministic split proposal. Only atomicity overrides this.
    fn split(&self, _text: &str) -> Option<Vec<SplitChild>> {
        None
    }
}

/// The rubric for `criterion`.
pub fn rubric(criterion: CriterionId) -> &'static dyn Rubric {
    match criterion {
        CriterionId::Atomicity => &atomicity::Atomicity,
        CriterionId::Clarity => &clarity::Clarity,
        CriterionId::Testability => &testability::Testability,
        CriterionId::Completeness => &completeness::Completeness,
        CriterionId::Measurability => &measurability::Measurability,
        CriterionId::Consistency => &consistency::Consistency,
        CriterionId::Feasibility => &feasibility::Feasibility,
        CriterionId::Conciseness => &conciseness::Conciseness,
        CriterionId::Terminology => &terminology::Terminology,
        CriterionId::Traceability => &traceability::Traceability,
    }
}

pub(crate) fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_criterion_has_its_own_rubric() {
        for criterion in CriterionId::ALL {
            let rubric = rubric(criterion);
            assert_eq!(rubric.criterion(), criterion);
            assert!(!rubric.scoring_rubric().is_empty());
            assert!(!rubric.fix_instructions().is_empty());
        }
    }

    #[test]
    fn only_atomicity_proposes_splits() {
        let text = "The system must export reports and must email invoices.";
        for criterion in CriterionId::ALL {
            let split = rubric(criterion).split(text);
            assert_eq!(split.is_some(), criterion.may_split(), "{criterion}");
        }
    }

    #[test]
    fn heuristic_scores_stay_in_range() {
        let samples = [
            "",
            "The app must be fast",
            "stuff",
            "The system shall always, never, 100% instantly do TBD etc. in order to basically work.",
        ];
        for text in samples {
            for criterion in CriterionId::ALL {
                let score = rubric(criterion).assess(text).score;
                assert!((0.0..=1.0).contains(&score), "{criterion} scored {score} on {text:?}");
            }
        }
    }

    #[test]
    fn vague_performance_requirement_fails_clarity_and_measurability_only() {
        let text = "The app must be fast";
        let failing: Vec<_> = CriterionId::ALL
            .into_iter()
            .filter(|c| {
                let thresholds = crate::domain::models::Thresholds::default();
                rubric(*c).assess(text).score < thresholds.for_criterion(*c)
            })
            .collect();
        assert_eq!(failing, vec![CriterionId::Clarity, CriterionId::Measurability]);
    }
}
