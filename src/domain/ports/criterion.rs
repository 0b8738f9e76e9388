//! Per-criterion evaluation and repair contracts.

use async_trait::async_trait;

use crate::domain::errors::{EvaluationError, FixError};
use crate::domain::models::{CriterionId, CriterionScore, SplitChild, ValidationContext};

/// Result of a successful fix proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixResult {
    Revise(String),
    /// At least two non-empty children. Only atomicity produces this.
    Split(Vec<SplitChild>),
}

/// Scores a text against one criterion.
///
/// Must behave as a pure function of its inputs: no state is retained between
/// calls for the same requirement.
#[async_trait]
pub trait CriterionEvaluator: Send + Sync {
    fn criterion(&self) -> CriterionId;

    async fn evaluate(
        &self,
        text: &str,
        context: &ValidationContext,
    ) -> Result<CriterionScore, EvaluationError>;
}

/// Proposes a revision (or, for atomicity, a split) for a failing criterion.
#[async_trait]
pub trait CriterionFixer: Send + Sync {
    fn criterion(&self) -> CriterionId;

    async fn propose_fix(
        &self,
        text: &str,
        score: &CriterionScore,
        context: &ValidationContext,
    ) -> Result<FixResult, FixError>;
}
