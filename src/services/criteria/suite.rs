//! Binding of rubrics to capabilities, and the per-criterion lookup table.

use async_trait::async_trait;
use std::sync::Arc;

use super::{rubric, Rubric};
use crate::domain::errors::{EvaluationError, FixError, SplitError};
use crate::domain::models::{CriterionId, CriterionScore, SplitChild, ValidationContext};
use crate::domain::ports::{
    CriterionEvaluator, CriterionFixer, FixResult, ScoringCapability, ScoringRequest, Synthesis,
    SynthesisCapability, SynthesisRequest,
};

/// Scores one criterion through the scoring capability.
pub struct RubricEvaluator {
    rubric: &'static dyn Rubric,
    scorer: Arc<dyn ScoringCapability>,
}

impl RubricEvaluator {
    pub fn new(criterion: CriterionId, scorer: Arc<dyn ScoringCapability>) -> Self {
        Self {
            rubric: rubric(criterion),
            scorer,
        }
    }
}

#[async_trait]
impl CriterionEvaluator for RubricEvaluator {
    fn criterion(&self) -> CriterionId {
        self.rubric.criterion()
    }

    async fn evaluate(
        &self,
        text: &str,
        context: &ValidationContext,
    ) -> Result<CriterionScore, EvaluationError> {
        let criterion = self.criterion();
        let raw = self
            .scorer
            .score(ScoringRequest {
                criterion,
                text,
                rubric: self.rubric.scoring_rubric(),
                project_context: context.project_context.as_deref(),
            })
            .await
            .map_err(|source| EvaluationError::Capability { criterion, source })?;

        if !raw.score.is_finite() || !(0.0..=1.0).contains(&raw.score) {
            return Err(EvaluationError::OutOfRange {
                criterion,
                score: raw.score,
            });
        }

        Ok(CriterionScore::new(criterion, raw.score, raw.rationale))
    }
}

/// Proposes fixes for one criterion through the synthesis capability.
pub struct RubricFixer {
    rubric: &'static dyn Rubric,
    synthesizer: Arc<dyn SynthesisCapability>,
}

impl RubricFixer {
    pub fn new(criterion: CriterionId, synthesizer: Arc<dyn SynthesisCapability>) -> Self {
        Self {
            rubric: rubric(criterion),
            synthesizer,
        }
    }
}

#[async_trait]
impl CriterionFixer for RubricFixer {
    fn criterion(&self) -> CriterionId {
        self.rubric.criterion()
    }

    async fn propose_fix(
        &self,
        text: &str,
        score: &CriterionScore,
        context: &ValidationContext,
    ) -> Result<FixResult, FixError> {
        let criterion = self.criterion();
        let synthesis = self
            .synthesizer
            .synthesize(SynthesisRequest {
                criterion,
                text,
                score,
                instructions: self.rubric.fix_instructions(),
                project_context: context.project_context.as_deref(),
            })
            .await
            .map_err(|source| FixError::Capability { criterion, source })?;

        match synthesis {
            Synthesis::Revision(revision) => {
                let revision = revision.trim();
                if revision.is_empty() || revision == text.trim() {
                    Err(FixError::NoImprovement(criterion))
                } else {
                    Ok(FixResult::Revise(revision.to_string()))
                }
            }
            Synthesis::SplitProposal(_) if !criterion.may_split() => {
                Err(FixError::UnexpectedSplit(criterion))
            }
            Synthesis::SplitProposal(children) => Ok(FixResult::Split(validate_split(children)?)),
        }
    }
}

/// Reject degenerate splits: fewer than two children or an empty child.
pub fn validate_split(children: Vec<SplitChild>) -> Result<Vec<SplitChild>, SplitError> {
    if children.len() < 2 {
        return Err(SplitError::TooFewChildren(children.len()));
    }
    if let Some(index) = children.iter().position(|c| c.text.trim().is_empty()) {
        return Err(SplitError::EmptyChild(index));
    }
    Ok(children
        .into_iter()
        .map(|c| SplitChild::new(c.text.trim(), c.rationale))
        .collect())
}

/// One evaluator and one fixer per criterion.
#[derive(Clone)]
pub struct CriterionSuite {
    evaluators: [Arc<dyn CriterionEvaluator>; 10],
    fixers: [Arc<dyn CriterionFixer>; 10],
}

impl CriterionSuite {
    /// Rubric-backed evaluators and fixers over the given capabilities.
    pub fn new(scorer: Arc<dyn ScoringCapability>, synthesizer: Arc<dyn SynthesisCapability>) -> Self {
        Self {
            evaluators: CriterionId::ALL.map(|criterion| {
                Arc::new(RubricEvaluator::new(criterion, Arc::clone(&scorer))) as Arc<dyn CriterionEvaluator>
            }),
            fixers: CriterionId::ALL.map(|criterion| {
                Arc::new(RubricFixer::new(criterion, Arc::clone(&synthesizer))) as Arc<dyn CriterionFixer>
            }),
        }
    }

    /// Replace the evaluator for `evaluator.criterion()`.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn CriterionEvaluator>) -> Self {
        let slot = evaluator.criterion() as usize;
        self.evaluators[slot] = evaluator;
        self
    }

    /// Replace the fixer for `fixer.criterion()`.
    pub fn with_fixer(mut self, fixer: Arc<dyn CriterionFixer>) -> Self {
        let slot = fixer.criterion() as usize;
        self.fixers[slot] = fixer;
        self
    }

    pub fn evaluator(&self, criterion: CriterionId) -> Arc<dyn CriterionEvaluator> {
        Arc::clone(&self.evaluators[criterion as usize])
    }

    pub fn fixer(&self, criterion: CriterionId) -> Arc<dyn CriterionFixer> {
        Arc::clone(&self.fixers[criterion as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::CapabilityError;
    use crate::domain::ports::RawScore;

    struct Fixed {
        score: f64,
        synthesis: Synthesis,
    }

    #[async_trait]
    impl ScoringCapability for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn score(&self, _request: ScoringRequest<'_>) -> Result<RawScore, CapabilityError> {
            Ok(RawScore {
                score: self.score,
                rationale: "fixed".into(),
            })
        }
    }

    #[async_trait]
    impl SynthesisCapability for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn synthesize(&self, _request: SynthesisRequest<'_>) -> Result<Synthesis, CapabilityError> {
            Ok(self.synthesis.clone())
        }
    }

    fn fixed(score: f64, synthesis: Synthesis) -> Arc<Fixed> {
        Arc::new(Fixed { score, synthesis })
    }

    fn low(criterion: CriterionId) -> CriterionScore {
        CriterionScore::new(criterion, 0.2, "low")
    }

    #[tokio::test]
    async fn out_of_range_scores_are_rejected() {
        for bad in [1.5, -0.1, f64::NAN] {
            let evaluator = RubricEvaluator::new(CriterionId::Clarity, fixed(bad, Synthesis::Revision(String::new())));
            let err = evaluator
                .evaluate("x", &ValidationContext::default())
                .await
                .unwrap_err();
            assert!(matches!(err, EvaluationError::OutOfRange { criterion: CriterionId::Clarity, .. }));
        }
    }

    #[tokio::test]
    async fn unchanged_revision_is_no_improvement() {
        let fixer = RubricFixer::new(
            CriterionId::Clarity,
            fixed(0.0, Synthesis::Revision("  same text ".into())),
        );
        let err = fixer
            .propose_fix("same text", &low(CriterionId::Clarity), &ValidationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FixError::NoImprovement(CriterionId::Clarity)));
    }

    #[tokio::test]
    async fn only_atomicity_may_split() {
        let children = vec![SplitChild::new("A must x.", "a"), SplitChild::new("B must y.", "b")];
        let clarity = RubricFixer::new(
            CriterionId::Clarity,
            fixed(0.0, Synthesis::SplitProposal(children.clone())),
        );
        let err = clarity
            .propose_fix("t", &low(CriterionId::Clarity), &ValidationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FixError::UnexpectedSplit(CriterionId::Clarity)));

        let atomicity = RubricFixer::new(
            CriterionId::Atomicity,
            fixed(0.0, Synthesis::SplitProposal(children)),
        );
        let result = atomicity
            .propose_fix("t", &low(CriterionId::Atomicity), &ValidationContext::default())
            .await
            .unwrap();
        assert!(matches!(result, FixResult::Split(ref c) if c.len() == 2));
    }

    #[test]
    fn degenerate_splits_are_rejected() {
        assert_eq!(
            validate_split(vec![SplitChild::new("only", "one")]),
            Err(SplitError::TooFewChildren(1))
        );
        assert_eq!(
            validate_split(vec![SplitChild::new("a", "x"), SplitChild::new("  ", "y")]),
            Err(SplitError::EmptyChild(1))
        );
    }

    #[test]
    fn suite_slots_follow_criterion_order() {
        let capability = fixed(0.5, Synthesis::Revision("r".into()));
        let suite = CriterionSuite::new(capability.clone(), capability);
        for criterion in CriterionId::ALL {
            assert_eq!(suite.evaluator(criterion).criterion(), criterion);
            assert_eq!(suite.fixer(criterion).criterion(), criterion);
        }
    }
}
