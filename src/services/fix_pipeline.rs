//! Batched fix application with a tier-ordered merge.
//!
//! Failing criteria arrive gating first. They are chunked into batches; every
//! fixer in a batch runs concurrently against the batch's base text, and the
//! proposals are then merged one by one in tier order. A proposal computed
//! from text that an earlier merge has since replaced is discarded and its
//! fixer re-run on the merged text, so an accepted revision is never built on
//! stale text.

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::FixError;
use crate::domain::models::{CriterionId, CriterionScore, FixApplication, ValidationContext};
use crate::domain::ports::FixResult;
use crate::services::criteria::CriterionSuite;

/// Speculative revision computed from `base`.
struct Proposal {
    revision: Result<String, FixError>,
    score_after: Option<f64>,
}

/// Fix application for one iteration.
pub struct FixPipeline<'a> {
    suite: &'a CriterionSuite,
    context: &'a ValidationContext,
    batch_size: usize,
    cancel: &'a CancellationToken,
}

impl<'a> FixPipeline<'a> {
    /// Pipeline merging `batch_size` concurrent fixes at a time (at least one).
    pub fn new(
        suite: &'a CriterionSuite,
        context: &'a ValidationContext,
        batch_size: usize,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            suite,
            context,
            batch_size: batch_size.max(1),
            cancel,
        }
    }

    /// Apply fixes for `failing` to `text`, returning the merged text and
    /// the accepted fixes in merge order.
    pub async fn apply(&self, text: &str, failing: &[CriterionScore]) -> (String, Vec<FixApplication>) {
        let mut current = text.to_string();
        let mut applied = Vec::new();

        for batch in failing.chunks(self.batch_size) {
            if self.cancel.is_cancelled() {
                tracing::info!(applied = applied.len(), "Fixing stopped by cancellation");
                break;
            }

            let base = current.clone();
            let proposals = join_all(batch.iter().map(|score| self.propose(&base, score))).await;

            for (score, proposal) in batch.iter().zip(proposals) {
                let fix = if current == base {
                    match proposal.revision {
                        Ok(revision) => Some(self.application(score, &current, revision, proposal.score_after, false)),
                        Err(err) => {
                            log_rejected(score.criterion, &err);
                            None
                        }
                    }
                } else if self.cancel.is_cancelled() {
                    None
                } else {
                    tracing::debug!(criterion = %score.criterion, "Rebasing fix onto merged text");
                    let rebased = self.propose(&current, score).await;
                    match rebased.revision {
                        Ok(revision) => Some(self.application(score, &current, revision, rebased.score_after, true)),
                        Err(err) => {
                            log_rejected(score.criterion, &err);
                            None
                        }
                    }
                };

                if let Some(fix) = fix {
                    current.clone_from(&fix.text_after);
                    applied.push(fix);
                }
            }
        }

        (current, applied)
    }

    /// Run one fixer and re-score its revision on the same criterion.
    async fn propose(&self, text: &str, score: &CriterionScore) -> Proposal {
        let fixer = self.suite.fixer(score.criterion);
        let revision = match fixer.propose_fix(text, score, self.context).await {
            Ok(FixResult::Revise(revision)) => Ok(revision),
            Ok(FixResult::Split(_)) => Err(FixError::UnexpectedSplit(score.criterion)),
            Err(err) => Err(err),
        };

        let score_after = match &revision {
            Ok(revision) => self.rescore(score.criterion, revision).await,
            Err(_) => None,
        };

        Proposal { revision, score_after }
    }

    /// Score `text` on one criterion; `None` when evaluation fails.
    pub async fn rescore(&self, criterion: CriterionId, text: &str) -> Option<f64> {
        match self.suite.evaluator(criterion).evaluate(text, self.context).await {
            Ok(score) => Some(score.score),
            Err(err) => {
                tracing::warn!(criterion = %criterion, error = %err, "Re-evaluation after fix failed");
                None
            }
        }
    }

    fn application(
        &self,
        score: &CriterionScore,
        text_before: &str,
        text_after: String,
        score_after: Option<f64>,
        rebased: bool,
    ) -> FixApplication {
        tracing::debug!(
            criterion = %score.criterion,
            score_before = score.score,
            score_after = ?score_after,
            rebased,
            "Fix accepted"
        );
        FixApplication {
            criterion: score.criterion,
            text_before: text_before.to_string(),
            text_after,
            score_before: score.score,
            score_after,
            rebased,
            applied_at: Utc::now(),
        }
    }
}

fn log_rejected(criterion: CriterionId, err: &FixError) {
    tracing::info!(criterion = %criterion, error = %err, "No fix applied, criterion stays failing");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::EvaluationError;
    use crate::domain::ports::{CriterionEvaluator, CriterionFixer};
    use crate::services::criteria::CriterionSuite;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Appends a marker to whatever text it is given and records its inputs.
    struct Appender {
        criterion: CriterionId,
        marker: &'static str,
        seen: Arc<Mutex<Vec<(CriterionId, String)>>>,
    }

    #[async_trait]
    impl CriterionFixer for Appender {
        fn criterion(&self) -> CriterionId {
            self.criterion
        }

        async fn propose_fix(
            &self,
            text: &str,
            _score: &CriterionScore,
            _context: &ValidationContext,
        ) -> Result<FixResult, FixError> {
            self.seen.lock().unwrap().push((self.criterion, text.to_string()));
            Ok(FixResult::Revise(format!("{text} {}", self.marker)))
        }
    }

    struct Refuses(CriterionId);

    #[async_trait]
    impl CriterionFixer for Refuses {
        fn criterion(&self) -> CriterionId {
            self.0
        }

        async fn propose_fix(
            &self,
            _text: &str,
            _score: &CriterionScore,
            _context: &ValidationContext,
        ) -> Result<FixResult, FixError> {
            Err(FixError::NoImprovement(self.0))
        }
    }

    struct Unscorable(CriterionId);

    #[async_trait]
    impl CriterionEvaluator for Unscorable {
        fn criterion(&self) -> CriterionId {
            self.0
        }

        async fn evaluate(&self, _text: &str, _context: &ValidationContext) -> Result<CriterionScore, EvaluationError> {
            Err(EvaluationError::OutOfRange {
                criterion: self.0,
                score: 2.0,
            })
        }
    }

    fn suite() -> CriterionSuite {
        let heuristic = Arc::new(crate::adapters::HeuristicCapability::new());
        CriterionSuite::new(heuristic.clone(), heuristic)
    }

    fn failing(criterion: CriterionId) -> CriterionScore {
        CriterionScore::new(criterion, 0.1, "failing")
    }

    #[tokio::test]
    async fn later_fixes_see_earlier_merged_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let suite = suite()
            .with_fixer(Arc::new(Appender {
                criterion: CriterionId::Clarity,
                marker: "[clarity]",
                seen: Arc::clone(&seen),
            }))
            .with_fixer(Arc::new(Appender {
                criterion: CriterionId::Conciseness,
                marker: "[concise]",
                seen: Arc::clone(&seen),
            }));
        let context = ValidationContext::default();
        let cancel = CancellationToken::new();
        let pipeline = FixPipeline::new(&suite, &context, 3, &cancel);

        let (text, fixes) = pipeline
            .apply("base", &[failing(CriterionId::Clarity), failing(CriterionId::Conciseness)])
            .await;

        assert_eq!(text, "base [clarity] [concise]");
        assert_eq!(fixes.len(), 2);
        assert!(!fixes[0].rebased);
        assert!(fixes[1].rebased);
        assert_eq!(fixes[1].text_before, "base [clarity]");

        let seen = seen.lock().unwrap();
        assert!(seen.contains(&(CriterionId::Conciseness, "base [clarity]".to_string())));
    }

    #[tokio::test]
    async fn rejected_proposal_does_not_force_rebase() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let suite = suite()
            .with_fixer(Arc::new(Refuses(CriterionId::Clarity)))
            .with_fixer(Arc::new(Appender {
                criterion: CriterionId::Measurability,
                marker: "[measured]",
                seen,
            }));
        let context = ValidationContext::default();
        let cancel = CancellationToken::new();
        let pipeline = FixPipeline::new(&suite, &context, 3, &cancel);

        let (text, fixes) = pipeline
            .apply("base", &[failing(CriterionId::Clarity), failing(CriterionId::Measurability)])
            .await;

        assert_eq!(text, "base [measured]");
        assert_eq!(fixes.len(), 1);
        assert!(!fixes[0].rebased);
    }

    #[tokio::test]
    async fn batches_chain_their_base_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let suite = suite()
            .with_fixer(Arc::new(Appender {
                criterion: CriterionId::Clarity,
                marker: "a",
                seen: Arc::clone(&seen),
            }))
            .with_fixer(Arc::new(Appender {
                criterion: CriterionId::Testability,
                marker: "b",
                seen: Arc::clone(&seen),
            }));
        let context = ValidationContext::default();
        let cancel = CancellationToken::new();
        let pipeline = FixPipeline::new(&suite, &context, 1, &cancel);

        let (text, fixes) = pipeline
            .apply("x", &[failing(CriterionId::Clarity), failing(CriterionId::Testability)])
            .await;

        assert_eq!(text, "x a b");
        assert!(fixes.iter().all(|f| !f.rebased));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_rescore_is_recorded_as_unknown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let suite = suite()
            .with_fixer(Arc::new(Appender {
                criterion: CriterionId::Clarity,
                marker: "[c]",
                seen,
            }))
            .with_evaluator(Arc::new(Unscorable(CriterionId::Clarity)));
        let context = ValidationContext::default();
        let cancel = CancellationToken::new();
        let pipeline = FixPipeline::new(&suite, &context, 3, &cancel);

        let (_, fixes) = pipeline.apply("base", &[failing(CriterionId::Clarity)]).await;
        assert_eq!(fixes[0].score_after, None);
    }

    #[tokio::test]
    async fn cancelled_pipeline_issues_no_fixes() {
        let suite = suite();
        let context = ValidationContext::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pipeline = FixPipeline::new(&suite, &context, 3, &cancel);

        let (text, fixes) = pipeline.apply("The app must be fast", &[failing(CriterionId::Clarity)]).await;
        assert_eq!(text, "The app must be fast");
        assert!(fixes.is_empty());
    }
}
