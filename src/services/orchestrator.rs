//! Requirement orchestrator: the evaluate → fix loop for one requirement.
//!
//! ```text
//! Evaluating ──release_ok──────────────────────────────▶ Released
//!     │
//!     ├─atomicity fails, split accepted ───────────────▶ Split
//!     │
//!     └─otherwise ─▶ Fixing ─▶ (iteration recorded) ─▶ Evaluating
//!                                     │
//!                  cap reached ─▶ closing evaluation ─▶ Released | NeedsImprovement
//! ```
//!
//! Every state change is written through the requirement's ledger writer
//! before the next step starts. A storage failure stops the run.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, SplitError};
use crate::domain::models::evaluation::gating_fails_widely;
use crate::domain::models::{
    CriterionId, CriterionOutcome, EvaluationSnapshot, FixApplication, Iteration, OutcomeRecord,
    ProgressPayload, Requirement, RequirementStage, SessionId, SplitChild, SplitChildInfo,
    SplitInfo, TerminalResult, Thresholds, Tier, ValidationConfig, ValidationContext, Verdict,
};
use crate::domain::ports::FixResult;
use crate::services::criteria::CriterionSuite;
use crate::services::fix_pipeline::FixPipeline;
use crate::services::progress_notifier::ProgressNotifier;
use crate::services::provenance_ledger::{LedgerWriter, ProvenanceLedger};

/// Outcome of the atomicity step of one iteration.
enum AtomicityStep {
    Split(Vec<SplitChild>),
    Revised(FixApplication),
    Unchanged,
}

/// State of one run, threaded through the loop.
struct Run<'a> {
    requirement: Requirement,
    context: &'a ValidationContext,
    session_id: Option<&'a SessionId>,
    cancel: &'a CancellationToken,
    current_text: String,
    next_iteration: u32,
    iterations: Vec<Iteration>,
    last_snapshot: Option<EvaluationSnapshot>,
}

/// Runs one requirement through evaluation and repair.
///
/// Concurrent calls for the same requirement id queue on its ledger writer;
/// different ids run independently.
pub struct RequirementOrchestrator {
    suite: CriterionSuite,
    ledger: Arc<ProvenanceLedger>,
    notifier: Arc<ProgressNotifier>,
    config: ValidationConfig,
}

impl RequirementOrchestrator {
    /// Orchestrator over `suite`, writing to `ledger` and reporting to `notifier`.
    pub fn new(
        suite: CriterionSuite,
        ledger: Arc<ProvenanceLedger>,
        notifier: Arc<ProgressNotifier>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            suite,
            ledger,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<ProvenanceLedger> {
        &self.ledger
    }

    pub fn notifier(&self) -> &Arc<ProgressNotifier> {
        &self.notifier
    }

    /// Validate one requirement until it releases, splits, or hits the iteration cap.
    pub async fn process(
        &self,
        requirement_id: Uuid,
        text: &str,
        context: &ValidationContext,
        session_id: Option<&SessionId>,
    ) -> DomainResult<TerminalResult> {
        self.process_cancellable(requirement_id, text, context, session_id, &CancellationToken::new())
            .await
    }

    /// Like [`process`](Self::process), but stops issuing capability calls
    /// once `cancel` fires. Work already done is still recorded and the
    /// result is flagged `cancelled`.
    #[instrument(
        skip(self, text, context, session_id, cancel),
        fields(requirement_id = %requirement_id, session_id = ?session_id.map(ToString::to_string)),
        err
    )]
    pub async fn process_cancellable(
        &self,
        requirement_id: Uuid,
        text: &str,
        context: &ValidationContext,
        session_id: Option<&SessionId>,
        cancel: &CancellationToken,
    ) -> DomainResult<TerminalResult> {
        let result = self.run(requirement_id, text, context, session_id, cancel).await;

        if let Err(err) = &result {
            tracing::error!(error = %err, "Validation aborted");
            self.emit(
                session_id,
                requirement_id,
                ProgressPayload::ValidationError { error: err.to_string() },
            )
            .await;
        }

        result
    }

    async fn run(
        &self,
        requirement_id: Uuid,
        text: &str,
        context: &ValidationContext,
        session_id: Option<&SessionId>,
        cancel: &CancellationToken,
    ) -> DomainResult<TerminalResult> {
        let writer = self.ledger.writer(requirement_id).await;
        let (requirement, recorded) = self.admit(&writer, requirement_id, text, context).await?;

        let mut run = Run {
            current_text: requirement.current_text.clone(),
            requirement,
            context,
            session_id,
            cancel,
            next_iteration: recorded + 1,
            iterations: Vec::new(),
            last_snapshot: None,
        };
        let thresholds = self.config.thresholds();

        for _ in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                return self.finish(&writer, run, false, true).await;
            }

            let snapshot = self.evaluate_round(&writer, &mut run).await?;
            if snapshot.is_release_ok() {
                return self.finish(&writer, run, true, false).await;
            }
            if cancel.is_cancelled() {
                return self.finish(&writer, run, false, true).await;
            }

            writer.set_stage(RequirementStage::Fixing).await?;
            let started_at = Utc::now();
            let text_before = run.current_text.clone();
            let mut fixes = Vec::new();

            match self.atomicity_step(&run, &snapshot, &thresholds).await {
                AtomicityStep::Split(children) => {
                    return self.split(&writer, run, snapshot, children, started_at).await;
                }
                AtomicityStep::Revised(fix) => {
                    run.current_text.clone_from(&fix.text_after);
                    fixes.push(fix);
                }
                AtomicityStep::Unchanged => {}
            }

            // Atomicity below the split bar was handled above. Between the split
            // bar and the release bar it is repaired like any gating criterion.
            let split_step_ran = snapshot.atomicity_failure(&thresholds).is_some();
            let failing: Vec<_> = snapshot
                .failing(&thresholds)
                .into_iter()
                .filter(|s| !(split_step_ran && s.criterion == CriterionId::Atomicity))
                .collect();
            let pipeline = FixPipeline::new(&self.suite, context, self.config.fix_batch_size, cancel);
            let (merged, applied) = pipeline.apply(&run.current_text, &failing).await;
            run.current_text = merged;
            fixes.extend(applied);

            let iteration = Iteration {
                iteration_number: run.next_iteration,
                text_before,
                text_after: run.current_text.clone(),
                snapshot,
                fixes_applied: fixes,
                ended_in_split: false,
                started_at,
                completed_at: Utc::now(),
            };
            writer.append_iteration(&iteration).await?;
            tracing::info!(
                iteration = iteration.iteration_number,
                fixes = iteration.fixes_applied.len(),
                changed = iteration.changed_text(),
                "Iteration recorded"
            );

            for fix in &iteration.fixes_applied {
                self.emit(
                    session_id,
                    requirement_id,
                    ProgressPayload::RequirementUpdated {
                        iteration: iteration.iteration_number,
                        criterion: fix.criterion,
                        old_text: fix.text_before.clone(),
                        new_text: fix.text_after.clone(),
                        score_before: fix.score_before,
                        score_after: fix.score_after,
                        rebased: fix.rebased,
                    },
                )
                .await;
            }

            run.next_iteration += 1;
            run.iterations.push(iteration);
        }

        if cancel.is_cancelled() {
            return self.finish(&writer, run, false, true).await;
        }

        // Closing evaluation of the last revision; not an iteration.
        let snapshot = self.evaluate_round(&writer, &mut run).await?;
        let released = snapshot.is_release_ok();
        self.finish(&writer, run, released, false).await
    }

    /// Register a new requirement, or re-enter an existing one.
    ///
    /// Returns the requirement and the number of iterations already recorded.
    async fn admit(
        &self,
        writer: &LedgerWriter,
        requirement_id: Uuid,
        text: &str,
        context: &ValidationContext,
    ) -> DomainResult<(Requirement, u32)> {
        match writer.load().await? {
            None => {
                if text.trim().is_empty() {
                    return Err(DomainError::InvalidInput("requirement text is empty".into()));
                }
                let requirement = Requirement::new(requirement_id, text, context.source_metadata.clone());
                writer.register(&requirement).await?;
                tracing::debug!("Registered requirement");
                Ok((requirement, 0))
            }
            Some(requirement) if requirement.stage.is_inert() => {
                Err(DomainError::RequirementTerminal(requirement_id))
            }
            Some(requirement) if requirement.current_text != text => {
                Err(DomainError::ConflictingText(requirement_id))
            }
            Some(requirement) => {
                // Iteration numbers are contiguous from 1.
                let recorded = u32::try_from(writer.history().await?.len())
                    .map_err(|_| DomainError::InvalidInput("iteration history too long".into()))?;
                tracing::debug!(recorded, depth = requirement.split_depth, "Resuming requirement");
                Ok((requirement, recorded))
            }
        }
    }

    /// Evaluate the current text and announce it.
    async fn evaluate_round(&self, writer: &LedgerWriter, run: &mut Run<'_>) -> DomainResult<EvaluationSnapshot> {
        writer.set_stage(RequirementStage::Evaluating).await?;
        let requirement_id = run.requirement.id;

        self.emit(
            run.session_id,
            requirement_id,
            ProgressPayload::EvaluationStarted {
                iteration: run.next_iteration,
                text: run.current_text.clone(),
            },
        )
        .await;

        let mut snapshot = self.evaluate(&run.current_text, run.context).await;
        if run.requirement.split_depth >= self.config.max_split_depth {
            snapshot = snapshot.without_split();
        }
        tracing::info!(
            iteration = run.next_iteration,
            weighted_score = snapshot.weighted_score,
            verdict = %snapshot.verdict,
            unknown = snapshot.unknown().len(),
            "Evaluation completed"
        );

        self.emit(
            run.session_id,
            requirement_id,
            ProgressPayload::EvaluationCompleted {
                iteration: run.next_iteration,
                weighted_score: snapshot.weighted_score,
                verdict: snapshot.verdict,
                scores: snapshot.outcomes.clone(),
            },
        )
        .await;

        run.last_snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Score `text` on all criteria, gating first when early exit is enabled.
    pub async fn evaluate(&self, text: &str, context: &ValidationContext) -> EvaluationSnapshot {
        let thresholds = self.config.thresholds();

        if !self.config.early_exit_on_gating_failure {
            let outcomes = self.evaluate_criteria(CriterionId::ALL.into_iter(), text, context).await;
            return EvaluationSnapshot::from_outcomes(outcomes, &thresholds);
        }

        let mut outcomes = self
            .evaluate_criteria(CriterionId::in_tier(Tier::Gating), text, context)
            .await;
        if gating_fails_widely(&outcomes, &thresholds, self.config.gating_failure_margin) {
            tracing::debug!("Every gating criterion failed widely, skipping priority and polish");
            return EvaluationSnapshot::from_outcomes(outcomes, &thresholds);
        }

        let rest = CriterionId::ALL.into_iter().filter(|c| c.tier() != Tier::Gating);
        outcomes.extend(self.evaluate_criteria(rest, text, context).await);
        EvaluationSnapshot::from_outcomes(outcomes, &thresholds)
    }

    async fn evaluate_criteria(
        &self,
        criteria: impl Iterator<Item = CriterionId>,
        text: &str,
        context: &ValidationContext,
    ) -> Vec<CriterionOutcome> {
        join_all(criteria.map(|criterion| {
            let evaluator = self.suite.evaluator(criterion);
            async move {
                match evaluator.evaluate(text, context).await {
                    Ok(score) => CriterionOutcome::Scored(score),
                    Err(err) => {
                        tracing::warn!(criterion = %criterion, error = %err, "Criterion could not be scored");
                        CriterionOutcome::Failed {
                            criterion,
                            error: err.to_string(),
                        }
                    }
                }
            }
        }))
        .await
    }

    async fn atomicity_step(
        &self,
        run: &Run<'_>,
        snapshot: &EvaluationSnapshot,
        thresholds: &Thresholds,
    ) -> AtomicityStep {
        let Some(score) = snapshot.atomicity_failure(thresholds) else {
            return AtomicityStep::Unchanged;
        };

        let fixer = self.suite.fixer(CriterionId::Atomicity);
        match fixer.propose_fix(&run.current_text, score, run.context).await {
            Ok(FixResult::Split(children)) if run.requirement.split_depth >= self.config.max_split_depth => {
                let err = SplitError::DepthLimit(self.config.max_split_depth);
                tracing::warn!(children = children.len(), error = %err, "Split rejected");
                AtomicityStep::Unchanged
            }
            Ok(FixResult::Split(children)) => AtomicityStep::Split(children),
            Ok(FixResult::Revise(revision)) => {
                let pipeline = FixPipeline::new(&self.suite, run.context, 1, run.cancel);
                let score_after = pipeline.rescore(CriterionId::Atomicity, &revision).await;
                AtomicityStep::Revised(FixApplication {
                    criterion: CriterionId::Atomicity,
                    text_before: run.current_text.clone(),
                    text_after: revision,
                    score_before: score.score,
                    score_after,
                    rebased: false,
                    applied_at: Utc::now(),
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "Atomicity fix rejected, atomicity stays failing");
                AtomicityStep::Unchanged
            }
        }
    }

    async fn split(
        &self,
        writer: &LedgerWriter,
        mut run: Run<'_>,
        snapshot: EvaluationSnapshot,
        children: Vec<SplitChild>,
        started_at: chrono::DateTime<Utc>,
    ) -> DomainResult<TerminalResult> {
        let requirement_id = run.requirement.id;
        let created: Vec<(Requirement, String)> = children
            .into_iter()
            .map(|child| (Requirement::child_of(&run.requirement, child.text), child.rationale))
            .collect();

        let iteration = Iteration {
            iteration_number: run.next_iteration,
            text_before: run.current_text.clone(),
            text_after: run.current_text.clone(),
            snapshot: snapshot.clone(),
            fixes_applied: Vec::new(),
            ended_in_split: true,
            started_at,
            completed_at: Utc::now(),
        };
        writer.record_split(&iteration, &created).await?;
        run.iterations.push(iteration);

        let children: Vec<SplitChildInfo> = created
            .into_iter()
            .map(|(child, rationale)| SplitChildInfo {
                requirement_id: child.id,
                text: child.original_text,
                rationale,
                split_depth: child.split_depth,
            })
            .collect();
        tracing::info!(children = children.len(), "Requirement split");

        self.emit(
            run.session_id,
            requirement_id,
            ProgressPayload::RequirementSplit {
                iteration: run.next_iteration,
                text: run.current_text.clone(),
                children: children.clone(),
            },
        )
        .await;

        self.conclude(writer, run, Verdict::Split, snapshot, Some(SplitInfo { children }), false)
            .await
    }

    /// Finish a run that did not split.
    async fn finish(
        &self,
        writer: &LedgerWriter,
        mut run: Run<'_>,
        released: bool,
        cancelled: bool,
    ) -> DomainResult<TerminalResult> {
        let verdict = if released {
            Verdict::ReleaseOk
        } else {
            Verdict::NeedsImprovement
        };
        let snapshot = run
            .last_snapshot
            .take()
            .unwrap_or_else(|| EvaluationSnapshot::from_outcomes(Vec::new(), &self.config.thresholds()));
        self.conclude(writer, run, verdict, snapshot, None, cancelled).await
    }

    async fn conclude(
        &self,
        writer: &LedgerWriter,
        run: Run<'_>,
        verdict: Verdict,
        snapshot: EvaluationSnapshot,
        split: Option<SplitInfo>,
        cancelled: bool,
    ) -> DomainResult<TerminalResult> {
        let requirement_id = run.requirement.id;
        let iterations_executed = u32::try_from(run.iterations.len()).unwrap_or(u32::MAX);

        let outcome = OutcomeRecord {
            requirement_id,
            verdict,
            final_text: run.current_text.clone(),
            final_score: snapshot.weighted_score,
            snapshot: snapshot.clone(),
            iterations_executed,
            cancelled,
            recorded_at: Utc::now(),
        };
        writer.append_outcome(&outcome).await?;
        writer.set_stage(RequirementStage::from(verdict)).await?;

        tracing::info!(
            verdict = %verdict,
            final_score = snapshot.weighted_score,
            iterations = iterations_executed,
            cancelled,
            "Validation complete"
        );

        self.emit(
            run.session_id,
            requirement_id,
            ProgressPayload::ValidationComplete {
                verdict,
                final_text: run.current_text.clone(),
                final_score: snapshot.weighted_score,
                iterations: iterations_executed,
                cancelled,
            },
        )
        .await;

        Ok(TerminalResult {
            requirement_id,
            original_text: run.requirement.original_text,
            final_text: run.current_text,
            final_score: snapshot.weighted_score,
            scores: snapshot.outcomes,
            verdict,
            iterations: run.iterations,
            split,
            cancelled,
        })
    }

    async fn emit(&self, session_id: Option<&SessionId>, requirement_id: Uuid, payload: ProgressPayload) {
        if let Some(session_id) = session_id {
            self.notifier.publish(session_id, requirement_id, payload).await;
        }
    }
}
