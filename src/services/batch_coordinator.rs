//! Batch coordinator: runs many requirements through the orchestrator.
//!
//! Items run concurrently up to the configured width. Children created by a
//! split are appended to the same queue and processed in turn, as long as
//! they are within the split depth limit. Results come back in enqueue order
//! with counts aggregated from the returned values.

use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    BatchConfig, BatchEntry, BatchItem, BatchReport, BatchStats, EntryOrigin, EntryStatus,
    TerminalResult, ValidationContext,
};
use crate::services::orchestrator::RequirementOrchestrator;

struct Slot {
    item: BatchItem,
    origin: EntryOrigin,
    status: Option<EntryStatus>,
}

/// Processes batches of requirements through a shared orchestrator.
pub struct BatchCoordinator {
    orchestrator: Arc<RequirementOrchestrator>,
    config: BatchConfig,
}

impl BatchCoordinator {
    /// Coordinator running at most `config.concurrency` requirements at once.
    pub fn new(orchestrator: Arc<RequirementOrchestrator>, config: BatchConfig) -> Self {
        Self { orchestrator, config }
    }

    /// Run `items` and every split child they produce to completion.
    pub async fn process_batch(&self, items: Vec<BatchItem>) -> BatchReport {
        self.process_batch_cancellable(items, &CancellationToken::new()).await
    }

    /// Process `items` and any split children they produce.
    ///
    /// Once `cancel` fires no new item starts; in-flight items wind down and
    /// report `cancelled`, and unstarted items are reported as skipped.
    #[instrument(skip(self, items, cancel), fields(items = items.len(), concurrency = self.config.concurrency))]
    pub async fn process_batch_cancellable(
        &self,
        items: Vec<BatchItem>,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let max_split_depth = self.orchestrator.config().max_split_depth;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let mut slots: Vec<Slot> = items
            .into_iter()
            .map(|item| Slot {
                item,
                origin: EntryOrigin::Input,
                status: None,
            })
            .collect();
        let mut pending: VecDeque<usize> = (0..slots.len()).collect();
        let mut tasks: JoinSet<(usize, Result<DomainResult<TerminalResult>, String>)> = JoinSet::new();
        let mut stats = BatchStats::default();

        loop {
            while !cancel.is_cancelled() {
                let Some(&index) = pending.front() else { break };
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else { break };
                pending.pop_front();

                let orchestrator = Arc::clone(&self.orchestrator);
                let item = slots[index].item.clone();
                let cancel = cancel.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let run = orchestrator.process_cancellable(
                        item.requirement_id,
                        &item.text,
                        &item.context,
                        item.session_id.as_ref(),
                        &cancel,
                    );
                    let outcome = AssertUnwindSafe(run)
                        .catch_unwind()
                        .await
                        .map_err(|_| "orchestration task panicked".to_string());
                    (index, outcome)
                });
            }

            let Some(joined) = tasks.join_next().await else { break };
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(err) => {
                    tracing::error!(error = %err, "Batch task failed to join");
                    continue;
                }
            };

            let status = match outcome {
                Ok(Ok(result)) => {
                    if let Some(split) = &result.split {
                        let parent = &slots[index].item;
                        let context = ValidationContext {
                            project_context: parent.context.project_context.clone(),
                            source_metadata: parent.context.source_metadata.clone(),
                        };
                        let session_id = parent.session_id.clone();
                        let mut queued = Vec::new();

                        for child in &split.children {
                            if child.split_depth <= max_split_depth {
                                queued.push(Slot {
                                    item: BatchItem {
                                        requirement_id: child.requirement_id,
                                        text: child.text.clone(),
                                        context: context.clone(),
                                        session_id: session_id.clone(),
                                    },
                                    origin: EntryOrigin::SplitChild {
                                        parent: result.requirement_id,
                                    },
                                    status: None,
                                });
                            } else {
                                tracing::info!(
                                    child_id = %child.requirement_id,
                                    depth = child.split_depth,
                                    "Split child beyond depth limit left for follow-up"
                                );
                                stats.depth_limited += 1;
                            }
                        }

                        stats.children_enqueued += queued.len();
                        for slot in queued {
                            pending.push_back(slots.len());
                            slots.push(slot);
                        }
                    }
                    EntryStatus::Completed {
                        result: Box::new(result),
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        requirement_id = %slots[index].item.requirement_id,
                        error = %err,
                        "Requirement failed"
                    );
                    EntryStatus::Failed { error: err.to_string() }
                }
                Err(panic) => EntryStatus::Failed { error: panic },
            };
            slots[index].status = Some(status);
        }

        let entries: Vec<BatchEntry> = slots
            .into_iter()
            .map(|slot| BatchEntry {
                requirement_id: slot.item.requirement_id,
                origin: slot.origin,
                status: slot.status.unwrap_or(EntryStatus::Skipped),
            })
            .collect();
        for entry in &entries {
            stats.record(&entry.status);
        }

        tracing::info!(
            processed = stats.processed,
            released = stats.released,
            split = stats.split,
            failed = stats.failed,
            skipped = stats.skipped,
            "Batch complete"
        );

        BatchReport { entries, stats }
    }
}
