//! Results returned to callers of the orchestrator and batch coordinator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::criterion::CriterionId;
use super::evaluation::CriterionOutcome;
use super::progress::SessionId;
use super::provenance::Iteration;
use super::requirement::Verdict;

/// One split child as reported in a terminal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitChildInfo {
    pub requirement_id: Uuid,
    pub text: String,
    pub rationale: String,
    pub split_depth: u32,
}

/// Present on a terminal result only when the verdict is `split`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub children: Vec<SplitChildInfo>,
}

/// Everything a caller needs after orchestration finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalResult {
    pub requirement_id: Uuid,
    pub original_text: String,
    pub final_text: String,
    pub final_score: f64,
    /// Per-criterion outcomes of the last evaluation.
    pub scores: Vec<CriterionOutcome>,
    pub verdict: Verdict,
    /// Iterations executed by this run.
    pub iterations: Vec<Iteration>,
    pub split: Option<SplitInfo>,
    /// The run stopped early because its batch was cancelled.
    pub cancelled: bool,
}

impl TerminalResult {
    pub fn score(&self, criterion: CriterionId) -> Option<f64> {
        self.scores
            .iter()
            .find(|o| o.criterion() == criterion)
            .and_then(CriterionOutcome::score)
    }

    pub fn iteration_count(&self) -> usize {
        self.iterations.len()
    }
}

/// Caller-supplied context carried into every capability call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    /// Free-form project or domain description forwarded to prompts.
    #[serde(default)]
    pub project_context: Option<String>,
    /// Opaque metadata stored on the requirement and copied to split children.
    #[serde(default)]
    pub source_metadata: serde_json::Value,
}

/// One input to [`process_batch`](crate::services::BatchCoordinator::process_batch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(default = "Uuid::new_v4")]
    pub requirement_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub context: ValidationContext,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

impl BatchItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            requirement_id: Uuid::new_v4(),
            text: text.into(),
            context: ValidationContext::default(),
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// Where a batch entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    Input,
    SplitChild { parent: Uuid },
}

/// How one batch entry ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Completed { result: Box<TerminalResult> },
    Failed { error: String },
    /// Never started because the batch was cancelled.
    Skipped,
}

/// One requirement processed (or not) by a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub requirement_id: Uuid,
    pub origin: EntryOrigin,
    pub status: EntryStatus,
}

impl BatchEntry {
    pub fn result(&self) -> Option<&TerminalResult> {
        match &self.status {
            EntryStatus::Completed { result } => Some(result),
            _ => None,
        }
    }
}

/// Aggregated counts, derived from the entries of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub processed: usize,
    pub released: usize,
    pub needs_improvement: usize,
    pub split: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub children_enqueued: usize,
    pub depth_limited: usize,
}

impl BatchStats {
    pub fn record(&mut self, status: &EntryStatus) {
        match status {
            EntryStatus::Completed { result } => {
                self.processed += 1;
                if result.cancelled {
                    self.cancelled += 1;
                }
                match result.verdict {
                    Verdict::ReleaseOk => self.released += 1,
                    Verdict::NeedsImprovement => self.needs_improvement += 1,
                    Verdict::Split => self.split += 1,
                }
            }
            EntryStatus::Failed { .. } => self.failed += 1,
            EntryStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Output of a batch run: entries in enqueue order plus aggregated stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn results(&self) -> impl Iterator<Item = &TerminalResult> {
        self.entries.iter().filter_map(BatchEntry::result)
    }
}
