//! Provenance records: the append-only audit trail of a requirement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::criterion::CriterionId;
use super::evaluation::EvaluationSnapshot;
use super::requirement::Verdict;

/// One applied fix, scored before and after.
///
/// The record does not assume improvement: `score_after` may be lower than
/// `score_before`, and is `None` when re-evaluation of the revised text failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixApplication {
    pub criterion: CriterionId,
    /// Text the accepted revision was computed from.
    pub text_before: String,
    pub text_after: String,
    pub score_before: f64,
    pub score_after: Option<f64>,
    /// Set when the speculative revision was computed on stale text and the
    /// fixer had to be re-run on the merged text.
    pub rebased: bool,
    pub applied_at: DateTime<Utc>,
}

/// One pass of the evaluate → fix loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based, contiguous per requirement.
    pub iteration_number: u32,
    pub text_before: String,
    pub text_after: String,
    pub snapshot: EvaluationSnapshot,
    /// In merge order.
    pub fixes_applied: Vec<FixApplication>,
    /// The requirement was split in this iteration; `text_after == text_before`.
    pub ended_in_split: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Iteration {
    pub fn changed_text(&self) -> bool {
        self.text_before != self.text_after
    }
}

/// A child proposed by the atomicity fixer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitChild {
    pub text: String,
    pub rationale: String,
}

impl SplitChild {
    pub fn new(text: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rationale: rationale.into(),
        }
    }
}

/// Parent → child edge created by a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitEdge {
    pub parent_requirement_id: Uuid,
    pub child_requirement_id: Uuid,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

/// Terminal outcome of one orchestration run, appended when it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub requirement_id: Uuid,
    pub verdict: Verdict,
    pub final_text: String,
    pub final_score: f64,
    pub snapshot: EvaluationSnapshot,
    pub iterations_executed: u32,
    pub cancelled: bool,
    pub recorded_at: DateTime<Utc>,
}
