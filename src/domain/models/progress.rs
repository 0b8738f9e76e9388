//! Progress events relayed to session subscribers.
//!
//! Each event carries enough data (old/new text, criterion, scores) for a
//! consumer to render a live diff without querying the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::criterion::CriterionId;
use super::evaluation::CriterionOutcome;
use super::outcome::SplitChildInfo;
use super::requirement::Verdict;

/// Caller-supplied correlation id grouping the events of one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonically increasing sequence number assigned by the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Envelope around a [`ProgressPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub id: Uuid,
    pub sequence: SequenceNumber,
    pub session_id: SessionId,
    pub requirement_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: ProgressPayload,
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressPayload {
    EvaluationStarted {
        iteration: u32,
        text: String,
    },
    EvaluationCompleted {
        iteration: u32,
        weighted_score: f64,
        verdict: Verdict,
        scores: Vec<CriterionOutcome>,
    },
    /// One per applied fix.
    RequirementUpdated {
        iteration: u32,
        criterion: CriterionId,
        old_text: String,
        new_text: String,
        score_before: f64,
        score_after: Option<f64>,
        rebased: bool,
    },
    RequirementSplit {
        iteration: u32,
        text: String,
        children: Vec<SplitChildInfo>,
    },
    ValidationComplete {
        verdict: Verdict,
        final_text: String,
        final_score: f64,
        iterations: u32,
        cancelled: bool,
    },
    ValidationError {
        error: String,
    },
}

impl ProgressPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressPayload::EvaluationStarted { .. } => "evaluation_started",
            ProgressPayload::EvaluationCompleted { .. } => "evaluation_completed",
            ProgressPayload::RequirementUpdated { .. } => "requirement_updated",
            ProgressPayload::RequirementSplit { .. } => "requirement_split",
            ProgressPayload::ValidationComplete { .. } => "validation_complete",
            ProgressPayload::ValidationError { .. } => "validation_error",
        }
    }

    /// `validation_complete` and `validation_error` end a requirement's stream.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ProgressPayload::ValidationComplete { .. } | ProgressPayload::ValidationError { .. }
        )
    }
}
