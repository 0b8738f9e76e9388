//! Domain errors for the Vigil requirement validation system.
//!
//! The taxonomy mirrors how the orchestrator reacts to each failure:
//!
//! - [`EvaluationError`] -- a criterion could not be scored this round. The
//!   criterion is recorded as unknown and evaluated again next iteration.
//! - [`FixError`] -- a criterion could not be repaired this round. It stays
//!   failing and the loop continues.
//! - [`SplitError`] -- an atomic split was proposed but is degenerate. The
//!   proposal is discarded and atomicity stays failing for the iteration.
//! - [`StorageError`] -- a provenance write failed. Fatal for the requirement.

use thiserror::Error;
use uuid::Uuid;

use super::models::criterion::CriterionId;

/// Errors raised by an external scoring or synthesis capability.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("Capability transport failed: {0}")]
    Transport(String),

    #[error("Capability returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Capability rejected the request: {0}")]
    Rejected(String),

    #[error("Capability is not configured: {0}")]
    NotConfigured(String),
}

/// A criterion could not be scored this round.
#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("Scoring {criterion} failed: {source}")]
    Capability {
        criterion: CriterionId,
        #[source]
        source: CapabilityError,
    },

    #[error("Scoring {criterion} produced out-of-range score {score}")]
    OutOfRange { criterion: CriterionId, score: f64 },
}

/// A criterion could not be repaired this round.
#[derive(Debug, Clone, Error)]
pub enum FixError {
    #[error("Fixing {criterion} failed: {source}")]
    Capability {
        criterion: CriterionId,
        #[source]
        source: CapabilityError,
    },

    #[error("No improvement could be synthesized for {0}")]
    NoImprovement(CriterionId),

    #[error("Criterion {0} proposed a split, only atomicity may split")]
    UnexpectedSplit(CriterionId),

    #[error(transparent)]
    Split(#[from] SplitError),
}

/// An atomic split was requested but the proposal cannot be accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("Split produced {0} children, at least 2 are required")]
    TooFewChildren(usize),

    #[error("Split child {0} has empty text")]
    EmptyChild(usize),

    #[error("Split depth limit {0} reached")]
    DepthLimit(u32),
}

/// A provenance write or read failed.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Requirement not found: {0}")]
    RequirementNotFound(Uuid),

    #[error("Requirement already exists: {0}")]
    RequirementExists(Uuid),

    #[error("Iteration {iteration} already recorded for requirement {requirement_id}")]
    IterationExists { requirement_id: Uuid, iteration: u32 },

    #[error("Requirement {0} already has a parent edge")]
    ParentExists(Uuid),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Domain-level errors surfaced by the orchestrator and batch coordinator.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Requirement {0} is terminal (split) and cannot be processed again")]
    RequirementTerminal(Uuid),

    #[error("Requirement {0} already exists with different current text")]
    ConflictingText(Uuid),

    #[error("Validation input rejected: {0}")]
    InvalidInput(String),

    #[error("Orchestration task failed: {0}")]
    ExecutionFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

pub type StorageResult<T> = Result<T, StorageError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Storage(err.into())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_converts_into_domain_error() {
        let err: DomainError = StorageError::RequirementNotFound(Uuid::nil()).into();
        assert!(matches!(err, DomainError::Storage(StorageError::RequirementNotFound(_))));
    }

    #[test]
    fn split_error_wraps_into_fix_error() {
        let err: FixError = SplitError::TooFewChildren(1).into();
        assert_eq!(err.to_string(), "Split produced 1 children, at least 2 are required");
    }
}
