//! Domain models for requirement validation.

pub mod config;
pub mod criterion;
pub mod evaluation;
pub mod outcome;
pub mod progress;
pub mod provenance;
pub mod requirement;

pub use config::{
    BatchConfig, CapabilityConfig, Config, DatabaseConfig, LoggingConfig, NotifierConfig,
    ValidationConfig,
};
pub use criterion::{CriterionId, Tier};
pub use evaluation::{CriterionOutcome, CriterionScore, EvaluationSnapshot, Thresholds};
pub use outcome::{
    BatchEntry, BatchItem, BatchReport, BatchStats, EntryOrigin, EntryStatus, SplitChildInfo,
    SplitInfo, TerminalResult, ValidationContext,
};
pub use progress::{ProgressEvent, ProgressPayload, SequenceNumber, SessionId};
pub use provenance::{FixApplication, Iteration, OutcomeRecord, SplitChild, SplitEdge};
pub use requirement::{Requirement, RequirementStage, Verdict};
