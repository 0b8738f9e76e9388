//! Vigil - iterative requirement validation
//!
//! Vigil scores a natural-language requirement against ten quality criteria,
//! repairs the failing ones in tier order, and repeats until the requirement
//! clears the release bar, runs out of iterations, or is split into atomic
//! children. Every iteration and every fix is appended to a provenance
//! ledger, and progress is streamed to session subscribers as it happens.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, error taxonomy, and port traits
//! - **Service Layer** (`services`): criteria, orchestration loop, batch
//!   coordinator, ledger, and progress notifier
//! - **Adapters** (`adapters`): `SQLite` and in-memory stores, heuristic and
//!   Anthropic capabilities
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil::adapters::{HeuristicCapability, InMemoryProvenanceStore};
//! use vigil::services::{CriterionSuite, ProgressNotifier, ProvenanceLedger, RequirementOrchestrator};
//!
//! let heuristic = Arc::new(HeuristicCapability::new());
//! let orchestrator = RequirementOrchestrator::new(
//!     CriterionSuite::new(heuristic.clone(), heuristic),
//!     Arc::new(ProvenanceLedger::new(Arc::new(InMemoryProvenanceStore::new()))),
//!     Arc::new(ProgressNotifier::default()),
//!     Default::default(),
//! );
//! let result = orchestrator
//!     .process(uuid::Uuid::new_v4(), "The app must be fast", &Default::default(), None)
//!     .await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    BatchItem, BatchReport, Config, CriterionId, EvaluationSnapshot, ProgressEvent,
    ProgressPayload, Requirement, SessionId, TerminalResult, Tier, ValidationConfig,
    ValidationContext, Verdict,
};
pub use domain::ports::{ProvenanceStore, ScoringCapability, SynthesisCapability};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BatchCoordinator, ProgressNotifier, ProvenanceLedger, RequirementOrchestrator};
