//! Domain layer for the Vigil requirement validator
//!
//! This module contains the core models, error taxonomy, and the port
//! traits that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    CapabilityError, DomainError, DomainResult, EvaluationError, FixError, SplitError,
    StorageError, StorageResult,
};
