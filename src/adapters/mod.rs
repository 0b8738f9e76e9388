//! Adapters for storage and for the scoring/synthesis capabilities.

pub mod anthropic;
pub mod heuristic;
pub mod memory;
pub mod sqlite;

pub use anthropic::AnthropicCapability;
pub use heuristic::HeuristicCapability;
pub use memory::InMemoryProvenanceStore;
pub use sqlite::SqliteProvenanceStore;

use std::sync::Arc;

use crate::domain::errors::CapabilityError;
use crate::domain::models::CapabilityConfig;
use crate::domain::ports::{ScoringCapability, SynthesisCapability};

/// Scoring and synthesis capabilities for the configured provider.
pub fn capabilities_from_config(
    config: &CapabilityConfig,
) -> Result<(Arc<dyn ScoringCapability>, Arc<dyn SynthesisCapability>), CapabilityError> {
    match config.provider.as_str() {
        "heuristic" => {
            let capability = Arc::new(HeuristicCapability::new());
            Ok((capability.clone(), capability))
        }
        "anthropic" => {
            let capability = Arc::new(AnthropicCapability::new(config.clone())?);
            Ok((capability.clone(), capability))
        }
        other => Err(CapabilityError::NotConfigured(format!("unknown capability provider '{other}'"))),
    }
}
