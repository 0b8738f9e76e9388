//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - Serialized defaults
//! - Project YAML files under `.vigil/`
//! - `VIGIL_*` environment variable overrides
//! - Validation of the merged result

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
