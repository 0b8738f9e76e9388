use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid threshold: {0}. Must be greater than 0 and at most 1")]
    InvalidThreshold(f64),

    #[error("Invalid {name}: {value}. Must be between 0 and 1")]
    InvalidTierThreshold { name: &'static str, value: f64 },

    #[error("Invalid max_iterations: {0}. Must be between 1 and 20")]
    InvalidMaxIterations(u32),

    #[error("Invalid fix_batch_size: {0}. Must be at least 1")]
    InvalidFixBatchSize(usize),

    #[error("Invalid gating_failure_margin: {0}. Cannot be negative")]
    InvalidGatingMargin(f64),

    #[error("Invalid batch concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid notifier queue_capacity: {0}. Must be at least 1")]
    InvalidQueueCapacity(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Unknown capability provider: {0}. Must be one of: heuristic, anthropic")]
    UnknownProvider(String),

    #[error("Invalid requests_per_second: {0}. Must be positive")]
    InvalidRateLimit(u32),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];
const LOG_ROTATIONS: [&str; 3] = ["daily", "hourly", "never"];
const PROVIDERS: [&str; 2] = ["heuristic", "anthropic"];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .vigil/config.yaml (project config)
    /// 3. .vigil/local.yaml (local overrides, optional)
    /// 4. Environment variables (VIGIL_* prefix, `__` between nested keys)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// [`load`](Self::load) with `.vigil/` resolved against `root`.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(".vigil");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("VIGIL_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let validation = &config.validation;
        if !(validation.threshold > 0.0 && validation.threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(validation.threshold));
        }
        for (name, value) in [
            ("priority_threshold", validation.priority_threshold),
            ("polish_threshold", validation.polish_threshold),
            ("atomicity_threshold", validation.atomicity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidTierThreshold { name, value });
            }
        }
        if validation.max_iterations == 0 || validation.max_iterations > 20 {
            return Err(ConfigError::InvalidMaxIterations(validation.max_iterations));
        }
        if validation.fix_batch_size == 0 {
            return Err(ConfigError::InvalidFixBatchSize(validation.fix_batch_size));
        }
        if validation.gating_failure_margin.is_nan() || validation.gating_failure_margin < 0.0 {
            return Err(ConfigError::InvalidGatingMargin(validation.gating_failure_margin));
        }

        if config.batch.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(config.batch.concurrency));
        }
        if config.notifier.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(config.notifier.queue_capacity));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        if !LOG_ROTATIONS.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if !PROVIDERS.contains(&config.capability.provider.as_str()) {
            return Err(ConfigError::UnknownProvider(config.capability.provider.clone()));
        }
        if config.capability.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(config.capability.requests_per_second));
        }

        Ok(())
    }
}
