use serde::{Deserialize, Serialize};

use super::evaluation::Thresholds;

/// Main configuration structure for Vigil
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Orchestration loop configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Batch coordinator configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Progress notifier configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Provenance database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scoring and synthesis capability configuration
    #[serde(default)]
    pub capability: CapabilityConfig,
}

/// Orchestration loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ValidationConfig {
    /// Weighted-score pass bar, also the per-criterion bar for gating criteria
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Failing bar for priority-tier criteria
    #[serde(default = "default_priority_threshold")]
    pub priority_threshold: f64,

    /// Failing bar for polish-tier criteria
    #[serde(default = "default_polish_threshold")]
    pub polish_threshold: f64,

    /// Atomicity below this triggers the split path
    #[serde(default = "default_atomicity_threshold")]
    pub atomicity_threshold: f64,

    /// Hard cap on evaluate/fix iterations per requirement
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Number of fixers run concurrently per batch
    #[serde(default = "default_fix_batch_size")]
    pub fix_batch_size: usize,

    /// Skip priority/polish evaluation when every gating criterion fails widely
    #[serde(default)]
    pub early_exit_on_gating_failure: bool,

    /// How far below `threshold` a gating score must be to count as a wide failure
    #[serde(default = "default_gating_failure_margin")]
    pub gating_failure_margin: f64,

    /// Maximum split generations below a root requirement
    #[serde(default = "default_max_split_depth")]
    pub max_split_depth: u32,
}

const fn default_threshold() -> f64 {
    0.75
}

const fn default_priority_threshold() -> f64 {
    0.7
}

const fn default_polish_threshold() -> f64 {
    0.6
}

const fn default_atomicity_threshold() -> f64 {
    0.7
}

const fn default_max_iterations() -> u32 {
    3
}

const fn default_fix_batch_size() -> usize {
    3
}

const fn default_gating_failure_margin() -> f64 {
    0.3
}

const fn default_max_split_depth() -> u32 {
    2
}

impl ValidationConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            release: self.threshold,
            priority: self.priority_threshold,
            polish: self.polish_threshold,
            atomicity: self.atomicity_threshold,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            priority_threshold: default_priority_threshold(),
            polish_threshold: default_polish_threshold(),
            atomicity_threshold: default_atomicity_threshold(),
            max_iterations: default_max_iterations(),
            fix_batch_size: default_fix_batch_size(),
            early_exit_on_gating_failure: false,
            gating_failure_margin: default_gating_failure_margin(),
            max_split_depth: default_max_split_depth(),
        }
    }
}

/// Batch coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of requirements orchestrated concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

const fn default_concurrency() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Progress notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotifierConfig {
    /// Per-session backlog capacity; the oldest event is dropped on overflow
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Sessions without activity for this long are garbage-collected
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// How often the janitor sweeps idle sessions
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

const fn default_queue_capacity() -> usize {
    256
}

const fn default_idle_timeout_secs() -> u64 {
    3600
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".vigil/ledger.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl DatabaseConfig {
    /// `sqlx` connection URL for this database.
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation policy for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Scoring and synthesis capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CapabilityConfig {
    /// Which capability backs evaluation and fixing: heuristic or anthropic
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name for LLM-backed providers
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL for LLM-backed providers
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; falls back to the `ANTHROPIC_API_KEY` environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum tokens generated per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Transport-level retries for transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum retry backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Sustained request rate against the provider
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_provider() -> String {
    "heuristic".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

const fn default_requests_per_second() -> u32 {
    5
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            requests_per_second: default_requests_per_second(),
        }
    }
}
