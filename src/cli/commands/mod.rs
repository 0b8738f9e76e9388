//! CLI commands and the runtime they share.

pub mod batch;
pub mod history;
pub mod lineage;
pub mod list;
pub mod validate;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteProvenanceStore};
use crate::adapters::capabilities_from_config;
use crate::domain::models::Config;
use crate::services::{CriterionSuite, ProgressNotifier, ProvenanceLedger, RequirementOrchestrator};

/// Wired-up services for one CLI invocation.
pub struct Runtime {
    pub config: Config,
    pub orchestrator: Arc<RequirementOrchestrator>,
}

impl Runtime {
    /// Open the ledger database and build the orchestrator for `config`.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open ledger at {}", config.database.path))?;
        let ledger = Arc::new(ProvenanceLedger::new(Arc::new(SqliteProvenanceStore::new(pool))));
        let notifier = Arc::new(ProgressNotifier::new(config.notifier.clone()));

        let (scorer, synthesizer) = capabilities_from_config(&config.capability)
            .with_context(|| format!("Failed to set up capability '{}'", config.capability.provider))?;
        tracing::debug!(provider = scorer.name(), "Capabilities ready");

        let orchestrator = Arc::new(RequirementOrchestrator::new(
            CriterionSuite::new(scorer, synthesizer),
            ledger,
            notifier,
            config.validation.clone(),
        ));

        Ok(Self { config, orchestrator })
    }

    pub fn ledger(&self) -> &Arc<ProvenanceLedger> {
        self.orchestrator.ledger()
    }

    pub fn notifier(&self) -> &Arc<ProgressNotifier> {
        self.orchestrator.notifier()
    }
}
