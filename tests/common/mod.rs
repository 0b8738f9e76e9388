//! Common test utilities for integration tests
//!
//! Provides a scripted capability whose behavior is driven by markers in the
//! requirement text, plus builders for orchestrators over the in-memory and
//! `SQLite` stores.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use vigil::adapters::sqlite::{create_migrated_test_pool, SqliteProvenanceStore};
use vigil::adapters::InMemoryProvenanceStore;
use vigil::domain::errors::{CapabilityError, StorageError, StorageResult};
use vigil::domain::models::{
    CriterionId, Iteration, OutcomeRecord, Requirement, RequirementStage, SplitChild, SplitEdge,
    ValidationConfig,
};
use vigil::domain::ports::{
    ProvenanceStore, RawScore, RequirementSummary, ScoringCapability, ScoringRequest, Synthesis,
    SynthesisCapability, SynthesisRequest,
};
use vigil::services::{CriterionSuite, ProgressNotifier, ProvenanceLedger, RequirementOrchestrator};

pub const PASSING: f64 = 0.95;
pub const FAILING: f64 = 0.3;

/// Joins independent obligations; atomicity fails while it is present.
pub const CONJUNCTION: &str = " AND ";

/// Marker a fix for `criterion` appends to the text.
pub fn marker(criterion: CriterionId) -> String {
    format!("[{criterion}]")
}

/// Scripted scoring and synthesis.
///
/// Criteria named in `failing` score [`FAILING`] until their marker appears
/// in the text; every other criterion scores [`PASSING`]. Atomicity fails
/// whenever the text contains [`CONJUNCTION`] and its fixer splits at the
/// first one, so a text with two conjunctions needs two generations.
/// A `stubborn` criterion's fixer changes the text without adding the
/// marker, so it never recovers.
#[derive(Default)]
pub struct MarkerCapability {
    failing: HashSet<CriterionId>,
    stubborn: HashSet<CriterionId>,
    unscorable: HashSet<CriterionId>,
    failing_scores: HashMap<CriterionId, f64>,
    latency: Option<Duration>,
    synthesis_calls: Mutex<Vec<(CriterionId, String)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MarkerCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, criteria: &[CriterionId]) -> Self {
        self.failing.extend(criteria.iter().copied());
        self
    }

    pub fn stubborn(mut self, criterion: CriterionId) -> Self {
        self.failing.insert(criterion);
        self.stubborn.insert(criterion);
        self
    }

    /// Score `criterion` at `score` instead of [`FAILING`] until it is fixed.
    pub fn failing_at(mut self, criterion: CriterionId, score: f64) -> Self {
        self.failing.insert(criterion);
        self.failing_scores.insert(criterion, score);
        self
    }

    pub fn unscorable(mut self, criterion: CriterionId) -> Self {
        self.unscorable.insert(criterion);
        self
    }

    /// Delay every synthesis call, to widen concurrency windows.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every synthesis request seen so far, as `(criterion, input text)`.
    pub fn synthesis_calls(&self) -> Vec<(CriterionId, String)> {
        self.synthesis_calls.lock().unwrap().clone()
    }

    /// Highest number of synthesis calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn score_for(&self, criterion: CriterionId, text: &str) -> f64 {
        if criterion == CriterionId::Atomicity && text.contains(CONJUNCTION) {
            return 0.2;
        }
        if self.stubborn.contains(&criterion) {
            return FAILING;
        }
        if self.failing.contains(&criterion) && !text.contains(&marker(criterion)) {
            self.failing_scores.get(&criterion).copied().unwrap_or(FAILING)
        } else {
            PASSING
        }
    }
}

#[async_trait]
impl ScoringCapability for MarkerCapability {
    fn name(&self) -> &str {
        "marker"
    }

    async fn score(&self, request: ScoringRequest<'_>) -> Result<RawScore, CapabilityError> {
        if self.unscorable.contains(&request.criterion) {
            return Err(CapabilityError::Transport("scripted outage".into()));
        }
        Ok(RawScore {
            score: self.score_for(request.criterion, request.text),
            rationale: format!("scripted {}", request.criterion),
        })
    }
}

#[async_trait]
impl SynthesisCapability for MarkerCapability {
    fn name(&self) -> &str {
        "marker"
    }

    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Synthesis, CapabilityError> {
        self.synthesis_calls
            .lock()
            .unwrap()
            .push((request.criterion, request.text.to_string()));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if request.criterion == CriterionId::Atomicity && request.text.contains(CONJUNCTION) {
            let children = request
                .text
                .splitn(2, CONJUNCTION)
                .map(|part| SplitChild::new(part.trim(), "independent obligation"))
                .collect();
            return Ok(Synthesis::SplitProposal(children));
        }

        if self.stubborn.contains(&request.criterion) {
            return Ok(Synthesis::Revision(format!("{} ~", request.text)));
        }
        Ok(Synthesis::Revision(format!("{} {}", request.text, marker(request.criterion))))
    }
}

pub struct Harness {
    pub orchestrator: Arc<RequirementOrchestrator>,
    pub capability: Arc<MarkerCapability>,
    pub store: Arc<dyn ProvenanceStore>,
}

/// A ledger write that [`FlakyStore`] refuses once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingWrite {
    /// The n-th `append_iteration` call, counting from 1.
    Iteration(usize),
    Split,
    Stage(RequirementStage),
    Outcome,
}

/// In-memory store that fails the first write matching `failing`.
pub struct FlakyStore {
    inner: InMemoryProvenanceStore,
    failing: FailingWrite,
    tripped: AtomicBool,
    iteration_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failing: FailingWrite) -> Self {
        Self {
            inner: InMemoryProvenanceStore::new(),
            failing,
            tripped: AtomicBool::new(false),
            iteration_calls: AtomicUsize::new(0),
        }
    }

    fn check(&self, write: FailingWrite) -> StorageResult<()> {
        if write == self.failing && !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Database(format!("disk full during {write:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ProvenanceStore for FlakyStore {
    async fn create_requirement(&self, requirement: &Requirement) -> StorageResult<()> {
        self.inner.create_requirement(requirement).await
    }

    async fn get_requirement(&self, requirement_id: Uuid) -> StorageResult<Option<Requirement>> {
        self.inner.get_requirement(requirement_id).await
    }

    async fn append_iteration(&self, requirement_id: Uuid, iteration: &Iteration) -> StorageResult<()> {
        let call = self.iteration_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check(FailingWrite::Iteration(call))?;
        self.inner.append_iteration(requirement_id, iteration).await
    }

    async fn append_split(
        &self,
        parent_id: Uuid,
        iteration: &Iteration,
        children: &[(Requirement, String)],
    ) -> StorageResult<Vec<SplitEdge>> {
        self.check(FailingWrite::Split)?;
        self.inner.append_split(parent_id, iteration, children).await
    }

    async fn read_history(&self, requirement_id: Uuid) -> StorageResult<Vec<Iteration>> {
        self.inner.read_history(requirement_id).await
    }

    async fn read_children(&self, requirement_id: Uuid) -> StorageResult<Vec<SplitEdge>> {
        self.inner.read_children(requirement_id).await
    }

    async fn read_parent(&self, requirement_id: Uuid) -> StorageResult<Option<SplitEdge>> {
        self.inner.read_parent(requirement_id).await
    }

    async fn set_current_stage(&self, requirement_id: Uuid, stage: RequirementStage) -> StorageResult<()> {
        self.check(FailingWrite::Stage(stage))?;
        self.inner.set_current_stage(requirement_id, stage).await
    }

    async fn append_outcome(&self, outcome: &OutcomeRecord) -> StorageResult<()> {
        self.check(FailingWrite::Outcome)?;
        self.inner.append_outcome(outcome).await
    }

    async fn latest_outcome(&self, requirement_id: Uuid) -> StorageResult<Option<OutcomeRecord>> {
        self.inner.latest_outcome(requirement_id).await
    }

    async fn list_requirements(&self, limit: usize) -> StorageResult<Vec<RequirementSummary>> {
        self.inner.list_requirements(limit).await
    }
}

fn build(capability: MarkerCapability, store: Arc<dyn ProvenanceStore>, config: ValidationConfig) -> Harness {
    let capability = Arc::new(capability);
    let orchestrator = RequirementOrchestrator::new(
        CriterionSuite::new(capability.clone(), capability.clone()),
        Arc::new(ProvenanceLedger::new(Arc::clone(&store))),
        Arc::new(ProgressNotifier::default()),
        config,
    );
    Harness {
        orchestrator: Arc::new(orchestrator),
        capability,
        store,
    }
}

/// Orchestrator over an in-memory ledger.
pub fn harness(capability: MarkerCapability, config: ValidationConfig) -> Harness {
    build(capability, Arc::new(InMemoryProvenanceStore::new()), config)
}

/// Orchestrator over a store that refuses one write.
pub fn flaky_harness(capability: MarkerCapability, failing: FailingWrite, config: ValidationConfig) -> Harness {
    build(capability, Arc::new(FlakyStore::new(failing)), config)
}

/// Orchestrator over a migrated in-memory `SQLite` ledger.
pub async fn sqlite_harness(capability: MarkerCapability, config: ValidationConfig) -> Harness {
    let pool = create_migrated_test_pool().await.expect("Failed to create test pool");
    build(capability, Arc::new(SqliteProvenanceStore::new(pool)), config)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
