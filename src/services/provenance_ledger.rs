//! Provenance ledger: the single writer path in front of a [`ProvenanceStore`].
//!
//! Reads go straight to the store. Writes for one requirement go through a
//! [`LedgerWriter`], which holds that requirement's lock for as long as it
//! lives, so two runs on the same requirement never interleave their writes.
//! Writers for different requirements proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::domain::errors::StorageResult;
use crate::domain::models::{Iteration, OutcomeRecord, Requirement, RequirementStage, SplitEdge};
use crate::domain::ports::{ProvenanceStore, RequirementSummary};

pub struct ProvenanceLedger {
    store: Arc<dyn ProvenanceStore>,
    writers: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProvenanceLedger {
    pub fn new(store: Arc<dyn ProvenanceStore>) -> Self {
        Self {
            store,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive write access to `requirement_id`.
    pub async fn writer(&self, requirement_id: Uuid) -> LedgerWriter {
        let lock = {
            let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
            // Locks only the map still references are free and unclaimed.
            writers.retain(|id, lock| *id == requirement_id || Arc::strong_count(lock) > 1);
            Arc::clone(writers.entry(requirement_id).or_default())
        };
        let guard = lock.lock_owned().await;
        LedgerWriter {
            requirement_id,
            store: Arc::clone(&self.store),
            _guard: guard,
        }
    }

    pub async fn get_requirement(&self, requirement_id: Uuid) -> StorageResult<Option<Requirement>> {
        self.store.get_requirement(requirement_id).await
    }

    pub async fn read_history(&self, requirement_id: Uuid) -> StorageResult<Vec<Iteration>> {
        self.store.read_history(requirement_id).await
    }

    pub async fn read_children(&self, requirement_id: Uuid) -> StorageResult<Vec<SplitEdge>> {
        self.store.read_children(requirement_id).await
    }

    pub async fn read_parent(&self, requirement_id: Uuid) -> StorageResult<Option<SplitEdge>> {
        self.store.read_parent(requirement_id).await
    }

    pub async fn latest_outcome(&self, requirement_id: Uuid) -> StorageResult<Option<OutcomeRecord>> {
        self.store.latest_outcome(requirement_id).await
    }

    pub async fn list_requirements(&self, limit: usize) -> StorageResult<Vec<RequirementSummary>> {
        self.store.list_requirements(limit).await
    }

    #[cfg(test)]
    fn tracked_writers(&self) -> usize {
        self.writers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Exclusive write handle for one requirement.
pub struct LedgerWriter {
    requirement_id: Uuid,
    store: Arc<dyn ProvenanceStore>,
    _guard: OwnedMutexGuard<()>,
}

impl LedgerWriter {
    pub fn requirement_id(&self) -> Uuid {
        self.requirement_id
    }

    /// Current state, read under the writer lock.
    pub async fn load(&self) -> StorageResult<Option<Requirement>> {
        self.store.get_requirement(self.requirement_id).await
    }

    pub async fn history(&self) -> StorageResult<Vec<Iteration>> {
        self.store.read_history(self.requirement_id).await
    }

    pub async fn register(&self, requirement: &Requirement) -> StorageResult<()> {
        debug_assert_eq!(requirement.id, self.requirement_id);
        self.store.create_requirement(requirement).await
    }

    pub async fn append_iteration(&self, iteration: &Iteration) -> StorageResult<()> {
        tracing::debug!(
            requirement_id = %self.requirement_id,
            iteration = iteration.iteration_number,
            fixes = iteration.fixes_applied.len(),
            "Recording iteration"
        );
        self.store.append_iteration(self.requirement_id, iteration).await
    }

    /// Record the split iteration, the children and their edges, and the
    /// parent's `Split` stage in one unit of work.
    pub async fn record_split(
        &self,
        iteration: &Iteration,
        children: &[(Requirement, String)],
    ) -> StorageResult<Vec<SplitEdge>> {
        tracing::debug!(
            requirement_id = %self.requirement_id,
            iteration = iteration.iteration_number,
            children = children.len(),
            "Recording split"
        );
        self.store.append_split(self.requirement_id, iteration, children).await
    }

    pub async fn set_stage(&self, stage: RequirementStage) -> StorageResult<()> {
        self.store.set_current_stage(self.requirement_id, stage).await
    }

    pub async fn append_outcome(&self, outcome: &OutcomeRecord) -> StorageResult<()> {
        self.store.append_outcome(outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryProvenanceStore;
    use std::time::Duration;

    fn ledger() -> ProvenanceLedger {
        ProvenanceLedger::new(Arc::new(InMemoryProvenanceStore::new()))
    }

    #[tokio::test]
    async fn writers_for_one_requirement_are_exclusive() {
        let ledger = Arc::new(ledger());
        let id = Uuid::new_v4();

        let first = ledger.writer(id).await;
        let contender = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.writer(id).await.requirement_id() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        assert_eq!(contender.await.unwrap(), id);
    }

    #[tokio::test]
    async fn writers_for_different_requirements_do_not_block() {
        let ledger = ledger();
        let _a = ledger.writer(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), ledger.writer(Uuid::new_v4())).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let ledger = ledger();
        for _ in 0..5 {
            drop(ledger.writer(Uuid::new_v4()).await);
        }
        let _held = ledger.writer(Uuid::new_v4()).await;
        assert_eq!(ledger.tracked_writers(), 1);
    }
}
