//! Provenance store port: append-only persistence of the audit trail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::StorageResult;
use crate::domain::models::{
    Iteration, OutcomeRecord, Requirement, RequirementStage, SplitEdge,
};

/// Lightweight listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSummary {
    pub id: Uuid,
    pub original_text: String,
    pub current_text: String,
    pub parent_id: Option<Uuid>,
    pub split_depth: u32,
    pub stage: RequirementStage,
    pub iteration_count: u32,
}

/// Storage capability behind the provenance ledger.
///
/// Every write is a new row. The single exception is the `current_stage`
/// pointer, which is a cache. `current_text` on returned requirements is
/// derived from the last iteration's `text_after`, falling back to the
/// original text.
#[async_trait]
pub trait ProvenanceStore: Send + Sync {
    /// Register a requirement. Fails with `RequirementExists` on a duplicate id.
    async fn create_requirement(&self, requirement: &Requirement) -> StorageResult<()>;

    async fn get_requirement(&self, requirement_id: Uuid) -> StorageResult<Option<Requirement>>;

    /// Append one iteration with its fixes. Iteration numbers must be new.
    async fn append_iteration(&self, requirement_id: Uuid, iteration: &Iteration) -> StorageResult<()>;

    /// Record a split in one unit of work: the parent's split iteration, the
    /// children with their parent edges, and the parent's move to `Split`.
    async fn append_split(
        &self,
        parent_id: Uuid,
        iteration: &Iteration,
        children: &[(Requirement, String)],
    ) -> StorageResult<Vec<SplitEdge>>;

    /// Full iteration history in iteration order.
    async fn read_history(&self, requirement_id: Uuid) -> StorageResult<Vec<Iteration>>;

    /// Edges where `requirement_id` is the parent.
    async fn read_children(&self, requirement_id: Uuid) -> StorageResult<Vec<SplitEdge>>;

    /// The edge where `requirement_id` is the child, if any.
    async fn read_parent(&self, requirement_id: Uuid) -> StorageResult<Option<SplitEdge>>;

    async fn set_current_stage(&self, requirement_id: Uuid, stage: RequirementStage) -> StorageResult<()>;

    async fn append_outcome(&self, outcome: &OutcomeRecord) -> StorageResult<()>;

    async fn latest_outcome(&self, requirement_id: Uuid) -> StorageResult<Option<OutcomeRecord>>;

    /// Most recently created first.
    async fn list_requirements(&self, limit: usize) -> StorageResult<Vec<RequirementSummary>>;
}
