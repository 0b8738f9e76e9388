//! In-memory ProvenanceStore with the same append-only invariants as the
//! SQLite store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::{Iteration, OutcomeRecord, Requirement, RequirementStage, SplitEdge};
use crate::domain::ports::{ProvenanceStore, RequirementSummary};

#[derive(Debug, Default)]
struct LedgerState {
    /// Requirements in creation order.
    requirements: Vec<Requirement>,
    index: HashMap<Uuid, usize>,
    iterations: HashMap<Uuid, Vec<Iteration>>,
    edges: Vec<SplitEdge>,
    outcomes: Vec<OutcomeRecord>,
}

impl LedgerState {
    fn insert(&mut self, requirement: &Requirement) -> StorageResult<()> {
        if self.index.contains_key(&requirement.id) {
            return Err(StorageError::RequirementExists(requirement.id));
        }
        self.index.insert(requirement.id, self.requirements.len());
        self.requirements.push(requirement.clone());
        Ok(())
    }

    fn contains(&self, requirement_id: Uuid) -> bool {
        self.index.contains_key(&requirement_id)
    }

    fn check_new_iteration(&self, requirement_id: Uuid, iteration: &Iteration) -> StorageResult<()> {
        if !self.contains(requirement_id) {
            return Err(StorageError::RequirementNotFound(requirement_id));
        }
        let taken = self
            .iterations
            .get(&requirement_id)
            .is_some_and(|history| history.iter().any(|it| it.iteration_number == iteration.iteration_number));
        if taken {
            return Err(StorageError::IterationExists {
                requirement_id,
                iteration: iteration.iteration_number,
            });
        }
        Ok(())
    }

    fn push_iteration(&mut self, requirement_id: Uuid, iteration: &Iteration) {
        let history = self.iterations.entry(requirement_id).or_default();
        history.push(iteration.clone());
        history.sort_by_key(|it| it.iteration_number);
    }

    fn set_stage(&mut self, requirement_id: Uuid, stage: RequirementStage) -> StorageResult<()> {
        let index = *self
            .index
            .get(&requirement_id)
            .ok_or(StorageError::RequirementNotFound(requirement_id))?;
        self.requirements[index].stage = stage;
        Ok(())
    }

    /// Stored requirement with `current_text` derived from its history.
    fn materialize(&self, requirement: &Requirement) -> Requirement {
        let mut requirement = requirement.clone();
        requirement.current_text = self
            .iterations
            .get(&requirement.id)
            .and_then(|history| history.last())
            .map_or_else(|| requirement.original_text.clone(), |it| it.text_after.clone());
        requirement
    }
}

/// In-memory provenance store for testing.
#[derive(Debug, Default)]
pub struct InMemoryProvenanceStore {
    state: RwLock<LedgerState>,
}

impl InMemoryProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProvenanceStore for InMemoryProvenanceStore {
    async fn create_requirement(&self, requirement: &Requirement) -> StorageResult<()> {
        self.state.write().await.insert(requirement)
    }

    async fn get_requirement(&self, requirement_id: Uuid) -> StorageResult<Option<Requirement>> {
        let state = self.state.read().await;
        Ok(state
            .index
            .get(&requirement_id)
            .map(|&i| state.materialize(&state.requirements[i])))
    }

    async fn append_iteration(&self, requirement_id: Uuid, iteration: &Iteration) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.check_new_iteration(requirement_id, iteration)?;
        state.push_iteration(requirement_id, iteration);
        Ok(())
    }

    async fn append_split(
        &self,
        parent_id: Uuid,
        iteration: &Iteration,
        children: &[(Requirement, String)],
    ) -> StorageResult<Vec<SplitEdge>> {
        let mut state = self.state.write().await;
        // Validate everything first so a failure leaves no partial split behind.
        state.check_new_iteration(parent_id, iteration)?;
        for (index, (child, _)) in children.iter().enumerate() {
            if state.contains(child.id) || children[..index].iter().any(|(c, _)| c.id == child.id) {
                return Err(StorageError::RequirementExists(child.id));
            }
        }

        let mut edges = Vec::with_capacity(children.len());
        for (child, rationale) in children {
            state.insert(child)?;
            let edge = SplitEdge {
                parent_requirement_id: parent_id,
                child_requirement_id: child.id,
                rationale: rationale.clone(),
                created_at: Utc::now(),
            };
            state.edges.push(edge.clone());
            edges.push(edge);
        }
        state.push_iteration(parent_id, iteration);
        state.set_stage(parent_id, RequirementStage::Split)?;
        Ok(edges)
    }

    async fn read_history(&self, requirement_id: Uuid) -> StorageResult<Vec<Iteration>> {
        let state = self.state.read().await;
        Ok(state.iterations.get(&requirement_id).cloned().unwrap_or_default())
    }

    async fn read_children(&self, requirement_id: Uuid) -> StorageResult<Vec<SplitEdge>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .filter(|e| e.parent_requirement_id == requirement_id)
            .cloned()
            .collect())
    }

    async fn read_parent(&self, requirement_id: Uuid) -> StorageResult<Option<SplitEdge>> {
        let state = self.state.read().await;
        Ok(state
            .edges
            .iter()
            .find(|e| e.child_requirement_id == requirement_id)
            .cloned())
    }

    async fn set_current_stage(&self, requirement_id: Uuid, stage: RequirementStage) -> StorageResult<()> {
        self.state.write().await.set_stage(requirement_id, stage)
    }

    async fn append_outcome(&self, outcome: &OutcomeRecord) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if !state.contains(outcome.requirement_id) {
            return Err(StorageError::RequirementNotFound(outcome.requirement_id));
        }
        state.outcomes.push(outcome.clone());
        Ok(())
    }

    async fn latest_outcome(&self, requirement_id: Uuid) -> StorageResult<Option<OutcomeRecord>> {
        let state = self.state.read().await;
        Ok(state
            .outcomes
            .iter()
            .rev()
            .find(|o| o.requirement_id == requirement_id)
            .cloned())
    }

    async fn list_requirements(&self, limit: usize) -> StorageResult<Vec<RequirementSummary>> {
        let state = self.state.read().await;
        Ok(state
            .requirements
            .iter()
            .rev()
            .take(limit)
            .map(|stored| {
                let requirement = state.materialize(stored);
                let iteration_count = state
                    .iterations
                    .get(&requirement.id)
                    .map_or(0, |h| u32::try_from(h.len()).unwrap_or(u32::MAX));
                RequirementSummary {
                    id: requirement.id,
                    original_text: requirement.original_text,
                    current_text: requirement.current_text,
                    parent_id: requirement.parent_id,
                    split_depth: requirement.split_depth,
                    stage: requirement.stage,
                    iteration_count,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EvaluationSnapshot, Thresholds};

    fn split_iteration(text: &str) -> Iteration {
        let now = Utc::now();
        Iteration {
            iteration_number: 1,
            text_before: text.into(),
            text_after: text.into(),
            snapshot: EvaluationSnapshot::from_outcomes(Vec::new(), &Thresholds::default()),
            fixes_applied: Vec::new(),
            ended_in_split: true,
            started_at: now,
            completed_at: now,
        }
    }

    #[tokio::test]
    async fn split_records_iteration_children_and_stage_together() {
        let store = InMemoryProvenanceStore::new();
        let parent = Requirement::new(Uuid::new_v4(), "A and B", serde_json::Value::Null);
        store.create_requirement(&parent).await.unwrap();
        let a = Requirement::child_of(&parent, "A");
        let b = Requirement::child_of(&parent, "B");

        store
            .append_split(parent.id, &split_iteration("A and B"), &[(a, "a".into()), (b, "b".into())])
            .await
            .unwrap();

        let stored = store.get_requirement(parent.id).await.unwrap().unwrap();
        assert_eq!(stored.stage, RequirementStage::Split);
        assert_eq!(store.read_history(parent.id).await.unwrap().len(), 1);
        assert_eq!(store.read_children(parent.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_split_leaves_no_children() {
        let store = InMemoryProvenanceStore::new();
        let parent = Requirement::new(Uuid::new_v4(), "A and B", serde_json::Value::Null);
        store.create_requirement(&parent).await.unwrap();

        let a = Requirement::child_of(&parent, "A");
        let err = store
            .append_split(
                parent.id,
                &split_iteration("A and B"),
                &[(a.clone(), "a".into()), (a.clone(), "dup".into())],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RequirementExists(_)));
        assert!(store.read_history(parent.id).await.unwrap().is_empty());
        assert_eq!(
            store.get_requirement(parent.id).await.unwrap().unwrap().stage,
            RequirementStage::Pending
        );
        assert!(store.read_children(parent.id).await.unwrap().is_empty());
        assert!(store.get_requirement(a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryProvenanceStore::new();
        let first = Requirement::new(Uuid::new_v4(), "first", serde_json::Value::Null);
        let second = Requirement::new(Uuid::new_v4(), "second", serde_json::Value::Null);
        store.create_requirement(&first).await.unwrap();
        store.create_requirement(&second).await.unwrap();

        let listed = store.list_requirements(10).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(store.list_requirements(1).await.unwrap().len(), 1);
    }
}
