//! Orchestration against the `SQLite` provenance store.

mod common;

use uuid::Uuid;

use common::{marker, sqlite_harness, MarkerCapability, CONJUNCTION};
use vigil::adapters::sqlite::{initialize_database, SqliteProvenanceStore};
use vigil::domain::models::{
    CriterionId, DatabaseConfig, Requirement, RequirementStage, ValidationConfig, ValidationContext,
    Verdict,
};
use vigil::domain::ports::ProvenanceStore;

#[tokio::test]
async fn history_and_outcome_survive_in_sqlite() {
    let h = sqlite_harness(
        MarkerCapability::new().failing(&[CriterionId::Clarity, CriterionId::Measurability]),
        ValidationConfig::default(),
    )
    .await;
    let id = Uuid::new_v4();
    let context = ValidationContext {
        project_context: Some("billing portal".into()),
        source_metadata: serde_json::json!({ "ticket": "REQ-42" }),
    };

    let result = h
        .orchestrator
        .process(id, "The app must be fast", &context, None)
        .await
        .unwrap();
    assert_eq!(result.verdict, Verdict::ReleaseOk);

    let history = h.store.read_history(id).await.unwrap();
    assert_eq!(history.len(), result.iterations.len());
    assert_eq!(history[0].text_before, result.iterations[0].text_before);
    assert_eq!(history[0].text_after, result.final_text);
    let fixes = &history[0].fixes_applied;
    assert_eq!(fixes[0].criterion, CriterionId::Clarity);
    assert!(fixes[1].text_after.contains(&marker(CriterionId::Measurability)));

    let stored = h.store.get_requirement(id).await.unwrap().unwrap();
    assert_eq!(stored.original_text, "The app must be fast");
    assert_eq!(stored.current_text, result.final_text);
    assert_eq!(stored.stage, RequirementStage::Released);
    assert_eq!(stored.source_metadata["ticket"], "REQ-42");

    let outcome = h.store.latest_outcome(id).await.unwrap().unwrap();
    assert_eq!(outcome.verdict, Verdict::ReleaseOk);
    assert_eq!(outcome.iterations_executed, 1);
    assert_eq!(outcome.final_text, result.final_text);
}

#[tokio::test]
async fn split_lineage_is_queryable_both_ways() {
    let h = sqlite_harness(MarkerCapability::new(), ValidationConfig::default()).await;
    let id = Uuid::new_v4();
    let text = format!("Invoices are emailed monthly{CONJUNCTION}receipts are archived for 7 years");

    let result = h
        .orchestrator
        .process(id, &text, &ValidationContext::default(), None)
        .await
        .unwrap();
    assert_eq!(result.verdict, Verdict::Split);

    let edges = h.store.read_children(id).await.unwrap();
    assert_eq!(edges.len(), 2);
    assert!(h.store.read_parent(id).await.unwrap().is_none());

    for edge in &edges {
        let parent = h.store.read_parent(edge.child_requirement_id).await.unwrap().unwrap();
        assert_eq!(parent.parent_requirement_id, id);
        assert!(h.store.read_children(edge.child_requirement_id).await.unwrap().is_empty());
    }

    let listed = h.store.list_requirements(10).await.unwrap();
    assert_eq!(listed.len(), 3);
    let root = listed.iter().find(|s| s.id == id).unwrap();
    assert_eq!(root.stage, RequirementStage::Split);
    assert_eq!(root.iteration_count, 1);
}

#[tokio::test]
async fn reopened_database_keeps_requirements() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("ledger.db").display().to_string(),
        max_connections: 2,
    };

    let requirement = Requirement::new(Uuid::new_v4(), "Backups run nightly", serde_json::Value::Null);
    {
        let pool = initialize_database(&config).await.unwrap();
        SqliteProvenanceStore::new(pool)
            .create_requirement(&requirement)
            .await
            .unwrap();
    }

    let pool = initialize_database(&config).await.unwrap();
    let reopened = SqliteProvenanceStore::new(pool)
        .get_requirement(requirement.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reopened.original_text, "Backups run nightly");
    assert_eq!(reopened.stage, RequirementStage::Pending);
}
