//! A failed ledger write ends the run without leaving half-recorded state.

mod common;

use uuid::Uuid;

use common::{flaky_harness, FailingWrite, MarkerCapability, CONJUNCTION};
use vigil::domain::errors::DomainError;
use vigil::domain::models::{
    CriterionId, ProgressPayload, RequirementStage, SessionId, ValidationConfig, ValidationContext,
    Verdict,
};

const FAST: &str = "The app must be fast";

fn bundled() -> String {
    format!("Users can export reports{CONJUNCTION}administrators receive alerts")
}

#[tokio::test]
async fn failed_iteration_write_stops_the_run() {
    let h = flaky_harness(
        MarkerCapability::new().stubborn(CriterionId::Clarity),
        FailingWrite::Iteration(2),
        ValidationConfig {
            max_iterations: 4,
            ..ValidationConfig::default()
        },
    );
    let session = SessionId::new("storage");
    let id = Uuid::new_v4();

    let result = h
        .orchestrator
        .process(id, FAST, &ValidationContext::default(), Some(&session))
        .await;

    assert!(matches!(result, Err(DomainError::Storage(_))));
    assert_eq!(h.store.read_history(id).await.unwrap().len(), 1);
    assert!(h.store.latest_outcome(id).await.unwrap().is_none());

    let events = h.orchestrator.notifier().drain(&session).await;
    assert!(matches!(
        events.last().map(|e| &e.payload),
        Some(ProgressPayload::ValidationError { .. })
    ));
    assert!(!events.iter().any(|e| matches!(
        e.payload,
        ProgressPayload::RequirementUpdated { iteration: 2, .. } | ProgressPayload::EvaluationStarted { iteration: 3, .. }
    )));
    assert!(!events.iter().any(|e| e.kind() == "validation_complete"));
}

#[tokio::test]
async fn failed_stage_change_stops_before_fixing() {
    let h = flaky_harness(
        MarkerCapability::new().failing(&[CriterionId::Clarity]),
        FailingWrite::Stage(RequirementStage::Fixing),
        ValidationConfig::default(),
    );
    let id = Uuid::new_v4();

    let result = h
        .orchestrator
        .process(id, FAST, &ValidationContext::default(), None)
        .await;

    assert!(matches!(result, Err(DomainError::Storage(_))));
    assert!(h.store.read_history(id).await.unwrap().is_empty());
    assert!(h.capability.synthesis_calls().is_empty());
    assert!(h.store.latest_outcome(id).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_split_write_leaves_no_children_and_can_be_retried() {
    let h = flaky_harness(MarkerCapability::new(), FailingWrite::Split, ValidationConfig::default());
    let id = Uuid::new_v4();
    let text = bundled();

    let first = h
        .orchestrator
        .process(id, &text, &ValidationContext::default(), None)
        .await;
    assert!(matches!(first, Err(DomainError::Storage(_))));
    assert!(h.store.read_children(id).await.unwrap().is_empty());
    assert!(h.store.read_history(id).await.unwrap().is_empty());
    let parent = h.store.get_requirement(id).await.unwrap().unwrap();
    assert_ne!(parent.stage, RequirementStage::Split);

    let retry = h
        .orchestrator
        .process(id, &text, &ValidationContext::default(), None)
        .await
        .unwrap();
    assert_eq!(retry.verdict, Verdict::Split);
    assert_eq!(h.store.read_children(id).await.unwrap().len(), 2);
    assert_eq!(h.store.read_history(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn split_parent_stays_terminal_when_its_outcome_write_fails() {
    let h = flaky_harness(MarkerCapability::new(), FailingWrite::Outcome, ValidationConfig::default());
    let id = Uuid::new_v4();
    let text = bundled();

    let first = h
        .orchestrator
        .process(id, &text, &ValidationContext::default(), None)
        .await;
    assert!(matches!(first, Err(DomainError::Storage(_))));

    let parent = h.store.get_requirement(id).await.unwrap().unwrap();
    assert_eq!(parent.stage, RequirementStage::Split);
    assert_eq!(h.store.read_children(id).await.unwrap().len(), 2);

    let again = h
        .orchestrator
        .process(id, &text, &ValidationContext::default(), None)
        .await;
    assert!(matches!(again, Err(DomainError::RequirementTerminal(_))));
    assert_eq!(h.store.read_children(id).await.unwrap().len(), 2);
}
