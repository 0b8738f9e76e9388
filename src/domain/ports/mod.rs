//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - ScoringCapability / SynthesisCapability: the external model that scores
//!   and revises requirement text
//! - CriterionEvaluator / CriterionFixer: per-criterion contracts the
//!   orchestrator sequences
//! - ProvenanceStore: append-only persistence of the audit trail

pub mod capability;
pub mod criterion;
pub mod provenance_store;

pub use capability::{
    RawScore, ScoringCapability, ScoringRequest, Synthesis, SynthesisCapability, SynthesisRequest,
};
pub use criterion::{CriterionEvaluator, CriterionFixer, FixResult};
pub use provenance_store::{ProvenanceStore, RequirementSummary};
