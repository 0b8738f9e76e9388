//! Inbound capabilities: the external scoring and synthesis model.
//!
//! The orchestrator never talks to these directly; each criterion's
//! evaluator and fixer wraps them with its own rubric prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::CapabilityError;
use crate::domain::models::{CriterionId, CriterionScore, SplitChild};

/// A scoring call: does `text` satisfy `criterion`?
#[derive(Debug, Clone, Copy)]
pub struct ScoringRequest<'a> {
    pub criterion: CriterionId,
    pub text: &'a str,
    /// Rubric-specific instructions for model-backed capabilities.
    pub rubric: &'a str,
    pub project_context: Option<&'a str>,
}

/// Unvalidated score as returned by a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    pub score: f64,
    pub rationale: String,
}

/// A synthesis call: revise `text` so that it better satisfies `criterion`.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub criterion: CriterionId,
    pub text: &'a str,
    pub score: &'a CriterionScore,
    /// Rubric-specific fix instructions for model-backed capabilities.
    pub instructions: &'a str,
    pub project_context: Option<&'a str>,
}

/// Unvalidated synthesis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Synthesis {
    Revision(String),
    SplitProposal(Vec<SplitChild>),
}

/// `(text, criterion) -> (score, rationale)`. May be slow and may fail.
#[async_trait]
pub trait ScoringCapability: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, request: ScoringRequest<'_>) -> Result<RawScore, CapabilityError>;
}

/// `(text, criterion, score) -> revision | split-proposal`.
#[async_trait]
pub trait SynthesisCapability: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Synthesis, CapabilityError>;
}
