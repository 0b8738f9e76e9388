//! Offline capability backed by the rubric heuristics.
//!
//! Deterministic and free of I/O, so the same text always gets the same
//! score and the same revision.

use async_trait::async_trait;

use crate::domain::errors::CapabilityError;
use crate::domain::ports::{
    RawScore, ScoringCapability, ScoringRequest, Synthesis, SynthesisCapability, SynthesisRequest,
};
use crate::services::criteria::rubric;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCapability;

impl HeuristicCapability {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScoringCapability for HeuristicCapability {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn score(&self, request: ScoringRequest<'_>) -> Result<RawScore, CapabilityError> {
        Ok(rubric(request.criterion).assess(request.text))
    }
}

#[async_trait]
impl SynthesisCapability for HeuristicCapability {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<Synthesis, CapabilityError> {
        let rubric = rubric(request.criterion);

        if let Some(children) = rubric.split(request.text) {
            return Ok(Synthesis::SplitProposal(children));
        }

        rubric
            .revise(request.text, request.project_context)
            .map(Synthesis::Revision)
            .ok_or_else(|| {
                CapabilityError::Rejected(format!("no heuristic revision for {}", request.criterion))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CriterionId, CriterionScore};

    #[tokio::test]
    async fn scores_match_the_rubric() {
        let capability = HeuristicCapability::new();
        let raw = capability
            .score(ScoringRequest {
                criterion: CriterionId::Clarity,
                text: "The app must be fast",
                rubric: "",
                project_context: None,
            })
            .await
            .unwrap();
        assert!(raw.score < 0.75);
    }

    #[tokio::test]
    async fn compound_text_gets_a_split_proposal() {
        let capability = HeuristicCapability::new();
        let score = CriterionScore::new(CriterionId::Atomicity, 0.2, "compound");
        let synthesis = capability
            .synthesize(SynthesisRequest {
                criterion: CriterionId::Atomicity,
                text: "The system shall export reports and the app must send alerts.",
                score: &score,
                instructions: "",
                project_context: None,
            })
            .await
            .unwrap();
        assert!(matches!(synthesis, Synthesis::SplitProposal(children) if children.len() == 2));
    }

    #[tokio::test]
    async fn nothing_to_revise_is_rejected() {
        let capability = HeuristicCapability::new();
        let score = CriterionScore::new(CriterionId::Traceability, 0.65, "untraced");
        let result = capability
            .synthesize(SynthesisRequest {
                criterion: CriterionId::Traceability,
                text: "The system shall log every login.",
                score: &score,
                instructions: "",
                project_context: None,
            })
            .await;
        assert!(matches!(result, Err(CapabilityError::Rejected(_))));
    }
}
