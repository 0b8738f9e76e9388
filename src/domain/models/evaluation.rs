//! Evaluation results: per-criterion scores and full snapshots.
//!
//! An [`EvaluationSnapshot`] holds one [`CriterionOutcome`] per criterion and
//! derives the weighted score and verdict from them. Criteria that failed to
//! score or were skipped are *unknown*: they never count as zero, they are
//! left out of the tier averages, and an unknown gating criterion blocks
//! release.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::criterion::{CriterionId, Tier};
use super::requirement::Verdict;

/// Score of one criterion against one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: CriterionId,
    /// In `[0, 1]`.
    pub score: f64,
    pub rationale: String,
}

impl CriterionScore {
    pub fn new(criterion: CriterionId, score: f64, rationale: impl Into<String>) -> Self {
        Self {
            criterion,
            score,
            rationale: rationale.into(),
        }
    }
}

/// What happened when a criterion was evaluated in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CriterionOutcome {
    Scored(CriterionScore),
    Failed { criterion: CriterionId, error: String },
    Skipped { criterion: CriterionId },
}

impl CriterionOutcome {
    pub fn criterion(&self) -> CriterionId {
        match self {
            CriterionOutcome::Scored(s) => s.criterion,
            CriterionOutcome::Failed { criterion, .. } | CriterionOutcome::Skipped { criterion } => {
                *criterion
            }
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            CriterionOutcome::Scored(s) => Some(s.score),
            _ => None,
        }
    }

    pub fn as_scored(&self) -> Option<&CriterionScore> {
        match self {
            CriterionOutcome::Scored(s) => Some(s),
            _ => None,
        }
    }
}

/// Pass bars applied to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Weighted-score pass bar; also the per-criterion bar for gating criteria.
    pub release: f64,
    pub priority: f64,
    pub polish: f64,
    /// Below this, atomicity triggers the split path.
    pub atomicity: f64,
}

impl Thresholds {
    pub fn for_tier(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Gating => self.release,
            Tier::Priority => self.priority,
            Tier::Polish => self.polish,
        }
    }

    pub fn for_criterion(&self, criterion: CriterionId) -> f64 {
        self.for_tier(criterion.tier())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            release: 0.75,
            priority: 0.7,
            polish: 0.6,
            atomicity: 0.7,
        }
    }
}

/// Scores of one text against all ten criteria at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSnapshot {
    /// One entry per criterion, in [`CriterionId::ALL`] order.
    pub outcomes: Vec<CriterionOutcome>,
    pub weighted_score: f64,
    pub verdict: Verdict,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationSnapshot {
    /// Build a snapshot, filling any criterion missing from `outcomes` as skipped.
    pub fn from_outcomes(outcomes: Vec<CriterionOutcome>, thresholds: &Thresholds) -> Self {
        let ordered: Vec<CriterionOutcome> = CriterionId::ALL
            .into_iter()
            .map(|criterion| {
                outcomes
                    .iter()
                    .find(|o| o.criterion() == criterion)
                    .cloned()
                    .unwrap_or(CriterionOutcome::Skipped { criterion })
            })
            .collect();

        let weighted_score = weighted_score(&ordered);
        let verdict = derive_verdict(&ordered, weighted_score, thresholds);

        Self {
            outcomes: ordered,
            weighted_score,
            verdict,
            evaluated_at: Utc::now(),
        }
    }

    pub fn outcome(&self, criterion: CriterionId) -> Option<&CriterionOutcome> {
        self.outcomes.iter().find(|o| o.criterion() == criterion)
    }

    pub fn score(&self, criterion: CriterionId) -> Option<f64> {
        self.outcome(criterion).and_then(CriterionOutcome::score)
    }

    pub fn scored(&self) -> impl Iterator<Item = &CriterionScore> {
        self.outcomes.iter().filter_map(CriterionOutcome::as_scored)
    }

    /// Criteria with a known score below their tier threshold, gating first.
    pub fn failing(&self, thresholds: &Thresholds) -> Vec<CriterionScore> {
        self.scored()
            .filter(|s| s.score < thresholds.for_criterion(s.criterion))
            .cloned()
            .collect()
    }

    /// Criteria without a known score this round.
    pub fn unknown(&self) -> Vec<CriterionId> {
        self.outcomes
            .iter()
            .filter(|o| o.score().is_none())
            .map(CriterionOutcome::criterion)
            .collect()
    }

    /// The atomicity score, when it is known and below the split bar.
    pub fn atomicity_failure(&self, thresholds: &Thresholds) -> Option<&CriterionScore> {
        self.outcome(CriterionId::Atomicity)
            .and_then(CriterionOutcome::as_scored)
            .filter(|s| s.score < thresholds.atomicity)
    }

    /// The same snapshot for a requirement that may not split any further:
    /// a `Split` verdict becomes `NeedsImprovement`.
    #[must_use]
    pub fn without_split(mut self) -> Self {
        if self.verdict == Verdict::Split {
            self.verdict = Verdict::NeedsImprovement;
        }
        self
    }

    pub fn is_release_ok(&self) -> bool {
        self.verdict == Verdict::ReleaseOk
    }
}

/// Average of the known scores in `tier`, or `None` if none are known.
pub fn tier_average(outcomes: &[CriterionOutcome], tier: Tier) -> Option<f64> {
    let scores: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.criterion().tier() == tier)
        .filter_map(CriterionOutcome::score)
        .collect();

    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// `0.5·avg(gating) + 0.3·avg(priority) + 0.2·avg(polish)`; a tier without
/// known scores contributes nothing.
pub fn weighted_score(outcomes: &[CriterionOutcome]) -> f64 {
    Tier::ALL
        .into_iter()
        .map(|tier| tier.weight() * tier_average(outcomes, tier).unwrap_or(0.0))
        .sum()
}

fn derive_verdict(outcomes: &[CriterionOutcome], weighted: f64, thresholds: &Thresholds) -> Verdict {
    let gating_pass = CriterionId::in_tier(Tier::Gating).all(|criterion| {
        outcomes
            .iter()
            .find(|o| o.criterion() == criterion)
            .and_then(CriterionOutcome::score)
            .is_some_and(|score| score >= thresholds.release)
    });

    if gating_pass && weighted >= thresholds.release {
        return Verdict::ReleaseOk;
    }

    let atomicity_failing = outcomes
        .iter()
        .find(|o| o.criterion() == CriterionId::Atomicity)
        .and_then(CriterionOutcome::score)
        .is_some_and(|score| score < thresholds.atomicity);

    if atomicity_failing {
        Verdict::Split
    } else {
        Verdict::NeedsImprovement
    }
}

/// True when every gating criterion is known and misses the release bar by
/// more than `margin`.
pub fn gating_fails_widely(outcomes: &[CriterionOutcome], thresholds: &Thresholds, margin: f64) -> bool {
    let cutoff = thresholds.release - margin;
    CriterionId::in_tier(Tier::Gating).all(|criterion| {
        outcomes
            .iter()
            .find(|o| o.criterion() == criterion)
            .and_then(CriterionOutcome::score)
            .is_some_and(|score| score < cutoff)
    })
}
