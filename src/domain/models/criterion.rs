//! The ten fixed quality criteria and their tiers.
//!
//! [`CriterionId`] is a closed enum. Anything that maps criteria to
//! behaviour (rubrics, thresholds, weights) does so through an exhaustive
//! `match`, so adding a variant fails to compile until every table is
//! updated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Release-blocking strictness group of a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Must all pass individually for release.
    Gating,
    /// Weighted into the score but not individually blocking.
    Priority,
    /// Cosmetic quality.
    Polish,
}

impl Tier {
    /// All tiers in merge order.
    pub const ALL: [Tier; 3] = [Tier::Gating, Tier::Priority, Tier::Polish];

    /// Contribution of this tier's average to the weighted score.
    pub const fn weight(self) -> f64 {
        match self {
            Tier::Gating => 0.5,
            Tier::Priority => 0.3,
            Tier::Polish => 0.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Gating => "gating",
            Tier::Priority => "priority",
            Tier::Polish => "polish",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one quality criterion.
///
/// Variant order is significant: it is the declaration order that
/// [`CriterionId::ALL`] exposes, and within a tier it is the order in which
/// fixes are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionId {
    Atomicity,
    Clarity,
    Testability,
    Completeness,
    Measurability,
    Consistency,
    Feasibility,
    Conciseness,
    Terminology,
    Traceability,
}

impl CriterionId {
    /// Every criterion, gating first, then priority, then polish.
    pub const ALL: [CriterionId; 10] = [
        CriterionId::Atomicity,
        CriterionId::Clarity,
        CriterionId::Testability,
        CriterionId::Completeness,
        CriterionId::Measurability,
        CriterionId::Consistency,
        CriterionId::Feasibility,
        CriterionId::Conciseness,
        CriterionId::Terminology,
        CriterionId::Traceability,
    ];

    pub const fn tier(self) -> Tier {
        match self {
            CriterionId::Atomicity | CriterionId::Clarity | CriterionId::Testability => Tier::Gating,
            CriterionId::Completeness
            | CriterionId::Measurability
            | CriterionId::Consistency
            | CriterionId::Feasibility => Tier::Priority,
            CriterionId::Conciseness | CriterionId::Terminology | CriterionId::Traceability => {
                Tier::Polish
            }
        }
    }

    /// Only atomicity may answer a fix request with a split.
    pub const fn may_split(self) -> bool {
        matches!(self, CriterionId::Atomicity)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CriterionId::Atomicity => "atomicity",
            CriterionId::Clarity => "clarity",
            CriterionId::Testability => "testability",
            CriterionId::Completeness => "completeness",
            CriterionId::Measurability => "measurability",
            CriterionId::Consistency => "consistency",
            CriterionId::Feasibility => "feasibility",
            CriterionId::Conciseness => "conciseness",
            CriterionId::Terminology => "terminology",
            CriterionId::Traceability => "traceability",
        }
    }

    /// Criteria belonging to `tier`, in declaration order.
    pub fn in_tier(tier: Tier) -> impl Iterator<Item = CriterionId> {
        Self::ALL.into_iter().filter(move |c| c.tier() == tier)
    }
}

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CriterionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CriterionId::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown criterion: '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_partition_all_criteria() {
        let gating: Vec<_> = CriterionId::in_tier(Tier::Gating).collect();
        let priority: Vec<_> = CriterionId::in_tier(Tier::Priority).collect();
        let polish: Vec<_> = CriterionId::in_tier(Tier::Polish).collect();

        assert_eq!(gating.len() + priority.len() + polish.len(), CriterionId::ALL.len());
        assert!(gating.contains(&CriterionId::Atomicity));
        assert!(gating.contains(&CriterionId::Clarity));
        assert!(priority.contains(&CriterionId::Measurability));
    }

    #[test]
    fn all_is_ordered_by_tier() {
        let tiers: Vec<Tier> = CriterionId::ALL.iter().map(|c| c.tier()).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = Tier::ALL.iter().map(|t| t.weight()).sum();
        assert!((total - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_round_trips_names() {
        for criterion in CriterionId::ALL {
            assert_eq!(criterion.as_str().parse::<CriterionId>(), Ok(criterion));
        }
        assert!("vibes".parse::<CriterionId>().is_err());
    }

    #[test]
    fn only_atomicity_may_split() {
        let splitters: Vec<_> = CriterionId::ALL.into_iter().filter(|c| c.may_split()).collect();
        assert_eq!(splitters, vec![CriterionId::Atomicity]);
    }
}
