//! Requirement domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Terminal classification of a requirement after orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    ReleaseOk,
    NeedsImprovement,
    Split,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::ReleaseOk => "release_ok",
            Verdict::NeedsImprovement => "needs_improvement",
            Verdict::Split => "split",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release_ok" => Ok(Verdict::ReleaseOk),
            "needs_improvement" => Ok(Verdict::NeedsImprovement),
            "split" => Ok(Verdict::Split),
            other => Err(format!("Unknown verdict: '{}'", other)),
        }
    }
}

/// Cached pointer to where a requirement sits in the orchestration state machine.
///
/// This is the only mutable column in the ledger and is never a source of truth:
/// the iteration history and outcome records are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStage {
    Pending,
    Evaluating,
    Fixing,
    Released,
    NeedsImprovement,
    Split,
}

impl RequirementStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RequirementStage::Pending => "pending",
            RequirementStage::Evaluating => "evaluating",
            RequirementStage::Fixing => "fixing",
            RequirementStage::Released => "released",
            RequirementStage::NeedsImprovement => "needs_improvement",
            RequirementStage::Split => "split",
        }
    }

    /// A split requirement is inert and never processed again.
    pub fn is_inert(self) -> bool {
        matches!(self, RequirementStage::Split)
    }
}

impl From<Verdict> for RequirementStage {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::ReleaseOk => RequirementStage::Released,
            Verdict::NeedsImprovement => RequirementStage::NeedsImprovement,
            Verdict::Split => RequirementStage::Split,
        }
    }
}

impl fmt::Display for RequirementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequirementStage::Pending),
            "evaluating" => Ok(RequirementStage::Evaluating),
            "fixing" => Ok(RequirementStage::Fixing),
            "released" => Ok(RequirementStage::Released),
            "needs_improvement" => Ok(RequirementStage::NeedsImprovement),
            "split" => Ok(RequirementStage::Split),
            other => Err(format!("Unknown requirement stage: '{}'", other)),
        }
    }
}

/// A natural-language requirement under validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: Uuid,
    /// Set once at creation and never changed.
    pub original_text: String,
    /// Latest text; derived from the iteration history when read from a store.
    pub current_text: String,
    /// Set when the requirement was created as a split child.
    pub parent_id: Option<Uuid>,
    /// Opaque caller data, carried through unchanged (and copied to split children).
    pub source_metadata: serde_json::Value,
    /// Number of split edges between this requirement and its root.
    pub split_depth: u32,
    pub stage: RequirementStage,
    pub created_at: DateTime<Utc>,
}

impl Requirement {
    /// Create a root requirement.
    pub fn new(id: Uuid, text: impl Into<String>, source_metadata: serde_json::Value) -> Self {
        let text = text.into();
        Self {
            id,
            current_text: text.clone(),
            original_text: text,
            parent_id: None,
            source_metadata,
            split_depth: 0,
            stage: RequirementStage::Pending,
            created_at: Utc::now(),
        }
    }

    /// Create a split child of `parent`, inheriting its metadata.
    pub fn child_of(parent: &Requirement, text: impl Into<String>) -> Self {
        let mut child = Self::new(Uuid::new_v4(), text, parent.source_metadata.clone());
        child.parent_id = Some(parent.id);
        child.split_depth = parent.split_depth + 1;
        child
    }
}
