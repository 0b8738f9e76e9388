//! `vigil lineage`: split parent and children of one requirement.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use super::Runtime;
use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{Requirement, SplitEdge};

#[derive(Args, Debug)]
pub struct LineageArgs {
    /// Requirement id
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct LineageChild {
    pub edge: SplitEdge,
    pub requirement: Option<Requirement>,
}

#[derive(Debug, Serialize)]
pub struct LineageOutput {
    pub requirement: Requirement,
    pub parent: Option<SplitEdge>,
    pub children: Vec<LineageChild>,
}

impl CommandOutput for LineageOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{}  {}",
            self.requirement.id,
            truncate(&self.requirement.current_text, 80)
        )];

        match &self.parent {
            Some(edge) => lines.push(format!(
                "Split from {} ({})",
                edge.parent_requirement_id, edge.rationale
            )),
            None => lines.push("Root requirement".to_string()),
        }

        if self.children.is_empty() {
            lines.push("No children".to_string());
        } else {
            let mut children = table(&["Child", "Stage", "Text", "Rationale"]);
            for child in &self.children {
                let (stage, text) = child.requirement.as_ref().map_or_else(
                    || ("?".to_string(), String::new()),
                    |r| (r.stage.as_str().to_string(), truncate(&r.current_text, 50)),
                );
                children.add_row(vec![
                    child.edge.child_requirement_id.to_string(),
                    stage,
                    text,
                    truncate(&child.edge.rationale, 40),
                ]);
            }
            lines.push(children.to_string());
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: LineageArgs, runtime: &Runtime, json_mode: bool) -> Result<()> {
    let ledger = runtime.ledger();
    let Some(requirement) = ledger.get_requirement(args.id).await? else {
        bail!("Requirement {} not found", args.id);
    };
    let parent = ledger.read_parent(args.id).await?;

    let mut children = Vec::new();
    for edge in ledger.read_children(args.id).await? {
        let requirement = ledger.get_requirement(edge.child_requirement_id).await?;
        children.push(LineageChild { edge, requirement });
    }

    output(
        &LineageOutput {
            requirement,
            parent,
            children,
        },
        json_mode,
    );
    Ok(())
}
