//! `vigil history`: the iteration history of one requirement.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use super::Runtime;
use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{Iteration, OutcomeRecord, Requirement};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Requirement id
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    pub requirement: Requirement,
    pub iterations: Vec<Iteration>,
    pub latest_outcome: Option<OutcomeRecord>,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        let requirement = &self.requirement;
        let mut lines = vec![
            format!("Requirement {} ({})", requirement.id, requirement.stage.as_str()),
            format!("Original: {}", requirement.original_text),
            format!("Current:  {}", requirement.current_text),
        ];
        if let Some(parent) = requirement.parent_id {
            lines.push(format!("Parent:   {parent} (depth {})", requirement.split_depth));
        }

        if self.iterations.is_empty() {
            lines.push("\nNo iterations recorded.".to_string());
        }
        for iteration in &self.iterations {
            lines.push(format!(
                "\nIteration {} at {}: score {:.2}, {}{}",
                iteration.iteration_number,
                iteration.started_at.format("%Y-%m-%d %H:%M:%S"),
                iteration.snapshot.weighted_score,
                iteration.snapshot.verdict,
                if iteration.ended_in_split { ", split" } else { "" }
            ));
            if iteration.fixes_applied.is_empty() {
                continue;
            }
            let mut fixes = table(&["Criterion", "Before", "After", "Rebased", "Revised text"]);
            for fix in &iteration.fixes_applied {
                fixes.add_row(vec![
                    fix.criterion.to_string(),
                    format!("{:.2}", fix.score_before),
                    fix.score_after.map_or_else(|| "?".to_string(), |s| format!("{s:.2}")),
                    if fix.rebased { "yes" } else { "no" }.to_string(),
                    truncate(&fix.text_after, 60),
                ]);
            }
            lines.push(fixes.to_string());
        }

        if let Some(outcome) = &self.latest_outcome {
            lines.push(format!(
                "\nLatest outcome: {} ({:.2}) after {} iteration(s){}",
                outcome.verdict,
                outcome.final_score,
                outcome.iterations_executed,
                if outcome.cancelled { ", cancelled" } else { "" }
            ));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: HistoryArgs, runtime: &Runtime, json_mode: bool) -> Result<()> {
    let ledger = runtime.ledger();
    let Some(requirement) = ledger.get_requirement(args.id).await? else {
        bail!("Requirement {} not found", args.id);
    };
    let iterations = ledger.read_history(args.id).await?;
    let latest_outcome = ledger.latest_outcome(args.id).await?;

    output(
        &HistoryOutput {
            requirement,
            iterations,
            latest_outcome,
        },
        json_mode,
    );
    Ok(())
}
