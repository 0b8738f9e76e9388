//! `vigil list`: known requirements, newest first.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::Runtime;
use crate::cli::output::{output, short_id, table, truncate, CommandOutput};
use crate::domain::ports::RequirementSummary;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of requirements to show
    #[arg(short, long, default_value = "50")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ListOutput(pub Vec<RequirementSummary>);

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        if self.0.is_empty() {
            return "No requirements found.".to_string();
        }

        let mut rows = table(&["ID", "Stage", "Iter", "Parent", "Text"]);
        for summary in &self.0 {
            rows.add_row(vec![
                short_id(&summary.id),
                summary.stage.as_str().to_string(),
                summary.iteration_count.to_string(),
                summary.parent_id.as_ref().map(short_id).unwrap_or_default(),
                truncate(&summary.current_text, 70),
            ]);
        }
        format!("{rows}\n\n{} requirement(s)", self.0.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ListArgs, runtime: &Runtime, json_mode: bool) -> Result<()> {
    let summaries = runtime.ledger().list_requirements(args.limit).await?;
    output(&ListOutput(summaries), json_mode);
    Ok(())
}
