//! `vigil validate`: process one requirement.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use super::Runtime;
use crate::cli::output::{output, scores_table, short_id, verdict_icon, CommandOutput};
use crate::domain::models::{ProgressEvent, ProgressPayload, SessionId, TerminalResult, ValidationContext};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Requirement text
    pub text: String,

    /// Requirement id; a new one is generated when omitted
    #[arg(long)]
    pub id: Option<Uuid>,

    /// Source metadata as a JSON value, stored with the requirement
    #[arg(short, long)]
    pub metadata: Option<String>,

    /// Project or domain context passed to the capabilities
    #[arg(short = 'p', long)]
    pub project_context: Option<String>,

    /// Stream progress events while validating
    #[arg(short, long)]
    pub watch: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ValidationOutput(pub TerminalResult);

impl CommandOutput for ValidationOutput {
    fn to_human(&self) -> String {
        let result = &self.0;
        let mut lines = vec![
            format!(
                "{} {} ({:.2}) after {} iteration(s){}",
                verdict_icon(result.verdict),
                result.verdict,
                result.final_score,
                result.iteration_count(),
                if result.cancelled { ", cancelled" } else { "" }
            ),
            format!("Requirement: {}", result.requirement_id),
            format!("Original:    {}", result.original_text),
            format!("Final:       {}", result.final_text),
            String::new(),
            scores_table(&result.scores).to_string(),
        ];

        for iteration in &result.iterations {
            lines.push(format!(
                "\nIteration {} (score {:.2})",
                iteration.iteration_number, iteration.snapshot.weighted_score
            ));
            for fix in &iteration.fixes_applied {
                lines.push(format!(
                    "  {:<14} {:.2} -> {}{}",
                    fix.criterion.as_str(),
                    fix.score_before,
                    fix.score_after.map_or_else(|| "?".to_string(), |s| format!("{s:.2}")),
                    if fix.rebased { " (rebased)" } else { "" }
                ));
            }
            if iteration.ended_in_split {
                lines.push("  split".to_string());
            }
        }

        if let Some(split) = &result.split {
            lines.push(format!("\nSplit into {} requirement(s):", split.children.len()));
            for child in &split.children {
                lines.push(format!("  {}  {}", short_id(&child.requirement_id), child.text));
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Render one progress event as a single line.
pub fn describe_event(event: &ProgressEvent) -> String {
    let id = short_id(&event.requirement_id);
    match &event.payload {
        ProgressPayload::EvaluationStarted { iteration, .. } => {
            format!("[{id}] evaluating (round {iteration})")
        }
        ProgressPayload::EvaluationCompleted {
            weighted_score, verdict, ..
        } => format!("[{id}] scored {weighted_score:.2}, {verdict}"),
        ProgressPayload::RequirementUpdated {
            criterion,
            new_text,
            score_before,
            score_after,
            ..
        } => format!(
            "[{id}] {criterion}: {score_before:.2} -> {} | {new_text}",
            score_after.map_or_else(|| "?".to_string(), |s| format!("{s:.2}"))
        ),
        ProgressPayload::RequirementSplit { children, .. } => {
            format!("[{id}] split into {} requirement(s)", children.len())
        }
        ProgressPayload::ValidationComplete {
            verdict, final_score, ..
        } => format!("[{id}] done: {verdict} ({final_score:.2})"),
        ProgressPayload::ValidationError { error } => format!("[{id}] error: {error}"),
    }
}

pub async fn execute(args: ValidateArgs, runtime: &Runtime, json_mode: bool) -> Result<()> {
    let source_metadata = match &args.metadata {
        Some(raw) => serde_json::from_str(raw).context("--metadata must be valid JSON")?,
        None => serde_json::Value::Null,
    };
    let context = ValidationContext {
        project_context: args.project_context.clone(),
        source_metadata,
    };
    let requirement_id = args.id.unwrap_or_else(Uuid::new_v4);

    let session_id = args.watch.then(SessionId::generate);
    let watcher = match &session_id {
        Some(session_id) => {
            let mut subscription = runtime.notifier().subscribe(session_id).await;
            Some(tokio::spawn(async move {
                while let Some(event) = subscription.next().await {
                    if json_mode {
                        eprintln!("{}", serde_json::to_string(&event).unwrap_or_default());
                    } else {
                        eprintln!("{}", describe_event(&event));
                    }
                    if event.payload.is_final() {
                        break;
                    }
                }
            }))
        }
        None => None,
    };

    let result = runtime
        .orchestrator
        .process(requirement_id, &args.text, &context, session_id.as_ref())
        .await;

    if let Some(watcher) = watcher {
        let _ = watcher.await;
    }
    if let Some(session_id) = &session_id {
        runtime.notifier().close_session(session_id).await;
    }

    let result = result.with_context(|| format!("Failed to validate requirement {requirement_id}"))?;
    output(&ValidationOutput(result), json_mode);
    Ok(())
}
