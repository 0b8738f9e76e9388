//! `vigil batch`: validate a file of requirements.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Runtime;
use crate::cli::output::{output, progress_bar, short_id, table, truncate, CommandOutput};
use crate::domain::models::{
    BatchItem, BatchReport, EntryOrigin, EntryStatus, ProgressPayload, SessionId, ValidationContext,
};
use crate::services::BatchCoordinator;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// YAML or JSON list of requirements: `[{id?, text, metadata?, context?}]`
    pub file: PathBuf,
}

/// One requirement as written in a batch file.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchFileEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub context: Option<String>,
}

/// Read batch items from `path`; `.json` files are parsed as JSON, anything else as YAML.
pub fn read_batch_file(path: &Path) -> Result<Vec<BatchItem>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let entries: Vec<BatchFileEntry> = if is_json {
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid YAML in {}", path.display()))?
    };

    if entries.is_empty() {
        bail!("{} contains no requirements", path.display());
    }

    Ok(entries
        .into_iter()
        .map(|entry| BatchItem {
            requirement_id: entry.id.unwrap_or_else(Uuid::new_v4),
            text: entry.text,
            context: ValidationContext {
                project_context: entry.context,
                source_metadata: entry.metadata,
            },
            session_id: None,
        })
        .collect())
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct BatchOutput(pub BatchReport);

impl CommandOutput for BatchOutput {
    fn to_human(&self) -> String {
        let report = &self.0;
        let mut summary = table(&["ID", "Origin", "Outcome", "Score", "Iter", "Final text"]);

        for entry in &report.entries {
            let origin = match entry.origin {
                EntryOrigin::Input => "input".to_string(),
                EntryOrigin::SplitChild { parent } => format!("child of {}", short_id(&parent)),
            };
            let (outcome, score, iterations, text) = match &entry.status {
                EntryStatus::Completed { result } => (
                    if result.cancelled {
                        format!("{} (cancelled)", result.verdict)
                    } else {
                        result.verdict.to_string()
                    },
                    format!("{:.2}", result.final_score),
                    result.iteration_count().to_string(),
                    truncate(&result.final_text, 60),
                ),
                EntryStatus::Failed { error } => ("failed".to_string(), "-".into(), "-".into(), truncate(error, 60)),
                EntryStatus::Skipped => ("skipped".to_string(), "-".into(), "-".into(), String::new()),
            };
            summary.add_row(vec![short_id(&entry.requirement_id), origin, outcome, score, iterations, text]);
        }

        let stats = &report.stats;
        format!(
            "{summary}\n\n{} processed: {} released, {} need improvement, {} split ({} children queued, {} beyond depth limit), {} failed, {} skipped",
            stats.processed,
            stats.released,
            stats.needs_improvement,
            stats.split,
            stats.children_enqueued,
            stats.depth_limited,
            stats.failed,
            stats.skipped,
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: BatchArgs, runtime: &Runtime, json_mode: bool) -> Result<()> {
    let session_id = SessionId::generate();
    let items: Vec<BatchItem> = read_batch_file(&args.file)?
        .into_iter()
        .map(|item| item.with_session(session_id.clone()))
        .collect();

    let bar = progress_bar(items.len() as u64, json_mode);
    let mut subscription = runtime.notifier().subscribe(&session_id).await;
    let done = CancellationToken::new();
    let tracker = {
        let bar = bar.clone();
        let done = done.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = done.cancelled() => break,
                    event = subscription.next() => match event.map(|e| e.payload) {
                        Some(ProgressPayload::RequirementSplit { children, .. }) => {
                            bar.inc_length(children.len() as u64);
                        }
                        Some(ProgressPayload::ValidationComplete { verdict, .. }) => {
                            bar.set_message(verdict.to_string());
                            bar.inc(1);
                        }
                        Some(ProgressPayload::ValidationError { .. }) => bar.inc(1),
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        })
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing in-flight requirements");
                cancel.cancel();
            }
        })
    };

    let coordinator = BatchCoordinator::new(runtime.orchestrator.clone(), runtime.config.batch.clone());
    let report = coordinator.process_batch_cancellable(items, &cancel).await;

    interrupt.abort();
    done.cancel();
    let _ = tracker.await;
    bar.finish_and_clear();
    runtime.notifier().close_session(&session_id).await;

    output(&BatchOutput(report), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_yaml_and_json_batches() {
        let dir = tempfile::TempDir::new().unwrap();

        let yaml = dir.path().join("reqs.yaml");
        fs::write(&yaml, "- text: The app must be fast\n  metadata: {ticket: OPS-1}\n- text: Logs must be kept\n").unwrap();
        let items = read_batch_file(&yaml).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].context.source_metadata["ticket"], "OPS-1");

        let id = Uuid::new_v4();
        let json = dir.path().join("reqs.json");
        fs::write(&json, format!(r#"[{{"id": "{id}", "text": "The app must be fast"}}]"#)).unwrap();
        let items = read_batch_file(&json).unwrap();
        assert_eq!(items[0].requirement_id, id);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.yaml");
        fs::write(&path, "[]\n").unwrap();
        assert!(read_batch_file(&path).is_err());
    }
}
