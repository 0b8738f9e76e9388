//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use crate::domain::models::{CriterionOutcome, Verdict};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to at most `max_len` characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// First eight characters of an id.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Table with bold headers and the shared preset.
pub fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

/// Per-criterion scores as a table.
pub fn scores_table(outcomes: &[CriterionOutcome]) -> Table {
    let mut scores = table(&["Criterion", "Tier", "Score", "Rationale"]);
    for outcome in outcomes {
        let criterion = outcome.criterion();
        let (score, note) = match outcome {
            CriterionOutcome::Scored(s) => (format!("{:.2}", s.score), truncate(&s.rationale, 60)),
            CriterionOutcome::Failed { error, .. } => ("?".to_string(), truncate(error, 60)),
            CriterionOutcome::Skipped { .. } => ("-".to_string(), "skipped".to_string()),
        };
        scores.add_row(vec![
            criterion.to_string(),
            criterion.tier().to_string(),
            score,
            note,
        ]);
    }
    scores
}

pub fn verdict_icon(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::ReleaseOk => "✓",
        Verdict::NeedsImprovement => "!",
        Verdict::Split => "⑂",
    }
}

/// Progress bar for batch runs; hidden when `hidden` is set.
pub fn progress_bar(total: u64, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("█▓▒░ "));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééé", 6), "ééé...");
    }

    #[test]
    fn scores_table_marks_unknown_scores() {
        let outcomes = vec![CriterionOutcome::Skipped {
            criterion: crate::domain::models::CriterionId::Traceability,
        }];
        let rendered = scores_table(&outcomes).to_string();
        assert!(rendered.contains("traceability"));
        assert!(rendered.contains("skipped"));
    }
}
