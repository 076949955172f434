use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::target_file::TargetFile;
use super::ticker::TickerJob;

/// Tag for one scratchpad entry, used to summarize prior-file context into
/// subsequent per-file prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    DataGathered,
    EmptyCells,
    Validation,
    Decision,
    Error,
    FileSkipped,
    FileCompleted,
}

/// One append-only scratchpad entry the agent (or the orchestrator, for
/// bookkeeping notes like file-skip/complete) writes during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub category: NoteCategory,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The mutable per-ticker record threaded through every tool call of a
/// single run.
///
/// Lifecycle: created at run start, destroyed after the callback is sent.
/// The browser session and every open workbook handle must be explicitly
/// closed on every exit path (success, failure, or exception) — see the
/// orchestrator's control flow.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub job: TickerJob,
    pub working_dir: std::path::PathBuf,
    /// The file currently being processed, if any.
    pub current_file: Option<TargetFile>,
    /// Files that had at least one cell written; gates the upload decision.
    pub files_written: HashSet<&'static str>,
    /// The period label (e.g. "Q4 2025") captured from the first successful
    /// quarterly column insertion. `None` until that happens.
    pub detected_quarter: Option<String>,
    pub notes: Vec<Note>,
    pub data_sources_used: HashSet<String>,
    /// Per-file count of cells actually written by `update_excel_cell`.
    pub cells_written_count: HashMap<&'static str, u32>,
}

impl AgentContext {
    pub fn new(job: TickerJob, working_dir: std::path::PathBuf) -> Self {
        AgentContext {
            job,
            working_dir,
            current_file: None,
            files_written: HashSet::new(),
            detected_quarter: None,
            notes: Vec::new(),
            data_sources_used: HashSet::new(),
            cells_written_count: HashMap::new(),
        }
    }

    pub fn add_note(&mut self, category: NoteCategory, message: impl Into<String>) {
        self.notes.push(Note {
            category,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_data_source(&mut self, source: impl Into<String>) {
        self.data_sources_used.insert(source.into());
    }

    pub fn increment_cells_written(&mut self, bucket: &'static str) {
        *self.cells_written_count.entry(bucket).or_insert(0) += 1;
        self.files_written.insert(bucket);
    }

    pub fn cells_written_for(&self, bucket: &'static str) -> u32 {
        self.cells_written_count.get(bucket).copied().unwrap_or(0)
    }

    /// True once a quarterly insertion has recorded a detected quarter that
    /// does not contain "Q4" (case-insensitive) — the Q4-gate.
    pub fn should_skip_annual_file(&self) -> bool {
        match &self.detected_quarter {
            Some(quarter) => !quarter.to_uppercase().contains("Q4"),
            None => false,
        }
    }

    /// Summarizes notes from prior files for inclusion in the next file's
    /// system prompt, per §4.5.2's "scratchpad summary from previous files".
    pub fn scratchpad_summary(&self) -> String {
        if self.notes.is_empty() {
            return "No prior notes.".to_string();
        }
        self.notes
            .iter()
            .map(|n| format!("[{:?}] {}", n.category, n.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ticker::Timing;
    use chrono::NaiveDate;

    fn sample_context() -> AgentContext {
        let job = TickerJob {
            ticker: "ZM".to_string(),
            report_date: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            fiscal_period_end: Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()),
            timing: Timing::AfterHours,
            callback_url: "https://dispatcher.example.com/callback".to_string(),
        };
        AgentContext::new(job, std::path::PathBuf::from("/tmp/zm"))
    }

    #[test]
    fn q4_gate_passes_when_no_quarter_detected_yet() {
        let ctx = sample_context();
        assert!(!ctx.should_skip_annual_file());
    }

    #[test]
    fn q4_gate_skips_non_q4_quarters() {
        let mut ctx = sample_context();
        ctx.detected_quarter = Some("Q1 2026".to_string());
        assert!(ctx.should_skip_annual_file());
    }

    #[test]
    fn q4_gate_is_case_insensitive_and_allows_q4() {
        let mut ctx = sample_context();
        ctx.detected_quarter = Some("q4 2026".to_string());
        assert!(!ctx.should_skip_annual_file());
    }

    #[test]
    fn increment_cells_written_tracks_per_file_counts_and_marks_written() {
        let mut ctx = sample_context();
        assert_eq!(ctx.cells_written_for("financials-quarterly-income"), 0);
        ctx.increment_cells_written("financials-quarterly-income");
        ctx.increment_cells_written("financials-quarterly-income");
        assert_eq!(ctx.cells_written_for("financials-quarterly-income"), 2);
        assert!(ctx.files_written.contains("financials-quarterly-income"));
    }
}
