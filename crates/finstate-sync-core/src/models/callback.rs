use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ticker::Timing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Aggregate bookkeeping the orchestrator accumulates over a run and folds
/// into the terminal callback payload.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_updated: u32,
    pub data_sources_used: Vec<String>,
}

/// The terminal status callback body posted to `TickerJob::callback_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub ticker: String,
    pub report_date: NaiveDate,
    pub timing: Timing,
    pub status: RunStatus,
    pub files_updated: u32,
    pub data_sources_used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
