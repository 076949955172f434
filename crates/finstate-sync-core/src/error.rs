use thiserror::Error;

/// Macro to log an error with context before returning it.
/// Usage: `log_and_return!(error, "context message")`
#[macro_export]
macro_rules! log_and_return {
    ($error:expr, $context:expr) => {{
        $error.log_with_context($context);
        return Err($error);
    }};
}

/// Macro to log an error with context and return it as a `Result`.
/// Usage: `log_error!(error, "context message")`
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {{
        $error.log_with_context($context);
        Err($error)
    }};
}

/// Application-wide error taxonomy for the per-ticker agent.
///
/// Each variant maps to one of the recovery rules in the error handling
/// design: some are surfaced to the LLM as a structured tool result so it can
/// adapt, others short-circuit the whole ticker run.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed ingress payload. Refused at the boundary, never spawns a run.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// A spreadsheet was absent in the object store. Recoverable: that file
    /// is recorded as skipped and processing continues.
    #[error("resource missing: {0}")]
    ResourceMissing(String),

    /// Browser could not authenticate after the retry budget. Fatal for the
    /// whole ticker.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Browser navigation did not reach the expected page/state. Recoverable
    /// at the tool-call level.
    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    /// Vision or search extraction failed. Recoverable at the tool-call level.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The agent attempted to write a cell that was non-empty on load.
    #[error("cell conflict at {0}: target cell is not empty")]
    CellConflict(String),

    /// Per-file tool-call budget was exhausted before the model stopped.
    #[error("iteration budget exceeded for file {0}")]
    IterationBudgetExceeded(String),

    /// Per-ticker wall-clock budget was exceeded.
    #[error("timeout exceeded after {0:?}")]
    TimeoutExceeded(std::time::Duration),

    /// Outbound HTTP call failed after its retry budget.
    #[error("transport error: {0}")]
    TransportError(String),

    /// An invalid spreadsheet cell reference was supplied.
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    /// A structural operation (e.g. column insertion) was attempted twice on
    /// the same sheet within one run.
    #[error("operation already performed on sheet {0}")]
    AlreadyPerformed(String),

    /// Chat/vision/search vendor returned an error response.
    #[error("vendor API error: {0}")]
    VendorError(String),

    /// Anything unexpected that escaped the taxonomy above.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Logs this error at an appropriate level with extra context, without
    /// consuming it. Recoverable variants log at `warn`, everything else at
    /// `error`.
    pub fn log_with_context(&self, context: &str) {
        match self {
            AppError::ResourceMissing(_)
            | AppError::NavigationFailed(_)
            | AppError::ExtractionFailed(_)
            | AppError::CellConflict(_)
            | AppError::IterationBudgetExceeded(_) => {
                tracing::warn!(error = %self, context, "recoverable error");
            }
            _ => {
                tracing::error!(error = %self, context, "unrecoverable error");
            }
        }
    }

    /// Whether this error should be surfaced to the LLM as a structured tool
    /// result (recoverable) rather than aborting the ticker run.
    ///
    /// `IterationBudgetExceeded` is recoverable at the file level: the file
    /// is finalized with whatever cells were written so far, upload-gated on
    /// `cells_written_count > 0` same as any other file, and processing
    /// continues to the next file.
    pub fn is_recoverable_tool_error(&self) -> bool {
        matches!(
            self,
            AppError::NavigationFailed(_)
                | AppError::ExtractionFailed(_)
                | AppError::CellConflict(_)
                | AppError::InvalidReference(_)
                | AppError::AlreadyPerformed(_)
                | AppError::VendorError(_)
                | AppError::IterationBudgetExceeded(_)
        )
    }

    /// Renders this error as the structured JSON payload handed back to the
    /// model as a tool result, per the error propagation design.
    pub fn to_tool_result_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": true,
            "kind": self.kind_str(),
            "message": self.to_string(),
        })
    }

    fn kind_str(&self) -> &'static str {
        match self {
            AppError::InputInvalid(_) => "InputInvalid",
            AppError::ResourceMissing(_) => "ResourceMissing",
            AppError::LoginFailed(_) => "LoginFailed",
            AppError::NavigationFailed(_) => "NavigationFailed",
            AppError::ExtractionFailed(_) => "ExtractionFailed",
            AppError::CellConflict(_) => "CellConflict",
            AppError::IterationBudgetExceeded(_) => "IterationBudgetExceeded",
            AppError::TimeoutExceeded(_) => "TimeoutExceeded",
            AppError::TransportError(_) => "TransportError",
            AppError::InvalidReference(_) => "InvalidReference",
            AppError::AlreadyPerformed(_) => "AlreadyPerformed",
            AppError::VendorError(_) => "VendorError",
            AppError::Internal(_) => "Fatal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_flagged_for_tool_results() {
        assert!(AppError::CellConflict("B5".into()).is_recoverable_tool_error());
        assert!(!AppError::LoginFailed("bad password".into()).is_recoverable_tool_error());
    }

    #[test]
    fn iteration_budget_exceeded_is_recoverable_at_the_file_level() {
        let err = AppError::IterationBudgetExceeded("financials-quarterly-income".into());
        assert!(err.is_recoverable_tool_error());
    }

    #[test]
    fn tool_result_json_carries_kind_and_message() {
        let err = AppError::ExtractionFailed("empty markdown table".into());
        let json = err.to_tool_result_json();
        assert_eq!(json["kind"], "ExtractionFailed");
        assert_eq!(json["error"], true);
        assert!(json["message"].as_str().unwrap().contains("empty markdown"));
    }
}
