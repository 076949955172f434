//! The fixed 8-tool surface published to the chat LLM for one per-file tool
//! loop. Each tool's JSON-schema input contract is derived with `schemars`
//! next to the Rust struct its arguments deserialize into, rather than
//! hand-written as a `serde_json::json!` literal.

use finstate_sync_llm::ToolDefinition;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

pub const ANALYZE_EXCEL: &str = "analyze_excel";
pub const BROWSE_STOCKANALYSIS: &str = "browse_stockanalysis";
pub const EXTRACT_PAGE_WITH_VISION: &str = "extract_page_with_vision";
pub const WEB_SEARCH: &str = "web_search";
pub const NOTE_FINDING: &str = "note_finding";
pub const INSERT_NEW_PERIOD_COLUMN: &str = "insert_new_period_column";
pub const UPDATE_EXCEL_CELL: &str = "update_excel_cell";
pub const SAVE_ALL_FILES: &str = "save_all_files";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeExcelArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BrowseStockAnalysisArgs {
    /// Always "as-reported" — the only display format this tool exposes.
    #[serde(default)]
    pub data_type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractPageWithVisionArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebSearchArgs {
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoteFindingArgs {
    /// One of: data_gathered, empty_cells, validation, decision, error.
    pub category: String,
    pub message: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InsertNewPeriodColumnArgs {
    /// Ignored by the orchestrator, which overrides this with
    /// `fiscal_period_end` (or `report_date`). Still required so the model
    /// reasons about the header it believes is correct.
    pub date_header: String,
    pub period_header: String,
    #[serde(default = "default_sheet_name")]
    pub sheet: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateExcelCellArgs {
    #[serde(default = "default_sheet_name")]
    pub sheet: String,
    pub cell_reference: String,
    pub value: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveAllFilesArgs {}

fn default_sheet_name() -> String {
    "Sheet1".to_string()
}

fn definition<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    let schema = schema_for!(T);
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        json_schema: serde_json::to_value(&schema)
            .expect("schemars output always serializes to JSON"),
    }
}

/// The fixed toolset for one per-file tool loop, in no particular order —
/// the model chooses which to call.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        definition::<AnalyzeExcelArgs>(
            ANALYZE_EXCEL,
            "Returns the per-sheet structure of the current file only: row count, \
             column count, row 1 (period dates), row 2 (period labels), column A \
             (row labels), and the full grid, with blank cells reported distinctly \
             from zero.",
        ),
        definition::<BrowseStockAnalysisArgs>(
            BROWSE_STOCKANALYSIS,
            "Logs in if needed, navigates to the current file's financial statement \
             page, selects raw (non-abbreviated) units, and captures a screenshot.",
        ),
        definition::<ExtractPageWithVisionArgs>(
            EXTRACT_PAGE_WITH_VISION,
            "Sends the browser session's latest screenshot to the vision model and \
             returns a markdown table of the row-label column plus the three newest \
             data columns.",
        ),
        definition::<WebSearchArgs>(
            WEB_SEARCH,
            "Issues a query to the secondary web-search API. Use sparingly, only to \
             validate or fill a gap the vision-extracted table left open.",
        ),
        definition::<NoteFindingArgs>(
            NOTE_FINDING,
            "Appends a note to the scratchpad. Does not alter the workbook.",
        ),
        definition::<InsertNewPeriodColumnArgs>(
            INSERT_NEW_PERIOD_COLUMN,
            "Inserts a new leftmost data column in the current file, shifting \
             existing columns right by one and preserving styles. Returns a row map \
             of rows expecting a value. Can only be called once per file.",
        ),
        definition::<UpdateExcelCellArgs>(
            UPDATE_EXCEL_CELL,
            "Writes one cell in the current file. Rejected if the target cell was \
             non-empty on load.",
        ),
        definition::<SaveAllFilesArgs>(
            SAVE_ALL_FILES,
            "No-op sentinel signaling the agent believes this file is complete. The \
             actual save/upload happens after the tool loop exits.",
        ),
    ]
}
