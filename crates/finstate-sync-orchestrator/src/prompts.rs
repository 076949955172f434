//! Per-file prompt construction, per spec.md §4.5.2/§4.5.3.

use finstate_sync_core::{AgentContext, TargetFile, WorkbookGrid};

/// The system prompt for one file's tool loop: the file identifier, ticker,
/// report/fiscal dates, browse parameters, the scratchpad summary from
/// prior files, and the workflow contract rules.
pub fn system_prompt(context: &AgentContext, file: &TargetFile) -> String {
    let job = &context.job;
    format!(
        "You are updating the financial-statement spreadsheet bucket \"{bucket}\" for \
         ticker {ticker}. The earnings report date is {report_date} and the fiscal \
         period end is {period_end}. Statement type: {statement_type:?}, period: \
         {period:?}, display format: as-reported.\n\n\
         Prior-file notes from this run:\n{scratchpad}\n\n\
         Workflow rules:\n\
         - Never overwrite a cell that already holds a value. You may only populate \
           empty cells, or cells in a newly inserted column.\n\
         - Every value you write must be a fully written absolute integer (e.g. \
           394328000000), never abbreviated or rounded.\n\
         - Match row labels carefully against the extracted table. If you cannot make \
           a confident match, leave the cell blank.\n\
         - When inserting a new column, base `period_header` on the leftmost data \
           column header of the extracted markdown table. The date header you supply \
           is advisory only; the system assigns the authoritative date.\n\
         - The vision-extracted table is your primary data source. Use web search only \
           to validate or fill a gap.\n\
         - Call save_all_files once you believe this file is complete.",
        bucket = file.bucket,
        ticker = job.ticker_upper(),
        report_date = job.report_date,
        period_end = job.effective_period_end(),
        statement_type = file.statement_type,
        period = file.period,
        scratchpad = context.scratchpad_summary(),
    )
}

/// The first user message: the current file's full grid plus an explicit
/// empty-cells list. When a new column is imminent, the empty-cells list is
/// restricted to column B and historical blanks are called out as
/// irrelevant.
pub fn initial_user_message(grid: &WorkbookGrid, column_insertion_expected: bool) -> String {
    let grid_json = serde_json::to_string_pretty(grid)
        .unwrap_or_else(|_| "<failed to serialize grid>".to_string());

    let empty_cells_note = if column_insertion_expected {
        "This file is expected to receive a new leftmost period column. Ignore \
         historical empty cells elsewhere in the sheet — only the new column B cells \
         (once inserted) are relevant empty targets."
            .to_string()
    } else {
        let empty_refs: Vec<String> = grid
            .grid
            .iter()
            .enumerate()
            .flat_map(|(row_idx, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, cell)| cell.is_empty())
                    .map(move |(col_idx, _)| (row_idx, col_idx))
            })
            .map(|(row_idx, col_idx)| format!("{}{}", column_letters(col_idx as u32 + 1), row_idx + 1))
            .collect();
        format!("Currently empty cells: {}", empty_refs.join(", "))
    };

    format!(
        "Current file grid:\n{grid_json}\n\n{empty_cells_note}\n\nBegin by analyzing the \
         sheet and deciding whether a new period column must be inserted."
    )
}

fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let remainder = (column - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}
