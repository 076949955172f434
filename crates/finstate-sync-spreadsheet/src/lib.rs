// Copyright (c) 2024 FinstateSync. All rights reserved.
// Licensed under the Microsoft Reference Source License (MS-RSL).
// See LICENSE file for complete terms and conditions.

//! # finstate-sync Spreadsheet
//!
//! Owns one open workbook at a time and exposes the narrow mutation contract
//! the agent orchestrator drives: read-only structural inspection, single
//! cell writes, and the structural "insert new leftmost period column"
//! operation, all with formatting preserved.
//!
//! Built on `umya-spreadsheet`, the one crate in reach of this workspace that
//! can load, mutate in place (including shifting columns while keeping
//! merged-cell geometry, column widths, and row heights intact), and
//! re-serialize `.xlsx` with styles preserved — `calamine` only reads and
//! `rust_xlsxwriter` only writes.

mod cellref;

use std::collections::HashSet;
use std::path::Path;

use finstate_sync_core::{CellValue, RowMapEntry, WorkbookGrid};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Row at which financial line items start; rows 1-2 are period headers.
const FIRST_DATA_ROW: u32 = 3;
/// The newest-period column is always B; the column it displaces is C.
const NEW_PERIOD_COLUMN: &str = "B";
const PRIOR_PERIOD_COLUMN: &str = "C";

#[derive(Debug, Error)]
pub enum MutatorError {
    #[error("failed to load workbook: {0}")]
    Load(String),

    #[error("failed to save workbook: {0}")]
    Save(String),

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("cell conflict at {0}: target cell is not empty")]
    CellConflict(String),

    #[error("column already inserted on sheet {0} during this run")]
    AlreadyInserted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns one open workbook and enforces the no-overwrite / single-insertion
/// invariants for its lifetime.
pub struct SpreadsheetMutator {
    book: umya_spreadsheet::Spreadsheet,
    inserted_sheets: HashSet<String>,
}

impl SpreadsheetMutator {
    /// Loads a workbook from downloaded bytes. `scratch_path` is a file
    /// path in the ticker's working directory used as scratch space, since
    /// the underlying engine reads and writes real files rather than
    /// in-memory buffers.
    #[instrument(skip(bytes))]
    pub fn load_from_bytes(bytes: &[u8], scratch_path: &Path) -> Result<Self, MutatorError> {
        std::fs::write(scratch_path, bytes)?;
        let book = umya_spreadsheet::reader::xlsx::read(scratch_path)
            .map_err(|e| MutatorError::Load(e.to_string()))?;
        info!(path = %scratch_path.display(), "loaded workbook");
        Ok(SpreadsheetMutator {
            book,
            inserted_sheets: HashSet::new(),
        })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.book
            .get_sheet_collection()
            .iter()
            .map(|sheet| sheet.get_name().to_string())
            .collect()
    }

    fn sheet(&self, sheet_name: &str) -> Result<&umya_spreadsheet::Worksheet, MutatorError> {
        self.book
            .get_sheet_by_name(sheet_name)
            .ok_or_else(|| MutatorError::SheetNotFound(sheet_name.to_string()))
    }

    fn sheet_mut(
        &mut self,
        sheet_name: &str,
    ) -> Result<&mut umya_spreadsheet::Worksheet, MutatorError> {
        self.book
            .get_sheet_by_name_mut(sheet_name)
            .ok_or_else(|| MutatorError::SheetNotFound(sheet_name.to_string()))
    }

    fn cell_value(sheet: &umya_spreadsheet::Worksheet, cell_reference: &str) -> CellValue {
        match sheet.get_cell(cell_reference) {
            Some(cell) => CellValue::from_raw(cell.get_value()),
            None => CellValue::Empty,
        }
    }

    /// Returns per-sheet structure: dimensions, the two header rows, column
    /// A, and the full grid, with blank cells reported as a distinct
    /// sentinel rather than as zero.
    pub fn read_structure(&self, sheet_name: &str) -> Result<WorkbookGrid, MutatorError> {
        let sheet = self.sheet(sheet_name)?;
        let row_count = sheet.get_highest_row();
        let column_count = sheet.get_highest_column();

        let row_1 = (1..=column_count)
            .map(|col| Self::cell_value(sheet, &col_row_ref(col, 1)))
            .collect();
        let row_2 = (1..=column_count)
            .map(|col| Self::cell_value(sheet, &col_row_ref(col, 2)))
            .collect();
        let column_a = (1..=row_count)
            .map(|row| Self::cell_value(sheet, &col_row_ref(1, row)))
            .collect();

        let grid = (1..=row_count)
            .map(|row| {
                (1..=column_count)
                    .map(|col| Self::cell_value(sheet, &col_row_ref(col, row)))
                    .collect()
            })
            .collect();

        Ok(WorkbookGrid {
            sheet_name: sheet_name.to_string(),
            row_count,
            column_count,
            row_1,
            row_2,
            column_a,
            grid,
        })
    }

    /// Whether `cell_reference` currently holds no value. Used by the
    /// orchestrator to avoid even attempting a write the mutator would
    /// reject, and by the mutator itself to enforce the no-overwrite ban.
    pub fn is_empty(&self, sheet_name: &str, cell_reference: &str) -> Result<bool, MutatorError> {
        cellref::parse(cell_reference)?;
        let sheet = self.sheet(sheet_name)?;
        Ok(Self::cell_value(sheet, cell_reference).is_empty())
    }

    fn clone_style(
        &mut self,
        sheet_name: &str,
        source_ref: &str,
        target_ref: &str,
    ) -> Result<(), MutatorError> {
        let sheet = self.sheet_mut(sheet_name)?;
        let style = sheet
            .get_cell(source_ref)
            .map(|cell| cell.get_style().clone())
            .unwrap_or_default();
        sheet.get_cell_mut(target_ref).set_style(style);
        Ok(())
    }

    /// Writes `value` into `cell_reference`. Refuses to overwrite a cell
    /// that is currently non-empty — this is the defensive enforcement of
    /// the no-overwrite invariant; it does not trust the caller.
    ///
    /// Writes targeting column B first clone the font/fill/alignment/border/
    /// number-format of the same row's column C cell, so the newest-period
    /// column always inherits the prior column's look even outside a fresh
    /// insertion.
    #[instrument(skip(self, value))]
    pub fn update_cell(
        &mut self,
        sheet_name: &str,
        cell_reference: &str,
        value: &str,
    ) -> Result<(), MutatorError> {
        let (column, row) = cellref::parse(cell_reference)?;

        if !self.is_empty(sheet_name, cell_reference)? {
            warn!(sheet_name, cell_reference, "refusing to overwrite non-empty cell");
            return Err(MutatorError::CellConflict(cell_reference.to_string()));
        }

        if column == NEW_PERIOD_COLUMN {
            let source_ref = format!("{PRIOR_PERIOD_COLUMN}{row}");
            self.clone_style(sheet_name, &source_ref, cell_reference)?;
        }

        let sheet = self.sheet_mut(sheet_name)?;
        sheet.get_cell_mut(cell_reference).set_value(value);
        info!(sheet_name, cell_reference, "wrote cell");
        Ok(())
    }

    /// Shifts existing data one column right (B→C, C→D, …), writes
    /// `date_header`/`period_header` into the new B1/B2, clones the
    /// now-shifted C1/C2 styles back onto B1/B2, and returns the row map of
    /// every row whose shifted column-C cell is non-empty.
    ///
    /// Refuses a second insertion on the same sheet within this mutator's
    /// lifetime (one workbook load = one run).
    #[instrument(skip(self))]
    pub fn insert_new_period_column(
        &mut self,
        sheet_name: &str,
        date_header: &str,
        period_header: &str,
    ) -> Result<Vec<RowMapEntry>, MutatorError> {
        if self.inserted_sheets.contains(sheet_name) {
            return Err(MutatorError::AlreadyInserted(sheet_name.to_string()));
        }
        // Validate the sheet exists before marking it used, so a typo'd
        // sheet name doesn't burn the single-insertion budget.
        self.sheet(sheet_name)?;

        {
            let sheet = self.sheet_mut(sheet_name)?;
            sheet.insert_new_column(NEW_PERIOD_COLUMN, &1);
        }
        self.inserted_sheets.insert(sheet_name.to_string());

        let sheet = self.sheet_mut(sheet_name)?;
        sheet.get_cell_mut("B1").set_value(date_header);
        sheet.get_cell_mut("B2").set_value(period_header);

        self.clone_style(sheet_name, "C1", "B1")?;
        self.clone_style(sheet_name, "C2", "B2")?;

        let sheet = self.sheet(sheet_name)?;
        let row_count = sheet.get_highest_row();

        let mut row_map = Vec::new();
        for row in FIRST_DATA_ROW..=row_count {
            let source_cell_ref = format!("{PRIOR_PERIOD_COLUMN}{row}");
            if Self::cell_value(sheet, &source_cell_ref).is_empty() {
                continue;
            }
            let label = Self::cell_value(sheet, &col_row_ref(1, row))
                .as_str()
                .to_string();
            row_map.push(RowMapEntry {
                row_number: row,
                label,
                cell_reference: format!("{NEW_PERIOD_COLUMN}{row}"),
            });
        }

        info!(
            sheet_name,
            rows = row_map.len(),
            "inserted new period column"
        );
        Ok(row_map)
    }

    /// Serializes the workbook to bytes for upload.
    pub fn save_to_bytes(&self, scratch_path: &Path) -> Result<Vec<u8>, MutatorError> {
        umya_spreadsheet::writer::xlsx::write(&self.book, scratch_path)
            .map_err(|e| MutatorError::Save(e.to_string()))?;
        Ok(std::fs::read(scratch_path)?)
    }
}

/// Builds an A1-style reference from 1-based column/row indices.
fn col_row_ref(column: u32, row: u32) -> String {
    format!("{}{}", column_letters(column), row)
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn build_sample_workbook() -> (SpreadsheetMutator, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch.xlsx");

        let mut book = umya_spreadsheet::new_file();
        {
            let sheet = book.get_sheet_by_name_mut("Sheet1").unwrap();
            sheet.get_cell_mut("A1").set_value("");
            sheet.get_cell_mut("B1").set_value("2025-10-31");
            sheet.get_cell_mut("B2").set_value("Q3 2026");
            sheet.get_cell_mut("A3").set_value("Revenue");
            sheet.get_cell_mut("B3").set_value("394328000000");
            sheet.get_cell_mut("A4").set_value("Total Assets");
            sheet.get_cell_mut("B4").set_value("");
        }
        umya_spreadsheet::writer::xlsx::write(&book, &scratch).unwrap();
        let bytes = std::fs::read(&scratch).unwrap();

        let mutator = SpreadsheetMutator::load_from_bytes(&bytes, &scratch).unwrap();
        (mutator, dir)
    }

    #[test]
    fn read_structure_distinguishes_blank_from_zero() {
        let (mutator, _dir) = build_sample_workbook();
        let grid = mutator.read_structure("Sheet1").unwrap();
        assert!(grid.is_empty_at(3, 1)); // B4, 0-indexed row 3 col 1
        assert!(!grid.is_empty_at(2, 1)); // B3 has a value
    }

    #[test]
    fn update_cell_rejects_overwriting_non_empty_cell() {
        let (mut mutator, _dir) = build_sample_workbook();
        let err = mutator
            .update_cell("Sheet1", "B3", "999")
            .unwrap_err();
        assert!(matches!(err, MutatorError::CellConflict(_)));
    }

    #[test]
    fn update_cell_writes_into_empty_cell() {
        let (mut mutator, _dir) = build_sample_workbook();
        mutator.update_cell("Sheet1", "B4", "500000000").unwrap();
        assert!(!mutator.is_empty("Sheet1", "B4").unwrap());
    }

    #[test]
    fn update_cell_rejects_malformed_reference() {
        let (mut mutator, _dir) = build_sample_workbook();
        let err = mutator.update_cell("Sheet1", "not-a-cell", "1").unwrap_err();
        assert!(matches!(err, MutatorError::InvalidReference(_)));
    }

    #[test]
    fn insert_new_period_column_shifts_data_and_writes_headers() {
        let (mut mutator, _dir) = build_sample_workbook();
        let row_map = mutator
            .insert_new_period_column("Sheet1", "2026-01-31", "Q4 2026")
            .unwrap();

        assert_eq!(
            mutator.read_structure("Sheet1").unwrap().row_1[1].as_str(),
            "2026-01-31"
        );
        assert_eq!(
            mutator.read_structure("Sheet1").unwrap().row_2[1].as_str(),
            "Q4 2026"
        );

        // Former B3 (Revenue, 394328000000) is now at C3.
        assert!(!mutator.is_empty("Sheet1", "C3").unwrap());
        // Row 4 (Total Assets) was blank before the shift, so it is not in
        // the row map.
        assert!(row_map.iter().any(|r| r.row_number == 3 && r.label == "Revenue"));
        assert!(!row_map.iter().any(|r| r.row_number == 4));

        // New B3/B4 are empty, ready for the agent to fill.
        assert!(mutator.is_empty("Sheet1", "B3").unwrap());
    }

    #[test]
    fn insert_new_period_column_refuses_second_insertion() {
        let (mut mutator, _dir) = build_sample_workbook();
        mutator
            .insert_new_period_column("Sheet1", "2026-01-31", "Q4 2026")
            .unwrap();
        let err = mutator
            .insert_new_period_column("Sheet1", "2026-04-30", "Q1 2027")
            .unwrap_err();
        assert!(matches!(err, MutatorError::AlreadyInserted(_)));
    }

    #[test]
    fn column_letters_handles_multi_letter_columns() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
    }
}
