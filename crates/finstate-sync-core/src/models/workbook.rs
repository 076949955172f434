use serde::{Deserialize, Serialize};

/// A cell's read value, distinguishing an explicitly blank cell from a cell
/// holding the literal value `0`, per the mutator's "read structure"
/// contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CellValue::Empty => "",
            CellValue::Text(s) => s.as_str(),
        }
    }
}

/// Read-only view of one sheet, as returned by `analyze_excel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookGrid {
    pub sheet_name: String,
    pub row_count: u32,
    pub column_count: u32,
    /// Row 1: period end dates, oldest to newest reading right to left
    /// (column B is newest).
    pub row_1: Vec<CellValue>,
    /// Row 2: period labels (e.g. "Q4 2025").
    pub row_2: Vec<CellValue>,
    /// Column A: row labels (financial line items).
    pub column_a: Vec<CellValue>,
    /// Full grid of cell values, `grid[row][col]`, 0-indexed.
    pub grid: Vec<Vec<CellValue>>,
}

impl WorkbookGrid {
    pub fn is_empty_at(&self, row: usize, col: usize) -> bool {
        self.grid
            .get(row)
            .and_then(|r| r.get(col))
            .map(CellValue::is_empty)
            .unwrap_or(true)
    }
}

/// One row the agent must consider filling after a column insertion: the row
/// number, its label from column A, and the freshly inserted cell reference
/// expecting a value (always in column B).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMapEntry {
    pub row_number: u32,
    pub label: String,
    pub cell_reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cell_parses_to_empty_not_zero() {
        assert_eq!(CellValue::from_raw(""), CellValue::Empty);
        assert_eq!(CellValue::from_raw("   "), CellValue::Empty);
        assert_eq!(CellValue::from_raw("0"), CellValue::Text("0".to_string()));
    }

    #[test]
    fn is_empty_at_treats_out_of_bounds_as_empty() {
        let grid = WorkbookGrid {
            sheet_name: "Sheet1".to_string(),
            row_count: 1,
            column_count: 1,
            row_1: vec![],
            row_2: vec![],
            column_a: vec![],
            grid: vec![vec![CellValue::Text("394328000000".to_string())]],
        };
        assert!(!grid.is_empty_at(0, 0));
        assert!(grid.is_empty_at(0, 1));
        assert!(grid.is_empty_at(5, 5));
    }
}
