//! In-memory worksheet model shared by extraction and rendering.
//!
//! Workbooks are read into a sparse [`Grid`] of [`CellValue`]s keyed by
//! zero-based `(row, column)` coordinates, the same convention used by both
//! `calamine` and `rust_xlsxwriter`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ConsolidateError, Result};

/// Sheet name used when a grid is created from scratch.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

static EMPTY: CellValue = CellValue::Empty;

/// One formatted run of a rich-text cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
}

impl TextRun {
    /// Unformatted run holding `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Raw value held by a worksheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
    RichText(Vec<TextRun>),
    Date(NaiveDateTime),
    /// A formula together with its cached result, when the workbook stored one.
    Formula {
        formula: String,
        result: Option<Box<CellValue>>,
    },
    Error(String),
}

impl CellValue {
    /// Returns `true` for cells that carry no visible content.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::RichText(runs) => runs.iter().all(|run| run.text.trim().is_empty()),
            _ => false,
        }
    }

    /// Concatenated text of a rich-text run list.
    pub fn joined_runs(runs: &[TextRun]) -> String {
        runs.iter().map(|run| run.text.as_str()).collect()
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// Zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl CellRef {
    /// Reference to the zero-based `row` and `col`.
    pub const fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Parses an A1-style reference such as `B2` or `$AA$10`.
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = || ConsolidateError::InvalidCellReference(reference.to_string());
        let cleaned: String = reference.trim().chars().filter(|ch| *ch != '$').collect();
        let split = cleaned
            .find(|ch: char| ch.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);
        let col = column_index(letters).ok_or_else(invalid)?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        if row == 0 {
            return Err(invalid());
        }
        Ok(Self::new(row - 1, col))
    }
}

impl FromStr for CellRef {
    type Err = ConsolidateError;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col), self.row + 1)
    }
}

/// Converts column letters (`A`, `Z`, `AA`) into a zero-based index.
pub fn column_index(letters: &str) -> Option<u16> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    u16::try_from(index - 1).ok()
}

/// Converts a zero-based column index into its letter form.
pub fn column_name(col: u16) -> String {
    let mut remaining = col as u32 + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        let rem = (remaining - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Sparse worksheet contents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
}

impl Grid {
    /// Empty worksheet called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Worksheet name, written back unchanged.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value at `cell`; unset cells read as [`CellValue::Empty`].
    pub fn get(&self, cell: CellRef) -> &CellValue {
        self.cells.get(&(cell.row, cell.col)).unwrap_or(&EMPTY)
    }

    /// Stores a value; writing [`CellValue::Empty`] clears the cell.
    pub fn set(&mut self, cell: CellRef, value: impl Into<CellValue>) {
        let value = value.into();
        if value == CellValue::Empty {
            self.cells.remove(&(cell.row, cell.col));
        } else {
            self.cells.insert((cell.row, cell.col), value);
        }
    }

    /// Iterates the populated cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &CellValue)> {
        self.cells
            .iter()
            .map(|(&(row, col), value)| (CellRef::new(row, col), value))
    }

    /// Iterates the populated cells of one row.
    pub fn row(&self, row: u32) -> impl Iterator<Item = (u16, &CellValue)> {
        self.cells
            .range((row, 0)..=(row, u16::MAX))
            .map(|(&(_, col), value)| (col, value))
    }

    /// Returns `true` when every cell of `row` within `columns` is blank.
    pub fn is_row_blank(&self, row: u32, columns: std::ops::RangeInclusive<u16>) -> bool {
        self.cells
            .range((row, *columns.start())..=(row, *columns.end()))
            .all(|(_, value)| value.is_blank())
    }

    /// Removes and returns all cells of `row`.
    pub fn take_row(&mut self, row: u32) -> BTreeMap<u16, CellValue> {
        let cols: Vec<u16> = self.row(row).map(|(col, _)| col).collect();
        cols.into_iter()
            .filter_map(|col| self.cells.remove(&(row, col)).map(|value| (col, value)))
            .collect()
    }

    /// Index of the last row holding any cell.
    pub fn last_row(&self) -> Option<u32> {
        self.cells.keys().next_back().map(|&(row, _)| row)
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
