use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use calamine::{DataType, Reader, Xlsx, open_workbook_from_rs};
use tracing::debug;

use crate::coerce::excel_serial_to_date;
use crate::error::{ConsolidateError, Result};
use crate::grid::{CellRef, CellValue, Grid};

/// Reads the first worksheet of an `.xlsx` document held in memory.
///
/// `label` names the document in errors (usually the source id). Cells that
/// carry a formula are stored as [`CellValue::Formula`] wrapping the cached
/// result.
pub fn read_first_sheet(bytes: &[u8], label: &str) -> Result<Grid> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ConsolidateError::MissingWorksheet(label.to_string()))?;
    read_sheet(&mut workbook, &sheet_name, label)
}

/// Reads every worksheet of an `.xlsx` document, in workbook order.
///
/// Used where a workbook is rewritten: the first sheet is rendered and the
/// others are carried through with their cell contents.
pub fn read_all_sheets(bytes: &[u8], label: &str) -> Result<Vec<Grid>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(ConsolidateError::MissingWorksheet(label.to_string()));
    }
    sheet_names
        .iter()
        .map(|sheet_name| read_sheet(&mut workbook, sheet_name, label))
        .collect()
}

/// Reads a workbook file and returns its first worksheet, bounding the read
/// by `timeout`.
pub fn read_workbook(path: &Path, timeout: Duration, label: &str) -> Result<Grid> {
    let bytes = read_bytes_with_timeout(path, timeout)?;
    read_first_sheet(&bytes, label)
}

/// Reads every worksheet of a workbook file, bounding the read by `timeout`.
pub fn read_workbook_sheets(path: &Path, timeout: Duration, label: &str) -> Result<Vec<Grid>> {
    let bytes = read_bytes_with_timeout(path, timeout)?;
    read_all_sheets(&bytes, label)
}

fn read_sheet<R: Read + Seek>(
    workbook: &mut Xlsx<R>,
    sheet_name: &str,
    label: &str,
) -> Result<Grid> {
    let range = workbook
        .worksheet_range(sheet_name)
        .ok_or_else(|| ConsolidateError::MissingWorksheet(format!("{label}: {sheet_name}")))?
        .map_err(ConsolidateError::from)?;

    let mut grid = Grid::new(sheet_name);
    if let Some((first_row, first_col)) = range.start() {
        for (row, col, value) in range.cells() {
            let cell = CellRef::new(first_row + row as u32, (first_col as usize + col) as u16);
            grid.set(cell, from_calamine(value));
        }
    }

    match workbook.worksheet_formula(sheet_name) {
        Some(Ok(formulas)) => {
            if let Some((first_row, first_col)) = formulas.start() {
                for (row, col, formula) in formulas.cells() {
                    if formula.is_empty() {
                        continue;
                    }
                    let cell =
                        CellRef::new(first_row + row as u32, (first_col as usize + col) as u16);
                    let cached = grid.get(cell).clone();
                    let result = (cached != CellValue::Empty).then(|| Box::new(cached));
                    grid.set(
                        cell,
                        CellValue::Formula {
                            formula: formula.clone(),
                            result,
                        },
                    );
                }
            }
        }
        Some(Err(err)) => debug!(%label, error = %err, "formulas unavailable, using cached values"),
        None => {}
    }

    debug!(%label, sheet = %sheet_name, cells = grid.len(), "worksheet loaded");
    Ok(grid)
}

/// Reads a whole file on a helper thread and gives up after `timeout`.
///
/// A read that never completes leaves its helper thread parked; the caller
/// gets [`ConsolidateError::ReadTimeout`] instead of blocking forever.
pub fn read_bytes_with_timeout(path: &Path, timeout: Duration) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(ConsolidateError::MissingInput(path.to_path_buf()));
    }

    let (sender, receiver) = mpsc::channel();
    let owned = path.to_path_buf();
    thread::Builder::new()
        .name("workbook-read".into())
        .spawn(move || {
            let _ = sender.send(fs::read(&owned));
        })?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => Ok(result?),
        Err(RecvTimeoutError::Timeout) => Err(ConsolidateError::ReadTimeout {
            path: path.to_path_buf(),
            timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ConsolidateError::Io(std::io::Error::other(
            format!("reader for {} exited without a result", path.display()),
        ))),
    }
}

fn from_calamine(value: &DataType) -> CellValue {
    match value {
        DataType::Empty => CellValue::Empty,
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(serial) => excel_serial_to_date(*serial)
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(*serial)),
        DataType::Error(err) => CellValue::Error(err.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}
