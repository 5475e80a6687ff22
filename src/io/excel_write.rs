use std::io::Write;
use std::path::Path;
use std::slice;

use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::coerce::{coerce_header, date_to_excel_serial};
use crate::error::{ConsolidateError, Result};
use crate::grid::{CellRef, CellValue, Grid};

const DATE_FORMAT: &str = "dd/mm/yyyy";

/// Serialises the grid into a single-sheet `.xlsx` document in memory.
pub fn grid_to_bytes(grid: &Grid) -> Result<Vec<u8>> {
    sheets_to_bytes(slice::from_ref(grid))
}

/// Serialises the grids, one worksheet each and in order, into an `.xlsx`
/// document in memory. Only cell contents are written; formatting other than
/// the date number format is not carried.
pub fn sheets_to_bytes(sheets: &[Grid]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    for grid in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(grid.name())?;
        for (cell, value) in grid.cells() {
            write_cell(worksheet, cell, value, &date_format)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Writes the grid to `path` as a single-sheet workbook.
pub fn write_grid(path: &Path, grid: &Grid) -> Result<()> {
    write_sheets(path, slice::from_ref(grid))
}

/// Writes the grids to `path`, one worksheet each.
///
/// The workbook is staged in a temporary file next to `path` and renamed into
/// place, so a failed write never leaves a truncated artifact behind.
pub fn write_sheets(path: &Path, sheets: &[Grid]) -> Result<()> {
    let bytes = sheets_to_bytes(sheets)?;

    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let failure = |source: std::io::Error| ConsolidateError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let mut staged = NamedTempFile::new_in(directory).map_err(failure)?;
    staged.write_all(&bytes).map_err(failure)?;
    staged.as_file().sync_all().map_err(failure)?;
    staged.persist(path).map_err(|err| failure(err.error))?;

    debug!(
        path = %path.display(),
        sheets = sheets.len(),
        bytes = bytes.len(),
        "workbook written"
    );
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    cell: CellRef,
    value: &CellValue,
    date_format: &Format,
) -> Result<()> {
    let CellRef { row, col } = cell;
    match value {
        CellValue::Empty => {}
        CellValue::Number(number) => {
            worksheet.write_number(row, col, *number)?;
        }
        CellValue::Bool(flag) => {
            worksheet.write_boolean(row, col, *flag)?;
        }
        CellValue::Text(text) | CellValue::Error(text) => {
            worksheet.write_string(row, col, text)?;
        }
        CellValue::RichText(runs) => {
            worksheet.write_string(row, col, CellValue::joined_runs(runs))?;
        }
        CellValue::Date(datetime) => {
            worksheet.write_number_with_format(
                row,
                col,
                date_to_excel_serial(datetime),
                date_format,
            )?;
        }
        CellValue::Formula { formula, result } => {
            let mut formula = Formula::new(formula);
            if let Some(result) = result {
                formula = formula.set_result(cached_result(result));
            }
            worksheet.write_formula(row, col, formula)?;
        }
    }
    Ok(())
}

fn cached_result(result: &CellValue) -> String {
    match result {
        CellValue::Number(number) => number.to_string(),
        other => coerce_header(other),
    }
}
