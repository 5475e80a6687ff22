//! Best-effort conversion of raw cell values into numbers and header strings.
//!
//! Coercion is total: nothing in this module returns an error. Cells that
//! cannot be interpreted degrade to `0` (numbers) or an empty string
//! (headers), and numeric degradations are counted in [`CoercionStats`] so a
//! batch can report how many cells it had to guess.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::grid::CellValue;

/// Serial numbers strictly inside this range are read as Excel dates in
/// header cells.
pub const DATE_SERIAL_MIN: f64 = 1.0;
pub const DATE_SERIAL_MAX: f64 = 100_000.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Tally of cells that fell back to a default during numeric coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoercionStats {
    degraded: usize,
}

impl CoercionStats {
    pub fn degraded(&self) -> usize {
        self.degraded
    }

    fn record_degraded(&mut self) {
        self.degraded += 1;
    }
}

/// Coerces a cell into a number, defaulting to `0`.
///
/// Attempts, in order: a plain number, the numeric result of a formula, the
/// concatenated text of a rich-text run list, and a string parsed the way
/// JavaScript's `Number()` would. Anything else is `0`. Blank cells are `0`
/// without counting as a degradation.
pub fn coerce_number(value: &CellValue, stats: &mut CoercionStats) -> f64 {
    match numeric_value(value) {
        Some(number) => number,
        None => {
            if !value.is_blank() {
                stats.record_degraded();
            }
            0.0
        }
    }
}

fn numeric_value(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(number) => Some(*number).filter(|n| n.is_finite()),
        CellValue::Formula {
            result: Some(result),
            ..
        } => match result.as_ref() {
            CellValue::Number(number) => Some(*number).filter(|n| n.is_finite()),
            _ => None,
        },
        CellValue::RichText(runs) => parse_number_text(&CellValue::joined_runs(runs)),
        CellValue::Text(text) => parse_number_text(text),
        _ => None,
    }
}

/// Parses numeric text the way a spreadsheet formula's `Number()` would,
/// restricted to finite results.
///
/// Surrounding whitespace is ignored and an empty string is zero. Unsigned
/// `0x`, `0o` and `0b` literals are read in their radix. Text that only
/// parses to a non-finite value (`Infinity`, `NaN`) is unparsable.
fn parse_number_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        let has_prefix = trimmed
            .get(..2)
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if has_prefix {
            return parse_radix_digits(&trimmed[2..], radix);
        }
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Digits only: no sign, no separators, at least one digit.
fn parse_radix_digits(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0_f64, |acc, ch| {
        ch.to_digit(radix).map(|digit| acc * f64::from(radix) + f64::from(digit))
    })
}

/// Coerces a cell into the display string used for header fields.
///
/// Dates render as `DD/MM/YYYY`. Bare numbers between [`DATE_SERIAL_MIN`]
/// and [`DATE_SERIAL_MAX`] (exclusive) are treated as Excel date serials,
/// so a genuine small quantity in a header cell will render as a date.
pub fn coerce_header(value: &CellValue) -> String {
    match value {
        CellValue::Empty | CellValue::Error(_) => String::new(),
        CellValue::Date(datetime) => format_date(datetime.date()),
        CellValue::Number(number) => {
            if *number > DATE_SERIAL_MIN && *number < DATE_SERIAL_MAX {
                if let Some(datetime) = excel_serial_to_date(*number) {
                    return format_date(datetime.date());
                }
            }
            format_number(*number)
        }
        CellValue::Bool(flag) => flag.to_string(),
        CellValue::Text(text) => text.trim().to_string(),
        CellValue::RichText(runs) => CellValue::joined_runs(runs).trim().to_string(),
        CellValue::Formula { result, .. } => result
            .as_deref()
            .map(coerce_header)
            .unwrap_or_default(),
    }
}

/// Coerces a cell into plain text without the date-serial heuristic.
///
/// Used for tour-name columns, where numbers are never dates.
pub fn coerce_text(value: &CellValue) -> String {
    match value {
        CellValue::Number(number) => format_number(*number),
        CellValue::Formula { result, .. } => result.as_deref().map(coerce_text).unwrap_or_default(),
        other => coerce_header(other),
    }
}

/// Text of a cell exactly as stored, surrounding whitespace included.
///
/// Rich-text runs are joined and formulas yield their cached result. Cells
/// that hold no text fall back to [`coerce_text`].
pub fn coerce_verbatim(value: &CellValue) -> String {
    match value {
        CellValue::Text(text) => text.clone(),
        CellValue::RichText(runs) => CellValue::joined_runs(runs),
        CellValue::Formula { result, .. } => {
            result.as_deref().map(coerce_verbatim).unwrap_or_default()
        }
        other => coerce_text(other),
    }
}

/// Converts an Excel serial day count into a timestamp.
///
/// The 1899-12-30 epoch already absorbs the phantom 1900-02-29 that Excel
/// counts, so modern serials map onto the calendar date Excel displays.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.trunc();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round();
    excel_epoch()?
        .checked_add_signed(Duration::try_days(days as i64)?)?
        .checked_add_signed(Duration::try_seconds(seconds as i64)?)
}

/// Inverse of [`excel_serial_to_date`].
pub fn date_to_excel_serial(datetime: &NaiveDateTime) -> f64 {
    let Some(epoch) = excel_epoch() else {
        return 0.0;
    };
    (*datetime - epoch).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Formats a date as `DD/MM/YYYY`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}
