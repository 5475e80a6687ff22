use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ConsolidateError>;

/// Error type covering the failure cases of extracting, merging, and
/// rendering passenger workbooks.
///
/// Cell-level problems are never represented here: coercion always degrades
/// to a default value instead.
#[derive(Debug, Error)]
pub enum ConsolidateError {
    /// Wrapper for IO failures such as reading or listing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the JSON configuration or dataset serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// The workbook opened for a source has no first sheet.
    #[error("workbook for '{0}' has no worksheet")]
    MissingWorksheet(String),

    /// No source produced an extract, so there is nothing to consolidate.
    #[error("no source data available for consolidation")]
    NoDataAvailable,

    /// Saving or moving the rendered artifact into place failed.
    #[error("failed to write artifact {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bounded file read did not complete in time.
    #[error("reading {path} timed out after {timeout:?}")]
    ReadTimeout { path: PathBuf, timeout: Duration },

    /// Raised when an A1-style cell reference cannot be parsed.
    #[error("invalid cell reference '{0}'")]
    InvalidCellReference(String),

    /// Raised when the configuration is structurally valid JSON but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when an operation names a source that is not configured.
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
