//! Discovery of the current consolidated artifact.
//!
//! Artifacts are named `<prefix>_<unix-millis>.<extension>`; the embedded
//! timestamp is the only ordering key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Default prefix of consolidated artifacts.
pub const CONSOLIDATED_PREFIX: &str = "consolidated_pax";
/// Default prefix of single-source PAX reports.
pub const PAX_PREFIX: &str = "pax";
pub const XLSX_EXTENSION: &str = "xlsx";

/// Naming convention of timestamped artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNaming {
    pub prefix: String,
    pub extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self::new(CONSOLIDATED_PREFIX)
    }
}

impl ArtifactNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: XLSX_EXTENSION.to_string(),
        }
    }

    /// File name for a millisecond `timestamp`.
    pub fn file_name(&self, timestamp: i64) -> String {
        format!("{}_{timestamp}.{}", self.prefix, self.extension)
    }

    /// Extracts the timestamp from a file name that follows the convention.
    pub fn parse_timestamp(&self, file_name: &str) -> Option<i64> {
        let digits = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('_')?
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Name for a new artifact in `dir`.
    ///
    /// Uses the current time, bumped past the newest existing artifact so
    /// names keep increasing even if the clock steps backwards.
    pub fn next_file_name(&self, dir: &Path) -> Result<String> {
        let now = Utc::now().timestamp_millis();
        let latest = artifacts(dir, self)?
            .into_iter()
            .map(|(timestamp, _)| timestamp)
            .max();
        let timestamp = match latest {
            Some(latest) if latest >= now => latest + 1,
            _ => now,
        };
        Ok(self.file_name(timestamp))
    }
}

/// Returns the newest artifact in `dir`, or `None` when there is none yet.
///
/// A missing directory counts as empty.
pub fn locate(dir: &Path, naming: &ArtifactNaming) -> Result<Option<PathBuf>> {
    let newest = artifacts(dir, naming)?
        .into_iter()
        .max_by_key(|(timestamp, _)| *timestamp)
        .map(|(_, path)| path);
    debug!(dir = %dir.display(), found = ?newest, "artifact lookup");
    Ok(newest)
}

fn artifacts(dir: &Path, naming: &ArtifactNaming) -> Result<Vec<(i64, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(timestamp) = file_name.to_str().and_then(|name| naming.parse_timestamp(name))
        else {
            continue;
        };
        found.push((timestamp, entry.path()));
    }
    Ok(found)
}
