use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConsolidateError, Result};
use crate::locate::{ArtifactNaming, CONSOLIDATED_PREFIX, PAX_PREFIX};
use crate::model::SourceId;
use crate::render::RowPolicy;

const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

/// A configured source and the name shown for it in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub id: SourceId,
    pub display_name: String,
}

impl SourceEntry {
    pub fn new(id: impl Into<SourceId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Directory layout, templates and policies of a consolidation deployment.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// One subdirectory per source holding raw uploads.
    pub uploads_root: PathBuf,
    /// One subdirectory per source holding processed exports.
    pub exports_root: PathBuf,
    /// Shared directory of the consolidated artifact.
    pub consolidated_dir: PathBuf,
    /// One subdirectory per source receiving single-source PAX reports.
    pub pax_output_root: PathBuf,
    pub consolidated_template: Option<PathBuf>,
    pub pax_template: Option<PathBuf>,
    /// Processing order and friendly names of the sources.
    pub sources: Vec<SourceEntry>,
    pub artifact_prefix: String,
    pub pax_prefix: String,
    pub read_timeout_ms: u64,
    pub row_policy: RowPolicy,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            uploads_root: PathBuf::from("uploads"),
            exports_root: PathBuf::from("outputs"),
            consolidated_dir: PathBuf::from("outputs/consolidated"),
            pax_output_root: PathBuf::from("outputs/pax"),
            consolidated_template: None,
            pax_template: None,
            sources: vec![
                SourceEntry::new("source-1", "Ship A"),
                SourceEntry::new("source-2", "Ship B"),
                SourceEntry::new("source-3", "Ship C"),
            ],
            artifact_prefix: CONSOLIDATED_PREFIX.to_string(),
            pax_prefix: PAX_PREFIX.to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            row_policy: RowPolicy::default(),
        }
    }
}

impl ConsolidationConfig {
    /// Loads and checks a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConsolidateError::MissingInput(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(ConsolidateError::InvalidConfig(
                "at least one source must be configured".into(),
            ));
        }
        for (index, entry) in self.sources.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(ConsolidateError::InvalidConfig(format!(
                    "source #{index} has an empty id"
                )));
            }
            if self.sources[..index].iter().any(|other| other.id == entry.id) {
                return Err(ConsolidateError::InvalidConfig(format!(
                    "source '{}' is configured twice",
                    entry.id
                )));
            }
        }
        if self.artifact_prefix.is_empty() || self.pax_prefix.is_empty() {
            return Err(ConsolidateError::InvalidConfig(
                "artifact prefixes must not be empty".into(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConsolidateError::InvalidConfig(
                "read_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Upper bound on any single workbook read.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Naming of consolidated artifacts.
    pub fn artifact_naming(&self) -> ArtifactNaming {
        ArtifactNaming::new(self.artifact_prefix.clone())
    }

    /// Naming of single-source PAX reports.
    pub fn pax_naming(&self) -> ArtifactNaming {
        ArtifactNaming::new(self.pax_prefix.clone())
    }

    /// Configured entry for `id`.
    pub fn source(&self, id: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|entry| entry.id == id)
    }
}
