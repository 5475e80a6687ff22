//! End-to-end consolidation runs.
//!
//! A run extracts every source, merges the results, then locates, renders
//! and writes the consolidated artifact. Sources are processed one at a time
//! in configuration order. Nothing is written until the final step, and the
//! locate-to-write section is serialized per output directory within this
//! process. Separate processes are not coordinated.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::ConsolidationConfig;
use crate::error::{ConsolidateError, Result};
use crate::extract::{SheetShape, extract};
use crate::grid::Grid;
use crate::io::excel_read::{
    read_all_sheets, read_bytes_with_timeout, read_first_sheet, read_workbook, read_workbook_sheets,
};
use crate::io::excel_write::write_sheets;
use crate::locate::{ArtifactNaming, locate};
use crate::merge::{CrossSourceMerger, SourceExtracts};
use crate::model::{ConsolidatedDataset, SourceExtract, SourceId};
use crate::names::SourceNames;
use crate::render::{
    CONSOLIDATED_LAYOUT, PAX_TEMPLATE_LAYOUT, RowPolicy, SourceTotals, default_consolidated_template,
    default_pax_template, render_consolidated, render_source_totals,
};
use crate::validate::validate;

/// A source document handed to the pipeline.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_id: SourceId,
    pub shape: SheetShape,
    pub bytes: Vec<u8>,
}

/// Whether a run started a new artifact or extended the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactMode {
    Created,
    Updated,
}

/// Result of a consolidation run.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationOutcome {
    pub dataset: ConsolidatedDataset,
    pub file_name: String,
    pub path: PathBuf,
    pub mode: ArtifactMode,
}

/// Result of a single-source PAX report run.
#[derive(Debug, Clone, Serialize)]
pub struct PaxOutcome {
    pub source_id: SourceId,
    pub extract: SourceExtract,
    pub totals: SourceTotals,
    pub file_name: String,
    pub path: PathBuf,
}

/// Where and how a consolidated artifact is written.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub output_dir: PathBuf,
    pub naming: ArtifactNaming,
    pub names: SourceNames,
    pub policy: RowPolicy,
    pub read_timeout: Duration,
}

/// Where the layout of a newly created artifact comes from.
#[derive(Debug, Clone, Copy, Default)]
pub enum TemplateSource<'a> {
    /// The built-in consolidated layout.
    #[default]
    Builtin,
    /// An `.xlsx` template already in memory.
    Bytes(&'a [u8]),
    /// An `.xlsx` template file, read only when an artifact is created.
    File(&'a Path),
}

impl<'a> From<Option<&'a [u8]>> for TemplateSource<'a> {
    fn from(bytes: Option<&'a [u8]>) -> Self {
        bytes.map_or(TemplateSource::Builtin, TemplateSource::Bytes)
    }
}

impl TemplateSource<'_> {
    fn load(self, timeout: Duration) -> Result<Vec<Grid>> {
        const LABEL: &str = "consolidated template";
        match self {
            TemplateSource::Builtin => Ok(vec![default_consolidated_template()]),
            TemplateSource::Bytes(bytes) => read_all_sheets(bytes, LABEL),
            TemplateSource::File(path) => read_workbook_sheets(path, timeout, LABEL),
        }
    }
}

/// Process-wide mutexes keyed by output directory.
///
/// Entries nobody holds are pruned whenever a handle is requested, so the
/// map stays as large as the number of directories in use at once.
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirectoryLocks {
    /// The registry shared by every run in this process.
    pub fn global() -> &'static DirectoryLocks {
        static LOCKS: OnceLock<DirectoryLocks> = OnceLock::new();
        LOCKS.get_or_init(DirectoryLocks::default)
    }

    /// Mutex guarding `dir`; equal directories share one mutex.
    pub fn handle(&self, dir: &Path) -> Arc<Mutex<()>> {
        let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    }
}

/// Extracts every readable document. Unreadable documents are logged and
/// skipped; a later document for the same source replaces an earlier one.
pub fn extract_documents(documents: &[SourceDocument]) -> SourceExtracts {
    let mut extracts = SourceExtracts::new();
    for document in documents {
        match read_first_sheet(&document.bytes, &document.source_id) {
            Ok(grid) => {
                let extract = extract(&grid, document.shape);
                info!(
                    source_id = %document.source_id,
                    shape = ?document.shape,
                    record_count = extract.records.len(),
                    "source extracted"
                );
                extracts.insert(document.source_id.clone(), extract);
            }
            Err(err) => {
                warn!(source_id = %document.source_id, error = %err, "skipping unreadable source");
            }
        }
    }
    extracts
}

/// Consolidates in-memory source documents into the artifact described by
/// `options`. `template` seeds a new artifact; without one the built-in
/// template is used. Every worksheet of the template is kept; the rows are
/// rendered into the first.
#[instrument(
    level = "info",
    skip_all,
    fields(triggered_by = %triggered_by, output_dir = %options.output_dir.display())
)]
pub fn consolidate_documents(
    documents: &[SourceDocument],
    template: Option<&[u8]>,
    triggered_by: &str,
    options: &RenderOptions,
) -> Result<ConsolidationOutcome> {
    let extracts = extract_documents(documents);
    consolidate_extracts(&extracts, template.into(), triggered_by, options)
}

/// Merges already extracted sources and writes the consolidated artifact.
///
/// The template is only loaded when no artifact exists yet. Worksheets other
/// than the first, of the template or the existing artifact, are written
/// back with their cell contents.
#[instrument(level = "debug", skip_all, fields(sources = extracts.len()))]
pub fn consolidate_extracts(
    extracts: &SourceExtracts,
    template: TemplateSource<'_>,
    triggered_by: &str,
    options: &RenderOptions,
) -> Result<ConsolidationOutcome> {
    if extracts.is_empty() {
        return Err(ConsolidateError::NoDataAvailable);
    }

    let dataset = CrossSourceMerger::new(options.names.clone()).merge(extracts, triggered_by);
    info!(
        record_count = dataset.total_record_count,
        conflicts = dataset.conflicts.len(),
        "sources merged"
    );

    let dir = options.output_dir.as_path();
    fs::create_dir_all(dir)?;
    let lock = DirectoryLocks::global().handle(dir);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    let (mut sheets, path, mode) = match locate(dir, &options.naming)? {
        Some(path) => {
            let sheets =
                read_workbook_sheets(&path, options.read_timeout, "consolidated artifact")?;
            (sheets, path, ArtifactMode::Updated)
        }
        None => {
            let sheets = template.load(options.read_timeout)?;
            let path = dir.join(options.naming.next_file_name(dir)?);
            (sheets, path, ArtifactMode::Created)
        }
    };
    debug!(?mode, path = %path.display(), sheets = sheets.len(), "artifact selected");

    let grid = sheets
        .first_mut()
        .ok_or_else(|| ConsolidateError::MissingWorksheet(file_name_of(&path)))?;
    render_consolidated(
        grid,
        &dataset,
        &options.names,
        options.policy,
        &CONSOLIDATED_LAYOUT,
    );
    write_sheets(&path, &sheets)?;

    let file_name = file_name_of(&path);
    info!(%file_name, ?mode, "consolidated artifact written");
    Ok(ConsolidationOutcome {
        dataset,
        file_name,
        path,
        mode,
    })
}

/// Directory-driven pipeline over a [`ConsolidationConfig`].
#[derive(Debug, Clone)]
pub struct Consolidator {
    config: ConsolidationConfig,
    names: SourceNames,
}

impl Consolidator {
    /// Validates `config` and builds the source name table from it.
    pub fn new(config: ConsolidationConfig) -> Result<Self> {
        config.validate()?;
        let names = SourceNames::from_entries(&config.sources);
        Ok(Self { config, names })
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    pub fn names(&self) -> &SourceNames {
        &self.names
    }

    /// Options for rendering into the configured consolidated directory.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            output_dir: self.config.consolidated_dir.clone(),
            naming: self.config.artifact_naming(),
            names: self.names.clone(),
            policy: self.config.row_policy,
            read_timeout: self.config.read_timeout(),
        }
    }

    /// Current document of a source: the newest processed export when one
    /// exists, otherwise the newest raw upload.
    pub fn current_document(&self, source_id: &str) -> Result<Option<(PathBuf, SheetShape)>> {
        if let Some(path) = newest_workbook(&self.config.exports_root.join(source_id))? {
            return Ok(Some((path, SheetShape::ProcessedExport)));
        }
        Ok(newest_workbook(&self.config.uploads_root.join(source_id))?
            .map(|path| (path, SheetShape::RawSource)))
    }

    /// Reads the current document of every configured source, in
    /// configuration order. Sources without a readable document contribute
    /// nothing.
    pub fn collect_documents(&self) -> Vec<SourceDocument> {
        let timeout = self.config.read_timeout();
        let mut documents = Vec::new();
        for entry in &self.config.sources {
            let located = match self.current_document(&entry.id) {
                Ok(Some(located)) => located,
                Ok(None) => {
                    info!(source_id = %entry.id, "source has no document");
                    continue;
                }
                Err(err) => {
                    warn!(source_id = %entry.id, error = %err, "source directory unreadable");
                    continue;
                }
            };
            let (path, shape) = located;
            match read_bytes_with_timeout(&path, timeout) {
                Ok(bytes) => documents.push(SourceDocument {
                    source_id: entry.id.clone(),
                    shape,
                    bytes,
                }),
                Err(err) => {
                    warn!(source_id = %entry.id, path = %path.display(), error = %err, "skipping source");
                }
            }
        }
        documents
    }

    /// Runs a full consolidation triggered by `triggered_by`.
    #[instrument(level = "info", skip(self))]
    pub fn consolidate(&self, triggered_by: &str) -> Result<ConsolidationOutcome> {
        if self.config.source(triggered_by).is_none() {
            return Err(ConsolidateError::UnknownSource(triggered_by.to_string()));
        }
        let documents = self.collect_documents();
        let extracts = extract_documents(&documents);
        let template = self
            .config
            .consolidated_template
            .as_deref()
            .map_or(TemplateSource::Builtin, TemplateSource::File);
        consolidate_extracts(&extracts, template, triggered_by, &self.render_options())
    }

    /// Renders the single-source PAX report of `source_id`.
    #[instrument(level = "info", skip(self))]
    pub fn generate_source_pax(&self, source_id: &str) -> Result<PaxOutcome> {
        if self.config.source(source_id).is_none() {
            return Err(ConsolidateError::UnknownSource(source_id.to_string()));
        }
        let timeout = self.config.read_timeout();
        let Some((document, shape)) = self.current_document(source_id)? else {
            info!(%source_id, "source has no document");
            return Err(ConsolidateError::NoDataAvailable);
        };

        let source = read_workbook(&document, timeout, source_id)?;
        let extract = extract(&source, shape);
        let totals = SourceTotals::from_records(&validate(&extract.records));

        let mut sheets = match &self.config.pax_template {
            Some(path) => read_workbook_sheets(path, timeout, "pax template")?,
            None => vec![default_pax_template()],
        };
        let ship_name = self.names.display_name(source_id, &extract.source_name);
        let grid = sheets
            .first_mut()
            .ok_or_else(|| ConsolidateError::MissingWorksheet("pax template".to_string()))?;
        render_source_totals(grid, &extract, &ship_name, &PAX_TEMPLATE_LAYOUT);

        let dir = self.config.pax_output_root.join(source_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(self.config.pax_naming().next_file_name(&dir)?);
        write_sheets(&path, &sheets)?;

        let file_name = file_name_of(&path);
        info!(%file_name, "pax report written");
        Ok(PaxOutcome {
            source_id: source_id.to_string(),
            extract,
            totals,
            file_name,
            path,
        })
    }
}

/// Newest `.xlsx` in `dir` by modification time, ties broken by name.
/// Office lock files (`~$...`) are ignored.
fn newest_workbook(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_workbook = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        let is_lock_file = entry.file_name().to_string_lossy().starts_with("~$");
        if !is_workbook || is_lock_file || !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let candidate = (modified, path);
        if newest.as_ref().is_none_or(|current| candidate > *current) {
            newest = Some(candidate);
        }
    }
    Ok(newest.map(|(_, path)| path))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
