//! Upload ingestion: payload decoding, TSV parsing and derived columns.
//!
//! Every file in a batch is handled on its own; a failure is recorded in the
//! [`IngestReport`] and the remaining files are still processed.

use base64::Engine;
use chrono::{DateTime, Utc};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{DecodeError, IngestError};
use crate::record::{
    TraceRecord, FILE_COL, GROUP_CODE_COL, GROUP_COL, TREE_COL, TREE_NUMBER_COL,
};
use crate::registry::{DatasetRegistry, FileMetadata};

/// Raw content of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// File bytes as read from disk.
    Bytes(Vec<u8>),
    /// Browser upload content: `data:<mime>;base64,<body>`.
    DataUrl(String),
}

impl Payload {
    /// Decode into the file's bytes.
    pub fn decode(&self) -> std::result::Result<Vec<u8>, DecodeError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::DataUrl(url) => {
                let (header, body) = url.split_once(',').ok_or(DecodeError::NotDataUrl)?;
                if header.ends_with(";base64") {
                    Ok(base64::engine::general_purpose::STANDARD.decode(body.trim())?)
                } else {
                    Ok(body.as_bytes().to_vec())
                }
            }
        }
    }
}

/// One entry of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub payload: Payload,
    pub last_modified: Option<DateTime<Utc>>,
}

impl UploadedFile {
    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            payload: Payload::Bytes(bytes),
            last_modified: None,
        }
    }

    pub fn from_data_url(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            payload: Payload::DataUrl(url.into()),
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Read a file from disk; the registry key is the file name without its directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| eyre!("Path has no file name: {}", path.display()))?
            .to_string();
        let bytes = std::fs::read(path)
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        let mut file = Self::from_bytes(filename, bytes);
        if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
            file.last_modified = Some(DateTime::<Utc>::from(modified));
        }
        Ok(file)
    }
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    filename: String,
    content: String,
    /// Seconds since the Unix epoch, as reported by the browser.
    #[serde(default)]
    last_modified: Option<f64>,
}

/// Parse a JSON upload batch (`[{filename, content, last_modified}, ...]`).
pub fn read_batch(json: &str) -> Result<Vec<UploadedFile>> {
    let entries: Vec<BatchEntry> =
        serde_json::from_str(json).map_err(|e| eyre!("Invalid upload batch: {}", e))?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            let mut file = UploadedFile::from_data_url(entry.filename, entry.content);
            file.last_modified = entry.last_modified.and_then(timestamp_from_secs);
            file
        })
        .collect())
}

fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Column renaming rule for embedding dimensions.
///
/// Every occurrence of `from` in a header is replaced by `to`, so `V1`
/// becomes `MDS1`. The match is case- and position-sensitive: `Value` also
/// becomes `MDSalue` and is then treated as a dimension. Any column whose
/// renamed header contains `to` is a dimension column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionRename {
    pub from: String,
    pub to: String,
}

impl Default for DimensionRename {
    fn default() -> Self {
        Self {
            from: "V".to_string(),
            to: "MDS".to_string(),
        }
    }
}

impl DimensionRename {
    pub fn apply(&self, column: &str) -> String {
        if self.from.is_empty() {
            return column.to_string();
        }
        column.replace(&self.from, &self.to)
    }

    pub fn is_dimension(&self, column: &str) -> bool {
        column.contains(&self.to)
    }
}

impl From<&IngestConfig> for DimensionRename {
    fn from(config: &IngestConfig) -> Self {
        Self {
            from: config.rename_from.clone(),
            to: config.rename_to.clone(),
        }
    }
}

/// What happened to a file that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Added,
    /// Re-ingest of a registered filename; the old entry was overwritten.
    Replaced,
    /// Filename already registered; the existing entry is kept.
    SkippedDuplicate,
}

/// How a batch treats filenames that are already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Plain upload: registered filenames are skipped.
    #[default]
    Add,
    /// Explicit re-ingest: registered filenames are parsed again and replaced.
    Replace,
}

/// Result of ingesting one batch.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub outcomes: Vec<(String, IngestOutcome)>,
    pub errors: Vec<IngestError>,
}

impl IngestReport {
    /// All error messages, one per line, in batch order.
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the alert should be displayed.
    pub fn show_alert(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Message of the last failing file only.
    pub fn last_error(&self) -> Option<&IngestError> {
        self.errors.last()
    }

    pub fn added(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == IngestOutcome::Added)
            .count()
    }

    pub fn replaced(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == IngestOutcome::Replaced)
            .count()
    }
}

/// Ingest every file of a batch into the registry, skipping registered filenames.
pub fn ingest_batch(
    registry: &mut DatasetRegistry,
    files: &[UploadedFile],
    config: &IngestConfig,
) -> IngestReport {
    ingest_batch_with(registry, files, config, IngestMode::Add)
}

pub fn ingest_batch_with(
    registry: &mut DatasetRegistry,
    files: &[UploadedFile],
    config: &IngestConfig,
    mode: IngestMode,
) -> IngestReport {
    let mut report = IngestReport::default();
    for file in files {
        match ingest_file(registry, file, config, mode) {
            Ok(outcome) => report.outcomes.push((file.filename.clone(), outcome)),
            Err(err) => {
                warn!(filename = %file.filename, error = %err, "upload rejected");
                report.errors.push(err);
            }
        }
    }
    info!(
        files = files.len(),
        added = report.added(),
        replaced = report.replaced(),
        failed = report.errors.len(),
        "upload batch processed"
    );
    report
}

/// Ingest a single file. With [`IngestMode::Add`] duplicates are skipped without
/// touching the registry; with [`IngestMode::Replace`] a registered entry is
/// overwritten only once the new content has parsed.
pub fn ingest_file(
    registry: &mut DatasetRegistry,
    file: &UploadedFile,
    config: &IngestConfig,
    mode: IngestMode,
) -> std::result::Result<IngestOutcome, IngestError> {
    if !file.filename.ends_with(&config.accepted_extension) {
        return Err(IngestError::UnsupportedFileType {
            filename: file.filename.clone(),
            extension: config.accepted_extension.clone(),
        });
    }

    let registered = registry.contains(&file.filename);
    if registered && mode == IngestMode::Add {
        debug!(filename = %file.filename, "already registered, skipping");
        return Ok(IngestOutcome::SkippedDuplicate);
    }

    let bytes = file
        .payload
        .decode()
        .map_err(|e| IngestError::from_decode(&file.filename, &e))?;
    let record = parse_trace(&file.filename, bytes, &DimensionRename::from(config))?;
    let metadata = FileMetadata::from_record(&record, file.last_modified)
        .map_err(|e| IngestError::parse(&file.filename, e.to_string()))?;

    debug!(
        filename = %file.filename,
        rows = metadata.rows,
        dimensions = metadata.dimensions.len(),
        groups = metadata.groups.len(),
        "parsed trace file"
    );
    if registered {
        registry.replace(metadata, record);
        info!(filename = %file.filename, "re-ingested, previous entry replaced");
        Ok(IngestOutcome::Replaced)
    } else {
        registry.add(metadata, record);
        Ok(IngestOutcome::Added)
    }
}

/// Parse TSV bytes into a [`TraceRecord`].
pub fn parse_trace(
    filename: &str,
    bytes: Vec<u8>,
    rename: &DimensionRename,
) -> std::result::Result<TraceRecord, IngestError> {
    let bytes = String::from_utf8(bytes)
        .map_err(|e| IngestError::parse(filename, format!("file is not valid UTF-8: {}", e)))?
        .into_bytes();

    let mut frame = read_tsv(bytes).map_err(|e| IngestError::from_polars(filename, &e))?;

    let renamed: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| rename.apply(name.as_str()))
        .collect();
    frame
        .set_column_names(renamed.iter().map(String::as_str))
        .map_err(|e| IngestError::from_polars(filename, &e))?;

    if !renamed.iter().any(|name| name == GROUP_COL) {
        return Err(IngestError::MissingRequiredColumn {
            filename: filename.to_string(),
            column: GROUP_COL.to_string(),
        });
    }
    if frame.height() == 0 {
        return Err(IngestError::parse(filename, "file contains no data rows"));
    }

    let mut dimension_columns: Vec<String> = renamed
        .iter()
        .filter(|name| rename.is_dimension(name))
        .cloned()
        .collect();
    dimension_columns.sort();
    dimension_columns.dedup();

    let group_index = derive_columns(&mut frame, filename, &dimension_columns)
        .map_err(|e| IngestError::from_polars(filename, &e))?;

    Ok(TraceRecord {
        filename: filename.to_string(),
        frame,
        dimension_columns,
        group_index,
    })
}

fn read_tsv(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
    let mut read_options = CsvReadOptions::default();
    read_options.has_header = true;
    read_options.infer_schema_length = None;
    read_options = read_options.map_parse_options(|opts| opts.with_separator(b'\t'));
    CsvReader::new(Cursor::new(bytes))
        .with_options(read_options)
        .finish()
}

/// Normalise column types and add the derived columns. Returns the group index.
fn derive_columns(
    frame: &mut DataFrame,
    filename: &str,
    dimension_columns: &[String],
) -> PolarsResult<Vec<String>> {
    let height = frame.height();

    let group = frame.column(GROUP_COL)?.cast(&DataType::String)?;
    let groups: Vec<String> = group
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect();
    frame.with_column(group)?;

    // code and running count per group
    let mut seen: HashMap<String, (u32, u32)> = HashMap::new();
    let mut group_index = Vec::new();
    let mut codes = Vec::with_capacity(height);
    let mut tree_numbers = Vec::with_capacity(height);
    for g in &groups {
        let next_code = seen.len() as u32;
        let entry = seen.entry(g.clone()).or_insert_with(|| {
            group_index.push(g.clone());
            (next_code, 0)
        });
        entry.1 += 1;
        codes.push(entry.0);
        tree_numbers.push(entry.1);
    }

    let tree = match frame.column(TREE_COL) {
        Ok(column) => column.cast(&DataType::String)?,
        Err(_) => Column::new(
            TREE_COL.into(),
            (1..=height).map(|i| i.to_string()).collect::<Vec<_>>(),
        ),
    };
    frame.with_column(tree)?;

    for dim in dimension_columns {
        let values = frame.column(dim)?.cast(&DataType::Float64)?;
        frame.with_column(values)?;
    }

    frame.with_column(Column::new(GROUP_CODE_COL.into(), codes))?;
    frame.with_column(Column::new(
        FILE_COL.into(),
        vec![filename.to_string(); height],
    ))?;
    frame.with_column(Column::new(TREE_NUMBER_COL.into(), tree_numbers))?;

    Ok(group_index)
}
