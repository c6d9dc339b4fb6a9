//! In-memory store of ingested files, keyed by filename.
//!
//! One registry lives inside the application state for the whole session.
//! Entries keep their insertion order, which is the order shown to the user.

use chrono::{DateTime, Utc};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::record::TraceRecord;

/// Summary of one registered file, as shown in the file info panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    /// Modification time declared by the uploader, if any.
    pub last_modified: Option<DateTime<Utc>>,
    pub rows: usize,
    pub dimensions: Vec<String>,
    pub groups: Vec<String>,
    pub min_tree_number: u32,
    pub max_tree_number: u32,
}

impl FileMetadata {
    pub fn from_record(
        record: &TraceRecord,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let (min_tree_number, max_tree_number) = record
            .tree_number_range()?
            .ok_or_else(|| eyre!("{} has no rows", record.filename))?;
        Ok(Self {
            filename: record.filename.clone(),
            uploaded_at: Utc::now(),
            last_modified,
            rows: record.num_rows(),
            dimensions: record.dimension_columns.clone(),
            groups: record.group_index.clone(),
            min_tree_number,
            max_tree_number,
        })
    }

    /// Lines of the per-file info block.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("Filename: {}", self.filename),
            format!("Number of Dimensions: {}", self.dimensions.len()),
            format!("Dimensions: {}", self.dimensions.join(", ")),
            format!("Number of Groups: {}", self.groups.len()),
            format!("Groups: {}", self.groups.join(", ")),
            format!(
                "Tree Range: {}-{}",
                self.min_tree_number, self.max_tree_number
            ),
            format!("Total Number of Trees: {}", self.rows),
        ]
    }
}

#[derive(Debug, Clone)]
struct Entry {
    metadata: FileMetadata,
    record: TraceRecord,
}

/// Filename → (record, metadata) store.
#[derive(Debug, Default, Clone)]
pub struct DatasetRegistry {
    entries: Vec<Entry>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file. Returns `false` and leaves the registry untouched when
    /// the filename is already present.
    pub fn add(&mut self, metadata: FileMetadata, record: TraceRecord) -> bool {
        if self.contains(&metadata.filename) {
            return false;
        }
        self.entries.push(Entry { metadata, record });
        true
    }

    /// Register a file, replacing any entry with the same filename wholesale.
    /// A replaced entry keeps its position.
    pub fn replace(&mut self, metadata: FileMetadata, record: TraceRecord) {
        match self.position(&metadata.filename) {
            Some(idx) => self.entries[idx] = Entry { metadata, record },
            None => self.entries.push(Entry { metadata, record }),
        }
    }

    pub fn remove_all(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, filename: &str) -> Option<&TraceRecord> {
        self.position(filename).map(|idx| &self.entries[idx].record)
    }

    pub fn get_metadata(&self, filename: &str) -> Option<&FileMetadata> {
        self.position(filename).map(|idx| &self.entries[idx].metadata)
    }

    /// Metadata of every file in insertion order.
    pub fn list_metadata(&self) -> Vec<&FileMetadata> {
        self.entries.iter().map(|e| &e.metadata).collect()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.metadata.filename.clone())
            .collect()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.position(filename).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, filename: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.metadata.filename == filename)
    }
}
