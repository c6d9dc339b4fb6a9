//! Per-file ingest errors and user-facing message formatting.
//!
//! Polars failures are matched by variant rather than by string so the message
//! shown in the alert stays short and actionable.

use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

/// Failure to ingest one uploaded file. Never aborts the rest of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Only {extension} files are allowed. '{filename}' was rejected.")]
    UnsupportedFileType { filename: String, extension: String },

    #[error("Error processing {filename}: missing required column '{column}'")]
    MissingRequiredColumn { filename: String, column: String },

    #[error("Error processing {filename}: {cause}")]
    ParseFailure { filename: String, cause: String },
}

impl IngestError {
    /// Name of the file this error is about.
    pub fn filename(&self) -> &str {
        match self {
            Self::UnsupportedFileType { filename, .. }
            | Self::MissingRequiredColumn { filename, .. }
            | Self::ParseFailure { filename, .. } => filename,
        }
    }

    pub(crate) fn parse(filename: &str, cause: impl Into<String>) -> Self {
        Self::ParseFailure {
            filename: filename.to_string(),
            cause: cause.into(),
        }
    }

    pub(crate) fn from_decode(filename: &str, err: &DecodeError) -> Self {
        Self::parse(filename, err.to_string())
    }

    pub(crate) fn from_polars(filename: &str, err: &PolarsError) -> Self {
        Self::parse(filename, user_message_from_polars(err))
    }
}

/// Failure to turn an upload payload into file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("upload content is not a data URL")]
    NotDataUrl,

    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!("Column not found: {}", msg),
        PE::Duplicate(msg) => format!(
            "Duplicate column after renaming: {}. Check for both V<N> and MDS<N> headers.",
            msg
        ),
        PE::IO { error, .. } => user_message_from_io(error.as_ref()),
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Malformed table (row shape mismatch): {}", msg),
        PE::ComputeError(msg) => {
            let first = msg.lines().next().unwrap_or_default().trim();
            format!("Could not parse table: {}", first)
        }
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error) -> String {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failure_becomes_parse_failure() {
        let err = IngestError::from_decode("web.tsv", &DecodeError::NotDataUrl);
        assert_eq!(
            err,
            IngestError::ParseFailure {
                filename: "web.tsv".into(),
                cause: "upload content is not a data URL".into(),
            }
        );
    }

    #[test]
    fn unsupported_type_names_file() {
        let err = IngestError::UnsupportedFileType {
            filename: "notes.csv".into(),
            extension: ".tsv".into(),
        };
        assert_eq!(
            err.to_string(),
            "Only .tsv files are allowed. 'notes.csv' was rejected."
        );
        assert_eq!(err.filename(), "notes.csv");
    }

    #[test]
    fn missing_column_message() {
        let err = IngestError::MissingRequiredColumn {
            filename: "a.tsv".into(),
            column: "group".into(),
        };
        assert!(err.to_string().contains("a.tsv"));
        assert!(err.to_string().contains("'group'"));
    }

    #[test]
    fn polars_compute_error_keeps_first_line() {
        let err = PolarsError::ComputeError("bad row 3\nmore detail".into());
        assert_eq!(
            user_message_from_polars(&err),
            "Could not parse table: bad row 3"
        );
    }

    #[test]
    fn polars_duplicate_mentions_renaming() {
        let err = PolarsError::Duplicate("MDS1".into());
        let msg = IngestError::from_polars("x.tsv", &err).to_string();
        assert!(msg.starts_with("Error processing x.tsv"));
        assert!(msg.contains("MDS1"));
    }

    #[test]
    fn io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(user_message_from_io(&err), "File or directory not found.");
    }
}
