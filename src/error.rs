//! Error types for the item export.
//!
//! This module provides the [`ExportError`] type for all library operations
//! and the [`Result`] convenience type.
//!
//! Errors fall in two groups. Decode errors describe a single unusable
//! MARC record; the pipeline logs them to the error sink and carries on
//! (see [`ExportError::is_decode_error`]). Every other variant is a setup or
//! I/O failure that ends the run.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for all export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The record structure is malformed (bad directory, field overrun).
    #[error("Invalid MARC record: {0}")]
    InvalidRecord(String),

    /// The 24-byte leader could not be parsed.
    #[error("Invalid leader: {0}")]
    InvalidLeader(String),

    /// A data field could not be parsed.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// Field content is not valid UTF-8.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The stream ended in the middle of a record.
    #[error("Truncated record: {0}")]
    TruncatedRecord(String),

    /// The record does not end with the 0x1D record terminator.
    #[error("Record terminator not found at byte {0}")]
    MissingRecordTerminator(usize),

    /// The framework export could not be read.
    #[error("Cannot read MARC framework {path}: {source}")]
    Framework {
        /// Path of the framework export.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A configured file could not be opened or created.
    #[error("Cannot open {path}: {source}")]
    Open {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// CSV writer failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// True when the error only invalidates the record being decoded.
    ///
    /// The pipeline reports these as `CHUNK_ERROR` and moves on to the next
    /// record; anything else aborts the run.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ExportError::InvalidRecord(_)
                | ExportError::InvalidLeader(_)
                | ExportError::InvalidField(_)
                | ExportError::Encoding(_)
                | ExportError::TruncatedRecord(_)
                | ExportError::MissingRecordTerminator(_)
        )
    }
}

/// Convenience type alias for [`std::result::Result`] with [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_recoverable() {
        assert!(ExportError::InvalidLeader("x".to_string()).is_decode_error());
        assert!(ExportError::TruncatedRecord("x".to_string()).is_decode_error());
        assert!(ExportError::MissingRecordTerminator(12).is_decode_error());
    }

    #[test]
    fn test_setup_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!ExportError::Io(io).is_decode_error());
        assert!(!ExportError::Config("missing tag".to_string()).is_decode_error());
    }

    #[test]
    fn test_open_error_names_the_path() {
        let err = ExportError::Open {
            path: PathBuf::from("/tmp/nowhere.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/tmp/nowhere.csv"));
    }
}
