//! Error file for records that could not be exported.
//!
//! Skipped records are logged as `;`-separated rows with a fixed header
//! (`index;id;error;error_message;data`) so the run never stops on bad input.
//! The error and header names are closed enums whose labels are written
//! verbatim.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{ExportError, Result};

/// Written in the index column when no index applies.
pub const NO_INDEX: &str = "Ø";

/// Field delimiter of both output files.
pub const DELIMITER: u8 = b';';

/// Line ending of both output files.
pub const TERMINATOR: csv::Terminator = csv::Terminator::CRLF;

/// Columns of the error file, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHeader {
    /// Position of the record in the input stream
    Index,
    /// Record identifier, when known
    Id,
    /// Error kind name
    Error,
    /// Human readable message
    Message,
    /// Extra data that triggered the error
    Data,
}

impl ErrorHeader {
    /// All columns in output order.
    pub const ALL: [ErrorHeader; 5] = [
        ErrorHeader::Index,
        ErrorHeader::Id,
        ErrorHeader::Error,
        ErrorHeader::Message,
        ErrorHeader::Data,
    ];

    /// Column name in the header row.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ErrorHeader::Index => "index",
            ErrorHeader::Id => "id",
            ErrorHeader::Error => "error",
            ErrorHeader::Message => "error_message",
            ErrorHeader::Data => "data",
        }
    }
}

/// Why a record was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The record could not be decoded
    ChunkError,
    /// The record has no control number (001)
    NoRecordId,
}

impl ErrorKind {
    /// Name written to the error file.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::ChunkError => "CHUNK_ERROR",
            ErrorKind::NoRecordId => "NO_RECORD_ID",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the error file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Record position, `None` renders as [`NO_INDEX`]
    pub index: Option<usize>,
    /// Record identifier, empty when unknown
    pub record_id: String,
    /// Error kind
    pub kind: ErrorKind,
    /// Message
    pub message: String,
    /// Extra data
    pub data: String,
}

impl ErrorRecord {
    /// A record at `index` that failed to decode.
    #[must_use]
    pub fn chunk_error(index: usize) -> Self {
        ErrorRecord {
            index: Some(index),
            record_id: String::new(),
            kind: ErrorKind::ChunkError,
            message: String::new(),
            data: String::new(),
        }
    }

    /// A record at `index` without a control number.
    #[must_use]
    pub fn missing_record_id(index: usize) -> Self {
        ErrorRecord {
            index: Some(index),
            record_id: String::new(),
            kind: ErrorKind::NoRecordId,
            message: "No 001".to_string(),
            data: String::new(),
        }
    }

    fn index_cell(&self) -> String {
        self.index
            .map_or_else(|| NO_INDEX.to_string(), |index| index.to_string())
    }
}

/// Append-only error file.
pub struct ErrorSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> fmt::Debug for ErrorSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink")
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl ErrorSink<File> {
    /// Create (or truncate) the error file at `path` and write its header.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Open`] if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| ExportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        ErrorSink::new(file)
    }
}

impl<W: Write> ErrorSink<W> {
    /// Wrap a writer and write the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(writer: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .terminator(TERMINATOR)
            .from_writer(writer);
        writer.write_record(ErrorHeader::ALL.iter().map(|h| h.label()))?;
        Ok(ErrorSink { writer, rows: 0 })
    }

    /// Append one error row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn trigger(
        &mut self,
        index: Option<usize>,
        record_id: &str,
        kind: ErrorKind,
        message: &str,
        data: &str,
    ) -> Result<()> {
        self.report(&ErrorRecord {
            index,
            record_id: record_id.to_string(),
            kind,
            message: message.to_string(),
            data: data.to_string(),
        })
    }

    /// Append a prepared error row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn report(&mut self, error: &ErrorRecord) -> Result<()> {
        let index = error.index_cell();
        self.writer.write_record([
            index.as_str(),
            error.record_id.as_str(),
            error.kind.name(),
            error.message.as_str(),
            error.data.as_str(),
        ])?;
        self.rows += 1;
        debug!(index = %index, kind = %error.kind, "Record skipped");
        Ok(())
    }

    /// Number of rows written after the header.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered rows cannot be flushed.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(sink: ErrorSink<Vec<u8>>) -> String {
        String::from_utf8(sink.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_header_only() {
        let sink = ErrorSink::new(Vec::new()).unwrap();
        assert_eq!(output(sink), "index;id;error;error_message;data\r\n");
    }

    #[test]
    fn test_chunk_and_missing_id_rows() {
        let mut sink = ErrorSink::new(Vec::new()).unwrap();
        sink.report(&ErrorRecord::chunk_error(3)).unwrap();
        sink.report(&ErrorRecord::missing_record_id(5)).unwrap();
        assert_eq!(sink.rows(), 2);

        let text = output(sink);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "3;;CHUNK_ERROR;;");
        assert_eq!(lines[2], "5;;NO_RECORD_ID;No 001;");
    }

    #[test]
    fn test_missing_index_sentinel() {
        let mut sink = ErrorSink::new(Vec::new()).unwrap();
        sink.trigger(None, "12", ErrorKind::NoRecordId, "msg", "d")
            .unwrap();
        assert!(output(sink).ends_with("Ø;12;NO_RECORD_ID;msg;d\r\n"));
    }

    #[test]
    fn test_values_with_delimiter_are_quoted() {
        let mut sink = ErrorSink::new(Vec::new()).unwrap();
        sink.trigger(Some(0), "", ErrorKind::ChunkError, "a;b", "")
            .unwrap();
        assert!(output(sink).contains("0;;CHUNK_ERROR;\"a;b\";"));
    }

    #[test]
    fn test_labels() {
        let labels: Vec<_> = ErrorHeader::ALL.iter().map(|h| h.label()).collect();
        assert_eq!(labels, vec!["index", "id", "error", "error_message", "data"]);
        assert_eq!(ErrorKind::ChunkError.to_string(), "CHUNK_ERROR");
    }
}
