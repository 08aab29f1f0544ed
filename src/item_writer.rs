//! CSV output of item rows.
//!
//! The header is fixed when the writer is created. Each [`OutputRow`] is
//! projected onto it: columns the header does not know are dropped and
//! header columns the row does not set are left blank.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::trace;

use crate::error::{ExportError, Result};
use crate::error_sink::{DELIMITER, TERMINATOR};
use crate::transform::OutputRow;

/// `;`-separated item file with a fixed header.
pub struct ItemWriter<W: Write> {
    writer: csv::Writer<W>,
    headers: Vec<String>,
    rows: usize,
}

impl<W: Write> fmt::Debug for ItemWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemWriter")
            .field("headers", &self.headers)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl ItemWriter<File> {
    /// Create (or truncate) the output file at `path` and write the header.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Open`] if the file cannot be created.
    pub fn create(path: &Path, headers: Vec<String>) -> Result<Self> {
        let file = File::create(path).map_err(|source| ExportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        ItemWriter::new(file, headers)
    }
}

impl<W: Write> ItemWriter<W> {
    /// Wrap a writer and write the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(writer: W, headers: Vec<String>) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .terminator(TERMINATOR)
            .from_writer(writer);
        writer.write_record(&headers)?;
        Ok(ItemWriter {
            writer,
            headers,
            rows: 0,
        })
    }

    /// Header the rows are projected onto.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Write one row in header order.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        let cells = self
            .headers
            .iter()
            .map(|column| row.get(column).unwrap_or_default());
        self.writer.write_record(cells)?;
        self.rows += 1;
        trace!(row = self.rows, "Wrote item row");
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

    fn headers() -> Vec<String> {
        ["items.biblionumber", "items.homebranch", "952$$z"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_projection() {
        let mut writer = ItemWriter::new(Vec::new(), headers()).unwrap();

        let mut full = OutputRow::for_record("42");
        full.set("items.homebranch", "MAIN");
        full.set("952$$z", "note1|note2");
        full.set("items.unknown", "dropped");
        writer.write_row(&full).unwrap();

        writer.write_row(&OutputRow::for_record("43")).unwrap();
        assert_eq!(writer.rows(), 2);

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "items.biblionumber;items.homebranch;952$$z\r\n42;MAIN;note1|note2\r\n43;;\r\n"
        );
    }

    #[test]
    fn test_column_order_follows_header() {
        let mut writer = ItemWriter::new(Vec::new(), headers()).unwrap();
        let mut row = OutputRow::default();
        row.set("952$$z", "n");
        row.set("items.biblionumber", "1");
        writer.write_row(&row).unwrap();

        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(text.lines().nth(1), Some("1;;n"));
    }
}
