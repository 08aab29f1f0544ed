//! Sequential export driver.
//!
//! [`ExportPipeline`] pulls decode attempts one at a time, indexed from 0,
//! and resolves each before moving on:
//!
//! - a decode failure becomes a `CHUNK_ERROR` row in the error file;
//! - a record without a control number becomes a `NO_RECORD_ID` row;
//! - any other record contributes one item row per occurrence of the item tag.
//!
//! Only I/O failures stop the run. The pipeline owns both sinks; they are
//! flushed by [`ExportPipeline::finish`] and closed on drop on every other path.

use std::fs::File;
use std::io::Write;

use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::error::Result;
use crate::error_sink::{ErrorRecord, ErrorSink};
use crate::framework::FieldMapping;
use crate::item_writer::ItemWriter;
use crate::marc_record::MarcRecord;
use crate::reader::open_records;
use crate::transform::transform;

/// Read-only settings shared by every record of a run.
#[derive(Debug, Clone)]
pub struct ExportContext {
    /// Subfield mapping of the item tag
    pub mapping: FieldMapping,
    /// Whether unmapped subfields get `<tag>$$<code>` columns
    pub include_unmapped: bool,
}

impl ExportContext {
    /// Bundle a mapping with the unmapped-columns switch.
    #[must_use]
    pub fn new(mapping: FieldMapping, include_unmapped: bool) -> Self {
        ExportContext {
            mapping,
            include_unmapped,
        }
    }

    /// Header of the item file for this run.
    #[must_use]
    pub fn output_headers(&self) -> Vec<String> {
        self.mapping.output_headers(self.include_unmapped)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Decode attempts seen
    pub records_read: usize,
    /// Records that reached the transformer
    pub records_exported: usize,
    /// Item rows written
    pub rows_written: usize,
    /// Records that failed to decode
    pub chunk_errors: usize,
    /// Records without a control number
    pub missing_ids: usize,
}

impl RunSummary {
    /// Records sent to the error file.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.chunk_errors + self.missing_ids
    }
}

/// Drives records from a source into the item and error sinks.
#[derive(Debug)]
pub struct ExportPipeline<O: Write, E: Write> {
    context: ExportContext,
    items: ItemWriter<O>,
    errors: ErrorSink<E>,
    summary: RunSummary,
}

impl ExportPipeline<File, File> {
    /// Set up a run from configuration.
    ///
    /// Loads the framework and creates both output files; the header of each
    /// is written before any record is read.
    ///
    /// # Errors
    ///
    /// Returns the first setup failure (unreadable framework, file that cannot
    /// be created).
    pub fn create(config: &ExportConfig) -> Result<Self> {
        let mapping = FieldMapping::load(&config.framework_file, &config.item_field_tag)?;
        if mapping.mapped().is_empty() && mapping.unmapped().is_empty() {
            warn!(
                tag = %config.item_field_tag,
                "MARC framework has no subfields for the item tag"
            );
        }
        let context = ExportContext::new(mapping, config.include_unmapped_fields);
        let errors = ErrorSink::create(&config.errors_file)?;
        let items = ItemWriter::create(&config.output_file, context.output_headers())?;
        Ok(ExportPipeline::new(context, items, errors))
    }
}

impl<O: Write, E: Write> ExportPipeline<O, E> {
    /// Assemble a pipeline from already opened sinks.
    pub fn new(context: ExportContext, items: ItemWriter<O>, errors: ErrorSink<E>) -> Self {
        ExportPipeline {
            context,
            items,
            errors,
            summary: RunSummary::default(),
        }
    }

    /// Settings of this run.
    #[must_use]
    pub fn context(&self) -> &ExportContext {
        &self.context
    }

    /// Counters so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Handle one decode attempt at position `index`.
    ///
    /// # Errors
    ///
    /// Returns non-decode errors from the source and write failures of either sink.
    pub fn process<R: MarcRecord>(&mut self, index: usize, attempt: Result<R>) -> Result<()> {
        self.summary.records_read += 1;

        let record = match attempt {
            Ok(record) => record,
            Err(e) if e.is_decode_error() => {
                debug!(index, error = %e, "Record could not be decoded");
                self.summary.chunk_errors += 1;
                return self.errors.report(&ErrorRecord::chunk_error(index));
            },
            Err(e) => return Err(e),
        };

        let Some(record_id) = record.control_number() else {
            self.summary.missing_ids += 1;
            return self.errors.report(&ErrorRecord::missing_record_id(index));
        };

        let rows = transform(
            &record,
            record_id,
            &self.context.mapping,
            self.context.include_unmapped,
        );
        for row in &rows {
            self.items.write_row(row)?;
        }
        self.summary.records_exported += 1;
        self.summary.rows_written += rows.len();
        Ok(())
    }

    /// Process every attempt of `source` in order.
    ///
    /// # Errors
    ///
    /// Stops at the first error [`process`](Self::process) returns.
    pub fn run<I, R>(&mut self, source: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<R>>,
        R: MarcRecord,
    {
        info!(
            tag = self.context.mapping.tag(),
            columns = self.items.headers().len(),
            "Exporting item fields"
        );
        for (index, attempt) in source.into_iter().enumerate() {
            self.process(index, attempt)?;
        }
        Ok(self.summary)
    }

    /// Flush both sinks and return their writers (items, errors).
    ///
    /// # Errors
    ///
    /// Returns an error if either sink cannot be flushed.
    pub fn finish(self) -> Result<(O, E)> {
        let items = self.items.finish()?;
        let errors = self.errors.finish()?;
        Ok((items, errors))
    }
}

/// Run a complete export as described by `config`.
///
/// The framework is parsed and every file opened before the first record is
/// read, so a setup failure leaves no item rows behind.
///
/// # Errors
///
/// Returns setup failures, source I/O failures and sink write failures.
pub fn export(config: &ExportConfig) -> Result<RunSummary> {
    let mut reader = open_records(&config.records_file, config.recovery_mode)?;
    let mut pipeline = ExportPipeline::create(config)?;
    let summary = pipeline.run(reader.records())?;
    pipeline.finish()?;
    Ok(summary)
}
