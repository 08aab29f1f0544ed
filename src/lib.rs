#![warn(missing_docs)]

//! # marc-items-csv
//!
//! Export the item fields of MARC bibliographic records (ISO 2709) to a
//! `;`-separated CSV whose columns follow a Koha MARC framework.
//!
//! A run reads three inputs: the records, the framework export and the item
//! tag (`952` for MARC 21 Koha, `995` for UNIMARC). It writes two outputs:
//!
//! - the item file, one row per occurrence of the item tag, columns
//!   `items.biblionumber` then every mapped `items.*` field, then optionally
//!   one `<tag>$$<code>` column per unmapped subfield;
//! - the error file, one row per record that could not be decoded
//!   (`CHUNK_ERROR`) or has no `001` (`NO_RECORD_ID`).
//!
//! ## Quick Start
//!
//! ```no_run
//! use marc_items_csv::{export, ConfigOverrides, ExportConfig};
//!
//! # fn main() -> marc_items_csv::Result<()> {
//! let config = ExportConfig::load(&ConfigOverrides::default())?;
//! let summary = export(&config)?;
//! println!("{} item rows, {} records skipped", summary.rows_written, summary.skipped());
//! # Ok(())
//! # }
//! ```
//!
//! ### Building a mapping by hand
//!
//! ```
//! use marc_items_csv::{Field, FieldMapping, Leader, Record};
//! use marc_items_csv::transform::transform;
//!
//! let mut mapping = FieldMapping::new("952");
//! mapping.add_subfield("p", "items.barcode");
//!
//! let record = Record::builder(Leader::default())
//!     .control_field_str("001", "7")
//!     .field(Field::builder("952".to_string(), ' ', ' ').subfield_str('p', "B001").build())
//!     .build();
//!
//! let rows = transform(&record, "7", &mapping, false);
//! assert_eq!(rows[0].get("items.barcode"), Some("B001"));
//! ```
//!
//! ## Modules
//!
//! - [`framework`]: Koha framework parsing and the subfield mapping
//! - [`reader`]: ISO 2709 decoding with resynchronisation
//! - [`transform`]: item fields to output rows
//! - [`item_writer`] and [`error_sink`]: the two CSV outputs
//! - [`pipeline`]: the run driver
//! - [`config`] and [`logging`]: ambient setup for the binary

pub mod config;
pub mod error;
pub mod error_sink;
pub mod framework;
pub mod item_writer;
pub mod leader;
pub mod logging;
pub mod marc_record;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod recovery;
pub mod transform;

pub use config::{ConfigOverrides, ExportConfig};
pub use error::{ExportError, Result};
pub use error_sink::{ErrorKind, ErrorRecord, ErrorSink};
pub use framework::{FieldMapping, FrameworkEntry};
pub use item_writer::ItemWriter;
pub use leader::Leader;
pub use marc_record::MarcRecord;
pub use pipeline::{export, ExportContext, ExportPipeline, RunSummary};
pub use reader::{open_records, MarcReader};
pub use record::{Field, FieldBuilder, Record, RecordBuilder, Subfield};
pub use recovery::RecoveryMode;
pub use transform::{transform, OutputRow};
