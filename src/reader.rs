//! Reading MARC records from binary streams.
//!
//! This module provides [`MarcReader`] for reading ISO 2709 formatted MARC records
//! from any source that implements [`std::io::Read`], and [`RecordIterator`]
//! which yields one decode attempt per record.
//!
//! A record that cannot be decoded is reported as an error and the reader
//! moves on to the next one. When the leader itself is unreadable the record
//! boundary is unknown, so the reader skips past the next record terminator
//! (0x1D) before trying again. Only I/O failures of the underlying source end
//! the stream early.
//!
//! # Examples
//!
//! ```
//! use marc_items_csv::MarcReader;
//! use std::io::Cursor;
//!
//! let mut reader = MarcReader::new(Cursor::new(Vec::new()));
//! for attempt in reader.records() {
//!     match attempt {
//!         Ok(record) => println!("{:?}", record.get_control_field("001")),
//!         Err(e) => eprintln!("skipped: {e}"),
//!     }
//! }
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, trace};

use crate::error::{ExportError, Result};
use crate::leader::{Leader, LEADER_LEN};
use crate::record::{Field, Record};
use crate::recovery::RecoveryMode;

/// Ends a field or the directory.
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Introduces a subfield code.
pub const SUBFIELD_DELIMITER: u8 = 0x1F;
/// Ends a record.
pub const RECORD_TERMINATOR: u8 = 0x1D;

const DIRECTORY_ENTRY_LEN: usize = 12;

/// Reader for ISO 2709 binary MARC format.
///
/// `MarcReader` reads one MARC record at a time. All text is decoded as UTF-8
/// whatever the leader's character coding position says.
pub struct MarcReader<R: Read> {
    reader: BufReader<R>,
    /// Bytes already pulled from `reader` that belong to the next record.
    pending: Vec<u8>,
    recovery_mode: RecoveryMode,
    records_read: usize,
    exhausted: bool,
}

impl<R: Read> fmt::Debug for MarcReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarcReader")
            .field("recovery_mode", &self.recovery_mode)
            .field("records_read", &self.records_read)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<R: Read> MarcReader<R> {
    /// Create a new MARC reader.
    pub fn new(reader: R) -> Self {
        MarcReader {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            recovery_mode: RecoveryMode::Strict,
            records_read: 0,
            exhausted: false,
        }
    }

    /// Set the recovery mode for handling malformed records.
    #[must_use]
    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    /// Number of decode attempts so far, failed ones included.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Iterate over the remaining decode attempts.
    pub fn records(&mut self) -> RecordIterator<'_, R> {
        RecordIterator {
            reader: self,
            done: false,
        }
    }

    /// Read a single MARC record.
    ///
    /// Returns `Ok(Some(record))` if a record was successfully read, `Ok(None)` if EOF
    /// was reached, or `Err` if this record could not be decoded. After a decode
    /// error the reader is positioned on the next record, so calling again is valid.
    ///
    /// # Errors
    ///
    /// Returns a decode error (see [`ExportError::is_decode_error`]) for a malformed
    /// record, or [`ExportError::Io`] if the underlying source fails.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut leader_bytes = [0u8; LEADER_LEN];
        let filled = self.read_up_to(&mut leader_bytes)?;
        if filled == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        self.records_read += 1;
        if filled < LEADER_LEN {
            self.exhausted = true;
            return Err(ExportError::TruncatedRecord(format!(
                "Unexpected end of file after {filled} leader bytes"
            )));
        }

        let leader = match Leader::from_bytes(&leader_bytes).and_then(|leader| {
            leader.validate_for_reading()?;
            Ok(leader)
        }) {
            Ok(leader) => leader,
            Err(e) => {
                self.resync(&leader_bytes)?;
                return Err(e);
            },
        };

        let mut body = vec![0u8; leader.record_length as usize - LEADER_LEN];
        let filled = self.read_up_to(&mut body)?;
        if filled < body.len() {
            self.exhausted = true;
            return Err(ExportError::TruncatedRecord(format!(
                "Expected {} bytes of record data, found {filled}",
                body.len()
            )));
        }

        let record = parse_record(leader, &body, self.recovery_mode)?;
        trace!(fields = record.fields().count(), "Decoded MARC record");
        Ok(Some(record))
    }

    /// Fill `buf` from the pending bytes then the source; returns how much was filled.
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let from_pending = self.pending.len().min(buf.len());
        buf[..from_pending].copy_from_slice(&self.pending[..from_pending]);
        self.pending.drain(..from_pending);

        let mut filled = from_pending;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
                Err(e) => return Err(ExportError::Io(e)),
            }
        }
        Ok(filled)
    }

    /// Skip to just past the next record terminator after an unreadable leader.
    fn resync(&mut self, leader_bytes: &[u8]) -> Result<()> {
        if let Some(pos) = memchr::memchr(RECORD_TERMINATOR, leader_bytes) {
            let mut rest = leader_bytes[pos + 1..].to_vec();
            rest.append(&mut self.pending);
            self.pending = rest;
            debug!(skipped = pos + 1, "Resynchronised on record terminator");
            return Ok(());
        }

        if let Some(pos) = memchr::memchr(RECORD_TERMINATOR, &self.pending) {
            self.pending.drain(..=pos);
            return Ok(());
        }
        self.pending.clear();

        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ExportError::Io(e)),
            };
            if buf.is_empty() {
                self.exhausted = true;
                return Ok(());
            }
            if let Some(pos) = memchr::memchr(RECORD_TERMINATOR, buf) {
                self.reader.consume(pos + 1);
                return Ok(());
            }
            let len = buf.len();
            self.reader.consume(len);
        }
    }
}

/// Iterator over decode attempts, created by [`MarcReader::records`].
///
/// Yields `Ok(record)` or the decode error for each record in the stream.
/// Stops after the first I/O error.
#[derive(Debug)]
pub struct RecordIterator<'a, R: Read> {
    reader: &'a mut MarcReader<R>,
    done: bool,
}

impl<R: Read> Iterator for RecordIterator<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                if !e.is_decode_error() {
                    self.done = true;
                }
                Some(Err(e))
            },
        }
    }
}

/// Open a MARC file for reading, gunzipping when the name ends in `.gz`.
///
/// # Errors
///
/// Returns [`ExportError::Open`] if the file cannot be opened.
pub fn open_records(path: &Path, mode: RecoveryMode) -> Result<MarcReader<Box<dyn Read>>> {
    let file = File::open(path).map_err(|source| ExportError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let is_gzip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let source: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(file)
    };
    Ok(MarcReader::new(source).with_recovery_mode(mode))
}

/// Decode the directory and data area that follow a leader.
fn parse_record(leader: Leader, body: &[u8], mode: RecoveryMode) -> Result<Record> {
    if body.last() != Some(&RECORD_TERMINATOR) && mode.is_strict() {
        return Err(ExportError::MissingRecordTerminator(
            leader.record_length as usize - 1,
        ));
    }

    let base = leader.data_base_address as usize - LEADER_LEN;
    let directory = &body[..base];
    let data = &body[base..];
    let mut record = Record::new(leader);

    for entry in directory_entries(directory, mode)? {
        let (tag, length, start) = match entry {
            Ok(entry) => entry,
            Err(e) if mode.is_strict() => return Err(e),
            Err(_) => continue,
        };

        let end = start + length;
        if end > data.len() {
            if mode.is_strict() {
                return Err(ExportError::InvalidRecord(format!(
                    "Field {tag} exceeds data area"
                )));
            }
            continue;
        }

        let field_data = strip_terminator(&data[start..end]);
        if is_control_tag(&tag) {
            let value = decode_text(field_data, mode)?;
            record.add_control_field(tag, value);
        } else {
            match parse_data_field(field_data, &tag, mode) {
                Ok(field) => record.add_field(field),
                Err(e) if mode.is_strict() => return Err(e),
                Err(e) => debug!(%tag, error = %e, "Dropped unreadable field"),
            }
        }
    }

    Ok(record)
}

type DirectoryEntry = Result<(String, usize, usize)>;

/// Split the directory into (tag, length, start) entries, 12 bytes each.
fn directory_entries(directory: &[u8], mode: RecoveryMode) -> Result<Vec<DirectoryEntry>> {
    let directory = match memchr::memchr(FIELD_TERMINATOR, directory) {
        Some(end) => &directory[..end],
        None if mode.is_strict() => {
            return Err(ExportError::InvalidRecord(
                "Directory is not terminated".to_string(),
            ));
        },
        None => directory,
    };

    if directory.len() % DIRECTORY_ENTRY_LEN != 0 && mode.is_strict() {
        return Err(ExportError::InvalidRecord(
            "Incomplete directory entry".to_string(),
        ));
    }

    Ok(directory
        .chunks_exact(DIRECTORY_ENTRY_LEN)
        .map(|entry| {
            let tag = String::from_utf8_lossy(&entry[0..3]).into_owned();
            let length = parse_number(&entry[3..7])?;
            let start = parse_number(&entry[7..12])?;
            Ok((tag, length, start))
        })
        .collect())
}

/// Parse a data field from raw bytes (terminator already removed)
fn parse_data_field(data: &[u8], tag: &str, mode: RecoveryMode) -> Result<Field> {
    if data.len() < 2 {
        return Err(ExportError::InvalidField(format!(
            "Tag {tag}: data field too short (needs indicators)"
        )));
    }

    let mut field = Field::new(tag.to_string(), data[0] as char, data[1] as char);
    let subfield_data = &data[2..];
    if subfield_data.is_empty() {
        return Ok(field);
    }

    let first = match memchr::memchr(SUBFIELD_DELIMITER, subfield_data) {
        Some(0) => 0,
        Some(pos) if !mode.is_strict() => pos,
        _ => {
            return Err(ExportError::InvalidField(format!(
                "Tag {tag}: expected subfield delimiter"
            )));
        },
    };

    for chunk in subfield_data[first + 1..].split(|&b| b == SUBFIELD_DELIMITER) {
        let text = decode_text(chunk, mode)?;
        let mut chars = text.chars();
        if let Some(code) = chars.next() {
            field.add_subfield(code, chars.as_str().to_string());
        }
    }

    Ok(field)
}

fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00") && tag.chars().all(|c| c.is_ascii_digit())
}

fn strip_terminator(bytes: &[u8]) -> &[u8] {
    match bytes.split_last() {
        Some((&FIELD_TERMINATOR, rest)) => rest,
        _ => bytes,
    }
}

fn decode_text(bytes: &[u8], mode: RecoveryMode) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(e) if mode.is_strict() => Err(ExportError::Encoding(e.to_string())),
        Err(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Parse an ASCII number from a directory entry
fn parse_number(bytes: &[u8]) -> Result<usize> {
    let mut result = 0usize;
    for &byte in bytes {
        if byte.is_ascii_digit() {
            result = result * 10 + (byte - b'0') as usize;
        } else {
            return Err(ExportError::InvalidRecord(format!(
                "Invalid numeric field: expected digits, got byte {}",
                byte as char
            )));
        }
    }
    Ok(result)
}
