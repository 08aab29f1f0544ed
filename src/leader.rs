//! MARC record leader parsing.
//!
//! The MARC leader is a 24-byte fixed-length field at the start of every MARC record.
//! Only the parts the decoder relies on are interpreted; the rest is kept verbatim.
//!
//! # Structure
//!
//! - Positions 0-4: Record length (5 digits)
//! - Position 5: Record status
//! - Position 6: Record type
//! - Position 7: Bibliographic level
//! - Position 9: Character coding (ignored, data is always read as UTF-8)
//! - Positions 12-16: Base address of data (5 digits)

use crate::error::{ExportError, Result};

/// Length of an ISO 2709 leader in bytes.
pub const LEADER_LEN: usize = 24;

/// MARC Leader - 24 bytes at the start of every MARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    /// Record length (5 digits) - positions 0-4
    pub record_length: u32,
    /// Record status (1 char) - position 5
    pub record_status: char,
    /// Type of record (1 char) - position 6
    pub record_type: char,
    /// Bibliographic level (1 char) - position 7
    pub bibliographic_level: char,
    /// Character coding scheme (1 char) - position 9
    pub character_coding: char,
    /// Base address of data (5 digits) - positions 12-16
    pub data_base_address: u32,
}

impl Default for Leader {
    fn default() -> Self {
        Leader {
            record_length: 0,
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            character_coding: 'a',
            data_base_address: 0,
        }
    }
}

impl Leader {
    /// Parse a leader from 24 bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are too short or a numeric position is not numeric.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEADER_LEN {
            return Err(ExportError::InvalidLeader(format!(
                "Leader must be at least 24 bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Leader {
            record_length: parse_digits(&bytes[0..5])?,
            record_status: bytes[5] as char,
            record_type: bytes[6] as char,
            bibliographic_level: bytes[7] as char,
            character_coding: bytes[9] as char,
            data_base_address: parse_digits(&bytes[12..17])?,
        })
    }

    /// Validate that the leader is suitable for binary record reading.
    ///
    /// Checks that `record_length` and `data_base_address` are at least 24 and
    /// that the data area starts inside the record.
    ///
    /// # Errors
    ///
    /// Returns an error if either length is out of range.
    pub fn validate_for_reading(&self) -> Result<()> {
        if (self.record_length as usize) < LEADER_LEN {
            return Err(ExportError::InvalidLeader(format!(
                "Record length must be at least 24, got {}",
                self.record_length
            )));
        }
        if (self.data_base_address as usize) < LEADER_LEN {
            return Err(ExportError::InvalidLeader(format!(
                "Base address of data must be at least 24, got {}",
                self.data_base_address
            )));
        }
        if self.data_base_address > self.record_length {
            return Err(ExportError::InvalidLeader(format!(
                "Base address of data {} lies beyond record length {}",
                self.data_base_address, self.record_length
            )));
        }
        Ok(())
    }
}

/// Parse 5-digit ASCII number from bytes
fn parse_digits(bytes: &[u8]) -> Result<u32> {
    let s = std::str::from_utf8(bytes)
        .map_err(|_| ExportError::InvalidLeader("Non-ASCII numeric field".to_string()))?;
    if s.len() != 5 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExportError::InvalidLeader(format!(
            "Invalid numeric field: '{s}'"
        )));
    }
    s.parse::<u32>()
        .map_err(|_| ExportError::InvalidLeader(format!("Invalid numeric field: '{s}'")))
}
