//! Recovery strategies for malformed MARC records.
//!
//! The reader either rejects a record at the first structural problem or
//! salvages whatever fields it can. Rejected records surface as
//! `CHUNK_ERROR` rows in the error file.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ExportError;

/// Strategy for handling malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMode {
    /// Reject the whole record on any malformation, invalid UTF-8 included (default)
    #[default]
    Strict,
    /// Drop unusable fields, replace invalid UTF-8 and keep the rest of the record
    Lenient,
}

impl RecoveryMode {
    /// Lower-case name used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryMode::Strict => "strict",
            RecoveryMode::Lenient => "lenient",
        }
    }

    /// True in strict mode.
    #[must_use]
    pub fn is_strict(self) -> bool {
        self == RecoveryMode::Strict
    }
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryMode {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(RecoveryMode::Strict),
            "lenient" => Ok(RecoveryMode::Lenient),
            other => Err(ExportError::Config(format!(
                "unknown recovery mode '{other}' (expected strict or lenient)"
            ))),
        }
    }
}
