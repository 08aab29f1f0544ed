//! MARC bibliographic record structures.
//!
//! This module provides the decoded record types consumed by the export:
//! - [`Record`] — Main bibliographic record structure
//! - [`Field`] — Variable data fields (010+)
//! - [`Subfield`] — Named data elements within fields
//!
//! # Examples
//!
//! ```
//! use marc_items_csv::{Field, Leader, MarcRecord, Record};
//!
//! let record = Record::builder(Leader::default())
//!     .control_field_str("001", "12345")
//!     .field(
//!         Field::builder("952".to_string(), ' ', ' ')
//!             .subfield_str('a', "MAIN")
//!             .subfield_str('p', "3900001")
//!             .build(),
//!     )
//!     .build();
//!
//! assert_eq!(record.get_control_field("001"), Some("12345"));
//! assert_eq!(record.fields_by_tag("952").count(), 1);
//! ```

use crate::leader::Leader;
use crate::marc_record::MarcRecord;
use indexmap::IndexMap;
use smallvec::SmallVec;

/// A MARC bibliographic record
///
/// Fields are stored in insertion order using `IndexMap`; repeated occurrences
/// of one tag keep the order in which they appeared in the source.
#[derive(Debug, Clone)]
pub struct Record {
    /// Record leader (24 bytes)
    pub leader: Leader,
    /// Control fields (000-009) - tag -> value, preserves insertion order
    pub control_fields: IndexMap<String, String>,
    /// Data fields (010+) - tag -> fields, preserves insertion order
    pub fields: IndexMap<String, Vec<Field>>,
}

/// A data field in a MARC record (fields 010 and higher)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field tag (3 digits)
    pub tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields (stored in `SmallVec` to avoid allocation for typical fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

/// A subfield within a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield value
    pub value: String,
}

impl Record {
    /// Create a new MARC record with the given leader
    #[must_use]
    pub fn new(leader: Leader) -> Self {
        Record {
            leader,
            control_fields: IndexMap::new(),
            fields: IndexMap::new(),
        }
    }

    /// Create a builder for fluently constructing MARC records
    #[must_use]
    pub fn builder(leader: Leader) -> RecordBuilder {
        RecordBuilder {
            record: Record::new(leader),
        }
    }

    /// Add a control field (000-009). A repeated tag replaces the earlier value.
    pub fn add_control_field(&mut self, tag: String, value: String) {
        self.control_fields.insert(tag, value);
    }

    /// Add a control field using string slices
    pub fn add_control_field_str(&mut self, tag: &str, value: &str) {
        self.add_control_field(tag.to_string(), value.to_string());
    }

    /// Get a control field value
    #[must_use]
    pub fn get_control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields.get(tag).map(String::as_str)
    }

    /// Add a data field
    pub fn add_field(&mut self, field: Field) {
        self.fields
            .entry(field.tag.clone())
            .or_default()
            .push(field);
    }

    /// Get all fields with a given tag
    #[must_use]
    pub fn get_fields(&self, tag: &str) -> Option<&[Field]> {
        self.fields.get(tag).map(Vec::as_slice)
    }

    /// Iterate over all data fields
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().flatten()
    }
}

impl MarcRecord for Record {
    fn get_control_field(&self, tag: &str) -> Option<&str> {
        Record::get_control_field(self, tag)
    }

    fn get_fields(&self, tag: &str) -> Option<&[Field]> {
        Record::get_fields(self, tag)
    }
}

/// Builder for fluently constructing MARC records
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Add a control field using string slices
    #[must_use]
    pub fn control_field_str(mut self, tag: &str, value: &str) -> Self {
        self.record.add_control_field_str(tag, value);
        self
    }

    /// Add a data field
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.record.add_field(field);
        self
    }

    /// Build the record
    #[must_use]
    pub fn build(self) -> Record {
        self.record
    }
}

impl Field {
    /// Create a new data field
    #[must_use]
    pub fn new(tag: String, indicator1: char, indicator2: char) -> Self {
        Field {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        }
    }

    /// Create a builder for constructing fields fluently
    #[must_use]
    pub fn builder(tag: String, indicator1: char, indicator2: char) -> FieldBuilder {
        FieldBuilder {
            field: Field::new(tag, indicator1, indicator2),
        }
    }

    /// Add a subfield
    pub fn add_subfield(&mut self, code: char, value: String) {
        self.subfields.push(Subfield { code, value });
    }

    /// Add a subfield using a string slice
    pub fn add_subfield_str(&mut self, code: char, value: &str) {
        self.add_subfield(code, value.to_string());
    }

    /// Get first value for a subfield code
    #[must_use]
    pub fn get_subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Iterate over subfields with a specific code
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |sf| sf.code == code)
            .map(|sf| sf.value.as_str())
    }

    /// Group subfield values by code.
    ///
    /// Codes are keyed in order of first appearance and each code keeps every
    /// value it carries, in field order. A code repeated further down the
    /// field joins its first group.
    ///
    /// # Examples
    ///
    /// ```
    /// use marc_items_csv::Field;
    ///
    /// let field = Field::builder("952".to_string(), ' ', ' ')
    ///     .subfield_str('z', "note1")
    ///     .subfield_str('a', "MAIN")
    ///     .subfield_str('z', "note2")
    ///     .build();
    ///
    /// let groups = field.subfield_groups();
    /// assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!['z', 'a']);
    /// assert_eq!(groups[&'z'], vec!["note1", "note2"]);
    /// ```
    #[must_use]
    pub fn subfield_groups(&self) -> IndexMap<char, Vec<&str>> {
        let mut groups: IndexMap<char, Vec<&str>> = IndexMap::new();
        for subfield in &self.subfields {
            groups
                .entry(subfield.code)
                .or_default()
                .push(subfield.value.as_str());
        }
        groups
    }
}

/// Builder for constructing fields fluently
#[derive(Debug)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Add a subfield
    #[must_use]
    pub fn subfield(mut self, code: char, value: String) -> Self {
        self.field.add_subfield(code, value);
        self
    }

    /// Add a subfield using a string slice
    #[must_use]
    pub fn subfield_str(mut self, code: char, value: &str) -> Self {
        self.field.add_subfield_str(code, value);
        self
    }

    /// Build the field
    #[must_use]
    pub fn build(self) -> Field {
        self.field
    }
}
