//! Read-only view of a decoded MARC record.
//!
//! The export only needs two lookups from a decoded record: a control field
//! by tag and every occurrence of a data field by tag. [`MarcRecord`] captures
//! exactly that so the transformer and the pipeline work with any record
//! type, not only [`crate::Record`].

use crate::record::Field;

/// Tag of the control number field.
pub const CONTROL_NUMBER_TAG: &str = "001";

/// Lookups the export performs on a decoded record.
///
/// # Examples
///
/// ```
/// use marc_items_csv::{Leader, MarcRecord, Record};
///
/// fn describe<T: MarcRecord>(record: &T) -> String {
///     format!(
///         "{} with {} item(s)",
///         record.control_number().unwrap_or("?"),
///         record.fields_by_tag("952").count()
///     )
/// }
///
/// let record = Record::builder(Leader::default())
///     .control_field_str("001", "42")
///     .build();
/// assert_eq!(describe(&record), "42 with 0 item(s)");
/// ```
pub trait MarcRecord {
    /// Get the value of a control field.
    ///
    /// Returns `None` if the field does not exist.
    fn get_control_field(&self, tag: &str) -> Option<&str>;

    /// Get all fields with a given tag.
    ///
    /// Returns a slice of all fields matching the tag, or `None` if no fields exist.
    fn get_fields(&self, tag: &str) -> Option<&[Field]>;

    /// Iterate over every occurrence of `tag` in source order.
    fn fields_by_tag<'a>(&'a self, tag: &str) -> std::slice::Iter<'a, Field> {
        self.get_fields(tag).unwrap_or_default().iter()
    }

    /// The record's control number (field 001), when present and non-empty.
    fn control_number(&self) -> Option<&str> {
        self.get_control_field(CONTROL_NUMBER_TAG)
            .filter(|id| !id.is_empty())
    }
}
