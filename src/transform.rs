//! Turning item fields into output rows.
//!
//! Every occurrence of the item tag in a record becomes one [`OutputRow`].
//! The row always carries `items.biblionumber`; each subfield code then goes
//! to its mapped item column, to its `<tag>$$<code>` column when unmapped
//! columns are enabled, or nowhere. Repeated codes within one occurrence are
//! joined with `|`.

use indexmap::IndexMap;
use tracing::trace;

use crate::framework::{unmapped_column, FieldMapping, BIBLIONUMBER_COLUMN};
use crate::marc_record::MarcRecord;
use crate::record::Field;

/// Joins the values of a repeated subfield.
pub const VALUE_SEPARATOR: &str = "|";

/// One output line: column name to value.
///
/// Columns keep insertion order; the writer projects them onto its fixed
/// header, so the order here only matters for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRow {
    columns: IndexMap<String, String>,
}

impl OutputRow {
    /// A row holding only the record identifier.
    #[must_use]
    pub fn for_record(record_id: &str) -> Self {
        let mut row = OutputRow::default();
        row.set(BIBLIONUMBER_COLUMN, record_id);
        row
    }

    /// Set a column, replacing any previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    /// Number of populated columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when no column is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate over (column, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Build one row per occurrence of the mapping's tag in `record`.
///
/// `record_id` is written to `items.biblionumber` as given; the caller has
/// already checked it is not empty. Rows come out in field order.
///
/// # Examples
///
/// ```
/// use marc_items_csv::framework::FieldMapping;
/// use marc_items_csv::transform::transform;
/// use marc_items_csv::{Field, Leader, Record};
///
/// let mut mapping = FieldMapping::new("952");
/// mapping.add_subfield("a", "items.homebranch");
/// mapping.add_subfield("z", "");
///
/// let record = Record::builder(Leader::default())
///     .control_field_str("001", "42")
///     .field(
///         Field::builder("952".to_string(), ' ', ' ')
///             .subfield_str('a', "MAIN")
///             .subfield_str('z', "note1")
///             .subfield_str('z', "note2")
///             .build(),
///     )
///     .build();
///
/// let rows = transform(&record, "42", &mapping, true);
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].get("items.homebranch"), Some("MAIN"));
/// assert_eq!(rows[0].get("952$$z"), Some("note1|note2"));
/// ```
#[must_use]
pub fn transform<R: MarcRecord + ?Sized>(
    record: &R,
    record_id: &str,
    mapping: &FieldMapping,
    include_unmapped: bool,
) -> Vec<OutputRow> {
    record
        .fields_by_tag(mapping.tag())
        .map(|field| transform_field(field, record_id, mapping, include_unmapped))
        .collect()
}

/// Build the row for a single item field.
#[must_use]
pub fn transform_field(
    field: &Field,
    record_id: &str,
    mapping: &FieldMapping,
    include_unmapped: bool,
) -> OutputRow {
    let mut row = OutputRow::for_record(record_id);
    for (code, values) in field.subfield_groups() {
        let code = code.to_string();
        let value = values.join(VALUE_SEPARATOR);
        if let Some(target) = mapping.target_for(&code) {
            row.set(target, value);
        } else if include_unmapped && mapping.is_unmapped(&code) {
            row.set(unmapped_column(mapping.tag(), &code), value);
        } else {
            trace!(tag = %field.tag, %code, "Dropped subfield without a column");
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;
    use crate::record::Record;

    fn mapping() -> FieldMapping {
        let mut mapping = FieldMapping::new("952");
        mapping.add_subfield("a", "items.homebranch");
        mapping.add_subfield("p", "items.barcode");
        mapping.add_subfield("z", "");
        mapping
    }

    fn item(subfields: &[(char, &str)]) -> Field {
        let mut field = Field::new("952".to_string(), ' ', ' ');
        for (code, value) in subfields {
            field.add_subfield_str(*code, value);
        }
        field
    }

    #[test]
    fn test_one_row_per_occurrence() {
        let record = Record::builder(Leader::default())
            .control_field_str("001", "42")
            .field(item(&[('p', "b1")]))
            .field(item(&[('p', "b2")]))
            .field(item(&[('p', "b3")]))
            .build();

        let rows = transform(&record, "42", &mapping(), false);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.get("items.biblionumber") == Some("42")));
        let barcodes: Vec<_> = rows.iter().filter_map(|r| r.get("items.barcode")).collect();
        assert_eq!(barcodes, vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_no_item_fields_no_rows() {
        let record = Record::builder(Leader::default())
            .control_field_str("001", "42")
            .build();
        assert!(transform(&record, "42", &mapping(), true).is_empty());
    }

    #[test]
    fn test_repeated_subfield_joined() {
        let row = transform_field(&item(&[('a', "x"), ('a', "y")]), "1", &mapping(), false);
        assert_eq!(row.get("items.homebranch"), Some("x|y"));
    }

    #[test]
    fn test_pipes_are_not_escaped() {
        let row = transform_field(&item(&[('a', "x|y"), ('a', "z")]), "1", &mapping(), false);
        assert_eq!(row.get("items.homebranch"), Some("x|y|z"));
    }

    #[test]
    fn test_unmapped_only_when_enabled() {
        let field = item(&[('a', "MAIN"), ('z', "note")]);

        let without = transform_field(&field, "1", &mapping(), false);
        assert_eq!(without.len(), 2);
        assert!(without.iter().all(|(column, _)| !column.contains("$$")));

        let with = transform_field(&field, "1", &mapping(), true);
        assert_eq!(with.get("952$$z"), Some("note"));
    }

    #[test]
    fn test_unknown_codes_always_dropped() {
        let field = item(&[('a', "MAIN"), ('9', "1234")]);
        let row = transform_field(&field, "1", &mapping(), true);
        assert_eq!(row.len(), 2);
        assert!(row.get("952$$9").is_none());
    }

    #[test]
    fn test_other_tags_ignored() {
        let mut other = Field::new("995".to_string(), ' ', ' ');
        other.add_subfield_str('a', "MAIN");
        let record = Record::builder(Leader::default())
            .control_field_str("001", "42")
            .field(other)
            .build();
        assert!(transform(&record, "42", &mapping(), true).is_empty());
    }
}
