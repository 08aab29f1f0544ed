//! Koha MARC framework export parsing.
//!
//! A framework export is a quoted CSV dump of two tables separated by a
//! sentinel row of ten `"#-#"` cells. The first page (tag structure) is
//! skipped. Every row of the second page (subfield structure) that belongs to
//! the configured item tag feeds a [`FieldMapping`]: subfields whose Koha
//! field lives in the `items.` namespace become output columns, the others
//! are remembered as unmapped.
//!
//! Parsing is split in two layers so each can be checked on its own:
//! [`classify_line`] decides what a line is, and [`quoted_fields`] extracts
//! the leading quoted cells the entry columns are read from.
//!
//! # Examples
//!
//! ```
//! use marc_items_csv::framework::FieldMapping;
//!
//! let export = concat!(
//!     "\"tagfield\",\"liblibrarian\"\n",
//!     "\"#-#\",\"#-#\",\"#-#\",\"#-#\",\"#-#\",\"#-#\",\"#-#\",\"#-#\",\"#-#\",\"#-#\"\n",
//!     "\"952\",\"a\",\"Home library\",\"Home library\",\"0\",\"1\",\"0\",\"items.homebranch\",\"10\"\n",
//!     "\"952\",\"z\",\"Note\",\"Note\",\"0\",\"0\",\"0\",\"\",\"10\"\n",
//! );
//!
//! let mapping = FieldMapping::parse(export, "952");
//! assert_eq!(mapping.target_for("a"), Some("items.homebranch"));
//! assert_eq!(mapping.unmapped(), ["z".to_string()]);
//! assert_eq!(
//!     mapping.output_headers(true),
//!     vec!["items.biblionumber", "items.homebranch", "952$$z"]
//! );
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{ExportError, Result};

/// Namespace of Koha item columns.
pub const ITEMS_NAMESPACE: &str = "items.";

/// Output column holding the record's control number.
pub const BIBLIONUMBER_COLUMN: &str = "items.biblionumber";

/// Separator between tag and code in unmapped column names.
pub const UNMAPPED_SEPARATOR: &str = "$$";

/// Row separating the two pages of the export.
const PAGE_SEPARATOR: &str =
    r##""#-#","#-#","#-#","#-#","#-#","#-#","#-#","#-#","#-#","#-#""##;

/// Both markers appear in the subfield table header row.
const HEADER_TAG_MARKER: &str = r#""tagfield""#;
const HEADER_FLAGS_MARKER: &str = r#""repeatable","mandatory","important""#;

/// Position of the tag among the quoted cells.
const TAG_CELL: usize = 0;
/// Position of the subfield code among the quoted cells.
const CODE_CELL: usize = 1;
/// Position of the Koha field; five cells sit between it and the code.
const TARGET_CELL: usize = 7;

/// One subfield row of the framework export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkEntry {
    /// Field tag, e.g. `952`
    pub tag: String,
    /// Subfield code
    pub subfield_code: String,
    /// Koha field the subfield is stored in, e.g. `items.homebranch` (may be empty)
    pub target_field: String,
}

/// What a single line of the export is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameworkLine {
    /// The `"#-#"` row between the two pages.
    PageSeparator,
    /// Fewer than two comma-separated tokens.
    Blank,
    /// Column header of the subfield table.
    Header,
    /// A row that matched the positional layout.
    Entry(FrameworkEntry),
    /// Anything else; ignored.
    Unmatched,
}

/// Classify one line of the export.
///
/// The separator is checked first so it is recognised on either page.
#[must_use]
pub fn classify_line(line: &str) -> FrameworkLine {
    if line.contains(PAGE_SEPARATOR) {
        return FrameworkLine::PageSeparator;
    }
    if line.split(',').count() < 2 {
        return FrameworkLine::Blank;
    }
    if line.contains(HEADER_TAG_MARKER) && line.contains(HEADER_FLAGS_MARKER) {
        return FrameworkLine::Header;
    }
    match parse_entry(line) {
        Some(entry) => FrameworkLine::Entry(entry),
        None => FrameworkLine::Unmatched,
    }
}

/// Read the tag, code and Koha field out of a subfield row.
///
/// Returns `None` when the line does not carry at least eight well-formed
/// leading quoted cells.
#[must_use]
pub fn parse_entry(line: &str) -> Option<FrameworkEntry> {
    let cells = quoted_fields(line);
    if cells.len() <= TARGET_CELL {
        return None;
    }
    Some(FrameworkEntry {
        tag: cells[TAG_CELL].to_string(),
        subfield_code: cells[CODE_CELL].to_string(),
        target_field: cells[TARGET_CELL].to_string(),
    })
}

/// Split the leading run of `"..."` cells joined by `,`.
///
/// A cell ends at the next quote, so commas inside a cell are kept. The run
/// stops at the first cell that is not followed by `,"`; that last cell is
/// still returned as long as its closing quote is present.
///
/// ```
/// use marc_items_csv::framework::quoted_fields;
///
/// assert_eq!(quoted_fields(r#""952","a","Home, library",3"#), vec!["952", "a", "Home, library"]);
/// assert!(quoted_fields("952,a").is_empty());
/// ```
#[must_use]
pub fn quoted_fields(line: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let Some(mut rest) = line.strip_prefix('"') else {
        return cells;
    };

    while let Some(end) = rest.find('"') {
        cells.push(&rest[..end]);
        match rest[end + 1..].strip_prefix(",\"") {
            Some(next) => rest = next,
            None => break,
        }
    }
    cells
}

/// Column name used for an unmapped subfield.
#[must_use]
pub fn unmapped_column(tag: &str, code: &str) -> String {
    format!("{tag}{UNMAPPED_SEPARATOR}{code}")
}

/// True when the Koha field belongs to the item table.
#[must_use]
pub fn is_item_field(target_field: &str) -> bool {
    target_field.trim_start().starts_with(ITEMS_NAMESPACE)
}

/// Subfield to column mapping for one item tag.
///
/// Built once from the framework export, then shared read-only by every
/// record transformation. Iteration order follows first appearance in the
/// export and decides the output column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    tag: String,
    mapped: IndexMap<String, String>,
    unmapped: Vec<String>,
}

impl FieldMapping {
    /// An empty mapping for `tag`.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        FieldMapping {
            tag: tag.into(),
            mapped: IndexMap::new(),
            unmapped: Vec::new(),
        }
    }

    /// Parse a whole framework export.
    ///
    /// Lines before the page separator are ignored, as are blank lines, the
    /// header row, rows that do not match the layout and rows for other tags.
    #[must_use]
    pub fn parse(text: &str, tag: &str) -> Self {
        let mut mapping = FieldMapping::new(tag);
        let mut on_first_page = true;
        let mut skipped = 0usize;

        for (line_no, line) in text.lines().enumerate() {
            let kind = classify_line(line);
            if kind == FrameworkLine::PageSeparator {
                on_first_page = false;
                continue;
            }
            if on_first_page {
                continue;
            }
            match kind {
                FrameworkLine::Entry(entry) if entry.tag == tag => {
                    mapping.add_subfield(&entry.subfield_code, &entry.target_field);
                },
                FrameworkLine::Unmatched => {
                    skipped += 1;
                    debug!(line = line_no + 1, "Framework line does not match the subfield layout");
                },
                _ => {},
            }
        }

        info!(
            tag,
            mapped = mapping.mapped.len(),
            unmapped = mapping.unmapped.len(),
            skipped,
            "Loaded MARC framework mapping"
        );
        mapping
    }

    /// Read and parse a framework export file.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Framework`] if the file cannot be read as UTF-8 text.
    pub fn load(path: &Path, tag: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ExportError::Framework {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text, tag))
    }

    /// Record one subfield of the item tag.
    ///
    /// Code and Koha field are trimmed. Once a code is mapped it stays
    /// mapped: a later item target replaces the column in place and a later
    /// non-item row is ignored. An unmapped code that later gets an item
    /// target moves to the mapped set. A code is never in both sets.
    pub fn add_subfield(&mut self, code: &str, target_field: &str) {
        let code = code.trim();
        let target_field = target_field.trim();

        if is_item_field(target_field) {
            self.unmapped.retain(|c| c != code);
            self.mapped.insert(code.to_string(), target_field.to_string());
        } else if self.mapped.contains_key(code) {
            debug!(%code, target_field, "Keeping item column for a code listed again");
        } else if !self.unmapped.iter().any(|c| c == code) {
            self.unmapped.push(code.to_string());
        }
    }

    /// Item tag this mapping is for.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Code to item column, in framework order.
    #[must_use]
    pub fn mapped(&self) -> &IndexMap<String, String> {
        &self.mapped
    }

    /// Codes with no item column, in framework order.
    #[must_use]
    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    /// Item column for a subfield code.
    #[must_use]
    pub fn target_for(&self, code: &str) -> Option<&str> {
        self.mapped.get(code).map(String::as_str)
    }

    /// True when the code is known but has no item column.
    #[must_use]
    pub fn is_unmapped(&self, code: &str) -> bool {
        self.unmapped.iter().any(|c| c == code)
    }

    /// Header of the output file.
    ///
    /// `items.biblionumber`, then the mapped columns, then one `<tag>$$<code>`
    /// column per unmapped code when `include_unmapped` is set.
    #[must_use]
    pub fn output_headers(&self, include_unmapped: bool) -> Vec<String> {
        let mut headers = Vec::with_capacity(1 + self.mapped.len() + self.unmapped.len());
        headers.push(BIBLIONUMBER_COLUMN.to_string());
        headers.extend(self.mapped.values().cloned());
        if include_unmapped {
            headers.extend(self.unmapped.iter().map(|code| unmapped_column(&self.tag, code)));
        }
        headers
    }
}
