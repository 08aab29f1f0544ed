//! Common test helpers shared across the test suite.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

const FIELD_TERMINATOR: u8 = 0x1E;
const SUBFIELD_DELIMITER: u8 = 0x1F;
const RECORD_TERMINATOR: u8 = 0x1D;

/// Sentinel row between the two pages of a framework export.
pub const PAGE_SEPARATOR: &str =
    r##""#-#","#-#","#-#","#-#","#-#","#-#","#-#","#-#","#-#","#-#""##;

/// Encode one ISO 2709 record.
///
/// `control` holds (tag, value) control fields; `data` holds data fields as
/// (tag, subfields) with blank indicators.
pub fn encode_record(control: &[(&str, &str)], data: &[(&str, &[(char, &str)])]) -> Vec<u8> {
    let mut bodies: Vec<(String, Vec<u8>)> = Vec::new();
    for (tag, value) in control {
        bodies.push(((*tag).to_string(), value.as_bytes().to_vec()));
    }
    for (tag, subfields) in data {
        let mut body = b"  ".to_vec();
        for (code, value) in *subfields {
            body.push(SUBFIELD_DELIMITER);
            let mut buf = [0u8; 4];
            body.extend_from_slice(code.encode_utf8(&mut buf).as_bytes());
            body.extend_from_slice(value.as_bytes());
        }
        bodies.push(((*tag).to_string(), body));
    }

    let mut directory = Vec::new();
    let mut area = Vec::new();
    for (tag, body) in &bodies {
        let start = area.len();
        area.extend_from_slice(body);
        area.push(FIELD_TERMINATOR);
        directory.extend_from_slice(tag.as_bytes());
        directory.extend_from_slice(format!("{:04}", body.len() + 1).as_bytes());
        directory.extend_from_slice(format!("{start:05}").as_bytes());
    }
    directory.push(FIELD_TERMINATOR);

    let base_address = 24 + directory.len();
    let record_length = base_address + area.len() + 1;
    let mut bytes = format!("{record_length:05}nam a22{base_address:05} a 4500").into_bytes();
    bytes.extend_from_slice(&directory);
    bytes.extend_from_slice(&area);
    bytes.push(RECORD_TERMINATOR);
    bytes
}

/// Bytes that fail leader parsing and end with a record terminator.
pub fn garbage_record() -> Vec<u8> {
    let mut bytes = b"this is not a MARC leader at all".to_vec();
    bytes.push(RECORD_TERMINATOR);
    bytes
}

/// Builder for Koha framework export text.
#[derive(Default)]
pub struct FrameworkText {
    first_page: Vec<String>,
    subfields: Vec<String>,
}

impl FrameworkText {
    pub fn new() -> Self {
        let mut text = FrameworkText::default();
        text.first_page
            .push(r#""tagfield","liblibrarian","libopac","repeatable","mandatory""#.to_string());
        text.first_page
            .push(r#""952","Items","Items","1","0","","","""#.to_string());
        text
    }

    /// Add a raw line to the first page.
    pub fn first_page_line(mut self, line: &str) -> Self {
        self.first_page.push(line.to_string());
        self
    }

    /// Add a subfield row: tag, code and Koha field in their export columns.
    pub fn subfield(mut self, tag: &str, code: &str, kohafield: &str) -> Self {
        self.subfields.push(format!(
            r#""{tag}","{code}","Label {code}","Label {code}","0","0","0","{kohafield}","10","","","","0""#
        ));
        self
    }

    /// Add a raw line to the subfield page.
    pub fn raw(mut self, line: &str) -> Self {
        self.subfields.push(line.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();
        for line in &self.first_page {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(PAGE_SEPARATOR);
        out.push('\n');
        out.push_str(
            r#""tagfield","tagsubfield","liblibrarian","libopac","repeatable","mandatory","important","kohafield","tab""#,
        );
        out.push('\n');
        out.push('\n');
        for line in &self.subfields {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Framework used by most end-to-end tests.
pub fn item_framework() -> String {
    FrameworkText::new()
        .subfield("952", "a", "items.homebranch")
        .subfield("952", "p", "items.barcode")
        .subfield("952", "z", "")
        .subfield("952", "x", "biblioitems.notes")
        .subfield("995", "a", "items.holdingbranch")
        .build()
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}
