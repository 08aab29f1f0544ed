//! Strict and lenient decoding through a full export.

mod common;

use std::fs;

use common::{encode_record, item_framework, write_file};
use marc_items_csv::{export, open_records, ExportConfig, RecoveryMode};
use tempfile::TempDir;

/// One record whose 952$a holds an invalid UTF-8 byte.
fn latin1_record() -> Vec<u8> {
    let mut bytes = encode_record(&[("001", "77")], &[("952", &[('a', "CAF#")])]);
    let pos = bytes.iter().position(|&b| b == b'#').unwrap();
    bytes[pos] = 0xE9;
    bytes
}

fn run(mode: RecoveryMode) -> (String, String) {
    let dir = TempDir::new().unwrap();
    let framework = write_file(dir.path(), "framework.csv", item_framework());
    let records = write_file(dir.path(), "records.mrc", latin1_record());
    let config = ExportConfig {
        records_file: records,
        framework_file: framework,
        output_file: dir.path().join("items.csv"),
        errors_file: dir.path().join("errors.csv"),
        item_field_tag: "952".to_string(),
        include_unmapped_fields: false,
        recovery_mode: mode,
    };
    export(&config).unwrap();
    (
        fs::read_to_string(&config.output_file).unwrap(),
        fs::read_to_string(&config.errors_file).unwrap(),
    )
}

#[test]
fn test_strict_rejects_bad_encoding() {
    let (items, errors) = run(RecoveryMode::Strict);
    assert_eq!(items.lines().count(), 1);
    assert!(errors.ends_with("0;;CHUNK_ERROR;;\r\n"));
}

#[test]
fn test_lenient_replaces_bad_bytes() {
    let (items, errors) = run(RecoveryMode::Lenient);
    assert_eq!(items.lines().nth(1), Some("77;CAF\u{FFFD};"));
    assert_eq!(errors.lines().count(), 1);
}

#[test]
fn test_open_records_counts_attempts() {
    let dir = TempDir::new().unwrap();
    let mut stream = encode_record(&[("001", "1")], &[]);
    stream.extend(encode_record(&[("001", "2")], &[]));
    let path = write_file(dir.path(), "records.mrc", stream);

    let mut reader = open_records(&path, RecoveryMode::Strict).unwrap();
    let ids: Vec<String> = reader
        .records()
        .map(|r| r.unwrap().get_control_field("001").unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(reader.records_read(), 2);
}
