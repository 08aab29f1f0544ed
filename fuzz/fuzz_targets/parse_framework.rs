#![no_main]

use libfuzzer_sys::fuzz_target;
use marc_items_csv::FieldMapping;

fuzz_target!(|text: &str| {
    let mapping = FieldMapping::parse(text, "952");
    for code in mapping.unmapped() {
        assert!(mapping.target_for(code).is_none());
    }
});
