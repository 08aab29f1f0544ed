#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use marc_items_csv::{MarcReader, RecoveryMode};

// Arbitrary bytes must never panic the reader in either mode, and every
// attempt must end in a record or a decode error.
fuzz_target!(|data: &[u8]| {
    for mode in [RecoveryMode::Strict, RecoveryMode::Lenient] {
        let mut reader = MarcReader::new(Cursor::new(data)).with_recovery_mode(mode);
        for attempt in reader.records() {
            if let Err(e) = attempt {
                assert!(e.is_decode_error(), "unexpected error: {e}");
            }
        }
    }
});
