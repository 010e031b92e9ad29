#![no_main]

use arbitrary::Arbitrary;
use spikewatch_log_pipeline::schema::split_row;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    line: String,
    delimiter: char,
}

fuzz_target!(|input: Input| {
    if input.delimiter == '"' {
        return;
    }
    if let Ok(fields) = split_row(&input.line, input.delimiter) {
        assert!(!fields.is_empty());
    }
});
