#![no_main]

use arbitrary::Arbitrary;
use spikewatch_log_pipeline::FilePattern;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    glob: String,
    name: String,
}

fuzz_target!(|input: Input| {
    if let Ok(pattern) = FilePattern::new(&input.glob) {
        let _ = pattern.matches_name(&input.name);
    }
});
