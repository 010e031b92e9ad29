#![no_main]

use spikewatch_core::config::SpikewatchConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // JSON 파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(json_str) = std::str::from_utf8(data) {
        if let Ok(config) = SpikewatchConfig::parse_legacy_json(json_str) {
            let _ = config.validate();
        }
    }
});
