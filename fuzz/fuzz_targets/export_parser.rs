#![no_main]

use spikewatch_core::config::TimeZoneSetting;
use spikewatch_log_pipeline::{ColumnSchema, analyze};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let schema = ColumnSchema::default().with_timezone(TimeZoneSetting::Utc);

        // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
        if let Ok(store) = schema.parse_str("fuzz.csv", content) {
            let analysis = analyze(&store);
            assert!(analysis.error_records <= analysis.records);
        }
    }
});
