//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `spikewatch_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(spikewatch_core::metrics::FILES_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 버킷팅 종류 레이블 키 (minute, hour_bundle)
pub const LABEL_BUCKETING: &str = "bucketing";

/// 실패 사유 레이블 키 (unreadable, malformed)
pub const LABEL_REASON: &str = "reason";

// ─── Pipeline 메트릭 ────────────────────────────────────────────────

/// 처리 완료된 파일 수 (counter)
pub const FILES_PROCESSED_TOTAL: &str = "spikewatch_files_processed_total";

/// 처리 실패한 파일 수 (counter, label: reason)
pub const FILES_FAILED_TOTAL: &str = "spikewatch_files_failed_total";

/// 파싱된 레코드 수 (counter)
pub const RECORDS_PARSED_TOTAL: &str = "spikewatch_records_parsed_total";

/// 에러 심각도 레코드 수 (counter)
pub const ERROR_RECORDS_TOTAL: &str = "spikewatch_error_records_total";

/// 임계값을 넘은 알림 라인 수 (counter, label: bucketing)
pub const ALERT_LINES_TOTAL: &str = "spikewatch_alert_lines_total";

/// 파일 하나의 파이프라인 처리 시간 (histogram, 초)
pub const PIPELINE_DURATION_SECONDS: &str = "spikewatch_pipeline_duration_seconds";

// ─── Watcher 메트릭 ─────────────────────────────────────────────────

/// 감시 중인 파일 수 (gauge)
pub const WATCHER_TRACKED_FILES: &str = "spikewatch_watcher_tracked_files";

/// 디렉토리 폴링 실패 수 (counter)
pub const WATCHER_POLL_ERRORS_TOTAL: &str = "spikewatch_watcher_poll_errors_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "spikewatch_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 등록합니다.
///
/// 메트릭 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        FILES_PROCESSED_TOTAL,
        "Total number of input files run through the alert pipeline"
    );
    describe_counter!(
        FILES_FAILED_TOTAL,
        "Total number of input files whose pipeline run failed"
    );
    describe_counter!(
        RECORDS_PARSED_TOTAL,
        "Total number of records parsed from input files"
    );
    describe_counter!(
        ERROR_RECORDS_TOTAL,
        "Total number of error-severity records seen"
    );
    describe_counter!(
        ALERT_LINES_TOTAL,
        "Total number of buckets reported above the error threshold"
    );
    describe_histogram!(
        PIPELINE_DURATION_SECONDS,
        "Time to parse, bucket and report a single file in seconds"
    );
    describe_gauge!(
        WATCHER_TRACKED_FILES,
        "Number of files currently tracked by the directory watcher"
    );
    describe_counter!(
        WATCHER_POLL_ERRORS_TOTAL,
        "Total number of failed directory polls"
    );
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}
