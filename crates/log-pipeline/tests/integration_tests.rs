//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 파일 파싱부터 버킷팅, 임계값 평가, 보고서 출력, 디렉토리 감시까지의
//! 전체 흐름을 검증합니다.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;

use spikewatch_core::config::TimeZoneSetting;
use spikewatch_core::pipeline::{FileReadyHandler, Pipeline};
use metrics_exporter_prometheus::PrometheusBuilder;
use spikewatch_log_pipeline::alert::REPORT_HEADLINE;
use spikewatch_log_pipeline::{
    AlertPipeline, AlertReport, AlertSink, BucketCounts, Bucketing, ColumnSchema, ERROR_THRESHOLD,
    LogPipelineBuilder, LogPipelineError, MinuteKey, PipelineConfig, TracingSink, analyze,
    count_by_bucket, error_severity, select_above_threshold,
};

/// 2024-01-15 12:00:00 UTC
const NOON: i64 = 1_705_320_000;

/// 보고서를 메모리에 모으는 싱크
#[derive(Default)]
struct CollectingSink {
    reports: Mutex<Vec<AlertReport>>,
}

impl CollectingSink {
    fn snapshot(&self) -> Vec<AlertReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl AlertSink for CollectingSink {
    fn emit(&self, report: &AlertReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// 기본 24개 컬럼 순서의 내보내기 행
fn export_row(severity: &str, bundle: &str, ts: i64) -> String {
    let mut fields = vec![String::new(); 24];
    fields[0] = "E100".to_owned();
    fields[1] = "\"crash, in renderer\"".to_owned();
    fields[2] = severity.to_owned();
    fields[15] = bundle.to_owned();
    fields[18] = "android".to_owned();
    fields[23] = ts.to_string();
    fields.join(",") + "\n"
}

fn rows(n: usize, severity: &str, bundle: &str, ts: i64) -> String {
    (0..n).map(|_| export_row(severity, bundle, ts)).collect()
}

fn utc_schema() -> ColumnSchema {
    ColumnSchema::default().with_timezone(TimeZoneSetting::Utc)
}

fn pipeline_with_sink() -> (AlertPipeline, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::default());
    (AlertPipeline::new(utc_schema(), sink.clone()), sink)
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// 조건이 참이 될 때까지 최대 5초 대기
async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within timeout"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ─── 시나리오 ────────────────────────────────────────────────────────

/// 같은 분, 같은 번들의 에러 15건 -> 두 버킷팅 모두 15
#[test]
fn scenario_a_single_minute_storm() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "a.csv", &rows(15, "Error", "com.example.game", NOON + 5));

    let (pipeline, sink) = pipeline_with_sink();
    let analysis = pipeline.run_file(&path).unwrap();

    assert_eq!(analysis.minute.body, "\t2024 01 15 12 00 15");
    assert_eq!(analysis.hour_bundle.body, "\tcom.example.game 2024 01 15 12 15");
    assert_eq!(analysis.error_records, 15);

    let reports = sink.snapshot();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].bucketing, Bucketing::Minute);
    assert_eq!(reports[0].alerts, 1);
    assert_eq!(reports[1].bucketing, Bucketing::HourBundle);
    assert_eq!(reports[1].alerts, 1);
}

/// 같은 시간, 두 번들에 6건/5건 -> 번들별 보고서는 비어 있음
#[test]
fn scenario_b_split_across_bundles() {
    let dir = tempfile::tempdir().unwrap();

    // 같은 분에 몰린 경우: 분 단위는 11건으로 보고됨
    let mut content = rows(6, "Error", "com.a", NOON + 10);
    content.push_str(&rows(5, "Error", "com.b", NOON + 20));
    let same_minute = write(dir.path(), "same_minute.csv", &content);

    let (pipeline, _sink) = pipeline_with_sink();
    let analysis = pipeline.run_file(&same_minute).unwrap();
    assert_eq!(analysis.minute.body, "\t2024 01 15 12 00 11");
    assert!(analysis.hour_bundle.is_empty());

    // 서로 다른 분으로 나뉜 경우: 둘 다 비어 있음
    let mut content = rows(6, "Error", "com.a", NOON);
    content.push_str(&rows(5, "Error", "com.b", NOON + 60));
    let split = write(dir.path(), "split.csv", &content);

    let analysis = pipeline.run_file(&split).unwrap();
    assert!(analysis.minute.is_empty());
    assert!(analysis.hour_bundle.is_empty());
}

/// 에러 레코드 없음 -> 빈 보고서 두 건
#[test]
fn scenario_c_no_errors_still_emits_two_reports() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = rows(30, "Warning", "com.a", NOON);
    content.push_str(&rows(30, "error", "com.a", NOON));
    let path = write(dir.path(), "quiet.csv", &content);

    let (pipeline, sink) = pipeline_with_sink();
    let analysis = pipeline.run_file(&path).unwrap();
    assert_eq!(analysis.records, 60);
    assert_eq!(analysis.error_records, 0);

    let reports = sink.snapshot();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.is_empty() && r.body.is_empty()));
}

/// 분석 결과와 별개로 처리/실패 파일 수가 같은 위치에서 집계됨
#[test]
fn run_file_counts_processed_and_failed_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.csv", &rows(3, "Error", "com.a", NOON));
    let bad = write(dir.path(), "bad.csv", "Error,com.a\n");

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let (pipeline, _sink) = pipeline_with_sink();
    metrics::with_local_recorder(&recorder, || {
        pipeline.run_file(&good).unwrap();
        pipeline.run_file(&good).unwrap();
        pipeline.run_file(&bad).unwrap_err();
    });

    let rendered = handle.render();
    assert!(rendered.contains("spikewatch_files_processed_total 2"), "{rendered}");
    assert!(
        rendered.contains("spikewatch_files_failed_total{reason=\"malformed\"} 1"),
        "{rendered}"
    );
    assert!(rendered.contains("spikewatch_records_parsed_total 6"), "{rendered}");
}

/// 필드 수가 부족한 행 -> MalformedInput, 출력 없음
#[test]
fn scenario_d_short_row_fails_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = rows(3, "Error", "com.a", NOON);
    content.push_str("E1,msg,Error,loc\n");
    let path = write(dir.path(), "short.csv", &content);

    let (pipeline, sink) = pipeline_with_sink();
    let err = pipeline.on_file_ready(&path).unwrap_err();
    match err {
        LogPipelineError::MalformedInput { line, reason, .. } => {
            assert_eq!(line, 4);
            assert!(reason.contains("expected 24 fields, found 4"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sink.snapshot().is_empty());
}

/// 정확히 10건인 버킷은 보고되지 않음
#[test]
fn exactly_ten_errors_is_not_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "ten.csv", &rows(10, "Error", "com.a", NOON));

    let (pipeline, _sink) = pipeline_with_sink();
    let analysis = pipeline.run_file(&path).unwrap();
    assert_eq!(analysis.total_alerts(), 0);

    let path = write(dir.path(), "eleven.csv", &rows(11, "Error", "com.a", NOON));
    let analysis = pipeline.run_file(&path).unwrap();
    assert_eq!(analysis.total_alerts(), 2);
}

/// 같은 파일을 다시 처리하면 같은 보고서
#[test]
fn rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = String::new();
    for (i, bundle) in ["com.c", "com.a", "com.b"].iter().enumerate() {
        content.push_str(&rows(12 + i, "Error", bundle, NOON + 3600 * i as i64));
    }
    let path = write(dir.path(), "mixed.csv", &content);

    let (pipeline, sink) = pipeline_with_sink();
    let first = pipeline.run_file(&path).unwrap();
    let second = pipeline.run_file(&path).unwrap();
    assert_eq!(first, second);

    let reports = sink.snapshot();
    assert_eq!(reports[0].message(), reports[2].message());
    assert_eq!(reports[1].message(), reports[3].message());
}

/// 출력은 키 오름차순 (번들이 먼저 비교됨)
#[test]
fn hour_bundle_report_is_ordered_by_bundle_then_time() {
    let mut content = rows(11, "Error", "com.b", NOON);
    content.push_str(&rows(11, "Error", "com.a", NOON + 3600));
    content.push_str(&rows(11, "Error", "com.a", NOON));
    let store = utc_schema().parse_str("mem", &content).unwrap();

    let analysis = analyze(&store);
    assert_eq!(
        analysis.hour_bundle.body,
        "\tcom.a 2024 01 15 12 11\n\tcom.a 2024 01 15 13 11\n\tcom.b 2024 01 15 12 11"
    );
    assert_eq!(
        analysis.minute.body,
        "\t2024 01 15 12 00 22\n\t2024 01 15 13 00 11"
    );
}

/// 로컬 시간대 변환은 chrono의 로컬 변환과 일치
#[test]
fn local_timezone_matches_chrono_local() {
    use chrono::{DateTime, Datelike, Local, Timelike, Utc};

    let store = ColumnSchema::default()
        .parse_str("mem", &rows(11, "Error", "com.a", NOON))
        .unwrap();
    let expected = DateTime::<Utc>::from_timestamp(NOON, 0)
        .unwrap()
        .with_timezone(&Local);

    let counts = count_by_bucket(&store, MinuteKey::from_record, error_severity);
    let (key, count) = counts.iter().next().unwrap();
    assert_eq!(count, 11);
    assert_eq!(key.year, expected.year());
    assert_eq!(key.hour, expected.hour());
    assert_eq!(key.minute, expected.minute());
}

// ─── tracing 출력 ────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// `f` 실행 중 INFO 이상 이벤트를 JSON으로 모읍니다.
fn capture_info_events(f: impl FnOnce()) -> Vec<serde_json::Value> {
    let captured = CapturedLog::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let raw = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    raw.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn report_events(events: &[serde_json::Value]) -> Vec<&serde_json::Value> {
    events
        .iter()
        .filter(|e| e["level"] == "INFO" && e["fields"]["bucketing"].is_string())
        .collect()
}

/// 에러가 없는 파일도 INFO 보고서 두 건을 남김
#[test]
fn tracing_sink_logs_two_empty_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "quiet.csv", &rows(20, "Warning", "com.a", NOON));
    let pipeline = AlertPipeline::new(utc_schema(), Arc::new(TracingSink));

    let events = capture_info_events(|| {
        pipeline.run_file(&path).unwrap();
    });
    let reports = report_events(&events);

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["fields"]["bucketing"], "minute");
    assert_eq!(reports[1]["fields"]["bucketing"], "hour_bundle");
    for report in &reports {
        let fields = &report["fields"];
        assert_eq!(fields["alerts"], 0);
        assert_eq!(fields["message"], REPORT_HEADLINE);
        assert!(fields["source"].as_str().unwrap().ends_with("quiet.csv"));
    }
}

/// 알림 라인은 같은 INFO 이벤트의 메시지 본문에 들여쓰기로 실림
#[test]
fn tracing_sink_puts_alert_lines_in_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "storm.csv", &rows(12, "Error", "com.a", NOON));
    let pipeline = AlertPipeline::new(utc_schema(), Arc::new(TracingSink));

    let events = capture_info_events(|| {
        pipeline.run_file(&path).unwrap();
    });
    let reports = report_events(&events);

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["fields"]["alerts"], 1);
    assert_eq!(
        reports[0]["fields"]["message"],
        "error spike report\n\t2024 01 15 12 00 12"
    );
    assert_eq!(
        reports[1]["fields"]["message"],
        "error spike report\n\tcom.a 2024 01 15 12 12"
    );
}

/// 실패한 파일은 보고서를 남기지 않음
#[test]
fn tracing_sink_logs_nothing_for_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "short.csv", "Error,com.a\n");
    let pipeline = AlertPipeline::new(utc_schema(), Arc::new(TracingSink));

    let events = capture_info_events(|| {
        pipeline.run_file(&path).unwrap_err();
    });
    assert!(report_events(&events).is_empty());
}

// ─── 디렉토리 감시 종단 간 테스트 ───────────────────────────────────

fn watch_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        directory: dir.to_path_buf(),
        poll_interval_ms: 20,
        timezone: TimeZoneSetting::Utc,
        ..Default::default()
    }
}

#[tokio::test]
async fn watcher_processes_existing_and_new_files_once() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "existing.csv", &rows(11, "Error", "com.a", NOON));
    write(dir.path(), "ignored.txt", &rows(11, "Error", "com.a", NOON));

    let sink = Arc::new(CollectingSink::default());
    let mut pipeline = LogPipelineBuilder::new()
        .config(watch_config(dir.path()))
        .sink(sink.clone())
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    wait_until(|| sink.snapshot().len() == 2).await;

    std::fs::create_dir(dir.path().join("nested")).unwrap();
    write(
        &dir.path().join("nested"),
        "new.csv",
        &rows(12, "Error", "com.b", NOON),
    );
    wait_until(|| sink.snapshot().len() == 4).await;

    // 몇 주기 더 기다려도 중복 처리 없음
    tokio::time::sleep(Duration::from_millis(150)).await;
    pipeline.stop().await.unwrap();

    let reports = sink.snapshot();
    assert_eq!(reports.len(), 4);
    assert!(reports[0].source.ends_with("existing.csv"));
    assert!(reports[2].source.ends_with("new.csv"));
    assert_eq!(reports[3].body, "\tcom.b 2024 01 15 12 12");
}

#[tokio::test]
async fn malformed_file_does_not_stop_watching() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(CollectingSink::default());
    let mut pipeline = LogPipelineBuilder::new()
        .config(watch_config(dir.path()))
        .sink(sink.clone())
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    write(dir.path(), "broken.csv", "Error,com.a\n");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sink.snapshot().is_empty());

    write(dir.path(), "good.csv", &rows(11, "Error", "com.a", NOON));
    wait_until(|| sink.snapshot().len() == 2).await;
    assert!(pipeline.health_check().await.is_healthy());

    pipeline.stop().await.unwrap();
}

// ─── 속성 기반 테스트 ───────────────────────────────────────────────

proptest! {
    /// 키 K는 개수가 임계값을 초과할 때만, 그리고 항상 결과에 포함됨
    #[test]
    fn threshold_selects_exactly_counts_above(
        entries in proptest::collection::vec((0u32..50, 0u64..30), 0..64)
    ) {
        let counts: BucketCounts<u32> = entries.into_iter().collect();
        let lines = select_above_threshold(&counts, ERROR_THRESHOLD);

        for (key, count) in counts.iter() {
            let present = lines.iter().any(|l| l.key == *key);
            prop_assert_eq!(present, count > ERROR_THRESHOLD);
        }
        prop_assert!(lines.windows(2).all(|w| w[0].key < w[1].key));
    }

    /// 버킷 개수의 합은 에러 레코드 수와 같음
    #[test]
    fn bucket_totals_match_error_records(
        rows_spec in proptest::collection::vec(
            (
                prop::sample::select(vec!["Error", "Warning", "Info"]),
                prop::sample::select(vec!["com.a", "com.b", "com.c"]),
                0i64..(3 * 86_400),
            ),
            0..200,
        )
    ) {
        let content: String = rows_spec
            .iter()
            .map(|(sev, bundle, offset)| export_row(sev, bundle, NOON + offset))
            .collect();
        let store = utc_schema().parse_str("mem", &content).unwrap();

        let analysis = analyze(&store);
        let by_minute = count_by_bucket(&store, MinuteKey::from_record, error_severity);
        let errors = rows_spec.iter().filter(|(sev, _, _)| *sev == "Error").count();

        prop_assert_eq!(analysis.error_records, errors);
        prop_assert_eq!(by_minute.total(), errors as u64);
        prop_assert_eq!(analysis, analyze(&store));
    }
}
