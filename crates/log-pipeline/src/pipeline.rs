//! 파이프라인 오케스트레이션 -- 파일 하나를 파싱부터 알림 출력까지 처리합니다.
//!
//! - [`AlertPipeline`]: 파일 단위 처리 (`parse -> bucket -> threshold -> format -> emit`).
//!   [`FileReadyHandler`]를 구현하여 감시 백엔드가 호출합니다.
//! - [`LogPipeline`]: 감시기와 알림 파이프라인을 묶은 장기 실행 서비스.
//!   core의 [`Pipeline`] trait으로 `spikewatch-daemon`에서 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! DirectoryWatcher -> on_file_ready(path) -> ColumnSchema::parse_file -> RecordStore
//!     -> count_by_bucket(MinuteKey)     -> select_above_threshold -> AlertSink
//!     -> count_by_bucket(HourBundleKey) -> select_above_threshold -> AlertSink
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use spikewatch_core::error::{PipelineError, SpikewatchError};
use spikewatch_core::metrics as m;
use spikewatch_core::pipeline::{FileReadyHandler, HealthStatus, Pipeline};
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::alert::{AlertReport, AlertSink, Bucketing, TracingSink};
use crate::bucket::{HourBundleKey, MinuteKey, count_by_bucket, error_severity};
use crate::collector::DirectoryWatcher;
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::record::RecordStore;
use crate::schema::ColumnSchema;
use crate::threshold::{ERROR_THRESHOLD, select_above_threshold};

/// 파일 하나의 분석 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAnalysis {
    /// 원본 파일 경로
    pub source: String,
    /// 전체 레코드 수
    pub records: usize,
    /// 에러 심각도 레코드 수
    pub error_records: usize,
    /// 분 단위 보고서
    pub minute: AlertReport,
    /// 번들별 시간 단위 보고서
    pub hour_bundle: AlertReport,
}

impl FileAnalysis {
    /// 출력 순서대로 두 보고서를 반환합니다.
    pub fn reports(&self) -> [&AlertReport; 2] {
        [&self.minute, &self.hour_bundle]
    }

    /// 두 보고서의 알림 라인 합계
    pub fn total_alerts(&self) -> usize {
        self.minute.alerts + self.hour_bundle.alerts
    }
}

/// 레코드 저장소에 두 가지 버킷팅과 임계값 평가를 적용합니다.
///
/// 순수 계산이며 입력 저장소를 변경하지 않습니다.
pub fn analyze(store: &RecordStore) -> FileAnalysis {
    let by_minute = count_by_bucket(store, MinuteKey::from_record, error_severity);
    let by_hour_bundle = count_by_bucket(store, HourBundleKey::from_record, error_severity);

    let minute_lines = select_above_threshold(&by_minute, ERROR_THRESHOLD);
    let hour_bundle_lines = select_above_threshold(&by_hour_bundle, ERROR_THRESHOLD);

    FileAnalysis {
        source: store.source().to_owned(),
        records: store.len(),
        error_records: store.error_count(),
        minute: AlertReport::new(store.source(), Bucketing::Minute, &minute_lines),
        hour_bundle: AlertReport::new(store.source(), Bucketing::HourBundle, &hour_bundle_lines),
    }
}

/// 파일 단위 알림 파이프라인
///
/// 실행 간 공유하는 가변 상태가 없으므로 같은 파일을 다시 처리하면
/// 같은 보고서가 나옵니다.
pub struct AlertPipeline {
    schema: ColumnSchema,
    sink: Arc<dyn AlertSink>,
}

impl AlertPipeline {
    /// 스키마와 출력 싱크로 파이프라인을 만듭니다.
    pub fn new(schema: ColumnSchema, sink: Arc<dyn AlertSink>) -> Self {
        Self { schema, sink }
    }

    /// 컬럼 스키마
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// 파일 하나를 처리하고 두 보고서를 싱크로 내보냅니다.
    ///
    /// 실행마다 `run_id`를 가진 span 안에서 수행됩니다. 동기 I/O를 포함합니다.
    pub fn run_file(&self, path: &Path) -> Result<FileAnalysis, LogPipelineError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", %run_id, path = %path.display());
        let _guard = span.enter();

        let started = Instant::now();
        let result = self.schema.parse_file(path).map(|store| {
            counter!(m::RECORDS_PARSED_TOTAL).increment(store.len() as u64);
            analyze(&store)
        });

        match result {
            Ok(analysis) => {
                counter!(m::FILES_PROCESSED_TOTAL).increment(1);
                counter!(m::ERROR_RECORDS_TOTAL).increment(analysis.error_records as u64);
                for report in analysis.reports() {
                    counter!(m::ALERT_LINES_TOTAL, m::LABEL_BUCKETING => report.bucketing.as_str())
                        .increment(report.alerts as u64);
                    self.sink.emit(report);
                }
                histogram!(m::PIPELINE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
                tracing::debug!(
                    records = analysis.records,
                    error_records = analysis.error_records,
                    alerts = analysis.total_alerts(),
                    "pipeline run complete"
                );
                Ok(analysis)
            }
            Err(e) => {
                counter!(m::FILES_FAILED_TOTAL, m::LABEL_REASON => e.reason_label()).increment(1);
                Err(e)
            }
        }
    }
}

impl FileReadyHandler for AlertPipeline {
    type Error = LogPipelineError;

    fn on_file_ready(&self, path: &Path) -> Result<(), Self::Error> {
        self.run_file(path).map(|_| ())
    }
}

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 로그 파이프라인 서비스 -- 디렉토리 감시와 파일 단위 처리를 묶습니다.
///
/// # 사용 예시
/// ```ignore
/// use spikewatch_log_pipeline::LogPipelineBuilder;
///
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// pipeline.start().await?;
/// // ...
/// pipeline.stop().await?;
/// ```
pub struct LogPipeline {
    config: PipelineConfig,
    handler: Arc<AlertPipeline>,
    state: PipelineState,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl LogPipeline {
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 파일 단위 처리기
    pub fn handler(&self) -> Arc<AlertPipeline> {
        Arc::clone(&self.handler)
    }
}

impl Pipeline for LogPipeline {
    async fn start(&mut self) -> Result<(), SpikewatchError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(directory = %self.config.directory.display(), "starting log pipeline");

        // 기준 스냅샷은 start가 반환되기 전에 기록
        let mut watcher = DirectoryWatcher::new(&self.config, Arc::clone(&self.handler))?;
        watcher.take_baseline().await?;

        let shutdown_rx = self.shutdown_tx.subscribe();
        let span = tracing::info_span!("watcher", directory = %self.config.directory.display());
        self.task = Some(tokio::spawn(watcher.run(shutdown_rx).instrument(span)));

        self.state = PipelineState::Running;
        tracing::info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SpikewatchError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");

        // 수신자가 이미 종료된 경우 send는 실패할 수 있음
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "watcher task ended abnormally");
            }
        }

        self.state = PipelineState::Stopped;
        tracing::info!("log pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.task.as_ref().is_none_or(|t| t.is_finished()) {
                    return HealthStatus::Unhealthy("watcher task exited".to_owned());
                }
                match tokio::fs::read_dir(&self.config.directory).await {
                    Ok(_) => HealthStatus::Healthy,
                    Err(e) => HealthStatus::Degraded(format!(
                        "directory unreadable: {}: {e}",
                        self.config.directory.display()
                    )),
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    sink: Option<Arc<dyn AlertSink>>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            sink: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 보고서 출력 싱크를 지정합니다. 지정하지 않으면 [`TracingSink`]를 사용합니다.
    pub fn sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 설정을 검증하고 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogPipeline, LogPipelineError> {
        self.config.validate()?;

        let schema = self.config.column_schema()?;
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(LogPipeline {
            config: self.config,
            handler: Arc::new(AlertPipeline::new(schema, sink)),
            state: PipelineState::Initialized,
            shutdown_tx,
            task: None,
        })
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
