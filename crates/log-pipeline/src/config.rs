//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`SpikewatchConfig`](spikewatch_core::config::SpikewatchConfig)
//! 중 감시(`[watcher]`)와 스키마(`[schema]`) 섹션을 평탄화한 파이프라인 전용 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use spikewatch_core::config::SpikewatchConfig;
//! use spikewatch_log_pipeline::config::PipelineConfig;
//!
//! let core_config = SpikewatchConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use spikewatch_core::config::{
    DEFAULT_COLUMNS, ScanFilter, SpikewatchConfig, TimeZoneSetting,
};

use crate::collector::FilePattern;
use crate::error::LogPipelineError;
use crate::schema::ColumnSchema;

const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 감시 디렉토리
    pub directory: PathBuf,
    /// 실시간 감시 파일 이름 패턴
    pub pattern: String,
    /// 하위 디렉토리 포함 여부
    pub recursive: bool,
    /// 시작 시 스캔 필터 정책
    pub scan_filter: ScanFilter,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 위치별 필드 이름 목록
    pub columns: Vec<String>,
    /// 타임스탬프 필드 이름
    pub timestamp_field: String,
    /// 필드 구분자
    pub delimiter: char,
    /// 첫 행 헤더 여부
    pub has_header: bool,
    /// 달력 변환 시간대
    pub timezone: TimeZoneSetting,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/spool/spikewatch"),
            pattern: "*.csv".to_owned(),
            recursive: true,
            scan_filter: ScanFilter::Matching,
            poll_interval_ms: 1000,
            columns: DEFAULT_COLUMNS.iter().map(|c| (*c).to_owned()).collect(),
            timestamp_field: "timestamp".to_owned(),
            delimiter: ',',
            has_header: false,
            timezone: TimeZoneSetting::Local,
        }
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// 구분자가 한 글자가 아니면 기본값(`,`)을 사용합니다.
    /// core 설정은 로딩 시 이미 검증되므로 정상 경로에서는 발생하지 않습니다.
    pub fn from_core(core: &SpikewatchConfig) -> Self {
        Self {
            directory: PathBuf::from(&core.watcher.directory),
            pattern: core.watcher.pattern.clone(),
            recursive: core.watcher.recursive,
            scan_filter: core.watcher.scan_filter,
            poll_interval_ms: core.watcher.poll_interval_ms,
            columns: core.schema.columns.clone(),
            timestamp_field: core.schema.timestamp_field.clone(),
            delimiter: core.schema.delimiter_char().unwrap_or(','),
            has_header: core.schema.has_header,
            timezone: core.schema.timezone,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.directory.as_os_str().is_empty() {
            return Err(LogPipelineError::Config {
                field: "directory".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(LogPipelineError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            });
        }

        if self.delimiter == '"' {
            return Err(LogPipelineError::Config {
                field: "delimiter".to_owned(),
                reason: "quote character cannot be a delimiter".to_owned(),
            });
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        if let Some(dup) = self.columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(LogPipelineError::Config {
                field: "columns".to_owned(),
                reason: format!("duplicate column name '{dup}'"),
            });
        }

        FilePattern::new(&self.pattern)?;
        self.column_schema()?;
        Ok(())
    }

    /// 컬럼 스키마를 생성합니다.
    pub fn column_schema(&self) -> Result<ColumnSchema, LogPipelineError> {
        ColumnSchema::new(self.columns.clone(), &self.timestamp_field)
            .map(|schema| {
                schema
                    .with_delimiter(self.delimiter)
                    .with_header(self.has_header)
                    .with_timezone(self.timezone)
            })
    }

    /// 감시 패턴을 컴파일합니다.
    pub fn file_pattern(&self) -> Result<FilePattern, LogPipelineError> {
        FilePattern::new(&self.pattern)
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시 디렉토리를 설정합니다.
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.directory = dir.into();
        self
    }

    /// 감시 패턴을 설정합니다.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.pattern = pattern.into();
        self
    }

    /// 하위 디렉토리 포함 여부를 설정합니다.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.config.recursive = recursive;
        self
    }

    /// 시작 스캔 필터를 설정합니다.
    pub fn scan_filter(mut self, filter: ScanFilter) -> Self {
        self.config.scan_filter = filter;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 컬럼 목록을 설정합니다.
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.config.columns = columns;
        self
    }

    /// 타임스탬프 필드 이름을 설정합니다.
    pub fn timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.config.timestamp_field = field.into();
        self
    }

    /// 구분자를 설정합니다.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// 헤더 행 여부를 설정합니다.
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.config.has_header = has_header;
        self
    }

    /// 시간대를 설정합니다.
    pub fn timezone(mut self, timezone: TimeZoneSetting) -> Self {
        self.config.timezone = timezone;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
