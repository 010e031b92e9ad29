//! 설정 관리 -- spikewatch.toml 파싱 및 런타임 설정
//!
//! [`SpikewatchConfig`]는 감시 디렉토리, 컬럼 스키마, 로깅, 메트릭 설정을 담는
//! 최상위 구조체입니다. 전역 상태 없이 명시적으로 생성되어 파이프라인에 전달됩니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SPIKEWATCH_WATCHER_DIRECTORY=/data/exports` 형식)
//! 3. 설정 파일 (`spikewatch.toml`, 또는 레거시 `config.json`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), spikewatch_core::error::SpikewatchError> {
//! use spikewatch_core::config::SpikewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SpikewatchConfig::load("spikewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SpikewatchConfig::parse("[watcher]\ndirectory = \"/tmp/exports\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SpikewatchError};

/// 심각도 필드 이름 (`"Error"` 값이 에러 레코드를 의미)
pub const SEVERITY_FIELD: &str = "severity";

/// 번들 식별자 필드 이름 (시간+번들 버킷팅 차원)
pub const BUNDLE_FIELD: &str = "bundle_id";

/// 기본 컬럼 스키마 -- 로그 내보내기 파일의 위치별 필드 이름
pub const DEFAULT_COLUMNS: [&str; 24] = [
    "error_code",
    "error_message",
    "severity",
    "log_location",
    "mode",
    "model",
    "graphics",
    "session_id",
    "sdk_version",
    "test_mode",
    "flow_id",
    "flow_type",
    "sdk_date",
    "publisher_id",
    "game_id",
    "bundle_id",
    "app_version",
    "language",
    "os",
    "advertising_id",
    "gdpr_flag",
    "ccpa_flag",
    "country_code",
    "timestamp",
];

const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Spikewatch 통합 설정
///
/// `spikewatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpikewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 디렉토리 감시 설정
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// 입력 파일 스키마 설정
    #[serde(default)]
    pub schema: SchemaConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl SpikewatchConfig {
    /// 설정 파일을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 확장자가 `.json`이면 레거시 JSON 형식으로, 그 외에는 TOML로 해석합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SpikewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SpikewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpikewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SpikewatchError::Io(e)
            }
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let config = if is_json {
            Self::parse_legacy_json(&content)?
        } else {
            Self::parse(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SpikewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            SpikewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 레거시 평면 JSON 설정을 파싱합니다.
    ///
    /// `{ "dir": ..., "columns": [...], "logging_level": "INFO" }` 형식을 받아
    /// 나머지 필드는 기본값으로 채웁니다.
    pub fn parse_legacy_json(json_str: &str) -> Result<Self, SpikewatchError> {
        let legacy: LegacyConfig = serde_json::from_str(json_str).map_err(|e| {
            SpikewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })?;

        let mut config = Self::default();
        config.watcher.directory = legacy.directory;

        if let Some(level) = legacy.logging_level {
            config.general.log_level = normalize_log_level(&level).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "logging_level".to_owned(),
                    reason: format!("unrecognized logging level: {level}"),
                }
            })?;
        }

        if let Some(columns) = legacy.columns {
            let has_timestamp = columns.iter().any(|c| c == "timestamp");
            if !has_timestamp && columns.iter().any(|c| c == "date") {
                config.schema.timestamp_field = "date".to_owned();
            }
            config.schema.columns = columns;
        }

        Ok(config)
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SPIKEWATCH_{SECTION}_{FIELD}`
    /// 예: `SPIKEWATCH_WATCHER_PATTERN=*.tsv`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SPIKEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SPIKEWATCH_GENERAL_LOG_FORMAT");

        // Watcher
        override_string(&mut self.watcher.directory, "SPIKEWATCH_WATCHER_DIRECTORY");
        override_string(&mut self.watcher.pattern, "SPIKEWATCH_WATCHER_PATTERN");
        override_bool(&mut self.watcher.recursive, "SPIKEWATCH_WATCHER_RECURSIVE");
        override_parsed(&mut self.watcher.scan_filter, "SPIKEWATCH_WATCHER_SCAN_FILTER");
        override_u64(
            &mut self.watcher.poll_interval_ms,
            "SPIKEWATCH_WATCHER_POLL_INTERVAL_MS",
        );

        // Schema
        override_csv(&mut self.schema.columns, "SPIKEWATCH_SCHEMA_COLUMNS");
        override_string(
            &mut self.schema.timestamp_field,
            "SPIKEWATCH_SCHEMA_TIMESTAMP_FIELD",
        );
        override_string(&mut self.schema.delimiter, "SPIKEWATCH_SCHEMA_DELIMITER");
        override_bool(&mut self.schema.has_header, "SPIKEWATCH_SCHEMA_HAS_HEADER");
        override_parsed(&mut self.schema.timezone, "SPIKEWATCH_SCHEMA_TIMEZONE");

        // Metrics
        override_bool(&mut self.metrics.enabled, "SPIKEWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SPIKEWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SPIKEWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SpikewatchError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["text", "json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.watcher.directory.trim().is_empty() {
            return Err(invalid("watcher.directory", "must not be empty"));
        }

        if self.watcher.pattern.is_empty() {
            return Err(invalid("watcher.pattern", "must not be empty"));
        }

        if self.watcher.poll_interval_ms == 0 || self.watcher.poll_interval_ms > MAX_POLL_INTERVAL_MS
        {
            return Err(invalid(
                "watcher.poll_interval_ms",
                format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            ));
        }

        self.schema.validate()?;

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is currently supported",
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (text, json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }
}

/// 시작 시 스캔 대상 필터 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanFilter {
    /// 감시 패턴과 일치하는 파일만 스캔 (실시간 감시와 동일한 정책)
    #[default]
    Matching,
    /// 확장자와 무관하게 모든 파일 스캔
    All,
}

impl fmt::Display for ScanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matching => write!(f, "matching"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for ScanFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "matching" => Ok(Self::Matching),
            "all" => Ok(Self::All),
            other => Err(format!("unknown scan filter '{other}'")),
        }
    }
}

/// 디렉토리 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// 감시할 디렉토리
    pub directory: String,
    /// 파일 이름 glob 패턴
    pub pattern: String,
    /// 하위 디렉토리 포함 여부
    pub recursive: bool,
    /// 시작 시 스캔 필터 정책
    pub scan_filter: ScanFilter,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            directory: "/var/spool/spikewatch".to_owned(),
            pattern: "*.csv".to_owned(),
            recursive: true,
            scan_filter: ScanFilter::Matching,
            poll_interval_ms: 1000,
        }
    }
}

/// 타임스탬프를 달력 시각으로 변환할 때 사용할 시간대
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneSetting {
    /// 프로세스의 로컬 시간대
    #[default]
    Local,
    /// UTC
    Utc,
}

impl fmt::Display for TimeZoneSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Utc => write!(f, "utc"),
        }
    }
}

impl FromStr for TimeZoneSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => Err(format!("unknown timezone '{other}'")),
        }
    }
}

/// 입력 파일 스키마 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// 위치별 필드 이름 목록
    pub columns: Vec<String>,
    /// 타임스탬프(유닉스 초)로 해석할 필드 이름
    pub timestamp_field: String,
    /// 필드 구분자 (한 글자)
    pub delimiter: String,
    /// 첫 행을 헤더로 보고 건너뛸지 여부
    pub has_header: bool,
    /// 달력 변환 시간대
    pub timezone: TimeZoneSetting,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS.iter().map(|c| (*c).to_owned()).collect(),
            timestamp_field: "timestamp".to_owned(),
            delimiter: ",".to_owned(),
            has_header: false,
            timezone: TimeZoneSetting::Local,
        }
    }
}

impl SchemaConfig {
    /// 구분자 문자를 반환합니다. 검증을 통과한 설정에서만 `Some`이 보장됩니다.
    pub fn delimiter_char(&self) -> Option<char> {
        let mut chars = self.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    /// 스키마 설정의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SpikewatchError> {
        if self.columns.is_empty() {
            return Err(invalid("schema.columns", "must not be empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if column.trim().is_empty() {
                return Err(invalid("schema.columns", "column names must not be empty"));
            }
            if !seen.insert(column.as_str()) {
                return Err(invalid(
                    "schema.columns",
                    format!("duplicate column name '{column}'"),
                ));
            }
        }

        for required in [self.timestamp_field.as_str(), SEVERITY_FIELD, BUNDLE_FIELD] {
            if !seen.contains(required) {
                return Err(invalid(
                    "schema.columns",
                    format!("missing required column '{required}'"),
                ));
            }
        }

        match self.delimiter_char() {
            Some('"') => Err(invalid("schema.delimiter", "quote character cannot be a delimiter")),
            Some(_) => Ok(()),
            None => Err(invalid("schema.delimiter", "must be exactly one character")),
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9108,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 레거시 `config.json` 구조
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    #[serde(alias = "dir")]
    directory: String,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    logging_level: Option<serde_json::Value>,
}

/// Python `logging` 스타일 레벨(이름 또는 숫자)을 tracing 레벨 이름으로 변환합니다.
fn normalize_log_level(value: &serde_json::Value) -> Option<String> {
    let level = match value {
        serde_json::Value::String(name) => match name.to_ascii_uppercase().as_str() {
            "TRACE" | "NOTSET" => "trace",
            "DEBUG" => "debug",
            "INFO" => "info",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" | "FATAL" => "error",
            _ => return None,
        },
        serde_json::Value::Number(n) => match n.as_u64()? {
            0..=9 => "trace",
            10..=19 => "debug",
            20..=29 => "info",
            30..=39 => "warn",
            _ => "error",
        },
        _ => return None,
    };
    Some(level.to_owned())
}

fn invalid(field: &str, reason: impl Into<String>) -> SpikewatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_parsed<T: FromStr<Err = String>>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(reason) => warn!(
                env_key,
                value = val.as_str(),
                reason = reason.as_str(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
