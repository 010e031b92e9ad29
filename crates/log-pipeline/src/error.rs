//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for SpikewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use spikewatch_core::error::{ConfigError, PipelineError, SpikewatchError};

/// 로그 파이프라인 도메인 에러
///
/// 파일 단위 에러(`UnreadableFile`, `MalformedInput`)는 해당 파일의 처리만
/// 중단시키며, 감시 루프는 계속 동작합니다.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 파일을 열거나 읽을 수 없음 (삭제됨, 권한 변경, 쓰기 중 등)
    #[error("unreadable file: {path}: {source}")]
    UnreadableFile {
        /// 파일 경로
        path: String,
        /// 원인 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 행의 필드 수 부족 또는 타임스탬프 파싱 실패
    #[error("malformed input: {path} line {line}: {reason}")]
    MalformedInput {
        /// 파일 경로
        path: String,
        /// 문제가 된 행 번호 (1부터 시작)
        line: usize,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 디렉토리 감시 에러
    #[error("watch error: {path}: {reason}")]
    Watch {
        /// 감시 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl LogPipelineError {
    /// 메트릭 레이블에 쓰는 짧은 사유 이름을 반환합니다.
    pub fn reason_label(&self) -> &'static str {
        match self {
            Self::UnreadableFile { .. } => "unreadable",
            Self::MalformedInput { .. } => "malformed",
            Self::Config { .. } => "config",
            Self::Watch { .. } => "watch",
            Self::Regex(_) => "regex",
        }
    }

    /// 파일 하나에 국한된 에러인지 확인합니다.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::UnreadableFile { .. } | Self::MalformedInput { .. }
        )
    }
}

impl From<LogPipelineError> for SpikewatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Config { field, reason } => {
                SpikewatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Regex(e) => SpikewatchError::Config(ConfigError::InvalidValue {
                field: "watcher.pattern".to_owned(),
                reason: e.to_string(),
            }),
            other if other.is_per_file() => {
                SpikewatchError::Pipeline(PipelineError::FileFailed(other.to_string()))
            }
            other => SpikewatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
