//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! - [`Pipeline`]: 장기 실행 서비스의 생명주기 (start/stop/health_check)
//! - [`FileReadyHandler`]: "파일 준비됨" 이벤트를 받아 파일 단위 처리를 수행하는 좁은 인터페이스
//!
//! 감시 백엔드(폴링, OS 알림 등)는 [`FileReadyHandler`]만 호출하므로
//! 파이프라인을 건드리지 않고 교체할 수 있습니다.

use std::fmt;
use std::future::Future;
use std::path::Path;

use crate::error::SpikewatchError;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작 중이지만 일부 기능 저하
    Degraded(String),
    /// 비정상
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 장기 실행 서비스의 생명주기 trait
///
/// ```text
/// Initialized → start() → Running → stop() → Stopped
/// ```
pub trait Pipeline: Send + Sync {
    /// 서비스를 시작합니다. 백그라운드 태스크를 스폰한 뒤 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), SpikewatchError>> + Send;

    /// 서비스를 정지합니다.
    ///
    /// 진행 중인 작업이 끝날 때까지 기다린 뒤 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), SpikewatchError>> + Send;

    /// 서비스의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// "파일 준비됨" 이벤트 핸들러
///
/// 감시 백엔드가 새 파일(또는 시작 시 이미 존재하던 파일)을 발견할 때마다
/// 파일 하나당 정확히 한 번 호출됩니다. 호출은 동기적이며 순차적입니다.
/// 반환된 에러는 해당 파일에만 국한되며 감시 루프를 중단시키지 않습니다.
pub trait FileReadyHandler: Send + Sync + 'static {
    /// 파일 단위 처리 에러 타입
    type Error: std::error::Error + Send + Sync + 'static;

    /// 파일 하나를 처리합니다.
    fn on_file_ready(&self, path: &Path) -> Result<(), Self::Error>;
}
