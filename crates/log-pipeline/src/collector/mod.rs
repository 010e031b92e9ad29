//! 수집 모듈 -- 감시 디렉토리에서 "파일 준비됨" 이벤트를 만들어냅니다.
//!
//! # 구성
//! - [`FilePattern`]: 파일 이름 glob 패턴
//! - [`DirectoryWatcher`]: 폴링 기반 감시 백엔드 (시작 스캔 + 신규 파일 감지)
//!
//! 감시기는 [`FileReadyHandler`](spikewatch_core::pipeline::FileReadyHandler)만
//! 호출하므로 다른 감시 백엔드로 교체해도 파이프라인은 바뀌지 않습니다.

pub mod file;
pub mod pattern;

pub use file::DirectoryWatcher;
pub use pattern::FilePattern;

/// 파일 처리를 일으킨 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOrigin {
    /// 시작 시 이미 존재하던 파일
    Startup,
    /// 감시 중 새로 생성된 파일
    Created,
}

impl TriggerOrigin {
    /// 로그 필드와 메트릭 레이블에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Created => "created",
        }
    }
}

impl std::fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
