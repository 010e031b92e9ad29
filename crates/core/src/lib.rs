//! Spikewatch 공통 크레이트
//!
//! 에러 타입, 설정, 메트릭 이름, 생명주기/트리거 trait을 정의합니다.
//! 다른 크레이트는 이 크레이트의 타입으로 설정과 에러를 교환합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PipelineError, SpikewatchError};

// 설정
pub use config::{
    GeneralConfig, MetricsConfig, ScanFilter, SchemaConfig, SpikewatchConfig, TimeZoneSetting,
    WatcherConfig,
};

// 파이프라인 trait
pub use pipeline::{FileReadyHandler, HealthStatus, Pipeline};
