//! Spikewatch 로그 파이프라인
//!
//! 감시 디렉토리에 나타나는 로그 내보내기 파일(구분자 텍스트)을 파싱하여
//! 에러 심각도 레코드를 두 가지 키로 버킷팅하고, 임계값을 넘은 버킷을
//! 들여쓴 보고서로 출력합니다.
//!
//! # 모듈 구성
//!
//! - [`schema`]: 위치 기반 컬럼 스키마와 행 파서
//! - [`record`]: 파일 하나의 불변 레코드 저장소
//! - [`bucket`]: 분 단위 / 번들별 시간 단위 버킷팅 엔진
//! - [`threshold`]: 고정 임계값(10) 초과 버킷 선택
//! - [`alert`]: 보고서 포맷팅과 출력 싱크
//! - [`collector`]: 폴링 기반 디렉토리 감시기
//! - [`pipeline`]: 파일 단위 파이프라인과 서비스 생명주기 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 평탄화)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! DirectoryWatcher -> AlertPipeline -> ColumnSchema -> RecordStore
//!       |                                                  |
//!  startup scan + poll              MinuteKey / HourBundleKey bucketing
//!                                                          |
//!                                  select_above_threshold -> AlertSink
//! ```

pub mod alert;
pub mod bucket;
pub mod collector;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod threshold;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{AlertPipeline, FileAnalysis, LogPipeline, LogPipelineBuilder, analyze};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 스키마와 레코드
pub use record::{Record, RecordStore};
pub use schema::ColumnSchema;

// 버킷팅과 임계값
pub use bucket::{BucketCounts, HourBundleKey, MinuteKey, count_by_bucket, error_severity};
pub use threshold::{AlertLine, ERROR_THRESHOLD, select_above_threshold};

// 알림
pub use alert::{AlertReport, AlertSink, Bucketing, TracingSink, format_report};

// 수집기
pub use collector::{DirectoryWatcher, FilePattern, TriggerOrigin};
