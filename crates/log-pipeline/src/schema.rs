//! 스키마 매퍼 -- 구분자 텍스트 행을 타입 레코드로 변환
//!
//! 입력 파일은 헤더 없는(기본) 구분자 텍스트입니다. 각 행의 필드는 위치에 따라
//! [`ColumnSchema`]의 이름을 부여받고, 타임스탬프 필드는 유닉스 초 정수에서
//! 설정된 시간대 기준의 달력 시각으로 변환됩니다.
//!
//! # 행 처리 규칙
//! - 빈 행은 건너뜁니다. 행 끝의 `\r`은 제거합니다.
//! - 큰따옴표로 감싼 필드는 구분자를 포함할 수 있으며 `""`는 `"` 하나입니다.
//! - 스키마보다 필드가 적으면 해당 파일 전체가 실패합니다. 초과 필드는 무시합니다.
//! - 여러 행에 걸친 따옴표 필드는 지원하지 않습니다.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use spikewatch_core::config::{DEFAULT_COLUMNS, TimeZoneSetting};

use crate::error::LogPipelineError;
use crate::record::{FieldLayout, Record, RecordStore};

/// 위치별 필드 이름과 행 해석 규칙
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    layout: Arc<FieldLayout>,
    delimiter: char,
    has_header: bool,
    timezone: TimeZoneSetting,
}

impl ColumnSchema {
    /// 필드 이름 목록과 타임스탬프 필드 이름으로 스키마를 생성합니다.
    ///
    /// 이름 목록에 `severity`, `bundle_id`, 타임스탬프 필드가 모두 있어야 합니다.
    pub fn new(columns: Vec<String>, timestamp_field: &str) -> Result<Self, LogPipelineError> {
        if columns.is_empty() {
            return Err(LogPipelineError::Config {
                field: "schema.columns".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        let layout = FieldLayout::new(columns, timestamp_field).map_err(|missing| {
            LogPipelineError::Config {
                field: "schema.columns".to_owned(),
                reason: format!("required field '{missing}' is not in the column list"),
            }
        })?;

        Ok(Self {
            layout: Arc::new(layout),
            delimiter: ',',
            has_header: false,
            timezone: TimeZoneSetting::Local,
        })
    }

    /// 구분자를 설정합니다.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// 첫 행을 헤더로 건너뛸지 설정합니다.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// 달력 변환 시간대를 설정합니다.
    pub fn with_timezone(mut self, timezone: TimeZoneSetting) -> Self {
        self.timezone = timezone;
        self
    }

    /// 필드 이름 목록
    pub fn columns(&self) -> &[String] {
        &self.layout.names
    }

    /// 타임스탬프 필드 이름
    pub fn timestamp_field(&self) -> &str {
        &self.layout.names[self.layout.timestamp]
    }

    /// 구분자
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// 시간대 설정
    pub fn timezone(&self) -> TimeZoneSetting {
        self.timezone
    }

    /// 파일을 읽어 레코드 저장소를 생성합니다.
    ///
    /// 동기 I/O를 수행하므로 비동기 컨텍스트에서는 `spawn_blocking`으로 호출해야 합니다.
    pub fn parse_file(&self, path: &Path) -> Result<RecordStore, LogPipelineError> {
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| LogPipelineError::UnreadableFile {
            path: display.clone(),
            source: e,
        })?;

        let content = std::str::from_utf8(&bytes).map_err(|e| {
            let line = bytes[..e.valid_up_to()]
                .iter()
                .filter(|b| **b == b'\n')
                .count()
                + 1;
            LogPipelineError::MalformedInput {
                path: display.clone(),
                line,
                reason: "invalid UTF-8".to_owned(),
            }
        })?;

        self.parse_str(&display, content)
    }

    /// 메모리 상의 텍스트를 파싱합니다. `source`는 에러 메시지와 결과에 쓰입니다.
    pub fn parse_str(&self, source: &str, content: &str) -> Result<RecordStore, LogPipelineError> {
        let expected = self.layout.names.len();
        let mut records = Vec::new();
        let mut header_pending = self.has_header;

        for (idx, raw) in content.split('\n').enumerate() {
            let line_no = idx + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            // 구분자가 공백 문자여도 구분자만으로 된 행은 빈 줄이 아님
            let delimiter = self.delimiter;
            if line
                .trim_matches(|c: char| c.is_whitespace() && c != delimiter)
                .is_empty()
            {
                continue;
            }
            if header_pending {
                header_pending = false;
                continue;
            }

            let malformed = |reason: String| LogPipelineError::MalformedInput {
                path: source.to_owned(),
                line: line_no,
                reason,
            };

            let mut values = split_row(line, self.delimiter).map_err(|r| malformed(r.to_owned()))?;
            if values.len() < expected {
                return Err(malformed(format!(
                    "expected {expected} fields, found {}",
                    values.len()
                )));
            }
            values.truncate(expected);

            let raw_ts = values[self.layout.timestamp].trim();
            let epoch_secs: i64 = raw_ts.parse().map_err(|_| {
                malformed(format!(
                    "timestamp field '{}' is not an integer: '{raw_ts}'",
                    self.timestamp_field()
                ))
            })?;
            let timestamp = to_calendar(epoch_secs, self.timezone).ok_or_else(|| {
                malformed(format!("timestamp {epoch_secs} is out of range"))
            })?;

            records.push(Record::new(
                Arc::clone(&self.layout),
                values,
                epoch_secs,
                timestamp,
            ));
        }

        Ok(RecordStore::new(source, records))
    }
}

impl Default for ColumnSchema {
    /// 기본 24개 컬럼 내보내기 스키마
    fn default() -> Self {
        let names: Vec<String> = DEFAULT_COLUMNS.iter().map(|c| (*c).to_owned()).collect();
        let index = |name: &str| names.iter().position(|n| n == name).unwrap_or_default();
        let layout = FieldLayout {
            severity: index(spikewatch_core::config::SEVERITY_FIELD),
            bundle: index(spikewatch_core::config::BUNDLE_FIELD),
            timestamp: index("timestamp"),
            names,
        };
        Self {
            layout: Arc::new(layout),
            delimiter: ',',
            has_header: false,
            timezone: TimeZoneSetting::Local,
        }
    }
}

/// 유닉스 초를 시간대 기준 달력 시각으로 변환합니다.
pub fn to_calendar(epoch_secs: i64, timezone: TimeZoneSetting) -> Option<NaiveDateTime> {
    let utc = DateTime::<Utc>::from_timestamp(epoch_secs, 0)?;
    Some(match timezone {
        TimeZoneSetting::Local => utc.with_timezone(&Local).naive_local(),
        TimeZoneSetting::Utc => utc.naive_utc(),
    })
}

/// 따옴표를 고려하여 한 행을 필드로 분리합니다.
pub fn split_row(line: &str, delimiter: char) -> Result<Vec<String>, &'static str> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut at_field_start = true;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        if c == delimiter {
            fields.push(std::mem::take(&mut current));
            at_field_start = true;
        } else if c == '"' && at_field_start {
            in_quotes = true;
            at_field_start = false;
        } else {
            current.push(c);
            at_field_start = false;
        }
    }

    if in_quotes {
        return Err("unterminated quoted field");
    }
    fields.push(current);
    Ok(fields)
}
