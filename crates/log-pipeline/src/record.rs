//! 레코드 저장소 -- 파일 하나에서 파싱된 타입 레코드의 불변 컬렉션
//!
//! [`RecordStore`]는 파일 하나를 파싱한 결과이며 생성 이후 수정되지 않습니다.
//! 부분 갱신이나 스트리밍 추가는 지원하지 않습니다.

use std::sync::Arc;

use chrono::NaiveDateTime;
use spikewatch_core::config::{BUNDLE_FIELD, SEVERITY_FIELD};

/// 에러 심각도를 나타내는 심각도 필드 값 (대소문자 구분, 정확히 일치)
pub const ERROR_SEVERITY: &str = "Error";

/// 필드 이름과 주요 필드의 위치
///
/// 스키마와 그 스키마로 파싱된 모든 레코드가 공유합니다.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct FieldLayout {
    pub(crate) names: Vec<String>,
    pub(crate) severity: usize,
    pub(crate) bundle: usize,
    pub(crate) timestamp: usize,
}

impl FieldLayout {
    /// 필드 이름 목록에서 레이아웃을 만듭니다. 필수 필드가 없으면 누락된 이름을 반환합니다.
    pub(crate) fn new(names: Vec<String>, timestamp_field: &str) -> Result<Self, String> {
        let find = |name: &str| {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| name.to_owned())
        };
        let severity = find(SEVERITY_FIELD)?;
        let bundle = find(BUNDLE_FIELD)?;
        let timestamp = find(timestamp_field)?;
        Ok(Self {
            names,
            severity,
            bundle,
            timestamp,
        })
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// 입력 파일의 한 행
#[derive(Debug, Clone)]
pub struct Record {
    layout: Arc<FieldLayout>,
    values: Vec<String>,
    epoch_secs: i64,
    timestamp: NaiveDateTime,
}

impl Record {
    pub(crate) fn new(
        layout: Arc<FieldLayout>,
        values: Vec<String>,
        epoch_secs: i64,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            layout,
            values,
            epoch_secs,
            timestamp,
        }
    }

    /// 이름으로 필드 값을 조회합니다.
    ///
    /// 타임스탬프 필드는 원본 정수 문자열을 반환합니다.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.layout
            .index_of(field)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// 심각도 필드 값
    pub fn severity(&self) -> &str {
        &self.values[self.layout.severity]
    }

    /// 번들 식별자
    pub fn bundle_id(&self) -> &str {
        &self.values[self.layout.bundle]
    }

    /// 원본 타임스탬프 (유닉스 초)
    pub fn epoch_secs(&self) -> i64 {
        self.epoch_secs
    }

    /// 설정된 시간대 기준 달력 시각
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// 에러 심각도 레코드인지 확인합니다.
    pub fn is_error(&self) -> bool {
        self.severity() == ERROR_SEVERITY
    }

    /// (필드 이름, 값) 쌍을 스키마 순서대로 순회합니다.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.layout
            .names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}

/// 파일 하나에서 파싱된 레코드의 순서 있는 불변 컬렉션
#[derive(Debug, Clone)]
pub struct RecordStore {
    source: String,
    records: Vec<Record>,
}

impl RecordStore {
    pub(crate) fn new(source: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }

    /// 원본 파일 경로(또는 식별자)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 레코드 수
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 레코드가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 파일 내 순서대로 레코드를 순회합니다.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// 레코드 슬라이스
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// 조건을 만족하는 레코드를 순회합니다.
    pub fn filter<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a Record> + 'a
    where
        P: Fn(&Record) -> bool + 'a,
    {
        self.records.iter().filter(move |r| predicate(r))
    }

    /// 필드 값이 정확히 일치하는 레코드를 순회합니다.
    pub fn filter_by<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |r| r.get(field) == Some(value))
    }

    /// 에러 심각도 레코드 수
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_error()).count()
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn layout() -> Arc<FieldLayout> {
        Arc::new(
            FieldLayout::new(
                vec![
                    "severity".to_owned(),
                    "bundle_id".to_owned(),
                    "os".to_owned(),
                    "timestamp".to_owned(),
                ],
                "timestamp",
            )
            .unwrap(),
        )
    }

    fn record(layout: &Arc<FieldLayout>, severity: &str, bundle: &str, os: &str) -> Record {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Record::new(
            Arc::clone(layout),
            vec![
                severity.to_owned(),
                bundle.to_owned(),
                os.to_owned(),
                "1705320000".to_owned(),
            ],
            1_705_320_000,
            ts,
        )
    }

    #[test]
    fn layout_reports_missing_field() {
        let err = FieldLayout::new(vec!["severity".to_owned()], "timestamp").unwrap_err();
        assert_eq!(err, "bundle_id");
    }

    #[test]
    fn record_accessors() {
        let layout = layout();
        let r = record(&layout, "Error", "com.example.game", "android");
        assert_eq!(r.severity(), "Error");
        assert_eq!(r.bundle_id(), "com.example.game");
        assert_eq!(r.get("os"), Some("android"));
        assert_eq!(r.get("timestamp"), Some("1705320000"));
        assert_eq!(r.get("missing"), None);
        assert_eq!(r.epoch_secs(), 1_705_320_000);
        assert!(r.is_error());
        assert_eq!(r.fields().count(), 4);
    }

    #[test]
    fn error_match_is_exact() {
        let layout = layout();
        assert!(!record(&layout, "error", "a", "ios").is_error());
        assert!(!record(&layout, "ERROR", "a", "ios").is_error());
        assert!(!record(&layout, "Error ", "a", "ios").is_error());
    }

    #[test]
    fn store_filtering() {
        let layout = layout();
        let store = RecordStore::new(
            "test.csv",
            vec![
                record(&layout, "Error", "a", "ios"),
                record(&layout, "Warning", "a", "android"),
                record(&layout, "Error", "b", "android"),
            ],
        );
        assert_eq!(store.len(), 3);
        assert_eq!(store.error_count(), 2);
        assert_eq!(store.filter_by("os", "android").count(), 2);
        assert_eq!(store.filter(|r| r.bundle_id() == "a").count(), 2);
        assert_eq!(store.source(), "test.csv");
    }
}
