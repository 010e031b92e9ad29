//! 버킷팅 엔진 -- 에러 레코드를 시간/번들 키로 묶어 개수를 셉니다.
//!
//! 엔진은 키 함수와 필터 조건을 모두 인자로 받으므로 조건에 독립적입니다.
//! 파이프라인은 매 실행마다 두 가지 버킷팅을 수행합니다:
//!
//! - [`MinuteKey`]: 번들 구분 없이 분 단위 -- 여러 번들에 걸친 급격한 폭주 감지
//! - [`HourBundleKey`]: 번들별 시간 단위 -- 특정 앱의 지속적인 품질 저하 감지
//!
//! 결과는 [`BTreeMap`] 기반이라 같은 입력에 대해 항상 같은 순서를 보장합니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Timelike};
use serde::Serialize;

use crate::record::{Record, RecordStore};

/// 분 단위 버킷 키 (년, 월, 일, 시, 분)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MinuteKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl MinuteKey {
    /// 레코드의 달력 시각에서 키를 만듭니다.
    pub fn from_record(record: &Record) -> Self {
        let ts = record.timestamp();
        Self {
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
            hour: ts.hour(),
            minute: ts.minute(),
        }
    }
}

impl fmt::Display for MinuteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04} {:02} {:02} {:02} {:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

/// 번들별 시간 단위 버킷 키 (번들, 년, 월, 일, 시)
///
/// 필드 선언 순서가 곧 정렬 순서이므로 번들 식별자가 가장 먼저 비교됩니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HourBundleKey {
    pub bundle_id: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl HourBundleKey {
    /// 레코드의 번들 식별자와 달력 시각에서 키를 만듭니다.
    pub fn from_record(record: &Record) -> Self {
        let ts = record.timestamp();
        Self {
            bundle_id: record.bundle_id().to_owned(),
            year: ts.year(),
            month: ts.month(),
            day: ts.day(),
            hour: ts.hour(),
        }
    }
}

impl fmt::Display for HourBundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:04} {:02} {:02} {:02}",
            self.bundle_id, self.year, self.month, self.day, self.hour
        )
    }
}

/// 버킷 키별 레코드 수
///
/// 파이프라인 실행 한 번 안에서만 쓰이며 파일 간, 실행 간에 합쳐지지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketCounts<K: Ord> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord> BucketCounts<K> {
    /// 키의 개수를 조회합니다. 없는 키는 0입니다.
    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// 버킷 수
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// 버킷이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// 모든 버킷 개수의 합
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// 키 오름차순으로 (키, 개수)를 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }
}

impl<K: Ord> Default for BucketCounts<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord> FromIterator<(K, u64)> for BucketCounts<K> {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut counts = BTreeMap::new();
        for (key, n) in iter {
            *counts.entry(key).or_insert(0) += n;
        }
        Self { counts }
    }
}

/// 필터를 통과한 레코드를 키 함수로 분할하고 분할마다 개수를 셉니다.
///
/// 입력 저장소는 변경하지 않습니다.
pub fn count_by_bucket<K, F, P>(store: &RecordStore, key_fn: F, filter: P) -> BucketCounts<K>
where
    K: Ord,
    F: Fn(&Record) -> K,
    P: Fn(&Record) -> bool,
{
    let mut counts = BTreeMap::new();
    for record in store.iter().filter(|r| filter(r)) {
        *counts.entry(key_fn(record)).or_insert(0u64) += 1;
    }
    BucketCounts { counts }
}

/// 에러 심각도 필터
pub fn error_severity(record: &Record) -> bool {
    record.is_error()
}
