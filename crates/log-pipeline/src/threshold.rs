//! 임계값 평가기 -- 임계값을 넘은 버킷만 골라냅니다.

use serde::Serialize;

use crate::bucket::BucketCounts;

/// 두 버킷팅 모두에 쓰는 고정 임계값
///
/// 버킷의 에러 수가 이 값을 **초과**해야 보고됩니다. 정확히 10이면 보고되지 않습니다.
pub const ERROR_THRESHOLD: u64 = 10;

/// 보고 대상 버킷 한 줄
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertLine<K> {
    pub key: K,
    pub count: u64,
}

/// 개수가 `threshold`보다 큰 버킷을 키 오름차순으로 반환합니다.
///
/// 빈 입력은 빈 출력입니다.
pub fn select_above_threshold<K>(counts: &BucketCounts<K>, threshold: u64) -> Vec<AlertLine<K>>
where
    K: Ord + Clone,
{
    counts
        .iter()
        .filter(|(_, count)| *count > threshold)
        .map(|(key, count)| AlertLine {
            key: key.clone(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_threshold_is_excluded() {
        let counts: BucketCounts<u32> = [(1, 10), (2, 11), (3, 9)].into_iter().collect();
        let lines = select_above_threshold(&counts, ERROR_THRESHOLD);
        assert_eq!(
            lines,
            vec![AlertLine {
                key: 2,
                count: 11
            }]
        );
    }

    #[test]
    fn output_is_ascending_by_key() {
        let counts: BucketCounts<&str> = [("c", 20), ("a", 30), ("b", 11)].into_iter().collect();
        let keys: Vec<&str> = select_above_threshold(&counts, ERROR_THRESHOLD)
            .into_iter()
            .map(|l| l.key)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let counts: BucketCounts<u32> = BucketCounts::default();
        assert!(select_above_threshold(&counts, ERROR_THRESHOLD).is_empty());
    }
}
