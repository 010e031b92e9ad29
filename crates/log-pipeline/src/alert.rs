//! 알림 출력기 -- 임계값을 넘은 버킷을 들여쓴 여러 줄 보고서로 만들어 싱크에 넘깁니다.
//!
//! 보고서 한 건은 구조화된 로그 항목 하나입니다. 알림 라인이 없어도 빈 보고서를
//! 출력하므로 파일 하나당 항상 두 건(분 단위, 번들별 시간 단위)이 기록됩니다.

use std::fmt;

use serde::Serialize;

use crate::threshold::AlertLine;

/// 보고서 머리글
pub const REPORT_HEADLINE: &str = "error spike report";

/// 버킷팅 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucketing {
    /// (년, 월, 일, 시, 분)
    Minute,
    /// (번들, 년, 월, 일, 시)
    HourBundle,
}

impl Bucketing {
    /// 로그 필드와 메트릭 레이블에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::HourBundle => "hour_bundle",
        }
    }
}

impl fmt::Display for Bucketing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파일 하나, 버킷팅 하나에 대한 보고서
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertReport {
    /// 원본 파일 경로
    pub source: String,
    /// 버킷팅 종류
    pub bucketing: Bucketing,
    /// 알림 라인 수
    pub alerts: usize,
    /// 탭으로 들여쓴 본문 (`\t<키> <개수>` 줄들)
    pub body: String,
}

impl AlertReport {
    /// 알림 라인으로 보고서를 만듭니다.
    pub fn new<K: fmt::Display>(
        source: impl Into<String>,
        bucketing: Bucketing,
        lines: &[AlertLine<K>],
    ) -> Self {
        Self {
            source: source.into(),
            bucketing,
            alerts: lines.len(),
            body: format_report(lines),
        }
    }

    /// 알림 라인이 없는 보고서인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.alerts == 0
    }

    /// 로그 메시지로 쓰는 전체 텍스트 (머리글 + 본문)
    pub fn message(&self) -> String {
        if self.body.is_empty() {
            REPORT_HEADLINE.to_owned()
        } else {
            format!("{REPORT_HEADLINE}\n{}", self.body)
        }
    }
}

/// 알림 라인을 `\t<키> <개수>` 형식의 줄로 만들어 `\n`으로 잇습니다.
pub fn format_report<K: fmt::Display>(lines: &[AlertLine<K>]) -> String {
    lines
        .iter()
        .map(|line| format!("\t{} {}", line.key, line.count))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 보고서 출력 대상
///
/// 출력 실패는 파이프라인 결과에 영향을 주지 않으므로 에러를 반환하지 않습니다.
pub trait AlertSink: Send + Sync {
    /// 보고서 한 건을 내보냅니다.
    fn emit(&self, report: &AlertReport);
}

/// `tracing` INFO 이벤트로 보고서를 내보내는 기본 싱크
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn emit(&self, report: &AlertReport) {
        tracing::info!(
            source = %report.source,
            bucketing = report.bucketing.as_str(),
            alerts = report.alerts,
            "{}",
            report.message()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::MinuteKey;

    fn key(minute: u32) -> MinuteKey {
        MinuteKey {
            year: 2024,
            month: 1,
            day: 15,
            hour: 12,
            minute,
        }
    }

    #[test]
    fn format_indents_each_line() {
        let lines = vec![
            AlertLine {
                key: key(0),
                count: 15,
            },
            AlertLine {
                key: key(1),
                count: 11,
            },
        ];
        assert_eq!(
            format_report(&lines),
            "\t2024 01 15 12 00 15\n\t2024 01 15 12 01 11"
        );
    }

    #[test]
    fn empty_report_keeps_headline() {
        let report = AlertReport::new::<MinuteKey>("a.csv", Bucketing::Minute, &[]);
        assert!(report.is_empty());
        assert_eq!(report.body, "");
        assert_eq!(report.message(), REPORT_HEADLINE);
    }

    #[test]
    fn message_puts_body_under_headline() {
        let lines = vec![AlertLine {
            key: key(0),
            count: 12,
        }];
        let report = AlertReport::new("a.csv", Bucketing::Minute, &lines);
        assert_eq!(report.alerts, 1);
        assert_eq!(report.message(), "error spike report\n\t2024 01 15 12 00 12");
    }

    #[test]
    fn bucketing_names() {
        assert_eq!(Bucketing::Minute.to_string(), "minute");
        assert_eq!(Bucketing::HourBundle.as_str(), "hour_bundle");
        assert_eq!(
            serde_json::to_string(&Bucketing::HourBundle).unwrap(),
            "\"hour_bundle\""
        );
    }
}
