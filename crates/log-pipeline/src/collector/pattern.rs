//! 파일 이름 glob 패턴
//!
//! `*`, `?`, `[...]`(`[!...]` 부정 포함)를 지원하며 정규식으로 변환해 사용합니다.
//! 경로 전체가 아니라 파일 이름에만 대소문자를 구분하여 매칭합니다.

use std::path::Path;

use regex::Regex;

use crate::error::LogPipelineError;

/// 컴파일된 파일 이름 패턴
#[derive(Debug, Clone)]
pub struct FilePattern {
    glob: String,
    regex: Regex,
}

impl FilePattern {
    /// glob 패턴을 컴파일합니다.
    pub fn new(glob: &str) -> Result<Self, LogPipelineError> {
        if glob.is_empty() {
            return Err(pattern_error("must not be empty"));
        }
        let regex = Regex::new(&glob_to_regex(glob)?)?;
        Ok(Self {
            glob: glob.to_owned(),
            regex,
        })
    }

    /// 원본 glob 문자열
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    /// 파일 이름이 패턴과 일치하는지 확인합니다.
    pub fn matches_name(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// 경로의 파일 이름이 패턴과 일치하는지 확인합니다.
    ///
    /// UTF-8이 아닌 파일 이름은 일치하지 않는 것으로 봅니다.
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.matches_name(n))
    }
}

fn pattern_error(reason: &str) -> LogPipelineError {
    LogPipelineError::Config {
        field: "watcher.pattern".to_owned(),
        reason: reason.to_owned(),
    }
}

fn glob_to_regex(glob: &str) -> Result<String, LogPipelineError> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    out.push('^');
                }
                // 여는 괄호 바로 뒤의 `]`는 문자 그대로
                if chars.peek() == Some(&']') {
                    chars.next();
                    out.push_str("\\]");
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    match inner {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | '&' | '~' | '^' => {
                            out.push('\\');
                            out.push(inner);
                        }
                        other => out.push(other),
                    }
                }
                if !closed {
                    return Err(pattern_error("unclosed '[' in pattern"));
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }

    out.push('$');
    Ok(out)
}
