//! 정규식 기반 추출 규칙
//!
//! [`PatternRule`]은 정규식 캡처 그룹으로 시각/레벨/퍼실리티/메시지를 추출합니다.
//! 이름 있는 그룹(`time`, `level`, `facility`, `message`)이 하나라도 있으면
//! 이름으로, 없으면 1~4번 그룹을 순서대로 사용합니다.

use regex::{Regex, RegexBuilder};

use logferry_core::pipeline::{ExtractedFields, LineRule};
use logferry_core::types::PROGRAM_CONNECT;

use crate::error::LogShipperError;

/// 내장 connect 규칙 ID
pub const CONNECT_RULE_ID: &str = "connect";
/// 내장 connect 규칙 우선순위
pub const CONNECT_RULE_PRIORITY: u32 = 100;

/// 내장 connect 패턴
///
/// 퍼실리티 괄호는 `T[Auth:42]`와 `T[Auth]:42` 두 형태를 모두 받습니다.
/// 숫자/단어/공백 클래스는 ASCII로 한정합니다.
pub const CONNECT_PATTERN: &str = r".*(?P<time>[0-9]{2}:[0-9]{2}:[0-9]{2}).*connect: (?P<level>[DIWENC]):[0-9.]+[[:space:]]+T?\[(?P<facility>[[:word:][:space:]]+)(?::[0-9]+\]|\]:[0-9]+)[[:space:]]+(?P<message>.*)";

/// 정규식 컴파일 크기 제한 (ReDoS/메모리 폭증 방지)
const REGEX_SIZE_LIMIT: usize = 1 << 20;

const FIELD_NAMES: [&str; 4] = ["time", "level", "facility", "message"];

/// 정규식 추출 규칙
#[derive(Debug, Clone)]
pub struct PatternRule {
    id: String,
    program: String,
    priority: u32,
    regex: Regex,
    named: bool,
}

impl PatternRule {
    /// 새 규칙을 컴파일합니다.
    ///
    /// # Errors
    /// 정규식이 유효하지 않거나 크기 제한을 넘으면 `Regex` 에러
    pub fn new(
        id: impl Into<String>,
        program: impl Into<String>,
        priority: u32,
        pattern: &str,
    ) -> Result<Self, LogShipperError> {
        let regex = RegexBuilder::new(pattern)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()?;
        let named = regex
            .capture_names()
            .flatten()
            .any(|name| FIELD_NAMES.contains(&name));

        Ok(Self {
            id: id.into(),
            program: program.into(),
            priority,
            regex,
            named,
        })
    }

    /// 내장 connect 규칙을 생성합니다.
    pub fn connect() -> Result<Self, LogShipperError> {
        Self::new(
            CONNECT_RULE_ID,
            PROGRAM_CONNECT,
            CONNECT_RULE_PRIORITY,
            CONNECT_PATTERN,
        )
    }

    /// 정규식 원문
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    fn capture(&self, caps: &regex::Captures<'_>, index: usize) -> String {
        let found = if self.named {
            caps.name(FIELD_NAMES[index])
        } else {
            caps.get(index + 1)
        };
        found.map(|m| m.as_str().to_owned()).unwrap_or_default()
    }
}

impl LineRule for PatternRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn extract(&self, line: &str) -> Option<ExtractedFields> {
        let caps = self.regex.captures(line)?;
        Some(ExtractedFields {
            time: self.capture(&caps, 0),
            level: self.capture(&caps, 1),
            facility: self.capture(&caps, 2),
            message: self.capture(&caps, 3),
        })
    }
}
