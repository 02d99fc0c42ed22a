//! 라인 파싱 모듈 -- 로그 라인 하나를 [`LogEntry`] 하나로 변환합니다.
//!
//! [`LineParser`]는 우선순위 순으로 정렬된 [`LineRule`] 목록을 차례로 시도하고,
//! 어떤 규칙에도 매칭되지 않으면 `Kernel` fallback을 적용합니다.
//! 파싱은 I/O가 없는 순수 함수이며 실패하지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use logferry_log_pipeline::parser::LineParser;
//!
//! let parser = LineParser::new()?;
//! let entry = parser.parse("12:34:56 connect: E:10.0.0.1 T[Auth]:42 login failed");
//! assert_eq!(entry.program, "Connect");
//! ```

pub mod pattern;

pub use pattern::PatternRule;

use std::fmt;
use std::sync::Arc;

use logferry_core::pipeline::LineRule;
use logferry_core::types::{LogEntry, PROGRAM_KERNEL};

use crate::error::LogShipperError;

/// 라인 파서
///
/// 규칙은 `Arc`로 공유되므로 복제 비용이 낮습니다.
/// 우선순위가 같은 규칙은 등록 순서대로 시도됩니다.
#[derive(Clone, Default)]
pub struct LineParser {
    /// 우선순위 오름차순으로 정렬된 규칙
    rules: Vec<Arc<dyn LineRule>>,
}

impl LineParser {
    /// 내장 connect 규칙이 등록된 파서를 생성합니다.
    pub fn new() -> Result<Self, LogShipperError> {
        let mut parser = Self::fallback_only();
        parser.register(Arc::new(PatternRule::connect()?))?;
        Ok(parser)
    }

    /// fallback만 있는 파서를 생성합니다. 모든 라인이 `Kernel`이 됩니다.
    pub fn fallback_only() -> Self {
        Self::default()
    }

    /// 규칙을 등록합니다.
    ///
    /// # Errors
    /// 같은 ID의 규칙이 이미 있으면 `RuleValidation` 에러
    pub fn register(&mut self, rule: Arc<dyn LineRule>) -> Result<(), LogShipperError> {
        if self.rules.iter().any(|r| r.id() == rule.id()) {
            return Err(LogShipperError::RuleValidation {
                rule_id: rule.id().to_owned(),
                reason: "duplicate rule id".to_owned(),
            });
        }

        // 같은 우선순위 안에서는 등록 순서 유지
        let position = self
            .rules
            .partition_point(|r| r.priority() <= rule.priority());
        self.rules.insert(position, rule);
        Ok(())
    }

    /// 라인 하나를 파싱합니다.
    ///
    /// 반환된 엔트리의 날짜/상관 ID/위치는 비어 있으며
    /// [`LogEntry::with_origin`]으로 채웁니다.
    pub fn parse(&self, raw_line: &str) -> LogEntry {
        for rule in &self.rules {
            if let Some(fields) = rule.extract(raw_line) {
                return LogEntry {
                    time: fields.time,
                    program: rule.program().to_owned(),
                    facility: fields.facility,
                    level: fields.level,
                    message: fields.message,
                    raw_line: raw_line.to_owned(),
                    ..LogEntry::default()
                };
            }
        }

        LogEntry {
            program: PROGRAM_KERNEL.to_owned(),
            raw_line: raw_line.to_owned(),
            ..LogEntry::default()
        }
    }

    /// 등록된 규칙 수 (fallback 제외)
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 시도 순서대로 규칙 ID 목록을 반환합니다.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }
}

impl fmt::Debug for LineParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineParser")
            .field("rules", &self.rule_ids())
            .finish()
    }
}
