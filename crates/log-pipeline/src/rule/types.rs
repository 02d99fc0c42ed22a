//! 추출 규칙 데이터 타입
//!
//! YAML 규칙 파일에서 역직렬화되는 구조체를 정의합니다.

use serde::{Deserialize, Serialize};

use crate::error::LogShipperError;
use crate::parser::PatternRule;

/// 규칙 ID 최대 길이
const MAX_RULE_ID_LEN: usize = 256;
/// 기본 우선순위 (내장 connect 규칙보다 뒤)
const DEFAULT_PRIORITY: u32 = 500;

/// 추출 규칙 정의 -- 하나의 YAML 규칙 파일에 대응합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// 규칙 고유 ID
    pub id: String,
    /// 매칭 시 기록할 프로그램 이름
    pub program: String,
    /// 우선순위 (작을수록 먼저 시도)
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// 정규식 패턴
    pub pattern: String,
    /// 활성화 여부
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

impl RuleDefinition {
    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogShipperError> {
        if self.id.is_empty() {
            return Err(LogShipperError::RuleValidation {
                rule_id: "(empty)".to_owned(),
                reason: "rule id must not be empty".to_owned(),
            });
        }

        if self.id.len() > MAX_RULE_ID_LEN {
            return Err(LogShipperError::RuleValidation {
                rule_id: self.id.clone(),
                reason: format!("rule id must not exceed {MAX_RULE_ID_LEN} characters"),
            });
        }

        if self.program.trim().is_empty() {
            return Err(LogShipperError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "program must not be empty".to_owned(),
            });
        }

        if self.pattern.is_empty() {
            return Err(LogShipperError::RuleValidation {
                rule_id: self.id.clone(),
                reason: "pattern must not be empty".to_owned(),
            });
        }

        Ok(())
    }

    /// 정규식을 컴파일하여 실행 가능한 규칙으로 변환합니다.
    ///
    /// # Errors
    /// 정규식이 유효하지 않으면 `RuleValidation` 에러
    pub fn compile(&self) -> Result<PatternRule, LogShipperError> {
        self.validate()?;
        PatternRule::new(&self.id, &self.program, self.priority, &self.pattern).map_err(|e| {
            LogShipperError::RuleValidation {
                rule_id: self.id.clone(),
                reason: format!("invalid pattern: {e}"),
            }
        })
    }
}
