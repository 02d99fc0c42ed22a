//! 추출 규칙 파일 -- YAML로 정의한 [`PatternRule`](crate::parser::PatternRule) 로딩
//!
//! 규칙 디렉토리의 `.yml`/`.yaml` 파일 하나에 규칙 하나를 둡니다.
//!
//! # 규칙 형식
//! ```yaml
//! id: connect_legacy
//! program: Connect
//! priority: 50
//! pattern: '(?P<time>\d{2}:\d{2}:\d{2}) (?P<level>[A-Z]) (?P<facility>\w+) (?P<message>.*)'
//! enabled: true
//! ```
//!
//! - [`loader`]: 디렉토리 스캔, 크기/개수 제한, 중복 ID 처리
//! - [`types`]: YAML 스키마와 유효성 검증

pub mod loader;
pub mod types;

pub use loader::RuleLoader;
pub use types::RuleDefinition;
