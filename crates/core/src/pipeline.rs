//! 파이프라인 trait — 모듈 확장 포인트 정의

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LogferryError;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하 (사유 포함)
    Degraded(String),
    /// 비정상 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 장기 실행 모듈의 생명주기 trait
///
/// ```text
/// Initialized → start() → Running → stop() → Stopped
/// ```
pub trait Pipeline: Send {
    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogferryError>> + Send;

    /// 진행 중인 작업을 마무리하고 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogferryError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 추출 규칙이 로그 라인에서 뽑아낸 구조화 필드
///
/// 규칙에 해당 캡처가 없으면 빈 문자열로 남습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    /// 시각 (HH:MM:SS)
    pub time: String,
    /// 레벨 코드
    pub level: String,
    /// 퍼실리티
    pub facility: String,
    /// 메시지 본문
    pub message: String,
}

/// 로그 라인 추출 규칙 trait
///
/// 새로운 로그 형식을 지원하려면 이 trait을 구현하고
/// 라인 파서에 등록합니다. 우선순위 값이 작을수록 먼저 시도됩니다.
pub trait LineRule: Send + Sync {
    /// 규칙 식별자
    fn id(&self) -> &str;

    /// 매칭 시 `LogEntry.program`에 기록할 프로그램 이름
    fn program(&self) -> &str;

    /// 우선순위 (오름차순으로 시도)
    fn priority(&self) -> u32;

    /// 라인에서 필드를 추출합니다. 매칭되지 않으면 `None`.
    fn extract(&self, line: &str) -> Option<ExtractedFields>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("down".to_owned()).is_unhealthy());
    }
}
