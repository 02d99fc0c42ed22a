//! 로그 파이프라인 에러 타입
//!
//! [`LogShipperError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! 종류마다 처리 방식이 고정되어 있습니다.
//!
//! | 종류 | 처리 |
//! |---|---|
//! | `EnvelopeDecode`, `MalformedKey` | 해당 메시지만 격리, `on_malformed_message` 정책 적용 |
//! | `Retrieval`, `Decompression` | 오브젝트 중단, 메시지 미확인 |
//! | `Delivery` | 재시도 후 drop 또는 dead letter |
//! | `Queue` | 로그 후 backoff |
//!
//! `From<LogShipperError> for LogferryError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use logferry_core::error::{ConfigError, LogferryError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogShipperError {
    /// 알림 메시지 본문을 해석할 수 없음
    #[error("envelope decode error: {0}")]
    EnvelopeDecode(String),

    /// 오브젝트 키가 `<date>/<correlationId>/...` 형식이 아님
    #[error("malformed object key '{key}': {reason}")]
    MalformedKey {
        /// 문제가 된 키
        key: String,
        /// 사유
        reason: String,
    },

    /// 오브젝트 조회 실패 (네트워크, 권한, 크기 초과, 타임아웃)
    #[error("retrieval error: {bucket}/{key}: {reason}")]
    Retrieval {
        /// 버킷
        bucket: String,
        /// 키
        key: String,
        /// 실패 사유
        reason: String,
    },

    /// gzip 해제 실패
    #[error("decompression error: {key}: {reason}")]
    Decompression {
        /// 키
        key: String,
        /// 실패 사유
        reason: String,
    },

    /// 인덱싱 백엔드 전달 실패
    #[error("delivery error (status {}): {reason}", display_status(.status))]
    Delivery {
        /// HTTP 상태 코드 (전송 계층 실패 시 None)
        status: Option<u16>,
        /// 실패 사유
        reason: String,
    },

    /// 큐 수신/삭제 실패
    #[error("queue error: {0}")]
    Queue(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 ID
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_owned(), |code| code.to_string())
}

impl LogShipperError {
    /// 재시도하면 성공할 수 있는 전달 실패인지 확인합니다.
    ///
    /// 전송 계층 실패, 429, 5xx만 재시도 대상입니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Delivery { status: None, .. } => true,
            Self::Delivery {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }

    /// 메시지 단위로 격리되는 디코딩 계열 에러인지 확인합니다.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::EnvelopeDecode(_) | Self::MalformedKey { .. })
    }
}

impl From<LogShipperError> for LogferryError {
    fn from(err: LogShipperError) -> Self {
        match err {
            LogShipperError::Config { field, reason } => {
                LogferryError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogShipperError::Io(e) => LogferryError::Io(e),
            LogShipperError::Channel(reason) => {
                LogferryError::Pipeline(PipelineError::ChannelSend(reason))
            }
            other => LogferryError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
