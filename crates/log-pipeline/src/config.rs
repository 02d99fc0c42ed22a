//! 로그 파이프라인 설정
//!
//! [`ShipperConfig`]는 core의 [`LogferryConfig`](logferry_core::config::LogferryConfig)에서
//! 파이프라인이 사용하는 값만 모아, 문자열 선택지를 타입으로 바꾼 설정입니다.
//! 큐 URL과 싱크 엔드포인트는 각 클라이언트가 들고 있으므로 여기에 두지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use logferry_core::config::LogferryConfig;
//! use logferry_log_pipeline::config::ShipperConfig;
//!
//! let core_config = LogferryConfig::load("logferry.toml").await?;
//! let config = ShipperConfig::from_core(&core_config)?;
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logferry_core::config::{
    LogferryConfig, MAX_RECEIVE_MESSAGES, MAX_RETRY_BACKOFF_MS, MAX_SINK_ATTEMPTS,
    MAX_WAIT_TIME_SECS,
};

use crate::error::LogShipperError;

/// 연속 수신 실패가 이 값 이상이면 Degraded
pub const DEGRADED_RECEIVE_FAILURES: u32 = 5;

/// 알림 메시지 확인(삭제) 시점
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// 모든 엔트리를 핸드오프 채널에 넣은 직후 (기본값)
    ///
    /// 크래시 시 채널에 남아 있던 엔트리는 유실됩니다 (at-most-once).
    #[default]
    AfterHandoff,
    /// 싱크가 모든 엔트리의 전달(또는 dead letter 기록)을 확인한 뒤 (at-least-once)
    AfterDelivery,
}

/// 디코딩할 수 없는 메시지 처리 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedMessageAction {
    /// 확인하지 않고 남겨 큐의 redrive 정책에 맡김 (기본값)
    #[default]
    Leave,
    /// 확인(삭제)하여 버림
    Delete,
}

/// 최종 전달 실패 시 처리 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    /// 에러 로그 후 버림 (기본값)
    #[default]
    Drop,
    /// dead letter 파일에 JSON 한 줄로 추가
    DeadLetter,
}

impl AckMode {
    /// 설정 파일 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfterHandoff => "after_handoff",
            Self::AfterDelivery => "after_delivery",
        }
    }

    /// 문자열에서 파싱합니다 (대소문자, `-`/`_` 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "after_handoff" | "handoff" => Some(Self::AfterHandoff),
            "after_delivery" | "delivery" => Some(Self::AfterDelivery),
            _ => None,
        }
    }
}

impl MalformedMessageAction {
    /// 설정 파일 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::Delete => "delete",
        }
    }

    /// 문자열에서 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "leave" => Some(Self::Leave),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl FailureAction {
    /// 설정 파일 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::DeadLetter => "dead_letter",
        }
    }

    /// 문자열에서 파싱합니다 (대소문자, `-`/`_` 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "drop" => Some(Self::Drop),
            "dead_letter" => Some(Self::DeadLetter),
            _ => None,
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MalformedMessageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FailureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_choice<T>(
    field: &str,
    value: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, LogShipperError> {
    parse(value).ok_or_else(|| LogShipperError::Config {
        field: field.to_owned(),
        reason: format!("unknown value '{value}'"),
    })
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipperConfig {
    // --- queue ---
    /// 한 번에 수신할 최대 메시지 수 (1..=10)
    pub max_messages: u32,
    /// long polling 대기 시간 (0..=20초)
    pub wait_time_secs: u32,
    /// 수신 호출 전체 타임아웃 (초)
    pub receive_timeout_secs: u64,
    /// 수신 실패 후 대기 (밀리초)
    pub error_backoff_ms: u64,

    // --- storage ---
    /// 오브젝트 다운로드 타임아웃 (초)
    pub fetch_timeout_secs: u64,
    /// 압축된 오브젝트 최대 크기 (바이트)
    pub max_object_bytes: u64,
    /// 압축 해제 후 최대 크기 (바이트)
    pub max_decompressed_bytes: u64,

    // --- sink ---
    /// 엔트리당 최대 시도 횟수
    pub max_attempts: u32,
    /// 재시도 기본 대기 (밀리초, 시도 횟수만큼 선형 증가)
    pub retry_backoff_ms: u64,
    /// 최종 실패 시 처리
    pub on_failure: FailureAction,
    /// dead letter 파일 경로
    pub dead_letter_path: String,

    // --- pipeline ---
    /// 핸드오프 채널 용량
    pub handoff_capacity: usize,
    /// 메시지 확인 시점
    pub ack_mode: AckMode,
    /// 디코딩 불가 메시지 처리
    pub on_malformed_message: MalformedMessageAction,
    /// 추가 규칙 디렉토리 (빈 문자열이면 로드하지 않음)
    pub rules_dir: String,
    /// 정상 종료 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            max_messages: MAX_RECEIVE_MESSAGES,
            wait_time_secs: MAX_WAIT_TIME_SECS,
            receive_timeout_secs: 30,
            error_backoff_ms: 1_000,
            fetch_timeout_secs: 60,
            max_object_bytes: 256 * 1024 * 1024,
            max_decompressed_bytes: 1024 * 1024 * 1024,
            max_attempts: 3,
            retry_backoff_ms: 500,
            on_failure: FailureAction::Drop,
            dead_letter_path: String::new(),
            handoff_capacity: 128,
            ack_mode: AckMode::AfterHandoff,
            on_malformed_message: MalformedMessageAction::Leave,
            rules_dir: String::new(),
            shutdown_timeout_secs: 30,
        }
    }
}

impl ShipperConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// 선택지 문자열이 알 수 없는 값이면 `Config` 에러를 반환합니다.
    pub fn from_core(core: &LogferryConfig) -> Result<Self, LogShipperError> {
        let config = Self {
            max_messages: core.queue.max_messages,
            wait_time_secs: core.queue.wait_time_secs,
            receive_timeout_secs: core.queue.receive_timeout_secs,
            error_backoff_ms: core.queue.error_backoff_ms,
            fetch_timeout_secs: core.storage.fetch_timeout_secs,
            max_object_bytes: core.storage.max_object_bytes,
            max_decompressed_bytes: core.storage.max_decompressed_bytes,
            max_attempts: core.sink.max_attempts,
            retry_backoff_ms: core.sink.retry_backoff_ms,
            on_failure: parse_choice(
                "sink.on_failure",
                &core.sink.on_failure,
                FailureAction::from_str_loose,
            )?,
            dead_letter_path: core.sink.dead_letter_path.clone(),
            handoff_capacity: core.pipeline.handoff_capacity,
            ack_mode: parse_choice(
                "pipeline.ack_mode",
                &core.pipeline.ack_mode,
                AckMode::from_str_loose,
            )?,
            on_malformed_message: parse_choice(
                "pipeline.on_malformed_message",
                &core.pipeline.on_malformed_message,
                MalformedMessageAction::from_str_loose,
            )?,
            rules_dir: core.pipeline.rules_dir.clone(),
            shutdown_timeout_secs: core.pipeline.shutdown_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogShipperError> {
        if self.max_messages == 0 || self.max_messages > MAX_RECEIVE_MESSAGES {
            return Err(config_error(
                "max_messages",
                format!("must be 1-{MAX_RECEIVE_MESSAGES}"),
            ));
        }

        if self.wait_time_secs > MAX_WAIT_TIME_SECS {
            return Err(config_error(
                "wait_time_secs",
                format!("must be 0-{MAX_WAIT_TIME_SECS}"),
            ));
        }

        if self.receive_timeout_secs <= u64::from(self.wait_time_secs) {
            return Err(config_error(
                "receive_timeout_secs",
                "must be greater than wait_time_secs",
            ));
        }

        if self.fetch_timeout_secs == 0 {
            return Err(config_error("fetch_timeout_secs", "must be greater than 0"));
        }

        if self.max_object_bytes == 0 || self.max_decompressed_bytes == 0 {
            return Err(config_error(
                "max_object_bytes",
                "size limits must be greater than 0",
            ));
        }

        if self.max_attempts == 0 || self.max_attempts > MAX_SINK_ATTEMPTS {
            return Err(config_error(
                "max_attempts",
                format!("must be between 1 and {MAX_SINK_ATTEMPTS}"),
            ));
        }

        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(config_error(
                "retry_backoff_ms",
                format!("must be at most {MAX_RETRY_BACKOFF_MS}"),
            ));
        }

        if self.on_failure == FailureAction::DeadLetter && self.dead_letter_path.is_empty() {
            return Err(config_error(
                "dead_letter_path",
                "required when on_failure is dead_letter",
            ));
        }

        if self.handoff_capacity == 0 {
            return Err(config_error("handoff_capacity", "must be at least 1"));
        }

        Ok(())
    }

    /// 수신 호출 타임아웃
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }

    /// 수신 실패 후 대기 시간
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// 오브젝트 다운로드 타임아웃
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// 재시도 기본 대기 시간
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// 정상 종료 대기 시간
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> LogShipperError {
    LogShipperError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct ShipperConfigBuilder {
    config: ShipperConfig,
}

impl ShipperConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 한 번에 수신할 메시지 수를 설정합니다.
    pub fn max_messages(mut self, count: u32) -> Self {
        self.config.max_messages = count;
        self
    }

    /// long polling 대기 시간을 설정합니다.
    pub fn wait_time_secs(mut self, secs: u32) -> Self {
        self.config.wait_time_secs = secs;
        self
    }

    /// 수신 실패 후 대기 시간(밀리초)을 설정합니다.
    pub fn error_backoff_ms(mut self, ms: u64) -> Self {
        self.config.error_backoff_ms = ms;
        self
    }

    /// 오브젝트 크기 제한을 설정합니다.
    pub fn max_object_bytes(mut self, bytes: u64) -> Self {
        self.config.max_object_bytes = bytes;
        self
    }

    /// 압축 해제 크기 제한을 설정합니다.
    pub fn max_decompressed_bytes(mut self, bytes: u64) -> Self {
        self.config.max_decompressed_bytes = bytes;
        self
    }

    /// 전달 최대 시도 횟수를 설정합니다.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// 재시도 기본 대기 시간(밀리초)을 설정합니다.
    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// 최종 실패 처리를 drop으로 설정합니다.
    pub fn drop_on_failure(mut self) -> Self {
        self.config.on_failure = FailureAction::Drop;
        self
    }

    /// 최종 실패 시 dead letter 파일에 기록하도록 설정합니다.
    pub fn dead_letter(mut self, path: impl Into<String>) -> Self {
        self.config.on_failure = FailureAction::DeadLetter;
        self.config.dead_letter_path = path.into();
        self
    }

    /// 핸드오프 채널 용량을 설정합니다.
    pub fn handoff_capacity(mut self, capacity: usize) -> Self {
        self.config.handoff_capacity = capacity;
        self
    }

    /// 메시지 확인 시점을 설정합니다.
    pub fn ack_mode(mut self, mode: AckMode) -> Self {
        self.config.ack_mode = mode;
        self
    }

    /// 디코딩 불가 메시지 처리를 설정합니다.
    pub fn on_malformed_message(mut self, action: MalformedMessageAction) -> Self {
        self.config.on_malformed_message = action;
        self
    }

    /// 추가 규칙 디렉토리를 설정합니다.
    pub fn rules_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.rules_dir = dir.into();
        self
    }

    /// 정상 종료 대기 시간(초)을 설정합니다.
    pub fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_timeout_secs = secs;
        self
    }

    /// 설정을 검증하고 `ShipperConfig`를 생성합니다.
    pub fn build(self) -> Result<ShipperConfig, LogShipperError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
