//! 설정 관리 — logferry.toml 파싱 및 런타임 설정
//!
//! [`LogferryConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGFERRY_QUEUE_URL=https://...` 형식)
//! 3. 설정 파일 (`logferry.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logferry_core::error::LogferryError> {
//! use logferry_core::config::LogferryConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogferryConfig::load("logferry.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogferryConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogferryError};

/// 큐 한 번 수신의 최대 메시지 수 (SQS 제한)
pub const MAX_RECEIVE_MESSAGES: u32 = 10;
/// long polling 최대 대기 시간 (SQS 제한)
pub const MAX_WAIT_TIME_SECS: u32 = 20;
/// 문서 전송 최대 시도 횟수
pub const MAX_SINK_ATTEMPTS: u32 = 10;
/// 재시도 기본 대기 시간 상한 (밀리초)
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

/// logferry 통합 설정
///
/// `logferry.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogferryConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// AWS 클라이언트 설정
    #[serde(default)]
    pub aws: AwsConfig,
    /// 알림 큐 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 오브젝트 스토어 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 인덱싱 싱크 설정
    #[serde(default)]
    pub sink: SinkConfig,
    /// 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineSection,
}

impl LogferryConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogferryError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogferryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogferryError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogferryError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogferryError> {
        toml::from_str(toml_str).map_err(|e| {
            LogferryError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGFERRY_{SECTION}_{FIELD}`
    /// 예: `LOGFERRY_SINK_ENDPOINT=http://es:9200/logs/_doc`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGFERRY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGFERRY_GENERAL_LOG_FORMAT");

        // AWS
        override_string(&mut self.aws.region, "LOGFERRY_AWS_REGION");
        override_string(&mut self.aws.endpoint_url, "LOGFERRY_AWS_ENDPOINT_URL");
        override_bool(
            &mut self.aws.force_path_style,
            "LOGFERRY_AWS_FORCE_PATH_STYLE",
        );

        // Queue
        override_string(&mut self.queue.url, "LOGFERRY_QUEUE_URL");
        override_u32(&mut self.queue.max_messages, "LOGFERRY_QUEUE_MAX_MESSAGES");
        override_u32(
            &mut self.queue.wait_time_secs,
            "LOGFERRY_QUEUE_WAIT_TIME_SECS",
        );
        override_u64(
            &mut self.queue.receive_timeout_secs,
            "LOGFERRY_QUEUE_RECEIVE_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.queue.error_backoff_ms,
            "LOGFERRY_QUEUE_ERROR_BACKOFF_MS",
        );

        // Storage
        override_u64(
            &mut self.storage.fetch_timeout_secs,
            "LOGFERRY_STORAGE_FETCH_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.storage.max_object_bytes,
            "LOGFERRY_STORAGE_MAX_OBJECT_BYTES",
        );
        override_u64(
            &mut self.storage.max_decompressed_bytes,
            "LOGFERRY_STORAGE_MAX_DECOMPRESSED_BYTES",
        );

        // Sink
        override_string(&mut self.sink.endpoint, "LOGFERRY_SINK_ENDPOINT");
        override_u64(
            &mut self.sink.request_timeout_secs,
            "LOGFERRY_SINK_REQUEST_TIMEOUT_SECS",
        );
        override_u32(&mut self.sink.max_attempts, "LOGFERRY_SINK_MAX_ATTEMPTS");
        override_u64(
            &mut self.sink.retry_backoff_ms,
            "LOGFERRY_SINK_RETRY_BACKOFF_MS",
        );
        override_string(&mut self.sink.on_failure, "LOGFERRY_SINK_ON_FAILURE");
        override_string(
            &mut self.sink.dead_letter_path,
            "LOGFERRY_SINK_DEAD_LETTER_PATH",
        );

        // Pipeline
        override_usize(
            &mut self.pipeline.handoff_capacity,
            "LOGFERRY_PIPELINE_HANDOFF_CAPACITY",
        );
        override_string(&mut self.pipeline.ack_mode, "LOGFERRY_PIPELINE_ACK_MODE");
        override_string(
            &mut self.pipeline.on_malformed_message,
            "LOGFERRY_PIPELINE_ON_MALFORMED_MESSAGE",
        );
        override_string(&mut self.pipeline.rules_dir, "LOGFERRY_PIPELINE_RULES_DIR");
        override_u64(
            &mut self.pipeline.shutdown_timeout_secs,
            "LOGFERRY_PIPELINE_SHUTDOWN_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogferryError> {
        check_one_of(
            "general.log_level",
            &self.general.log_level,
            &["trace", "debug", "info", "warn", "error"],
        )?;
        check_one_of(
            "general.log_format",
            &self.general.log_format,
            &["json", "pretty"],
        )?;

        // queue
        if self.queue.url.trim().is_empty() {
            return Err(invalid("queue.url", "must not be empty"));
        }
        if self.queue.max_messages == 0 || self.queue.max_messages > MAX_RECEIVE_MESSAGES {
            return Err(invalid(
                "queue.max_messages",
                format!("must be between 1 and {MAX_RECEIVE_MESSAGES}"),
            ));
        }
        if self.queue.wait_time_secs > MAX_WAIT_TIME_SECS {
            return Err(invalid(
                "queue.wait_time_secs",
                format!("must be at most {MAX_WAIT_TIME_SECS}"),
            ));
        }
        if self.queue.receive_timeout_secs <= u64::from(self.queue.wait_time_secs) {
            return Err(invalid(
                "queue.receive_timeout_secs",
                "must be greater than queue.wait_time_secs",
            ));
        }

        // storage
        if self.storage.fetch_timeout_secs == 0 {
            return Err(invalid("storage.fetch_timeout_secs", "must be greater than 0"));
        }
        if self.storage.max_object_bytes == 0 {
            return Err(invalid("storage.max_object_bytes", "must be greater than 0"));
        }
        if self.storage.max_decompressed_bytes == 0 {
            return Err(invalid(
                "storage.max_decompressed_bytes",
                "must be greater than 0",
            ));
        }

        // sink
        let endpoint = self.sink.endpoint.trim();
        if endpoint.is_empty() {
            return Err(invalid("sink.endpoint", "must not be empty"));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(invalid("sink.endpoint", "must be an http(s) URL"));
        }
        if self.sink.request_timeout_secs == 0 {
            return Err(invalid("sink.request_timeout_secs", "must be greater than 0"));
        }
        if self.sink.max_attempts == 0 || self.sink.max_attempts > MAX_SINK_ATTEMPTS {
            return Err(invalid(
                "sink.max_attempts",
                format!("must be between 1 and {MAX_SINK_ATTEMPTS}"),
            ));
        }
        if self.sink.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(invalid(
                "sink.retry_backoff_ms",
                format!("must be at most {MAX_RETRY_BACKOFF_MS}"),
            ));
        }
        check_one_of(
            "sink.on_failure",
            &self.sink.on_failure,
            &["drop", "dead_letter"],
        )?;
        if self.sink.on_failure == "dead_letter" && self.sink.dead_letter_path.is_empty() {
            return Err(invalid(
                "sink.dead_letter_path",
                "must be set when sink.on_failure is dead_letter",
            ));
        }

        // pipeline
        if self.pipeline.handoff_capacity == 0 {
            return Err(invalid("pipeline.handoff_capacity", "must be at least 1"));
        }
        check_one_of(
            "pipeline.ack_mode",
            &self.pipeline.ack_mode,
            &["after_handoff", "after_delivery"],
        )?;
        check_one_of(
            "pipeline.on_malformed_message",
            &self.pipeline.on_malformed_message,
            &["leave", "delete"],
        )?;

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LogferryError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), LogferryError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// AWS 클라이언트 설정
///
/// 자격 증명은 기본 provider chain에서 가져오므로 여기에 두지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// 리전 (비어 있으면 provider chain 기본값)
    pub region: String,
    /// 커스텀 엔드포인트 (LocalStack, MinIO 등). 비어 있으면 AWS 기본값
    pub endpoint_url: String,
    /// S3 path-style 주소 사용 여부
    pub force_path_style: bool,
}

/// 알림 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 큐 URL
    pub url: String,
    /// 한 번에 수신할 최대 메시지 수 (1..=10)
    pub max_messages: u32,
    /// long polling 대기 시간 (0..=20초)
    pub wait_time_secs: u32,
    /// 수신 호출 전체 타임아웃 (초)
    pub receive_timeout_secs: u64,
    /// 수신 실패 후 재시도 전 대기 (밀리초)
    pub error_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_messages: MAX_RECEIVE_MESSAGES,
            wait_time_secs: MAX_WAIT_TIME_SECS,
            receive_timeout_secs: 30,
            error_backoff_ms: 1_000,
        }
    }
}

/// 오브젝트 스토어 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 오브젝트 다운로드 타임아웃 (초)
    pub fetch_timeout_secs: u64,
    /// 압축된 오브젝트 최대 크기 (바이트)
    pub max_object_bytes: u64,
    /// 압축 해제 후 최대 크기 (바이트)
    pub max_decompressed_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 60,
            max_object_bytes: 256 * 1024 * 1024,            // 256MB
            max_decompressed_bytes: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// 인덱싱 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// 문서를 POST할 HTTP 엔드포인트
    pub endpoint: String,
    /// 요청당 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 엔트리당 최대 시도 횟수
    pub max_attempts: u32,
    /// 재시도 간 기본 대기 (밀리초, 시도 횟수만큼 선형 증가)
    pub retry_backoff_ms: u64,
    /// 최종 실패 시 처리 (drop, dead_letter)
    pub on_failure: String,
    /// dead letter JSONL 파일 경로
    pub dead_letter_path: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            request_timeout_secs: 10,
            max_attempts: 3,
            retry_backoff_ms: 500,
            on_failure: "drop".to_owned(),
            dead_letter_path: "/var/lib/logferry/dead-letter.jsonl".to_owned(),
        }
    }
}

/// 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// 컨슈머 → 싱크 핸드오프 채널 용량
    pub handoff_capacity: usize,
    /// 메시지 확인 시점 (after_handoff, after_delivery)
    pub ack_mode: String,
    /// 디코딩 불가 메시지 처리 (leave, delete)
    pub on_malformed_message: String,
    /// 추가 추출 규칙 YAML 디렉토리 (비어 있으면 내장 규칙만 사용)
    pub rules_dir: String,
    /// 정상 종료 대기 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            handoff_capacity: 128,
            ack_mode: "after_handoff".to_owned(),
            on_malformed_message: "leave".to_owned(),
            rules_dir: String::new(),
            shutdown_timeout_secs: 30,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> LogferryConfig {
        let mut config = LogferryConfig::default();
        config.queue.url = "https://sqs.us-east-1.amazonaws.com/123456789012/logs".to_owned();
        config.sink.endpoint = "http://localhost:9200/logs/_doc".to_owned();
        config
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = LogferryConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.queue.max_messages, 10);
        assert_eq!(config.queue.wait_time_secs, 20);
        assert_eq!(config.sink.max_attempts, 3);
        assert_eq!(config.sink.on_failure, "drop");
        assert_eq!(config.pipeline.handoff_capacity, 128);
        assert_eq!(config.pipeline.ack_mode, "after_handoff");
        assert_eq!(config.pipeline.on_malformed_message, "leave");
        assert!(config.pipeline.rules_dir.is_empty());
    }

    #[test]
    fn default_config_requires_queue_url() {
        let err = LogferryConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("queue.url"));
    }

    #[test]
    fn config_with_endpoints_passes_validation() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = LogferryConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.storage.fetch_timeout_secs, 60);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[queue]
url = "https://sqs.eu-west-1.amazonaws.com/1/q"
max_messages = 5

[sink]
endpoint = "https://search.internal/logs/_doc"
"#;
        let config = LogferryConfig::parse(toml).unwrap();
        assert_eq!(config.queue.max_messages, 5);
        // wait_time_secs는 기본값 유지
        assert_eq!(config.queue.wait_time_secs, 20);
        assert_eq!(config.sink.endpoint, "https://search.internal/logs/_doc");
        config.validate().unwrap();
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"

[aws]
region = "eu-central-1"
endpoint_url = "http://localhost:4566"
force_path_style = true

[queue]
url = "http://localhost:4566/000000000000/logs"
max_messages = 1
wait_time_secs = 0
receive_timeout_secs = 5
error_backoff_ms = 250

[storage]
fetch_timeout_secs = 15
max_object_bytes = 1048576
max_decompressed_bytes = 8388608

[sink]
endpoint = "http://localhost:9200/logs/_doc"
request_timeout_secs = 3
max_attempts = 1
retry_backoff_ms = 0
on_failure = "dead_letter"
dead_letter_path = "/tmp/dead.jsonl"

[pipeline]
handoff_capacity = 1
ack_mode = "after_delivery"
on_malformed_message = "delete"
rules_dir = "/etc/logferry/rules"
shutdown_timeout_secs = 5
"#;
        let config = LogferryConfig::parse(toml).unwrap();
        assert_eq!(config.aws.region, "eu-central-1");
        assert!(config.aws.force_path_style);
        assert_eq!(config.queue.wait_time_secs, 0);
        assert_eq!(config.storage.max_object_bytes, 1_048_576);
        assert_eq!(config.sink.on_failure, "dead_letter");
        assert_eq!(config.pipeline.handoff_capacity, 1);
        assert_eq!(config.pipeline.ack_mode, "after_delivery");
        config.validate().unwrap();
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = LogferryConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LogferryError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = valid_config();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_max_messages_out_of_range() {
        let mut config = valid_config();
        config.queue.max_messages = 0;
        assert!(config.validate().is_err());
        config.queue.max_messages = 11;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue.max_messages"));
    }

    #[test]
    fn validate_rejects_wait_time_over_limit() {
        let mut config = valid_config();
        config.queue.wait_time_secs = 21;
        config.queue.receive_timeout_secs = 60;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue.wait_time_secs"));
    }

    #[test]
    fn validate_rejects_receive_timeout_not_above_wait_time() {
        let mut config = valid_config();
        config.queue.receive_timeout_secs = 20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("receive_timeout_secs"));
    }

    #[test]
    fn validate_rejects_non_http_endpoint() {
        let mut config = valid_config();
        config.sink.endpoint = "ftp://example.com".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sink.endpoint"));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = valid_config();
        config.sink.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sink.max_attempts"));
    }

    #[test]
    fn validate_rejects_excessive_retry_backoff() {
        let mut config = valid_config();
        config.sink.retry_backoff_ms = MAX_RETRY_BACKOFF_MS + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sink.retry_backoff_ms"));
    }

    #[test]
    fn validate_rejects_dead_letter_without_path() {
        let mut config = valid_config();
        config.sink.on_failure = "dead_letter".to_owned();
        config.sink.dead_letter_path = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dead_letter_path"));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut config = valid_config();
        config.pipeline.handoff_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("handoff_capacity"));
    }

    #[test]
    fn validate_rejects_unknown_ack_mode() {
        let mut config = valid_config();
        config.pipeline.ack_mode = "never".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ack_mode"));
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut config = LogferryConfig::default();
        // SAFETY: serial_test로 환경변수 접근을 직렬화합니다.
        unsafe { std::env::set_var("LOGFERRY_QUEUE_URL", "https://sqs.local/q") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("LOGFERRY_QUEUE_URL") };
        assert_eq!(config.queue.url, "https://sqs.local/q");
    }

    #[test]
    #[serial]
    fn env_override_numeric_valid() {
        let mut config = LogferryConfig::default();
        // SAFETY: serial_test로 환경변수 접근을 직렬화합니다.
        unsafe { std::env::set_var("LOGFERRY_PIPELINE_HANDOFF_CAPACITY", "4") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("LOGFERRY_PIPELINE_HANDOFF_CAPACITY") };
        assert_eq!(config.pipeline.handoff_capacity, 4);
    }

    #[test]
    #[serial]
    fn env_override_invalid_keeps_original() {
        let mut config = LogferryConfig::default();
        // SAFETY: serial_test로 환경변수 접근을 직렬화합니다.
        unsafe {
            std::env::set_var("LOGFERRY_SINK_MAX_ATTEMPTS", "many");
            std::env::set_var("LOGFERRY_AWS_FORCE_PATH_STYLE", "yes");
        }
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGFERRY_SINK_MAX_ATTEMPTS");
            std::env::remove_var("LOGFERRY_AWS_FORCE_PATH_STYLE");
        }
        assert_eq!(config.sink.max_attempts, 3);
        assert!(!config.aws.force_path_style);
    }

    #[test]
    #[serial]
    fn env_override_missing_var_keeps_original() {
        let mut config = LogferryConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.pipeline.ack_mode, "after_handoff");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = valid_config();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = LogferryConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.queue.url, config.queue.url);
        assert_eq!(parsed.sink.endpoint, config.sink.endpoint);
        assert_eq!(parsed.pipeline.handoff_capacity, config.pipeline.handoff_capacity);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LogferryConfig::from_file("/nonexistent/logferry.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogferryError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
