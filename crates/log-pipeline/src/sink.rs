//! 인덱싱 백엔드 전달
//!
//! [`ForwardingSink`]는 전달 채널에서 엔트리를 하나씩 꺼내 [`DocumentSink`]로
//! 보냅니다. 전달은 순차적이며, 현재 엔트리의 전달이 끝나야 다음 엔트리를 꺼냅니다.
//!
//! 재시도 정책:
//! - 전송 계층 실패, 429, 5xx만 재시도합니다.
//! - 시도 사이에 `retry_backoff * attempt`만큼 대기합니다.
//! - 마지막 시도까지 실패하면 `on_failure`에 따라 버리거나 dead letter 파일에 기록합니다.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use logferry_core::types::LogEntry;

use crate::config::{FailureAction, ShipperConfig};
use crate::error::LogShipperError;
use crate::stats::ShipperStats;

/// 오류 응답 본문을 로그에 남길 최대 길이
const MAX_ERROR_BODY_LEN: usize = 512;

/// 문서 전송 추상화
pub trait DocumentSink: Send + Sync + 'static {
    /// 엔트리 하나를 JSON 문서로 전송합니다.
    ///
    /// # Errors
    /// 전송 실패 또는 비성공 응답 시 `Delivery`
    fn send(&self, entry: &LogEntry) -> impl Future<Output = Result<(), LogShipperError>> + Send;
}

/// HTTP POST 기반 문서 전송
pub struct HttpDocumentSink {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpDocumentSink {
    /// 엔드포인트와 요청 타임아웃으로 생성합니다.
    ///
    /// # Errors
    /// 엔드포인트 URL이 유효하지 않거나 HTTP 클라이언트를 만들 수 없으면 `Config`
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, LogShipperError> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|e| LogShipperError::Config {
            field: "sink.endpoint".to_owned(),
            reason: format!("invalid URL: {e}"),
        })?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LogShipperError::Config {
                field: "sink.request_timeout_secs".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, endpoint })
    }

    /// 대상 엔드포인트
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

impl DocumentSink for HttpDocumentSink {
    async fn send(&self, entry: &LogEntry) -> Result<(), LogShipperError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(entry)
            .send()
            .await
            .map_err(|e| LogShipperError::Delivery {
                status: None,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                status = status.as_u16(),
                correlation_id = %entry.correlation_id,
                "document accepted"
            );
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY_LEN {
            let cut = (0..=MAX_ERROR_BODY_LEN)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }

        Err(LogShipperError::Delivery {
            status: Some(status.as_u16()),
            reason: format!("backend rejected document: {body}"),
        })
    }
}

/// 전달 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 백엔드가 수락함
    Delivered,
    /// 재시도 소진 후 dead letter 파일에 기록됨
    DeadLettered,
    /// 재시도 소진 후 버려짐
    Dropped,
}

impl DeliveryOutcome {
    /// 엔트리가 유실되지 않았는지 확인합니다.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Delivered | Self::DeadLettered)
    }
}

/// 전달 채널로 넘어가는 단위
#[derive(Debug)]
pub struct HandoffItem {
    /// 전달할 엔트리
    pub entry: LogEntry,
    /// 전달 결과 통지 (after_delivery 모드에서만 사용)
    pub receipt: Option<oneshot::Sender<DeliveryOutcome>>,
}

impl HandoffItem {
    /// 결과 통지 없는 항목을 생성합니다.
    pub fn new(entry: LogEntry) -> Self {
        Self {
            entry,
            receipt: None,
        }
    }

    /// 결과 통지가 붙은 항목과 수신측을 생성합니다.
    pub fn with_receipt(entry: LogEntry) -> (Self, oneshot::Receiver<DeliveryOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                entry,
                receipt: Some(tx),
            },
            rx,
        )
    }
}

/// 전달 채널 소비자
pub struct ForwardingSink<D> {
    sink: Arc<D>,
    max_attempts: u32,
    retry_backoff: Duration,
    on_failure: FailureAction,
    dead_letter_path: PathBuf,
    stats: Arc<ShipperStats>,
}

impl<D: DocumentSink> ForwardingSink<D> {
    /// 전송 구현과 설정으로 생성합니다.
    pub fn new(sink: Arc<D>, config: &ShipperConfig, stats: Arc<ShipperStats>) -> Self {
        Self {
            sink,
            max_attempts: config.max_attempts,
            retry_backoff: config.retry_backoff(),
            on_failure: config.on_failure,
            dead_letter_path: PathBuf::from(&config.dead_letter_path),
            stats,
        }
    }

    /// 채널이 닫히거나 `abort`가 취소될 때까지 엔트리를 전달합니다.
    ///
    /// 채널이 닫히면 남은 엔트리를 모두 전달한 뒤 종료합니다.
    /// `abort`가 취소되면 진행 중인 전달을 포기하고 남은 엔트리 수를 기록합니다.
    pub async fn run(self, mut rx: mpsc::Receiver<HandoffItem>, abort: CancellationToken) {
        tracing::info!(
            max_attempts = self.max_attempts,
            on_failure = %self.on_failure,
            "forwarding sink started"
        );

        let mut abandoned: u64 = 0;
        loop {
            let item = tokio::select! {
                biased;
                () = abort.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => {
                        tracing::info!("handoff channel closed, forwarding sink drained");
                        return;
                    }
                },
            };

            let HandoffItem { entry, receipt } = item;
            let outcome = tokio::select! {
                biased;
                () = abort.cancelled() => {
                    abandoned += 1;
                    break;
                }
                outcome = self.deliver(&entry) => outcome,
            };

            if let Some(receipt) = receipt {
                // 수신측이 이미 사라졌으면 무시
                let _ = receipt.send(outcome);
            }
        }

        rx.close();
        while rx.try_recv().is_ok() {
            abandoned += 1;
        }
        self.stats.record_dropped(abandoned);
        tracing::warn!(
            abandoned,
            "forwarding sink aborted, undelivered entries discarded"
        );
    }

    async fn deliver(&self, entry: &LogEntry) -> DeliveryOutcome {
        let mut attempt = 0u32;
        let error = loop {
            attempt += 1;
            match self.sink.send(entry).await {
                Ok(()) => {
                    self.stats.record_delivered();
                    return DeliveryOutcome::Delivered;
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "delivery failed, retrying"
                    );
                    tokio::time::sleep(retry_delay(self.retry_backoff, attempt)).await;
                }
                Err(e) => break e,
            }
        };

        match self.on_failure {
            FailureAction::Drop => {
                tracing::error!(
                    correlation_id = %entry.correlation_id,
                    location = %entry.source_location,
                    attempts = attempt,
                    error = %error,
                    "delivery failed, dropping entry"
                );
                self.stats.record_dropped(1);
                DeliveryOutcome::Dropped
            }
            FailureAction::DeadLetter => match self.write_dead_letter(entry).await {
                Ok(()) => {
                    tracing::warn!(
                        correlation_id = %entry.correlation_id,
                        path = %self.dead_letter_path.display(),
                        attempts = attempt,
                        error = %error,
                        "delivery failed, entry written to dead letter file"
                    );
                    self.stats.record_dead_lettered();
                    DeliveryOutcome::DeadLettered
                }
                Err(e) => {
                    tracing::error!(
                        correlation_id = %entry.correlation_id,
                        path = %self.dead_letter_path.display(),
                        delivery_error = %error,
                        error = %e,
                        "failed to write dead letter, dropping entry"
                    );
                    self.stats.record_dropped(1);
                    DeliveryOutcome::Dropped
                }
            },
        }
    }

    async fn write_dead_letter(&self, entry: &LogEntry) -> Result<(), LogShipperError> {
        let mut line = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
        line.push(b'\n');

        if let Some(parent) = self.dead_letter_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.dead_letter_path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// `attempt`번째 실패 후의 대기 시간 (선형 증가, 넘치면 최대값)
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(attempt).unwrap_or(Duration::MAX)
}
