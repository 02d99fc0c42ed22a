//! 알림 큐 클라이언트
//!
//! [`QueueClient`] trait은 큐 수신/확인 연산을 추상화합니다.
//! 운영 환경에서는 [`SqsQueueClient`]를, 테스트에서는 mock 구현을 사용합니다.

use std::future::Future;

use aws_sdk_sqs::error::DisplayErrorContext;

use logferry_core::types::AckToken;

use crate::error::LogShipperError;

/// 큐에서 수신한 메시지
#[derive(Debug)]
pub struct QueueMessage {
    /// 큐가 부여한 메시지 ID
    pub message_id: String,
    /// 메시지 본문 (알림 envelope JSON)
    pub body: String,
    /// 확인용 토큰
    pub ack_token: AckToken,
}

/// 알림 큐 추상화
pub trait QueueClient: Send + Sync + 'static {
    /// 메시지를 최대 `max_messages`개까지 long polling으로 수신합니다.
    ///
    /// 대기 중 메시지가 없으면 빈 목록을 반환합니다.
    fn receive(
        &self,
        max_messages: u32,
        wait_time_secs: u32,
    ) -> impl Future<Output = Result<Vec<QueueMessage>, LogShipperError>> + Send;

    /// 메시지를 확인(삭제)합니다. 토큰은 소비됩니다.
    fn delete(&self, token: AckToken) -> impl Future<Output = Result<(), LogShipperError>> + Send;
}

/// SQS 기반 큐 클라이언트
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueueClient {
    /// 설정된 SDK 클라이언트와 큐 URL로 생성합니다.
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// 대상 큐 URL
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

impl QueueClient for SqsQueueClient {
    async fn receive(
        &self,
        max_messages: u32,
        wait_time_secs: u32,
    ) -> Result<Vec<QueueMessage>, LogShipperError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(i32::try_from(max_messages).unwrap_or(10))
            .wait_time_seconds(i32::try_from(wait_time_secs).unwrap_or(20))
            .send()
            .await
            .map_err(|e| {
                LogShipperError::Queue(format!("receive failed: {}", DisplayErrorContext(&e)))
            })?;

        let mut messages = Vec::new();
        for message in output.messages.unwrap_or_default() {
            let message_id = message.message_id.unwrap_or_default();
            let Some(receipt_handle) = message.receipt_handle else {
                tracing::warn!(message_id = %message_id, "message without receipt handle, skipping");
                continue;
            };
            messages.push(QueueMessage {
                message_id,
                body: message.body.unwrap_or_default(),
                ack_token: AckToken::new(receipt_handle),
            });
        }

        Ok(messages)
    }

    async fn delete(&self, token: AckToken) -> Result<(), LogShipperError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(token.into_receipt_handle())
            .send()
            .await
            .map_err(|e| {
                LogShipperError::Queue(format!("delete failed: {}", DisplayErrorContext(&e)))
            })?;
        Ok(())
    }
}
