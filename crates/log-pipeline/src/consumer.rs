//! 알림 수신기
//!
//! [`NotificationConsumer::poll_once`]는 큐에서 메시지 묶음을 받아 한 번에 하나씩
//! 처리합니다.
//!
//! ```text
//! receive -> decode envelope -> 레코드별 fetch -> 라인별 parse -> handoff -> ack
//! ```
//!
//! # 확인(ack) 규칙
//! - 모든 레코드가 조회/해제/전달 채널 투입까지 끝나야 메시지를 확인합니다.
//! - `after_delivery` 모드에서는 모든 엔트리가 전달(또는 dead letter)된 뒤에 확인합니다.
//! - 조회/해제 실패 시 메시지를 남겨 재전달을 기다립니다.
//! - 해석 불가 메시지는 `on_malformed_message` 정책에 따라 남기거나 삭제합니다.
//! - 확인 실패는 로그만 남기고 재시도하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use logferry_core::types::{AckToken, ObjectOrigin, ObjectReference};

use crate::config::{AckMode, MalformedMessageAction, ShipperConfig};
use crate::error::LogShipperError;
use crate::notification::decode_envelope;
use crate::parser::LineParser;
use crate::queue::{QueueClient, QueueMessage};
use crate::retriever::ObjectRetriever;
use crate::sink::{DeliveryOutcome, HandoffItem};
use crate::stats::ShipperStats;
use crate::store::ObjectStore;

/// `poll_once` 한 번의 처리 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// 수신한 메시지 수
    pub received: usize,
    /// 확인한 메시지 수
    pub acked: usize,
    /// 남겨둔 메시지 수
    pub left: usize,
    /// 해석 불가로 삭제한 메시지 수
    pub discarded: usize,
    /// 전달 채널에 넣은 엔트리 수
    pub entries: usize,
}

/// 메시지 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageDisposition {
    Acked,
    Left,
    Discarded,
}

/// 알림 수신기
pub struct NotificationConsumer<Q, S> {
    queue: Arc<Q>,
    retriever: ObjectRetriever<S>,
    parser: LineParser,
    tx: mpsc::Sender<HandoffItem>,
    max_messages: u32,
    wait_time_secs: u32,
    receive_timeout: Duration,
    ack_mode: AckMode,
    on_malformed: MalformedMessageAction,
    stats: Arc<ShipperStats>,
    shutdown: CancellationToken,
    abort: CancellationToken,
}

impl<Q: QueueClient, S: ObjectStore> NotificationConsumer<Q, S> {
    /// 수신기를 생성합니다.
    pub fn new(
        queue: Arc<Q>,
        retriever: ObjectRetriever<S>,
        parser: LineParser,
        tx: mpsc::Sender<HandoffItem>,
        config: &ShipperConfig,
        stats: Arc<ShipperStats>,
    ) -> Self {
        Self {
            queue,
            retriever,
            parser,
            tx,
            max_messages: config.max_messages,
            wait_time_secs: config.wait_time_secs,
            receive_timeout: config.receive_timeout(),
            ack_mode: config.ack_mode,
            on_malformed: config.on_malformed_message,
            stats,
            shutdown: CancellationToken::new(),
            abort: CancellationToken::new(),
        }
    }

    /// 종료 토큰을 연결합니다.
    ///
    /// `shutdown`은 새 메시지 처리를 멈추고, `abort`는 대기 중인 투입/전달 대기를 끊습니다.
    pub fn with_cancellation(
        mut self,
        shutdown: CancellationToken,
        abort: CancellationToken,
    ) -> Self {
        self.shutdown = shutdown;
        self.abort = abort;
        self
    }

    /// 메시지 묶음 하나를 수신하고 처리합니다.
    ///
    /// 수신 대기 중 종료가 요청되면 빈 결과를 반환합니다.
    ///
    /// # Errors
    /// 수신 실패 또는 타임아웃 시 `Queue`
    pub async fn poll_once(&self) -> Result<PollSummary, LogShipperError> {
        let mut summary = PollSummary::default();

        let receive = tokio::time::timeout(
            self.receive_timeout,
            self.queue.receive(self.max_messages, self.wait_time_secs),
        );
        let messages = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Ok(summary),
            result = receive => result.map_err(|_| {
                LogShipperError::Queue(format!(
                    "receive timed out after {}s",
                    self.receive_timeout.as_secs()
                ))
            })??,
        };

        summary.received = messages.len();
        self.stats.record_received(messages.len() as u64);

        let mut messages = messages.into_iter();
        while let Some(message) = messages.next() {
            if self.shutdown.is_cancelled() {
                let remaining = 1 + messages.len();
                tracing::info!(remaining, "shutdown requested, leaving unprocessed messages");
                for _ in 0..remaining {
                    self.stats.record_left();
                }
                summary.left += remaining;
                break;
            }

            let span = tracing::info_span!(
                "message",
                trace_id = %uuid::Uuid::new_v4(),
                message_id = %message.message_id
            );
            let mut entries = 0;
            let disposition = self
                .process_message(message, &mut entries)
                .instrument(span)
                .await;

            summary.entries += entries;
            match disposition {
                MessageDisposition::Acked => summary.acked += 1,
                MessageDisposition::Left => summary.left += 1,
                MessageDisposition::Discarded => summary.discarded += 1,
            }
        }

        Ok(summary)
    }

    async fn process_message(
        &self,
        message: QueueMessage,
        entries: &mut usize,
    ) -> MessageDisposition {
        let QueueMessage {
            body, ack_token, ..
        } = message;

        let disposition = match self.forward_records(&body, entries).await {
            Ok(()) => MessageDisposition::Acked,
            Err(e) if e.is_malformed() => match self.on_malformed {
                MalformedMessageAction::Leave => {
                    tracing::warn!(error = %e, "malformed message, leaving for redrive");
                    MessageDisposition::Left
                }
                MalformedMessageAction::Delete => {
                    tracing::warn!(error = %e, "malformed message, discarding");
                    MessageDisposition::Discarded
                }
            },
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    entries = *entries,
                    "message processing failed, leaving for redelivery"
                );
                MessageDisposition::Left
            }
        };

        if disposition == MessageDisposition::Left {
            self.stats.record_left();
            return disposition;
        }

        match self.acknowledge(ack_token).await {
            Ok(()) => {
                if disposition == MessageDisposition::Acked {
                    self.stats.record_acked();
                    tracing::debug!(entries = *entries, "message acknowledged");
                } else {
                    self.stats.record_discarded();
                }
                disposition
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to acknowledge message");
                self.stats.record_left();
                MessageDisposition::Left
            }
        }
    }

    /// 메시지의 모든 레코드를 처리합니다.
    ///
    /// 레코드 키는 조회 전에 모두 검증하므로, 잘못된 키가 있는 메시지에서는
    /// 엔트리가 하나도 투입되지 않습니다.
    async fn forward_records(
        &self,
        body: &str,
        entries: &mut usize,
    ) -> Result<(), LogShipperError> {
        let envelope = decode_envelope(body)?;

        let mut targets: Vec<(ObjectReference, ObjectOrigin)> =
            Vec::with_capacity(envelope.records.len());
        for record in &envelope.records {
            if record.is_removal() {
                tracing::debug!(event_name = %record.event_name, "skipping removal event");
                continue;
            }

            let reference = record.object_reference()?;
            let origin = reference
                .origin()
                .ok_or_else(|| LogShipperError::MalformedKey {
                    key: reference.key.clone(),
                    reason: "expected <date>/<correlationId>/...".to_owned(),
                })?;

            if let Some(lag_ms) = record.lag_ms() {
                tracing::debug!(object = %reference, lag_ms, "notification received");
            }
            targets.push((reference, origin));
        }

        let mut receipts = Vec::new();
        for (reference, origin) in targets {
            let fetched = tokio::select! {
                biased;
                () = self.abort.cancelled() => Err(LogShipperError::Channel(
                    "aborted while fetching object".to_owned(),
                )),
                result = self.retriever.fetch(&reference) => result,
            };
            let object = match fetched {
                Ok(object) => object,
                Err(e) => {
                    self.stats.record_object_failed();
                    return Err(e);
                }
            };

            let mut lines = 0usize;
            for line in object.lines() {
                let entry = self.parser.parse(&line).with_origin(&origin);
                let item = match self.ack_mode {
                    AckMode::AfterHandoff => HandoffItem::new(entry),
                    AckMode::AfterDelivery => {
                        let (item, receipt) = HandoffItem::with_receipt(entry);
                        receipts.push(receipt);
                        item
                    }
                };
                self.push(item).await?;
                lines += 1;
                *entries += 1;
            }

            self.stats.record_object_processed();
            tracing::debug!(object = %reference, lines, "object handed off");
        }

        if self.ack_mode == AckMode::AfterDelivery {
            self.await_receipts(receipts).await?;
        }

        Ok(())
    }

    /// 메시지를 확인(삭제)합니다. 수신 타임아웃으로 제한되며 abort 시 즉시 포기합니다.
    async fn acknowledge(&self, ack_token: AckToken) -> Result<(), LogShipperError> {
        let delete = tokio::time::timeout(self.receive_timeout, self.queue.delete(ack_token));
        tokio::select! {
            biased;
            () = self.abort.cancelled() => Err(LogShipperError::Channel(
                "aborted while acknowledging message".to_owned(),
            )),
            result = delete => result.map_err(|_| {
                LogShipperError::Queue(format!(
                    "delete timed out after {}s",
                    self.receive_timeout.as_secs()
                ))
            })?,
        }
    }

    async fn push(&self, item: HandoffItem) -> Result<(), LogShipperError> {
        tokio::select! {
            biased;
            () = self.abort.cancelled() => {
                return Err(LogShipperError::Channel(
                    "aborted while handing off entry".to_owned(),
                ));
            }
            result = self.tx.send(item) => result.map_err(|_| {
                LogShipperError::Channel("handoff channel closed".to_owned())
            })?,
        }
        self.stats.record_handed_off();
        Ok(())
    }

    async fn await_receipts(
        &self,
        receipts: Vec<oneshot::Receiver<DeliveryOutcome>>,
    ) -> Result<(), LogShipperError> {
        let mut unsettled = 0usize;
        for receipt in receipts {
            let outcome = tokio::select! {
                biased;
                () = self.abort.cancelled() => {
                    return Err(LogShipperError::Channel(
                        "aborted while awaiting delivery".to_owned(),
                    ));
                }
                outcome = receipt => outcome.map_err(|_| {
                    LogShipperError::Channel("sink stopped before reporting delivery".to_owned())
                })?,
            };
            if !outcome.is_settled() {
                unsettled += 1;
            }
        }

        if unsettled > 0 {
            return Err(LogShipperError::Delivery {
                status: None,
                reason: format!("{unsettled} entries were dropped after failed delivery"),
            });
        }
        Ok(())
    }
}
