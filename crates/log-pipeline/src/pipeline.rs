//! 파이프라인 오케스트레이션 -- 수신 태스크와 전달 태스크의 생명주기를 관리합니다.
//!
//! [`LogShipper`]는 core의 [`Pipeline`] trait을 구현하여
//! `logferry-daemon`에서 start/stop/health_check로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! QueueClient -> NotificationConsumer -> mpsc(handoff_capacity) -> ForwardingSink -> DocumentSink
//!                     |
//!               ObjectRetriever(ObjectStore) + LineParser
//! ```
//!
//! # 종료 순서
//! 1. shutdown 토큰 취소: 수신기는 새 메시지를 받지 않고 진행 중인 메시지만 마칩니다.
//! 2. `shutdown_timeout` 동안 수신 태스크를 기다리고, 넘기면 abort 토큰을 취소합니다.
//! 3. 수신기의 송신측이 사라지면 전달 태스크가 채널을 비우고 종료합니다.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logferry_core::error::{LogferryError, PipelineError};
use logferry_core::pipeline::{HealthStatus, LineRule, Pipeline};

use crate::config::{DEGRADED_RECEIVE_FAILURES, ShipperConfig};
use crate::consumer::NotificationConsumer;
use crate::error::LogShipperError;
use crate::parser::LineParser;
use crate::queue::QueueClient;
use crate::retriever::ObjectRetriever;
use crate::rule::RuleLoader;
use crate::sink::{DocumentSink, ForwardingSink, HandoffItem};
use crate::stats::ShipperStats;
use crate::store::ObjectStore;

/// 채널 사용률이 이 값을 넘으면 Degraded
const DEGRADED_UTILIZATION: f64 = 0.9;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 로그 전송 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logferry_log_pipeline::LogShipperBuilder;
///
/// let mut shipper = LogShipperBuilder::new()
///     .config(config)
///     .queue_client(Arc::new(queue))
///     .object_store(Arc::new(store))
///     .document_sink(Arc::new(sink))
///     .build()?;
///
/// shipper.start().await?;
/// ```
pub struct LogShipper<Q, S, D> {
    config: ShipperConfig,
    state: PipelineState,
    queue: Arc<Q>,
    store: Arc<S>,
    sink: Arc<D>,
    parser: LineParser,
    stats: Arc<ShipperStats>,
    shutdown: CancellationToken,
    abort: CancellationToken,
    /// 채널 사용률 관찰용 (송신측 생존에 영향 없음)
    handoff: Option<mpsc::WeakSender<HandoffItem>>,
    consumer_task: Option<JoinHandle<()>>,
    sink_task: Option<JoinHandle<()>>,
}

impl<Q, S, D> LogShipper<Q, S, D>
where
    Q: QueueClient,
    S: ObjectStore,
    D: DocumentSink,
{
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 처리 통계
    pub fn stats(&self) -> &Arc<ShipperStats> {
        &self.stats
    }

    /// 시작 전 구성된 라인 파서 (규칙 디렉토리 로드 전)
    pub fn parser(&self) -> &LineParser {
        &self.parser
    }

    /// 전달 채널 사용률 (0.0 ~ 1.0). 실행 중이 아니면 0.
    pub fn handoff_utilization(&self) -> f64 {
        self.handoff
            .as_ref()
            .and_then(mpsc::WeakSender::upgrade)
            .map_or(0.0, |tx| {
                let max = tx.max_capacity();
                if max == 0 {
                    return 0.0;
                }
                (max - tx.capacity()) as f64 / max as f64
            })
    }

    async fn build_parser(&self) -> Result<LineParser, LogShipperError> {
        let mut parser = self.parser.clone();
        if self.config.rules_dir.is_empty() {
            return Ok(parser);
        }

        for rule in RuleLoader::load_directory(&self.config.rules_dir).await? {
            if let Err(e) = parser.register(Arc::new(rule)) {
                tracing::warn!(error = %e, "skipping rule that conflicts with a registered rule");
            }
        }
        Ok(parser)
    }
}

impl<Q, S, D> Pipeline for LogShipper<Q, S, D>
where
    Q: QueueClient,
    S: ObjectStore,
    D: DocumentSink,
{
    async fn start(&mut self) -> Result<(), LogferryError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!("starting log shipper");

        // 1. 규칙 로드
        let parser = self.build_parser().await?;
        tracing::info!(rules = ?parser.rule_ids(), "line parser ready");

        // 2. 채널 및 토큰 준비
        self.shutdown = CancellationToken::new();
        self.abort = CancellationToken::new();
        self.stats.reset_receive_failures();
        let (tx, rx) = mpsc::channel(self.config.handoff_capacity);
        self.handoff = Some(tx.downgrade());

        // 3. 전달 태스크
        let forwarder = ForwardingSink::new(
            Arc::clone(&self.sink),
            &self.config,
            Arc::clone(&self.stats),
        );
        self.sink_task = Some(tokio::spawn(forwarder.run(rx, self.abort.clone())));

        // 4. 수신 태스크
        let consumer = NotificationConsumer::new(
            Arc::clone(&self.queue),
            ObjectRetriever::new(Arc::clone(&self.store), &self.config),
            parser,
            tx,
            &self.config,
            Arc::clone(&self.stats),
        )
        .with_cancellation(self.shutdown.clone(), self.abort.clone());
        self.consumer_task = Some(tokio::spawn(consume_loop(
            consumer,
            self.shutdown.clone(),
            self.config.error_backoff(),
            Arc::clone(&self.stats),
        )));

        self.state = PipelineState::Running;
        tracing::info!(
            handoff_capacity = self.config.handoff_capacity,
            ack_mode = %self.config.ack_mode,
            "log shipper started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogferryError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log shipper");
        let timeout = self.config.shutdown_timeout();

        // 1. 새 메시지 수신 중단, 진행 중인 메시지는 마무리
        self.shutdown.cancel();

        let mut failures = Vec::new();
        if let Some(task) = self.consumer_task.take() {
            // 시간 초과 시 abort로 투입 대기가 풀리므로 곧 종료됨
            if let Err(e) = join_or_abort(task, timeout, &self.abort, "consumer").await {
                failures.push(e);
            }
        }

        // 2. 송신측이 모두 사라졌으므로 전달 태스크는 채널을 비우고 종료
        if let Some(task) = self.sink_task.take() {
            if let Err(e) = join_or_abort(task, timeout, &self.abort, "sink").await {
                failures.push(e);
            }
        }

        self.handoff = None;
        self.state = PipelineState::Stopped;

        let stats = self.stats.snapshot();
        tracing::info!(
            messages_acked = stats.messages_acked,
            messages_left = stats.messages_left,
            entries_delivered = stats.entries_delivered,
            entries_dropped = stats.entries_dropped,
            "log shipper stopped"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::ShutdownFailed(failures.join("; ")).into())
        }
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let finished = |task: &Option<JoinHandle<()>>| {
                    task.as_ref().is_none_or(JoinHandle::is_finished)
                };
                if finished(&self.consumer_task) || finished(&self.sink_task) {
                    return HealthStatus::Unhealthy("worker task exited".to_owned());
                }

                let failures = self.stats.consecutive_receive_failures();
                if failures >= DEGRADED_RECEIVE_FAILURES {
                    return HealthStatus::Degraded(format!(
                        "{failures} consecutive queue receive failures"
                    ));
                }

                let utilization = self.handoff_utilization();
                if utilization > DEGRADED_UTILIZATION {
                    HealthStatus::Degraded(format!(
                        "handoff channel utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// `timeout` 안에 끝나지 않으면 abort 토큰을 취소한 뒤 태스크를 마저 기다립니다.
async fn join_or_abort(
    mut task: JoinHandle<()>,
    timeout: std::time::Duration,
    abort: &CancellationToken,
    name: &str,
) -> Result<(), String> {
    let result = match tokio::time::timeout(timeout, &mut task).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                task = name,
                timeout_secs = timeout.as_secs(),
                "task did not finish in time, aborting in-flight work"
            );
            abort.cancel();
            match tokio::time::timeout(timeout, &mut task).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(task = name, "task ignored abort, cancelling it");
                    task.abort();
                    return Err(format!("{name} task did not stop after abort"));
                }
            }
        }
    };

    match result {
        Err(e) if !e.is_cancelled() => Err(format!("{name} task failed: {e}")),
        _ => Ok(()),
    }
}

/// 종료 요청까지 `poll_once`를 반복합니다.
async fn consume_loop<Q: QueueClient, S: ObjectStore>(
    consumer: NotificationConsumer<Q, S>,
    shutdown: CancellationToken,
    error_backoff: std::time::Duration,
    stats: Arc<ShipperStats>,
) {
    tracing::info!("notification consumer started");

    while !shutdown.is_cancelled() {
        match consumer.poll_once().await {
            Ok(summary) => {
                stats.reset_receive_failures();
                if summary.received > 0 {
                    tracing::debug!(
                        received = summary.received,
                        acked = summary.acked,
                        left = summary.left,
                        discarded = summary.discarded,
                        entries = summary.entries,
                        "poll completed"
                    );
                }
            }
            Err(e) => {
                let failures = stats.record_receive_failure();
                tracing::warn!(
                    error = %e,
                    consecutive_failures = failures,
                    backoff_ms = error_backoff.as_millis() as u64,
                    "queue receive failed, backing off"
                );
                tokio::select! {
                    () = shutdown.cancelled() => {}
                    () = tokio::time::sleep(error_backoff) => {}
                }
            }
        }
    }

    tracing::info!("notification consumer stopped");
}

/// 로그 전송 파이프라인 빌더
pub struct LogShipperBuilder<Q, S, D> {
    config: ShipperConfig,
    queue: Option<Arc<Q>>,
    store: Option<Arc<S>>,
    sink: Option<Arc<D>>,
    rules: Vec<Arc<dyn LineRule>>,
}

impl<Q, S, D> LogShipperBuilder<Q, S, D>
where
    Q: QueueClient,
    S: ObjectStore,
    D: DocumentSink,
{
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ShipperConfig::default(),
            queue: None,
            store: None,
            sink: None,
            rules: Vec::new(),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: ShipperConfig) -> Self {
        self.config = config;
        self
    }

    /// 알림 큐 클라이언트를 지정합니다.
    pub fn queue_client(mut self, queue: Arc<Q>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// 오브젝트 스토어를 지정합니다.
    pub fn object_store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// 문서 전송 구현을 지정합니다.
    pub fn document_sink(mut self, sink: Arc<D>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 추가 추출 규칙을 등록합니다.
    pub fn rule(mut self, rule: impl LineRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Errors
    /// 설정이 유효하지 않거나 클라이언트가 빠졌거나 규칙 ID가 겹치면 에러
    pub fn build(self) -> Result<LogShipper<Q, S, D>, LogShipperError> {
        self.config.validate()?;

        let queue = self.queue.ok_or_else(|| missing("queue_client"))?;
        let store = self.store.ok_or_else(|| missing("object_store"))?;
        let sink = self.sink.ok_or_else(|| missing("document_sink"))?;

        let mut parser = LineParser::new()?;
        for rule in self.rules {
            parser.register(rule)?;
        }

        Ok(LogShipper {
            config: self.config,
            state: PipelineState::Initialized,
            queue,
            store,
            sink,
            parser,
            stats: Arc::new(ShipperStats::new()),
            shutdown: CancellationToken::new(),
            abort: CancellationToken::new(),
            handoff: None,
            consumer_task: None,
            sink_task: None,
        })
    }
}

impl<Q, S, D> Default for LogShipperBuilder<Q, S, D>
where
    Q: QueueClient,
    S: ObjectStore,
    D: DocumentSink,
{
    fn default() -> Self {
        Self::new()
    }
}

fn missing(field: &str) -> LogShipperError {
    LogShipperError::Config {
        field: field.to_owned(),
        reason: format!("{field} must be provided"),
    }
}
