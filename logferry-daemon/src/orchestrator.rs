//! Shipper lifecycle management.
//!
//! The [`Orchestrator`] owns the configured [`LogShipper`], starts it,
//! reports health periodically, and stops it gracefully once a shutdown
//! signal (SIGTERM or SIGINT) arrives.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;

use logferry_core::config::LogferryConfig;
use logferry_core::pipeline::Pipeline;
use logferry_log_pipeline::{DocumentSink, LogShipper, ObjectStore, QueueClient};

use crate::bootstrap::{self, AwsLogShipper};
use crate::health::DaemonHealth;

/// Interval between health reports.
const HEALTH_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// The daemon orchestrator.
pub struct Orchestrator<Q, S, D> {
    /// Loaded and validated configuration.
    config: LogferryConfig,
    shipper: LogShipper<Q, S, D>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    health_interval: Duration,
}

impl Orchestrator<
    logferry_log_pipeline::SqsQueueClient,
    logferry_log_pipeline::S3ObjectStore,
    logferry_log_pipeline::HttpDocumentSink,
>
{
    /// Build the orchestrator with production AWS and HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any client
    /// fails to initialize.
    pub async fn build_from_config(config: LogferryConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let shipper: AwsLogShipper = bootstrap::build_shipper(&config).await?;
        tracing::info!("orchestrator initialized");
        Ok(Self::new(config, shipper))
    }
}

impl<Q, S, D> Orchestrator<Q, S, D>
where
    Q: QueueClient,
    S: ObjectStore,
    D: DocumentSink,
{
    /// Wrap an already-built shipper.
    pub fn new(config: LogferryConfig, shipper: LogShipper<Q, S, D>) -> Self {
        Self {
            config,
            shipper,
            start_time: Instant::now(),
            health_interval: HEALTH_REPORT_INTERVAL,
        }
    }

    /// Override the health report interval.
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Start the shipper and block until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed or the
    /// shipper fails to start or stop.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the shipper and run until `shutdown` resolves.
    ///
    /// The future yields the name of the trigger, used only for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        self.shipper
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log shipper: {}", e))?;
        tracing::info!(
            queue_url = %self.config.queue.url,
            ack_mode = %self.config.pipeline.ack_mode,
            "logferry-daemon running"
        );

        let mut ticker = tokio::time::interval(self.health_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick completes immediately
        ticker.tick().await;

        tokio::pin!(shutdown);
        let trigger = loop {
            tokio::select! {
                signal = &mut shutdown => break signal,
                _ = ticker.tick() => self.health().await.log(),
            }
        };

        match &trigger {
            Ok(signal) => tracing::info!(signal = %signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown trigger failed, stopping"),
        }

        self.shutdown().await?;
        trigger.map(|_| ())
    }

    /// Stop the shipper gracefully.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping log shipper");
        self.shipper
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop log shipper: {}", e))?;
        tracing::info!("logferry-daemon shut down");
        Ok(())
    }

    /// Get the current health report.
    pub async fn health(&self) -> DaemonHealth {
        DaemonHealth {
            status: self.shipper.health_check().await,
            uptime_secs: self.start_time.elapsed().as_secs(),
            handoff_utilization: self.shipper.handoff_utilization(),
            stats: self.shipper.stats().snapshot(),
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogferryConfig {
        &self.config
    }

    /// Get a reference to the managed shipper.
    pub fn shipper(&self) -> &LogShipper<Q, S, D> {
        &self.shipper
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
