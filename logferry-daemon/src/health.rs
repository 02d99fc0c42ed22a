//! Periodic health reporting.
//!
//! The orchestrator polls the shipper's `health_check()` on a fixed
//! interval and logs a [`DaemonHealth`] report together with the
//! current processing counters.

use serde::Serialize;

use logferry_core::pipeline::HealthStatus;
use logferry_log_pipeline::StatsSnapshot;

/// Health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Shipper health status.
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Fraction of the hand-off channel currently occupied (0.0 - 1.0).
    pub handoff_utilization: f64,
    /// Processing counters.
    pub stats: StatsSnapshot,
}

impl DaemonHealth {
    /// Log the report at a level matching its status.
    pub fn log(&self) {
        let stats = serde_json::to_string(&self.stats).unwrap_or_default();
        match &self.status {
            HealthStatus::Healthy => tracing::info!(
                uptime_secs = self.uptime_secs,
                handoff_utilization = self.handoff_utilization,
                stats = %stats,
                "health: healthy"
            ),
            HealthStatus::Degraded(reason) => tracing::warn!(
                uptime_secs = self.uptime_secs,
                handoff_utilization = self.handoff_utilization,
                reason = %reason,
                stats = %stats,
                "health: degraded"
            ),
            HealthStatus::Unhealthy(reason) => tracing::error!(
                uptime_secs = self.uptime_secs,
                reason = %reason,
                stats = %stats,
                "health: unhealthy"
            ),
        }
    }
}
