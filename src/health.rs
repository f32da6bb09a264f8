//! Pull-based health aggregation
//!
//! Health queries are side-effect-free: they read liveness that the
//! adapters already publish, never trigger reconnects or commands, and are
//! bounded by a short timeout so a stuck probe reports `Unhealthy` instead
//! of hanging the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Default bound on a single health probe
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Binary health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HealthStatus {
    /// Component is operational
    Healthy,
    /// Component is degraded or unreachable
    Unhealthy,
}

impl HealthStatus {
    /// Whether the status is healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Health report for one component, recomputed on every poll
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthReport {
    /// Component name, e.g. `camera`
    pub component: String,
    /// Current status
    pub status: HealthStatus,
    /// Human-readable detail
    pub detail: String,
}

impl HealthReport {
    /// Build a healthy report
    pub fn healthy(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            detail: detail.into(),
        }
    }

    /// Build an unhealthy report
    pub fn unhealthy(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            detail: detail.into(),
        }
    }
}

/// Capability of answering a health query
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Component name used in reports
    fn component(&self) -> &str;

    /// Compute the current report; must not mutate adapter state
    async fn check(&self) -> HealthReport;
}

/// Polls registered components and produces a composite report
pub struct HealthMonitor {
    checks: Vec<Arc<dyn HealthCheck>>,
    check_timeout: Duration,
}

impl HealthMonitor {
    /// Create a monitor with the default per-check timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CHECK_TIMEOUT)
    }

    /// Create a monitor with an explicit per-check timeout
    pub fn with_timeout(check_timeout: Duration) -> Self {
        Self {
            checks: Vec::new(),
            check_timeout,
        }
    }

    /// Register one component
    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    /// Poll one registered check, bounded by the configured timeout
    async fn poll(&self, check: &Arc<dyn HealthCheck>) -> HealthReport {
        match tokio::time::timeout(self.check_timeout, check.check()).await {
            Ok(report) => report,
            Err(_) => HealthReport::unhealthy(
                check.component(),
                format!("health check timed out after {:?}", self.check_timeout),
            ),
        }
    }

    /// Poll every registered component concurrently
    ///
    /// Total latency is bounded by the slowest single probe, not the sum;
    /// reports come back in registration order.
    pub async fn check_all(&self) -> Vec<HealthReport> {
        futures::future::join_all(self.checks.iter().map(|check| self.poll(check))).await
    }

    /// Poll a single component by name
    pub async fn check(&self, component: &str) -> Option<HealthReport> {
        for check in &self.checks {
            if check.component() == component {
                return Some(self.poll(check).await);
            }
        }
        None
    }

    /// Aggregate status: healthy iff every component is healthy
    pub async fn aggregate(&self) -> HealthStatus {
        for report in self.check_all().await {
            if !report.status.is_healthy() {
                return HealthStatus::Unhealthy;
            }
        }
        HealthStatus::Healthy
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCheck {
        name: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl HealthCheck for FixedCheck {
        fn component(&self) -> &str {
            self.name
        }

        async fn check(&self) -> HealthReport {
            if self.healthy {
                HealthReport::healthy(self.name, "ok")
            } else {
                HealthReport::unhealthy(self.name, "down")
            }
        }
    }

    struct StuckCheck;

    #[async_trait]
    impl HealthCheck for StuckCheck {
        fn component(&self) -> &str {
            "stuck"
        }

        async fn check(&self) -> HealthReport {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            HealthReport::healthy("stuck", "never reached")
        }
    }

    #[tokio::test]
    async fn test_aggregate_is_conjunction() {
        let mut monitor = HealthMonitor::new();
        monitor.register(Arc::new(FixedCheck {
            name: "camera",
            healthy: true,
        }));
        monitor.register(Arc::new(FixedCheck {
            name: "door",
            healthy: true,
        }));
        assert_eq!(monitor.aggregate().await, HealthStatus::Healthy);

        monitor.register(Arc::new(FixedCheck {
            name: "elevator",
            healthy: false,
        }));
        assert_eq!(monitor.aggregate().await, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_stuck_check_times_out_as_unhealthy() {
        let mut monitor = HealthMonitor::with_timeout(Duration::from_millis(20));
        monitor.register(Arc::new(StuckCheck));

        let report = monitor.check("stuck").await.unwrap();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.detail.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_run_concurrently() {
        let mut monitor = HealthMonitor::with_timeout(Duration::from_millis(100));
        for _ in 0..3 {
            monitor.register(Arc::new(StuckCheck));
        }

        let started = tokio::time::Instant::now();
        let reports = monitor.check_all().await;
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.status == HealthStatus::Unhealthy));
        // One timeout window, not three back to back
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_check_by_name() {
        let mut monitor = HealthMonitor::new();
        monitor.register(Arc::new(FixedCheck {
            name: "door",
            healthy: false,
        }));

        let report = monitor.check("door").await.unwrap();
        assert_eq!(report.component, "door");
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(monitor.check("missing").await.is_none());
    }
}
