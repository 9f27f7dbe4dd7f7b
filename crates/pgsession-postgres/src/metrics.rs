//! Metrics for the PostgreSQL session store
//!
//! Provides Prometheus metrics for monitoring the session store:
//! - Store operations (create, fetch, delete) by outcome and latency
//! - Expiration sweeps by outcome and number of sessions removed

use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for the PostgreSQL session store
#[derive(Clone)]
pub struct SessionStoreMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Operation metrics
    /// Total store operations
    pub operations_total: CounterVec,
    /// Store operation duration
    pub operation_duration_seconds: HistogramVec,

    // Sweep metrics
    /// Total expiration sweeps
    pub sweeps_total: CounterVec,
    /// Sessions removed by expiration sweeps
    pub sessions_swept_total: IntCounter,
}

impl SessionStoreMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations_total = CounterVec::new(
            Opts::new(
                "session_store_operations_total",
                "Total number of session store operations",
            ),
            &["operation", "status"],
        )?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "session_store_operation_duration_seconds",
                "Session store operation duration in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]),
            &["operation"],
        )?;

        let sweeps_total = CounterVec::new(
            Opts::new(
                "session_store_sweeps_total",
                "Total number of expired-session sweeps",
            ),
            &["status"],
        )?;

        let sessions_swept_total = IntCounter::with_opts(Opts::new(
            "session_store_sessions_swept_total",
            "Total number of expired sessions deleted by sweeps",
        ))?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;
        registry.register(Box::new(sweeps_total.clone()))?;
        registry.register(Box::new(sessions_swept_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            operations_total,
            operation_duration_seconds,
            sweeps_total,
            sessions_swept_total,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished store operation
    ///
    /// `status` is one of `success`, `duplicate`, `timeout` or `error`.
    pub fn record_operation(&self, operation: &str, status: &str, duration_secs: f64) {
        self.operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record an expiration sweep
    pub fn record_sweep(&self, deleted: Option<u64>) {
        match deleted {
            Some(count) => {
                self.sweeps_total.with_label_values(&["success"]).inc();
                self.sessions_swept_total.inc_by(count);
            }
            None => {
                self.sweeps_total.with_label_values(&["error"]).inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = SessionStoreMetrics::new().unwrap();
        metrics.record_sweep(Some(0));
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_operation() {
        let metrics = SessionStoreMetrics::new().unwrap();
        metrics.record_operation("create", "success", 0.001);
        metrics.record_operation("create", "success", 0.002);
        metrics.record_operation("create", "duplicate", 0.001);

        assert_eq!(
            metrics
                .operations_total
                .with_label_values(&["create", "success"])
                .get(),
            2.0
        );
        assert_eq!(
            metrics
                .operations_total
                .with_label_values(&["create", "duplicate"])
                .get(),
            1.0
        );

        let gathered = metrics.registry().gather();
        let duration_metric = gathered
            .iter()
            .find(|m| m.name() == "session_store_operation_duration_seconds")
            .expect("operation_duration_seconds metric not found");
        assert_eq!(duration_metric.metric.len(), 1);
    }

    #[test]
    fn test_record_sweep() {
        let metrics = SessionStoreMetrics::new().unwrap();
        metrics.record_sweep(Some(3));
        metrics.record_sweep(Some(2));
        metrics.record_sweep(None);

        assert_eq!(metrics.sessions_swept_total.get(), 5);
        assert_eq!(metrics.sweeps_total.with_label_values(&["success"]).get(), 2.0);
        assert_eq!(metrics.sweeps_total.with_label_values(&["error"]).get(), 1.0);
    }
}
