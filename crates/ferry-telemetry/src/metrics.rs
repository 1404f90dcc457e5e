//! Prometheus-backed metrics registry for remote operations.
//!
//! # Design
//! - Collectors live in a private registry; callers only see typed increment methods.
//! - Counts what the engine decides, not what the transport sees: commands by outcome,
//!   retries by operation, batch items by outcome, and conflict resumptions.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus-backed metrics registry shared by clients.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    commands_total: IntCounterVec,
    transport_retries_total: IntCounterVec,
    batch_items_total: IntCounterVec,
    batch_resumptions_total: IntCounterVec,
    bridge_jobs_inflight: IntGauge,
}

impl Metrics {
    /// Registry with the command, retry, batch, and bridge collectors.
    ///
    /// # Errors
    ///
    /// Fails when a collector cannot be created or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let commands_total = IntCounterVec::new(
            Opts::new("ferry_commands_total", "Remote commands executed by outcome"),
            &["command", "outcome"],
        )?;
        let transport_retries_total = IntCounterVec::new(
            Opts::new(
                "ferry_transport_retries_total",
                "Transport calls retried after a transient failure",
            ),
            &["operation"],
        )?;
        let batch_items_total = IntCounterVec::new(
            Opts::new("ferry_batch_items_total", "Batch items settled by outcome"),
            &["action", "outcome"],
        )?;
        let batch_resumptions_total = IntCounterVec::new(
            Opts::new(
                "ferry_batch_resumptions_total",
                "Batch resumptions issued after a conflict",
            ),
            &["action"],
        )?;
        let bridge_jobs_inflight = IntGauge::with_opts(Opts::new(
            "ferry_bridge_jobs_inflight",
            "Jobs executing on the execution bridge",
        ))?;

        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(transport_retries_total.clone()))?;
        registry.register(Box::new(batch_items_total.clone()))?;
        registry.register(Box::new(batch_resumptions_total.clone()))?;
        registry.register(Box::new(bridge_jobs_inflight.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                commands_total,
                transport_retries_total,
                batch_items_total,
                batch_resumptions_total,
                bridge_jobs_inflight,
            }),
        })
    }

    /// Count one executed command.
    pub fn inc_command(&self, command: &str, succeeded: bool) {
        let outcome = if succeeded { "ok" } else { "error" };
        self.inner
            .commands_total
            .with_label_values(&[command, outcome])
            .inc();
    }

    /// Count one transport retry.
    pub fn inc_retry(&self, operation: &str) {
        self.inner
            .transport_retries_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Count one settled batch item.
    pub fn inc_batch_item(&self, action: &str, outcome: &str) {
        self.inner
            .batch_items_total
            .with_label_values(&[action, outcome])
            .inc();
    }

    /// Count one conflict resumption.
    pub fn inc_resumption(&self, action: &str) {
        self.inner
            .batch_resumptions_total
            .with_label_values(&[action])
            .inc();
    }

    /// Adjust the in-flight bridge job gauge.
    pub fn add_bridge_jobs(&self, delta: i64) {
        self.inner.bridge_jobs_inflight.add(delta);
    }

    /// Text exposition of every collector.
    ///
    /// # Errors
    ///
    /// Fails when encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Executions recorded for `command` with the given outcome.
    #[must_use]
    pub fn command_count(&self, command: &str, succeeded: bool) -> u64 {
        let outcome = if succeeded { "ok" } else { "error" };
        self.inner
            .commands_total
            .with_label_values(&[command, outcome])
            .get()
    }

    /// Retries recorded for `operation`.
    #[must_use]
    pub fn retry_count(&self, operation: &str) -> u64 {
        self.inner
            .transport_retries_total
            .with_label_values(&[operation])
            .get()
    }

    /// Conflict resumptions recorded for `action`.
    #[must_use]
    pub fn resumption_count(&self, action: &str) -> u64 {
        self.inner
            .batch_resumptions_total
            .with_label_values(&[action])
            .get()
    }

    /// Jobs currently executing on an execution bridge.
    #[must_use]
    pub fn bridge_jobs_inflight(&self) -> i64 {
        self.inner.bridge_jobs_inflight.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_reflect_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_command("submit_batch", true);
        metrics.inc_command("get_task", true);
        metrics.inc_command("open_file", false);
        metrics.inc_retry("submit_batch");
        metrics.inc_retry("get_task");
        metrics.inc_resumption("move");
        metrics.inc_batch_item("move", "succeeded");
        metrics.add_bridge_jobs(2);
        metrics.add_bridge_jobs(-1);

        assert_eq!(metrics.command_count("submit_batch", true), 1);
        assert_eq!(metrics.command_count("open_file", false), 1);
        assert_eq!(metrics.command_count("open_file", true), 0);
        assert_eq!(metrics.retry_count("get_task"), 1);
        assert_eq!(metrics.resumption_count("move"), 1);
        assert_eq!(metrics.bridge_jobs_inflight(), 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("ferry_commands_total"));
        assert!(rendered.contains("ferry_batch_items_total"));
        Ok(())
    }
}
