// src/metrics/collector.rs
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

/// Counters for control-socket traffic, labelled by instance endpoint.
pub struct MetricsCollector {
    pub commands_total: IntCounterVec,
    pub command_retries_total: IntCounterVec,
    pub command_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let commands_total = IntCounterVec::new(
            Opts::new(
                "haproxy_admin_commands_total",
                "Commands sent to control sockets",
            ),
            &["instance", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let command_retries_total = IntCounterVec::new(
            Opts::new(
                "haproxy_admin_command_retries_total",
                "Attempts repeated after a transport failure",
            ),
            &["instance"],
        )?;
        registry.register(Box::new(command_retries_total.clone()))?;

        let command_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "haproxy_admin_command_duration_seconds",
                "Wall time of a command including retries",
            ),
            &["instance"],
        )?;
        registry.register(Box::new(command_duration_seconds.clone()))?;

        Ok(Self {
            commands_total,
            command_retries_total,
            command_duration_seconds,
        })
    }

    pub fn record_command(&self, instance: &str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.commands_total
            .with_label_values(&[instance, outcome])
            .inc();

        self.command_duration_seconds
            .with_label_values(&[instance])
            .observe(duration.as_secs_f64());
    }

    pub fn record_retries(&self, instance: &str, retries: u64) {
        if retries > 0 {
            self.command_retries_total
                .with_label_values(&[instance])
                .inc_by(retries);
        }
    }
}
