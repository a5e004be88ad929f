//! Prometheus Collector
//!
//! A [`TelemetrySink`] that mirrors the latest status values into Prometheus
//! gauges for scraping.

use std::collections::HashMap;

use anyhow::Context;
use prometheus::{Gauge, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use super::sink::TelemetrySink;
use super::types::*;
use crate::Result;

const GAUGES: [(&str, &str, &str); 10] = [
    (ELAPSED, "loadprobe_elapsed_milliseconds", "Milliseconds since the first observed connection"),
    (CURRENT_CONNECTIONS, "loadprobe_current_connections", "Currently open connections"),
    (
        PEAK_CONNECTIONS,
        "loadprobe_peak_connections",
        "Highest number of simultaneously open connections",
    ),
    (TOTAL_CONNECTED, "loadprobe_total_connected", "Connections opened since start"),
    (TOTAL_DISCONNECTED, "loadprobe_total_disconnected", "Connections closed since start"),
    (
        WINDOW_TOTAL_CONNECTED,
        "loadprobe_window_connected",
        "Connections opened during the last reporting window",
    ),
    (
        WINDOW_TOTAL_DISCONNECTED,
        "loadprobe_window_disconnected",
        "Connections closed during the last reporting window",
    ),
    (
        WINDOW_CURRENT_CONNECTIONS,
        "loadprobe_window_current_connections",
        "Change in open connections during the last reporting window",
    ),
    (
        PROCESS_CPU,
        "loadprobe_process_cpu_percent",
        "Process CPU usage across all logical processors",
    ),
    (
        HOST_MEMORY_KIB,
        "loadprobe_host_memory_kib",
        "Resident memory of all visible processes in KiB",
    ),
];

/// Prometheus-backed telemetry sink
pub struct PrometheusSink {
    registry: Registry,
    gauges: HashMap<&'static str, Gauge>,
    events_total: IntCounterVec,
}

impl PrometheusSink {
    /// Create the sink with its own registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let mut gauges = HashMap::with_capacity(GAUGES.len());

        for (metric, name, help) in GAUGES {
            let gauge = Gauge::new(name, help)
                .with_context(|| format!("Failed to create gauge {}", name))?;
            registry
                .register(Box::new(gauge.clone()))
                .with_context(|| format!("Failed to register gauge {}", name))?;
            gauges.insert(metric, gauge);
        }

        let events_total = IntCounterVec::new(
            Opts::new("loadprobe_events_total", "Telemetry events recorded"),
            &["event"],
        )
        .context("Failed to create loadprobe_events_total")?;
        registry
            .register(Box::new(events_total.clone()))
            .context("Failed to register loadprobe_events_total")?;

        Ok(Self {
            registry,
            gauges,
            events_total,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "Failed to encode Prometheus metrics");
                String::new()
            }
        }
    }
}

impl TelemetrySink for PrometheusSink {
    fn record(&self, event: &str, _properties: &Properties, metrics: &MetricValues) -> Result<()> {
        self.events_total.with_label_values(&[event]).inc();

        let mut unknown = Vec::new();
        for (name, value) in metrics {
            match self.gauges.get(name.as_str()) {
                Some(gauge) => gauge.set(*value),
                None => unknown.push(name.as_str()),
            }
        }

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "No Prometheus gauge for metrics: {}",
                unknown.join(", ")
            ))
        }
    }
}
