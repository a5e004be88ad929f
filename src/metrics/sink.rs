//! Telemetry Sinks
//!
//! Destinations for named metric events.

use std::sync::Arc;

use tracing::info;

use super::types::{MetricValues, Properties};
use crate::Result;

/// Receives named events with a property bag and metric values.
///
/// Implementations must return promptly; callers log failures and carry on.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &str, properties: &Properties, metrics: &MetricValues) -> Result<()>;
}

/// Writes each event as one structured log record
#[derive(Debug, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &str, properties: &Properties, metrics: &MetricValues) -> Result<()> {
        let properties = serde_json::to_string(properties)?;
        let metrics = serde_json::to_string(metrics)?;
        info!(
            target: "loadprobe::telemetry",
            event = event,
            properties = %properties,
            metrics = %metrics,
            "Telemetry event"
        );
        Ok(())
    }
}

/// Forwards every event to each inner sink
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    /// Every sink is tried even when an earlier one fails
    fn record(&self, event: &str, properties: &Properties, metrics: &MetricValues) -> Result<()> {
        let failures: Vec<String> = self
            .sinks
            .iter()
            .filter_map(|sink| sink.record(event, properties, metrics).err())
            .map(|e| format!("{:#}", e))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} of {} sinks failed: {}",
                failures.len(),
                self.sinks.len(),
                failures.join("; ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
        fail: bool,
    }

    impl TelemetrySink for CountingSink {
        fn record(&self, _: &str, _: &Properties, _: &MetricValues) -> Result<()> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                anyhow::bail!("backend unavailable");
            }
            Ok(())
        }
    }

    #[test]
    fn test_tracing_sink_accepts_events() {
        let metrics: MetricValues = [("CurrentConnections".to_string(), 3.0)].into_iter().collect();
        assert!(TracingSink
            .record("Status", &Properties::new(), &metrics)
            .is_ok());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let failing = Arc::new(CountingSink {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(CountingSink::default());
        let fanout = FanoutSink::new()
            .with_sink(failing.clone())
            .with_sink(healthy.clone());
        assert_eq!(fanout.len(), 2);

        let err = fanout
            .record("Status", &Properties::new(), &MetricValues::new())
            .unwrap_err();

        assert!(err.to_string().contains("1 of 2 sinks failed"));
        assert_eq!(failing.calls.load(Ordering::Relaxed), 1);
        assert_eq!(healthy.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_empty_fanout_is_ok() {
        let fanout = FanoutSink::new();
        assert!(fanout.is_empty());
        assert!(fanout
            .record("Status", &Properties::new(), &MetricValues::new())
            .is_ok());
    }
}
