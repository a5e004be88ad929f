//! Status Reporter
//!
//! Every [`REPORT_INTERVAL`] turns the cumulative connection counters into
//! per-window deltas and emits them, together with the latest host sample, as
//! a `"Status"` event.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::sink::TelemetrySink;
use super::types::{Properties, StatusReport, WindowDelta, RUN_ID_PROPERTY, STATUS_EVENT};
use crate::connection::{ConnectionCounter, ConnectionSummary};
use crate::host::HostMetrics;
use crate::shutdown::{shutdown_requested, sleep_or_shutdown};

/// Pause between reporting ticks
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// State carried from one tick to the next
#[derive(Debug, Default)]
struct ReportingState {
    last_summary: ConnectionSummary,
    /// Armed by the first tick that sees any connection
    first_activity: Option<Instant>,
}

/// Periodic reporter of connection and host metrics
pub struct StatusReporter {
    counter: Arc<ConnectionCounter>,
    host: Arc<HostMetrics>,
    sink: Arc<dyn TelemetrySink>,
    log_reports: bool,
    properties: Properties,
    state: ReportingState,
}

impl StatusReporter {
    /// Create a reporter with a fresh run identifier
    pub fn new(
        counter: Arc<ConnectionCounter>,
        host: Arc<HostMetrics>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        let properties = Properties::from([(RUN_ID_PROPERTY.to_string(), run_id)]);

        Self {
            counter,
            host,
            sink,
            log_reports: true,
            properties,
            state: ReportingState::default(),
        }
    }

    /// Toggle the human-readable status line
    pub fn with_log_reports(mut self, enabled: bool) -> Self {
        self.log_reports = enabled;
        self
    }

    /// Identifier attached to every event from this reporter
    pub fn run_id(&self) -> &str {
        &self.properties[RUN_ID_PROPERTY]
    }

    /// Run one reporting tick.
    ///
    /// Returns the emitted report, or `None` while no connection has been
    /// seen yet.
    pub fn tick(&mut self) -> Option<StatusReport> {
        let summary = self.counter.summary();
        let host = self.host.snapshot();

        if summary.peak_connections == 0 {
            debug!("No connection activity yet, skipping report");
            return None;
        }

        let started = *self.state.first_activity.get_or_insert_with(Instant::now);

        let report = StatusReport {
            elapsed: started.elapsed(),
            summary,
            window: WindowDelta::between(&self.state.last_summary, &summary),
            host,
        };

        if self.log_reports {
            info!("{}", report);
        }

        if let Err(e) = self.sink.record(STATUS_EVENT, &self.properties, &report.metrics()) {
            warn!(error = %e, "Failed to record status event");
        }

        self.state.last_summary = summary;
        Some(report)
    }

    /// Report until shutdown
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            run_id = %self.run_id(),
            interval = ?REPORT_INTERVAL,
            "Status reporter started"
        );

        loop {
            if shutdown_requested(&mut shutdown_rx) {
                break;
            }

            self.tick();

            if sleep_or_shutdown(REPORT_INTERVAL, &mut shutdown_rx).await {
                break;
            }
        }

        info!(run_id = %self.run_id(), "Status reporter stopped");
    }
}
