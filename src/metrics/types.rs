//! Metrics Types

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use crate::connection::ConnectionSummary;
use crate::host::HostSnapshot;

/// Event name emitted once per reporting tick
pub const STATUS_EVENT: &str = "Status";

/// Property carrying the reporter's run identifier
pub const RUN_ID_PROPERTY: &str = "Id";

pub const ELAPSED: &str = "Elapsed";
pub const CURRENT_CONNECTIONS: &str = "CurrentConnections";
pub const PEAK_CONNECTIONS: &str = "PeakConnections";
pub const TOTAL_CONNECTED: &str = "TotalConnected";
pub const TOTAL_DISCONNECTED: &str = "TotalDisconnected";
pub const WINDOW_TOTAL_CONNECTED: &str = "WindowTotalConnected";
pub const WINDOW_TOTAL_DISCONNECTED: &str = "WindowTotalDisconnected";
pub const WINDOW_CURRENT_CONNECTIONS: &str = "WindowCurrentConnections";
pub const PROCESS_CPU: &str = "ProcessCpu";
pub const HOST_MEMORY_KIB: &str = "HostMemoryKib";

/// Every metric key carried by a status event
pub const STATUS_METRICS: [&str; 10] = [
    ELAPSED,
    CURRENT_CONNECTIONS,
    PEAK_CONNECTIONS,
    TOTAL_CONNECTED,
    TOTAL_DISCONNECTED,
    WINDOW_TOTAL_CONNECTED,
    WINDOW_TOTAL_DISCONNECTED,
    WINDOW_CURRENT_CONNECTIONS,
    PROCESS_CPU,
    HOST_MEMORY_KIB,
];

/// Event properties (string values)
pub type Properties = HashMap<String, String>;

/// Metric name to value mapping, ordered for stable output
pub type MetricValues = BTreeMap<String, f64>;

/// Change of the connection counters between two reporting ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowDelta {
    pub connected: u64,
    pub disconnected: u64,
    /// Signed: the live connection count can shrink within a window
    pub current: i64,
}

impl WindowDelta {
    /// Difference of `current` against the `previous` baseline
    pub fn between(previous: &ConnectionSummary, current: &ConnectionSummary) -> Self {
        Self {
            connected: current.total_connected.saturating_sub(previous.total_connected),
            disconnected: current
                .total_disconnected
                .saturating_sub(previous.total_disconnected),
            current: current.current_connections as i64 - previous.current_connections as i64,
        }
    }
}

/// Everything one reporting tick emits
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusReport {
    /// Time since the first observed connection
    pub elapsed: Duration,
    pub summary: ConnectionSummary,
    pub window: WindowDelta,
    pub host: HostSnapshot,
}

impl StatusReport {
    /// Metric mapping sent to the telemetry sink
    pub fn metrics(&self) -> MetricValues {
        [
            (ELAPSED, self.elapsed.as_millis() as f64),
            (CURRENT_CONNECTIONS, self.summary.current_connections as f64),
            (PEAK_CONNECTIONS, self.summary.peak_connections as f64),
            (TOTAL_CONNECTED, self.summary.total_connected as f64),
            (TOTAL_DISCONNECTED, self.summary.total_disconnected as f64),
            (WINDOW_TOTAL_CONNECTED, self.window.connected as f64),
            (WINDOW_TOTAL_DISCONNECTED, self.window.disconnected as f64),
            (WINDOW_CURRENT_CONNECTIONS, self.window.current as f64),
            (PROCESS_CPU, self.host.process_cpu_percent),
            (HOST_MEMORY_KIB, self.host.host_memory_kib),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        write!(
            f,
            "[{:02}:{:02}:{:02}] Current: {}, peak: {}, [+: {}, -: {}, rate: {}] cpu proc: {:.2}%, host mem: {:.0} KiB",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            self.summary.current_connections,
            self.summary.peak_connections,
            self.window.connected,
            self.window.disconnected,
            self.window.current,
            self.host.process_cpu_percent,
            self.host.host_memory_kib,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total_connected: u64, total_disconnected: u64, peak: u64) -> ConnectionSummary {
        ConnectionSummary {
            current_connections: total_connected - total_disconnected,
            peak_connections: peak,
            total_connected,
            total_disconnected,
        }
    }

    #[test]
    fn test_window_delta_between() {
        let window = WindowDelta::between(&summary(5, 1, 4), &summary(8, 2, 6));
        assert_eq!(window.connected, 3);
        assert_eq!(window.disconnected, 1);
        assert_eq!(window.current, 2);
    }

    #[test]
    fn test_window_delta_can_shrink() {
        let window = WindowDelta::between(&summary(10, 0, 10), &summary(10, 7, 10));
        assert_eq!(window.connected, 0);
        assert_eq!(window.disconnected, 7);
        assert_eq!(window.current, -7);
    }

    #[test]
    fn test_metrics_keys() {
        let report = StatusReport {
            elapsed: Duration::from_millis(5250),
            summary: summary(8, 2, 7),
            window: WindowDelta {
                connected: 3,
                disconnected: 1,
                current: 2,
            },
            host: HostSnapshot {
                process_cpu_percent: 12.5,
                host_memory_kib: 1024.0,
            },
        };

        let metrics = report.metrics();
        assert_eq!(metrics.len(), STATUS_METRICS.len());
        for name in STATUS_METRICS {
            assert!(metrics.contains_key(name), "missing {}", name);
        }
        assert_eq!(metrics[ELAPSED], 5250.0);
        assert_eq!(metrics[CURRENT_CONNECTIONS], 6.0);
        assert_eq!(metrics[WINDOW_CURRENT_CONNECTIONS], 2.0);
        assert_eq!(metrics[PROCESS_CPU], 12.5);
    }

    #[test]
    fn test_display_line() {
        let report = StatusReport {
            elapsed: Duration::from_secs(3725),
            summary: summary(8, 2, 7),
            window: WindowDelta {
                connected: 3,
                disconnected: 1,
                current: 2,
            },
            host: HostSnapshot {
                process_cpu_percent: 12.5,
                host_memory_kib: 1024.0,
            },
        };

        assert_eq!(
            report.to_string(),
            "[01:02:05] Current: 6, peak: 7, [+: 3, -: 1, rate: 2] cpu proc: 12.50%, host mem: 1024 KiB"
        );
    }
}
