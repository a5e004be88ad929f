//! Metrics Module
//!
//! Windowed status reporting and the sinks it emits to.

pub mod collector;
pub mod reporter;
pub mod sink;
pub mod types;

pub use collector::PrometheusSink;
pub use reporter::{StatusReporter, REPORT_INTERVAL};
pub use sink::{FanoutSink, TelemetrySink, TracingSink};
pub use types::{MetricValues, Properties, StatusReport, WindowDelta, STATUS_EVENT};
