//! loadprobe
//!
//! In-process telemetry for load-test servers: live connection counts,
//! host resource sampling, and windowed status reports.

pub mod config;
pub mod connection;
pub mod host;
pub mod management;
pub mod metrics;
pub mod shutdown;

pub use config::Config;
pub use connection::{ConnectionCounter, ConnectionSummary};
pub use host::{HostMetrics, HostResourceSampler};
pub use metrics::{StatusReporter, TelemetrySink};
pub use shutdown::ShutdownCoordinator;

/// Common error type for the crate
pub type Result<T> = anyhow::Result<T>;
