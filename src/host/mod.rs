//! Host Resource Module
//!
//! Samples process CPU and host memory into a shared snapshot.

pub mod metrics;
pub mod probe;
pub mod sampler;

pub use metrics::{HostMetrics, HostSnapshot};
pub use probe::{ProcessProbe, SysinfoProbe};
pub use sampler::{cpu_percent, HostResourceSampler, CPU_SAMPLE_WINDOW, SAMPLE_INTERVAL};
