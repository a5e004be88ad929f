//! Shared host resource snapshot

use serde::Serialize;
use std::sync::{PoisonError, RwLock};

/// One completed host sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HostSnapshot {
    /// CPU used by this process as a share of all logical processors
    pub process_cpu_percent: f64,
    /// Resident memory summed over every visible process, in KiB
    pub host_memory_kib: f64,
}

/// Latest host sample, replaced wholesale by the sampler
#[derive(Debug, Default)]
pub struct HostMetrics {
    latest: RwLock<HostSnapshot>,
}

impl HostMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both values in one step
    pub fn publish(&self, snapshot: HostSnapshot) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Most recently published sample
    pub fn snapshot(&self) -> HostSnapshot {
        *self.latest.read().unwrap_or_else(PoisonError::into_inner)
    }
}
