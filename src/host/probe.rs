//! Process and host introspection
//!
//! [`ProcessProbe`] is the only way the sampler touches the operating system,
//! which keeps the sampling arithmetic testable with synthetic readings.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

/// Raw readings consumed by the host resource sampler
pub trait ProcessProbe: Send + Sync {
    /// Cumulative CPU time consumed by the current process, if readable
    fn process_cpu_time(&self) -> Option<Duration>;

    /// Number of logical processors available to the process
    fn logical_processors(&self) -> usize;

    /// Resident memory of all visible processes in KiB.
    ///
    /// Processes that cannot be read are left out of the sum.
    fn total_resident_memory_kib(&self) -> f64;
}

/// [`ProcessProbe`] backed by `sysinfo`
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
    logical_processors: usize,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!(error = e, "Current process id unavailable, process CPU disabled");
                None
            }
        };

        Self {
            system: Mutex::new(System::new()),
            pid,
            logical_processors: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProbe {
    fn process_cpu_time(&self) -> Option<Duration> {
        let pid = self.pid?;
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_cpu(),
        );

        system
            .process(pid)
            .map(|process| Duration::from_millis(process.accumulated_cpu_time()))
    }

    fn logical_processors(&self) -> usize {
        self.logical_processors
    }

    fn total_resident_memory_kib(&self) -> f64 {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);

        // Vanished processes are dropped from the table; unreadable ones report 0.
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        system
            .processes()
            .values()
            .map(|process| process.memory() as f64 / 1024.0)
            .sum()
    }
}
