//! Connection Counter
//!
//! Thread-safe tally of connect/disconnect events with a high-water mark.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Point-in-time view of the connection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub current_connections: u64,
    pub peak_connections: u64,
    pub total_connected: u64,
    pub total_disconnected: u64,
}

#[derive(Debug, Default)]
struct CounterState {
    total_connected: u64,
    total_disconnected: u64,
    peak_connections: u64,
}

impl CounterState {
    fn current(&self) -> u64 {
        self.total_connected.saturating_sub(self.total_disconnected)
    }
}

/// Counts connection lifecycle events from any number of tasks.
///
/// All counters live behind one mutex so the increment and the peak update
/// in [`ConnectionCounter::connected`] happen as a single step, and
/// [`ConnectionCounter::summary`] never mixes values from two mutations.
#[derive(Debug, Default)]
pub struct ConnectionCounter {
    state: Mutex<CounterState>,
}

impl ConnectionCounter {
    /// Create a counter with all values at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened connection
    pub fn connected(&self) {
        let mut state = self.lock();
        state.total_connected += 1;
        state.peak_connections = state.peak_connections.max(state.current());
    }

    /// Record a closed connection
    pub fn disconnected(&self) {
        self.lock().total_disconnected += 1;
    }

    /// Take a consistent snapshot of all counters
    pub fn summary(&self) -> ConnectionSummary {
        let state = self.lock();
        ConnectionSummary {
            current_connections: state.current(),
            peak_connections: state.peak_connections,
            total_connected: state.total_connected,
            total_disconnected: state.total_disconnected,
        }
    }

    /// Record a connection and return a guard that records the disconnect on drop
    pub fn track(self: &Arc<Self>) -> ConnectionGuard {
        self.connected();
        ConnectionGuard {
            counter: Arc::clone(self),
        }
    }

    // The critical sections cannot panic midway, so a poisoned lock still
    // holds consistent counters.
    fn lock(&self) -> MutexGuard<'_, CounterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a connection counted for as long as it is alive
#[derive(Debug)]
pub struct ConnectionGuard {
    counter: Arc<ConnectionCounter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.disconnected();
    }
}
