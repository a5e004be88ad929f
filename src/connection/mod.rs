//! Connection Tracking Module
//!
//! Counts connection lifecycle events and serves the load-test endpoint.

pub mod counter;
pub mod listener;

pub use counter::{ConnectionCounter, ConnectionGuard, ConnectionSummary};
pub use listener::LoadListener;
