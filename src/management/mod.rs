//! Management API Module
//!
//! HTTP endpoints exposing live telemetry and Prometheus metrics.

pub mod api;
pub mod handlers;
pub mod server;
pub mod types;

pub use api::ManagementApi;
pub use handlers::AppState;
pub use server::ManagementServer;
pub use types::*;
