//! Management API Types

use serde::Serialize;
use std::time::SystemTime;

use crate::connection::ConnectionSummary;
use crate::host::HostSnapshot;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: SystemTime,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: SystemTime::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: SystemTime::now(),
        }
    }
}

/// Liveness information
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Live view of the telemetry state
#[derive(Debug, Serialize)]
pub struct TelemetryStatus {
    /// Null while status reporting is disabled
    pub run_id: Option<String>,
    pub uptime_seconds: u64,
    pub connections: ConnectionSummary,
    pub host: HostSnapshot,
}
