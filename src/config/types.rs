//! Configuration Types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

/// Load target server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_connections: usize,
    pub buffer_size: usize,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Telemetry configuration.
///
/// Sampling and reporting periods are fixed and intentionally absent here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Log each status event as a structured record
    pub log_reports: bool,
    pub prometheus_enabled: bool,
    pub log_level: String,
    pub management_api: ManagementApiConfig,
}

/// Management API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagementApiConfig {
    pub enabled: bool,
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
                max_connections: 100_000,
                buffer_size: 4096,
                shutdown_timeout: Duration::from_secs(10),
            },
            telemetry: TelemetryConfig {
                enabled: true,
                log_reports: true,
                prometheus_enabled: true,
                log_level: "info".to_string(),
                management_api: ManagementApiConfig {
                    enabled: true,
                    bind_addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
                },
            },
        }
    }
}
