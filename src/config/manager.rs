//! Configuration Manager

use super::Config;
use crate::Result;
use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::Path;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        Self::load_from_vars(|key| std::env::var(key).ok())
    }

    /// Apply `LOADPROBE_*` overrides from an arbitrary variable source
    pub fn load_from_vars<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(bind_addr) = lookup("LOADPROBE_BIND_ADDR") {
            config.server.bind_addr = bind_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid LOADPROBE_BIND_ADDR: {}", bind_addr))?;
        }

        if let Some(max_conn) = lookup("LOADPROBE_MAX_CONNECTIONS") {
            config.server.max_connections = max_conn
                .parse::<usize>()
                .with_context(|| format!("Invalid LOADPROBE_MAX_CONNECTIONS: {}", max_conn))?;
        }

        if let Some(buffer_size) = lookup("LOADPROBE_BUFFER_SIZE") {
            config.server.buffer_size = buffer_size
                .parse::<usize>()
                .with_context(|| format!("Invalid LOADPROBE_BUFFER_SIZE: {}", buffer_size))?;
        }

        if let Some(timeout) = lookup("LOADPROBE_SHUTDOWN_TIMEOUT") {
            config.server.shutdown_timeout = humantime::parse_duration(&timeout)
                .with_context(|| format!("Invalid LOADPROBE_SHUTDOWN_TIMEOUT: {}", timeout))?;
        }

        if let Some(enabled) = lookup("LOADPROBE_TELEMETRY_ENABLED") {
            config.telemetry.enabled = enabled
                .parse::<bool>()
                .with_context(|| format!("Invalid LOADPROBE_TELEMETRY_ENABLED: {}", enabled))?;
        }

        if let Some(api_addr) = lookup("LOADPROBE_API_ADDR") {
            config.telemetry.management_api.bind_addr = api_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid LOADPROBE_API_ADDR: {}", api_addr))?;
        }

        if let Some(log_level) = lookup("LOADPROBE_LOG_LEVEL") {
            config.telemetry.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .with_context(|| "Server configuration validation failed")?;

        self.validate_telemetry_config()
            .with_context(|| "Telemetry configuration validation failed")?;

        Ok(())
    }

    fn validate_server_config(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            bail!("max_connections must be greater than 0");
        }

        if self.server.max_connections > 1_000_000 {
            bail!("max_connections cannot exceed 1,000,000");
        }

        if self.server.buffer_size < 512 {
            bail!("buffer_size must be at least 512 bytes");
        }

        if self.server.buffer_size > 1048576 {
            bail!("buffer_size cannot exceed 1MB");
        }

        if self.server.shutdown_timeout.as_secs() > 300 {
            bail!("shutdown_timeout cannot exceed 5 minutes");
        }

        Ok(())
    }

    fn validate_telemetry_config(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.telemetry.log_level.as_str()) {
            bail!(
                "telemetry.log_level must be one of: {}",
                valid_log_levels.join(", ")
            );
        }

        let api = &self.telemetry.management_api;
        if api.enabled && api.bind_addr == self.server.bind_addr && api.bind_addr.port() != 0 {
            bail!(
                "management_api.bind_addr {} collides with server.bind_addr",
                api.bind_addr
            );
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        bind: Option<&str>,
        port: Option<u16>,
        max_connections: Option<usize>,
        api_bind: Option<&str>,
        no_api: bool,
    ) {
        if let Some(bind_str) = bind {
            if let Ok(addr) = bind_str.parse::<SocketAddr>() {
                self.server.bind_addr = addr;
                tracing::info!("CLI override: bind address set to {}", addr);
            } else {
                tracing::warn!("Invalid bind address provided: {}", bind_str);
            }
        }

        if let Some(port) = port {
            self.server.bind_addr.set_port(port);
            tracing::info!("CLI override: port set to {}", port);
        }

        if let Some(max_conn) = max_connections {
            self.server.max_connections = max_conn;
            tracing::info!("CLI override: max connections set to {}", max_conn);
        }

        if let Some(api_str) = api_bind {
            if let Ok(addr) = api_str.parse::<SocketAddr>() {
                self.telemetry.management_api.bind_addr = addr;
                tracing::info!("CLI override: management API address set to {}", addr);
            } else {
                tracing::warn!("Invalid management API address provided: {}", api_str);
            }
        }

        if no_api {
            self.telemetry.management_api.enabled = false;
            tracing::info!("CLI override: management API disabled");
        }
    }
}
