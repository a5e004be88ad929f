//! loadprobe - load-test target with built-in connection and host telemetry

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loadprobe::{
    config::{Config, ConfigManager},
    connection::{ConnectionCounter, LoadListener},
    host::{HostMetrics, HostResourceSampler, SysinfoProbe},
    management::{AppState, ManagementServer},
    metrics::{FanoutSink, PrometheusSink, StatusReporter, TelemetrySink, TracingSink},
    shutdown::{ShutdownAwareTask, ShutdownCoordinator},
};

/// CLI arguments for loadprobe
#[derive(Parser, Debug)]
#[command(name = "loadprobe")]
#[command(about = "Load-test target with connection and host telemetry")]
#[command(version)]
#[command(long_about = "
Load-test target with connection and host telemetry.

Accepts TCP connections, echoes their traffic, and reports connection counts,
per-window deltas and host resource usage every five seconds.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  LOADPROBE_BIND_ADDR          - Load listener address (e.g., 0.0.0.0:5000)
  LOADPROBE_MAX_CONNECTIONS    - Maximum concurrent connections
  LOADPROBE_BUFFER_SIZE        - Echo buffer size in bytes
  LOADPROBE_SHUTDOWN_TIMEOUT   - Connection drain timeout (e.g., 10s)
  LOADPROBE_TELEMETRY_ENABLED  - Enable sampling and reporting (true/false)
  LOADPROBE_API_ADDR           - Management API address
  LOADPROBE_LOG_LEVEL          - Log level (trace, debug, info, warn, error)
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "loadprobe.toml", help = "Path to configuration file")]
    pub config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(short, long, help = "Load listener address (e.g., 0.0.0.0:5000)")]
    pub bind: Option<String>,

    /// Port to bind to (overrides config file)
    #[arg(short, long, help = "Load listener port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Maximum number of concurrent connections
    #[arg(long, help = "Maximum number of concurrent connections")]
    pub max_connections: Option<usize>,

    /// Management API address (overrides config file)
    #[arg(long, help = "Management API address")]
    pub api_bind: Option<String>,

    /// Disable the management API
    #[arg(long, help = "Disable the management API")]
    pub no_api: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };

    init_tracing(&args, &config)?;

    info!("Starting loadprobe v{}", env!("CARGO_PKG_VERSION"));

    config.merge_with_cli_args(
        args.bind.as_deref(),
        args.port,
        args.max_connections,
        args.api_bind.as_deref(),
        args.no_api,
    );

    config
        .validate()
        .context("Final configuration validation failed")?;

    if args.validate_config {
        info!("Configuration is valid");
        info!("  Bind address: {}", config.server.bind_addr);
        info!("  Max connections: {}", config.server.max_connections);
        info!("  Shutdown timeout: {:?}", config.server.shutdown_timeout);
        info!(
            "  Telemetry: {}",
            if config.telemetry.enabled { "enabled" } else { "disabled" }
        );
        info!(
            "  Management API: {}",
            if config.telemetry.management_api.enabled {
                config.telemetry.management_api.bind_addr.to_string()
            } else {
                "disabled".to_string()
            }
        );
        return Ok(());
    }

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let coordinator = ShutdownCoordinator::new(config.server.shutdown_timeout);
    let counter = Arc::new(ConnectionCounter::new());
    let host = Arc::new(HostMetrics::new());
    let mut tasks = Vec::new();

    let prometheus = if config.telemetry.prometheus_enabled {
        Some(Arc::new(PrometheusSink::new()?))
    } else {
        None
    };

    let mut run_id = None;
    if config.telemetry.enabled {
        let mut sink = FanoutSink::new().with_sink(Arc::new(TracingSink));
        if let Some(prometheus) = &prometheus {
            sink = sink.with_sink(Arc::clone(prometheus) as Arc<dyn TelemetrySink>);
        }

        let sampler = HostResourceSampler::new(Arc::clone(&host), Arc::new(SysinfoProbe::new()));
        tasks.push(ShutdownAwareTask::spawn(&coordinator, "host-sampler", |rx| {
            sampler.run(rx)
        }));

        let reporter = StatusReporter::new(Arc::clone(&counter), Arc::clone(&host), Arc::new(sink))
            .with_log_reports(config.telemetry.log_reports);
        run_id = Some(reporter.run_id().to_string());
        tasks.push(ShutdownAwareTask::spawn(&coordinator, "status-reporter", |rx| {
            reporter.run(rx)
        }));
    } else {
        info!("Telemetry disabled, connections are counted but not reported");
    }

    if config.telemetry.management_api.enabled {
        let server = ManagementServer::new(
            config.telemetry.management_api.bind_addr,
            AppState {
                counter: Arc::clone(&counter),
                host: Arc::clone(&host),
                prometheus,
                run_id,
                start_time: Instant::now(),
            },
        );
        let listener = server.bind().await?;
        tasks.push(ShutdownAwareTask::spawn(&coordinator, "management-api", |rx| async move {
            if let Err(e) = server.serve(listener, rx).await {
                error!("Management API server error: {:#}", e);
            }
        }));
    }

    let load_listener = LoadListener::new(config.server.clone(), Arc::clone(&counter));
    let tcp = load_listener.bind().await?;
    tasks.push(ShutdownAwareTask::spawn(&coordinator, "load-listener", |rx| async move {
        if let Err(e) = load_listener.serve(tcp, rx).await {
            error!("Load listener error: {:#}", e);
        }
    }));

    info!("loadprobe started, press Ctrl+C or send SIGTERM/SIGINT to stop");

    if let Err(e) = coordinator.listen_for_signals().await {
        error!("Error setting up signal handlers: {}", e);
        coordinator.trigger();
    }

    coordinator.drain_connections(&counter).await;

    let grace = Duration::from_secs(2);
    for task in tasks {
        let name = task.name().to_string();
        if let Err(e) = task.join(grace).await {
            error!("Background task {} failed during shutdown: {}", name, e);
        }
    }

    let summary = counter.summary();
    info!(
        total_connected = summary.total_connected,
        total_disconnected = summary.total_disconnected,
        peak_connections = summary.peak_connections,
        "Shutdown complete"
    );

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs, config: &Config) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        args.log_level
            .as_deref()
            .unwrap_or(&config.telemetry.log_level)
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}
