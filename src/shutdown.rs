//! Graceful Shutdown Handling
//!
//! Broadcasts one shutdown signal to every background loop and drains open
//! load-test connections before the process exits.

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionCounter;
use crate::Result;

/// Shutdown coordinator that manages graceful shutdown process
pub struct ShutdownCoordinator {
    /// Broadcast sender for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// Connection drain timeout
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shutdown_tx,
            timeout,
        }
    }

    /// Get a shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown of every subscribed component
    pub fn trigger(&self) {
        match self.shutdown_tx.send(()) {
            Ok(receivers) => debug!(receivers, "Shutdown signal broadcast"),
            Err(_) => debug!("Shutdown requested with no active subscribers"),
        }
    }

    /// Wait for SIGTERM, SIGINT or Ctrl+C, then broadcast shutdown
    pub async fn listen_for_signals(&self) -> Result<()> {
        info!("Starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        self.trigger();
        Ok(())
    }

    /// Wait for open connections to close, bounded by the shutdown timeout.
    ///
    /// Returns the number of connections still open when waiting stopped.
    pub async fn drain_connections(&self, counter: &ConnectionCounter) -> u64 {
        let start_time = Instant::now();
        let mut last_count = counter.summary().current_connections;
        info!(
            "Waiting for {} active connections to close (timeout: {:?})",
            last_count, self.timeout
        );

        while last_count > 0 && start_time.elapsed() < self.timeout {
            tokio::time::sleep(Duration::from_millis(100)).await;

            let current_count = counter.summary().current_connections;
            if current_count != last_count {
                debug!("Active connections: {} -> {}", last_count, current_count);
                last_count = current_count;
            }
        }

        if last_count == 0 {
            info!("All connections closed gracefully in {:?}", start_time.elapsed());
        } else {
            warn!(
                "Shutdown timeout reached after {:?} with {} connections still active",
                start_time.elapsed(),
                last_count
            );
        }

        last_count
    }
}

/// True once a shutdown signal is pending or the coordinator is gone
pub fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
}

/// Sleep for `period` unless shutdown arrives first.
///
/// Returns `true` when the wait ended because of shutdown.
pub async fn sleep_or_shutdown(
    period: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => false,
        _ = shutdown_rx.recv() => true,
    }
}

/// Shutdown-aware task handle that can be gracefully cancelled
pub struct ShutdownAwareTask {
    name: Arc<str>,
    handle: tokio::task::JoinHandle<()>,
}

impl ShutdownAwareTask {
    /// Spawn a background loop that receives its own shutdown receiver
    pub fn spawn<F, Fut>(
        shutdown_coordinator: &ShutdownCoordinator,
        task_name: &str,
        task_fn: F,
    ) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let shutdown_rx = shutdown_coordinator.subscribe();
        let name: Arc<str> = Arc::from(task_name);
        let task_name = Arc::clone(&name);

        let handle = tokio::spawn(async move {
            debug!("Starting shutdown-aware task: {}", task_name);
            task_fn(shutdown_rx).await;
            debug!("Shutdown-aware task completed: {}", task_name);
        });

        Self { name, handle }
    }

    /// Task name given at spawn time
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the task to finish on its own, aborting it after `grace`
    pub async fn join(mut self, grace: Duration) -> Result<()> {
        let outcome = tokio::time::timeout(grace, &mut self.handle).await;
        match outcome {
            Ok(Ok(())) => {
                debug!("Task {} completed successfully", self.name);
                Ok(())
            }
            Ok(Err(e)) if e.is_cancelled() => {
                debug!("Task {} was cancelled", self.name);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Task {} failed: {}", self.name, e);
                Err(anyhow::anyhow!("Task {} failed: {}", self.name, e))
            }
            Err(_) => {
                warn!("Task {} did not stop within {:?}, aborting", self.name, grace);
                self.handle.abort();
                Ok(())
            }
        }
    }
}
