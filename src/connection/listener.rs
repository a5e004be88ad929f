//! Load Target Listener
//!
//! A TCP echo endpoint for load generators. Every accepted connection is
//! counted through a [`ConnectionGuard`] for its whole lifetime.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use super::counter::{ConnectionCounter, ConnectionGuard};
use crate::config::ServerConfig;
use crate::Result;

/// Accepts load-test connections and echoes their traffic
pub struct LoadListener {
    config: ServerConfig,
    counter: Arc<ConnectionCounter>,
    connection_slots: Arc<Semaphore>,
    next_connection_id: AtomicUsize,
    connection_shutdown_tx: broadcast::Sender<()>,
}

impl LoadListener {
    /// Create a listener that reports into `counter`
    pub fn new(config: ServerConfig, counter: Arc<ConnectionCounter>) -> Self {
        let connection_slots = Arc::new(Semaphore::new(config.max_connections));
        let (connection_shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            counter,
            connection_slots,
            next_connection_id: AtomicUsize::new(1),
            connection_shutdown_tx,
        }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let bind_addr = self.config.bind_addr;
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind load listener to {}", bind_addr))?;

        info!("Load listener bound to {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept connections until a shutdown signal arrives.
    ///
    /// Open connections are told to close once accepting stops.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Starting connection acceptance loop");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.dispatch(stream, addr),
                        Err(e) => error!("Error accepting connection: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, stopping connection acceptance");
                    break;
                }
            }
        }

        // No receivers just means no connection is open.
        let _ = self.connection_shutdown_tx.send(());
        info!("Connection acceptance loop stopped");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        let permit = match Arc::clone(&self.connection_slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Connection limit reached ({}), rejecting connection from {}",
                    self.config.max_connections, addr
                );
                return;
            }
        };

        let connection_id = format!(
            "conn_{}",
            self.next_connection_id.fetch_add(1, Ordering::Relaxed)
        );
        let guard = self.counter.track();
        let buffer_size = self.config.buffer_size;
        let shutdown_rx = self.connection_shutdown_tx.subscribe();

        tokio::spawn(async move {
            handle_connection(stream, addr, connection_id, buffer_size, guard, permit, shutdown_rx)
                .await;
        });
    }
}

#[instrument(skip_all, fields(connection_id = %connection_id, addr = %addr))]
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_id: String,
    buffer_size: usize,
    _guard: ConnectionGuard,
    _permit: OwnedSemaphorePermit,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    debug!("Connection opened");

    tokio::select! {
        result = echo(stream, buffer_size) => {
            match result {
                Ok(bytes) => debug!(bytes, "Connection closed by peer"),
                Err(e) => debug!(error = %e, "Connection ended with error"),
            }
        }
        _ = shutdown_rx.recv() => {
            debug!("Closing connection for shutdown");
        }
    }
}

/// Echo until EOF, returning the number of bytes relayed
async fn echo(mut stream: TcpStream, buffer_size: usize) -> std::io::Result<u64> {
    let mut buffer = BytesMut::with_capacity(buffer_size);
    let mut relayed = 0u64;

    loop {
        buffer.clear();
        let read = stream.read_buf(&mut buffer).await?;
        if read == 0 {
            return Ok(relayed);
        }
        stream.write_all(&buffer).await?;
        relayed += read as u64;
    }
}
