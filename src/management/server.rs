//! Management API Server

use super::{api::ManagementApi, handlers::AppState};
use crate::Result;
use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// Management API server
pub struct ManagementServer {
    bind_addr: SocketAddr,
    app_state: AppState,
}

impl ManagementServer {
    /// Create a new management server
    pub fn new(bind_addr: SocketAddr, app_state: AppState) -> Self {
        Self {
            bind_addr,
            app_state,
        }
    }

    /// Bind the listener without serving yet
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind management API server to {}", self.bind_addr))
    }

    /// Serve until the shutdown signal arrives
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let app = ManagementApi::create_router(self.app_state);
        info!("Management API server listening on {}", listener.local_addr()?);

        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
            info!("Management API server shutting down");
        };

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Management API server error: {}", e);
            return Err(e.into());
        }

        Ok(())
    }

    /// Create a router for testing
    pub fn create_test_router(&self) -> Router {
        ManagementApi::create_router(self.app_state.clone())
    }
}
