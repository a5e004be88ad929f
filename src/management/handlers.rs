//! Management API Handlers

use super::types::*;
use crate::connection::ConnectionCounter;
use crate::host::HostMetrics;
use crate::metrics::PrometheusSink;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub counter: Arc<ConnectionCounter>,
    pub host: Arc<HostMetrics>,
    /// Absent when Prometheus export is disabled
    pub prometheus: Option<Arc<PrometheusSink>>,
    /// Absent when status reporting is disabled
    pub run_id: Option<String>,
    pub start_time: Instant,
}

impl AppState {
    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Current connection counters and host sample
pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<TelemetryStatus>> {
    Json(ApiResponse::success(TelemetryStatus {
        run_id: state.run_id.clone(),
        uptime_seconds: state.uptime_seconds(),
        connections: state.counter.summary(),
        host: state.host.snapshot(),
    }))
}

/// Prometheus scrape endpoint
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(sink) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            sink.export(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                "Prometheus export is disabled".to_string(),
            )),
        )
            .into_response(),
    }
}
