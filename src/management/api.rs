//! Management API Routes

use super::handlers::*;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

/// Management API router
pub struct ManagementApi;

impl ManagementApi {
    /// Create the management API router
    pub fn create_router(state: AppState) -> Router {
        let api_routes = Router::new().route("/status", get(get_status));

        Router::new()
            .route("/health", get(health_check))
            .route("/metrics", get(get_metrics))
            .nest("/api/v1", api_routes)
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}
