//! Route Configuration
//!
//! Configures all HTTP routes, including the WebSocket endpoint.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::admin_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // Per-user alert channel
        .route("/ws/{user_id}", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new().nest("/alerts", alert_routes(state))
}

/// Alert source routes (admin only)
fn alert_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}", post(handlers::alerts::publish_to_user))
        .route("/broadcast", post(handlers::alerts::broadcast))
        .route_layer(middleware::from_fn_with_state(state, admin_middleware))
}
