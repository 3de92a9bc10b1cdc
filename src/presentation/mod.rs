// Presentation layer - HTTP surface
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    health_check, list_categories, list_monitors, monitor_calendar, refresh_monitors, server_stats,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/monitors", get(list_monitors))
        .route("/api/monitors/refresh", post(refresh_monitors))
        .route("/api/monitors/:id/calendar", get(monitor_calendar))
        .route("/api/categories", get(list_categories))
        .route("/api/servers/:id/stats", get(server_stats))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
