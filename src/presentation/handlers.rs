// HTTP request handlers
use crate::application::freshness_cache::FetchError;
use crate::application::upstream::{ErrorKind, UpstreamError};
use crate::domain::calendar::bucket_downtimes;
use crate::infrastructure::json_mapper::{
    CategoriesResponse, DayStatusView, MonitorsResponse, ServerStatsView, day_status_to_view,
    server_stats_to_view, snapshot_to_categories, snapshot_to_response,
};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug)]
pub enum ApiError {
    Fetch(FetchError),
    NotFound(String),
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        ApiError::Fetch(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Fetch(FetchError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Fetch(FetchError::Upstream(UpstreamError::Config)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Fetch(FetchError::Upstream(e)) if e.kind() == ErrorKind::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::Fetch(FetchError::Upstream(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Fetch(e) => e.to_string(),
            ApiError::NotFound(id) => format!("monitor {} not found", id),
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current monitors, possibly the last known list when upstream is failing
pub async fn list_monitors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MonitorsResponse>, ApiError> {
    let snapshot = state.dashboard_service.snapshot().await?;
    Ok(Json(snapshot_to_response(&snapshot)))
}

/// Force a revalidation of the monitor list
pub async fn refresh_monitors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MonitorsResponse>, ApiError> {
    let snapshot = state.dashboard_service.refresh().await?;
    Ok(Json(snapshot_to_response(&snapshot)))
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let snapshot = state.dashboard_service.snapshot().await?;
    Ok(Json(snapshot_to_categories(&snapshot)))
}

/// 61-day status calendar for one monitor
pub async fn monitor_calendar(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DayStatusView>>, ApiError> {
    let monitor = state
        .dashboard_service
        .find_monitor(&id)
        .await?
        .ok_or(ApiError::NotFound(id))?;

    let days = bucket_downtimes(&monitor.downtimes, Utc::now());
    Ok(Json(days.iter().map(day_status_to_view).collect()))
}

pub async fn server_stats(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ServerStatsView>, ApiError> {
    let stats = state.dashboard_service.server_stats(&id).await?;
    Ok(Json(server_stats_to_view(&stats)))
}
