// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::application::clock::SystemClock;
use crate::application::dashboard_service::DashboardService;
use crate::application::monitor_service::MonitorService;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::discord_notifier::DiscordNotifier;
use crate::infrastructure::hetrix_client::HetrixClient;
use crate::presentation::app_state::AppState;
use crate::presentation::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "uptime_dashboard=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = load_dashboard_config()?;
    let addr = config.server.socket_addr()?;
    if config.upstream.api_token.is_none() {
        tracing::warn!("HETRIX_API_TOKEN is not set; every upstream request will fail");
    }

    // Create adapters (infrastructure layer)
    let source = Arc::new(HetrixClient::new(
        config.upstream.base_url.clone(),
        config.upstream.api_token.clone(),
        config.upstream.request_timeout(),
        config.upstream.downtime_delay(),
    )?);
    let notifier = DiscordNotifier::new(
        reqwest::Client::builder()
            .timeout(config.upstream.request_timeout())
            .build()?,
        config.notifier.webhook_url.clone(),
        config.notifier.username.clone(),
        config.notifier.avatar_url.clone(),
        config.notifier.dashboard_url.clone(),
    );
    if !notifier.is_configured() {
        tracing::info!("No webhook configured; status change notifications are disabled");
    }

    // Create services (application layer)
    let monitor_service = MonitorService::new(
        source,
        Arc::new(notifier),
        config.cache.policy(),
        Arc::new(SystemClock),
        config.upstream.downtime_concurrency,
    );
    let state = Arc::new(AppState {
        dashboard_service: DashboardService::new(monitor_service),
    });

    // Build router (presentation layer)
    let router = build_router(state);

    tracing::info!("Starting uptime-dashboard service on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
