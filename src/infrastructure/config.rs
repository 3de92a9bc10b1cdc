use crate::application::freshness_cache::CachePolicy;
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub notifier: NotifierSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid server.bind {:?}: {}", self.bind, e))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub downtime_delay_ms: u64,
    pub downtime_concurrency: usize,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.hetrixtools.com/v3".to_string(),
            api_token: None,
            request_timeout_secs: 30,
            downtime_delay_ms: 10_000,
            downtime_concurrency: 4,
        }
    }
}

impl UpstreamSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn downtime_delay(&self) -> Duration {
        Duration::from_millis(self.downtime_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheSettings {
    pub fresh_window_ms: u64,
    pub stale_window_secs: u64,
    pub rate_limit_cooldown_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let policy = CachePolicy::default();
        Self {
            fresh_window_ms: policy.fresh_window.as_millis() as u64,
            stale_window_secs: policy.stale_window.as_secs(),
            rate_limit_cooldown_secs: policy.rate_limit_cooldown.as_secs(),
        }
    }
}

impl CacheSettings {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            fresh_window: Duration::from_millis(self.fresh_window_ms),
            stale_window: Duration::from_secs(self.stale_window_secs),
            rate_limit_cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierSettings {
    pub webhook_url: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub dashboard_url: Option<String>,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Uptime Monitor".to_string(),
            avatar_url: None,
            dashboard_url: None,
        }
    }
}

/// Load settings from `config/dashboard.toml` (optional), `DASHBOARD_*` variables,
/// and the `HETRIX_API_TOKEN` / `WEBHOOK_URL` variables.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("upstream.api_token", non_empty_env("HETRIX_API_TOKEN"))?
        .set_override_option("notifier.webhook_url", non_empty_env("WEBHOOK_URL"))?;

    build_config(builder)
}

fn build_config(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<DashboardConfig> {
    let mut cfg: DashboardConfig = builder.build()?.try_deserialize()?;
    cfg.upstream.api_token = cfg.upstream.api_token.filter(|t| !t.trim().is_empty());
    cfg.notifier.webhook_url = cfg.notifier.webhook_url.filter(|u| !u.trim().is_empty());
    Ok(cfg)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
