// Ports to the monitoring API and the notification channel
use crate::domain::monitor::{Downtime, MonitorRecord, ServerStats};
use crate::domain::notification::StatusChangeEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to the monitoring API.
///
/// Cloneable so one coalesced outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpstreamError {
    #[error("monitoring API token is not configured")]
    Config,
    #[error("upstream request failed with status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid upstream response format: {0}")]
    Format(String),
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream fetch aborted: {0}")]
    Aborted(String),
}

impl From<tokio::task::JoinError> for UpstreamError {
    fn from(err: tokio::task::JoinError) -> Self {
        UpstreamError::Aborted(err.to_string())
    }
}

/// Failure classification remembered by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Http,
    Format,
    Transport,
    RateLimited,
}

impl UpstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::Config => ErrorKind::Config,
            UpstreamError::Http { status: 429, .. } => ErrorKind::RateLimited,
            UpstreamError::Http { .. } => ErrorKind::Http,
            UpstreamError::Format(_) => ErrorKind::Format,
            UpstreamError::Transport(_) | UpstreamError::Aborted(_) => ErrorKind::Transport,
        }
    }
}

#[async_trait]
pub trait MonitorSource: Send + Sync {
    /// List all uptime monitors, normalised.
    async fn list_monitors(&self) -> Result<Vec<MonitorRecord>, UpstreamError>;

    /// Downtime history for one monitor. Implementations may delay before the request.
    async fn fetch_downtimes(&self, monitor_id: &str) -> Result<Vec<Downtime>, UpstreamError>;

    /// Current resource usage reported by a server agent.
    async fn fetch_server_stats(&self, monitor_id: &str) -> Result<ServerStats, UpstreamError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a status change. Delivery failures are the notifier's to log.
    async fn notify(&self, event: &StatusChangeEvent);
}
