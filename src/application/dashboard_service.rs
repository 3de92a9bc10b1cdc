// Dashboard service - Keeps the last good monitor list on screen
use crate::application::freshness_cache::FetchError;
use crate::application::monitor_service::{MonitorList, MonitorService};
use crate::domain::monitor::{Monitor, ServerStats};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub monitors: MonitorList,
    /// Set when the latest refresh failed and an older list is being shown.
    pub degraded: Option<String>,
}

#[derive(Clone)]
pub struct DashboardService {
    monitor_service: MonitorService,
    last_good: Arc<RwLock<Option<MonitorList>>>,
}

impl DashboardService {
    pub fn new(monitor_service: MonitorService) -> Self {
        Self {
            monitor_service,
            last_good: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot, FetchError> {
        let result = self.monitor_service.get_monitors().await;
        self.settle(result)
    }

    pub async fn refresh(&self) -> Result<DashboardSnapshot, FetchError> {
        let result = self.monitor_service.refresh_monitors().await;
        self.settle(result)
    }

    pub async fn find_monitor(&self, monitor_id: &str) -> Result<Option<Monitor>, FetchError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.monitors.iter().find(|m| m.id == monitor_id).cloned())
    }

    pub async fn server_stats(&self, monitor_id: &str) -> Result<ServerStats, FetchError> {
        self.monitor_service.get_server_stats(monitor_id).await
    }

    fn settle(&self, result: Result<MonitorList, FetchError>) -> Result<DashboardSnapshot, FetchError> {
        match result {
            Ok(monitors) => {
                *self.last_good.write().unwrap_or_else(PoisonError::into_inner) = Some(monitors.clone());
                Ok(DashboardSnapshot {
                    monitors,
                    degraded: None,
                })
            }
            Err(e) => {
                let last_good = self.last_good.read().unwrap_or_else(PoisonError::into_inner).clone();
                match last_good {
                    Some(monitors) => {
                        tracing::warn!("Serving last known monitor list: {}", e);
                        Ok(DashboardSnapshot {
                            monitors,
                            degraded: Some(e.to_string()),
                        })
                    }
                    None => Err(e),
                }
            }
        }
    }
}
