// Monitor service - Use case for assembling the monitor list
use crate::application::clock::Clock;
use crate::application::freshness_cache::{CachePolicy, FetchError, FreshnessCache};
use crate::application::upstream::{MonitorSource, Notifier, UpstreamError};
use crate::domain::monitor::{Downtime, Monitor, MonitorRecord, MonitorStatus, ServerStats};
use crate::domain::notification::StatusChangeEvent;
use futures::{StreamExt, TryStreamExt, stream};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

const MONITORS_KEY: &str = "monitors";

pub type MonitorList = Arc<Vec<Monitor>>;

#[derive(Clone)]
pub struct MonitorService {
    source: Arc<dyn MonitorSource>,
    notifier: Arc<dyn Notifier>,
    monitors: Arc<FreshnessCache<&'static str, MonitorList>>,
    downtimes: Arc<FreshnessCache<String, Vec<Downtime>>>,
    stats: Arc<FreshnessCache<String, ServerStats>>,
    last_statuses: Arc<Mutex<HashMap<String, MonitorStatus>>>,
    downtime_concurrency: usize,
}

impl MonitorService {
    pub fn new(
        source: Arc<dyn MonitorSource>,
        notifier: Arc<dyn Notifier>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
        downtime_concurrency: usize,
    ) -> Self {
        Self {
            source,
            notifier,
            monitors: Arc::new(FreshnessCache::new("monitors", policy, clock.clone())),
            // Downtime history is fetched once per monitor and kept for the process lifetime.
            downtimes: Arc::new(FreshnessCache::new("downtimes", CachePolicy::pinned(), clock.clone())),
            stats: Arc::new(FreshnessCache::new("server_stats", policy, clock)),
            last_statuses: Arc::new(Mutex::new(HashMap::new())),
            downtime_concurrency: downtime_concurrency.max(1),
        }
    }

    /// Current monitors with their downtime history.
    pub async fn get_monitors(&self) -> Result<MonitorList, FetchError> {
        let service = self.clone();
        self.monitors
            .get_or_fetch(MONITORS_KEY, move || async move { service.aggregate().await })
            .await
    }

    /// Revalidate the monitor list now, falling back to a stale list on failure.
    pub async fn refresh_monitors(&self) -> Result<MonitorList, FetchError> {
        let service = self.clone();
        self.monitors
            .refresh(MONITORS_KEY, move || async move { service.aggregate().await })
            .await
    }

    pub async fn get_server_stats(&self, monitor_id: &str) -> Result<ServerStats, FetchError> {
        let source = self.source.clone();
        let id = monitor_id.to_string();
        self.stats
            .get_or_fetch(monitor_id.to_string(), move || async move {
                source.fetch_server_stats(&id).await
            })
            .await
    }

    /// One full refresh cycle. Any monitor whose downtimes cannot be fetched fails the cycle.
    async fn aggregate(&self) -> Result<MonitorList, UpstreamError> {
        let records = self.source.list_monitors().await?;
        tracing::info!("Fetched {} monitors from upstream", records.len());

        let service = self.clone();
        let monitors: Vec<Monitor> = stream::iter(records)
            .map(move |record| {
                let service = service.clone();
                async move { service.assemble(record).await }
            })
            .buffered(self.downtime_concurrency)
            .try_collect()
            .await
            .inspect_err(|e| tracing::error!("Monitor refresh cycle failed: {}", e))?;

        for monitor in monitors.iter().filter(|m| !m.id.is_empty()) {
            self.emit_status_change(monitor);
        }
        Ok(Arc::new(monitors))
    }

    async fn assemble(&self, record: MonitorRecord) -> Result<Monitor, UpstreamError> {
        if !record.is_identifiable() {
            tracing::warn!("Monitor {:?} has no id; skipping downtime history", record.name);
            return Ok(Monitor::from_record(record, Vec::new()));
        }

        let downtimes = self.downtimes_for(&record.id).await?;
        Ok(Monitor::from_record(record, downtimes))
    }

    async fn downtimes_for(&self, monitor_id: &str) -> Result<Vec<Downtime>, UpstreamError> {
        let source = self.source.clone();
        let id = monitor_id.to_string();
        self.downtimes
            .get_or_fetch(monitor_id.to_string(), move || async move {
                source.fetch_downtimes(&id).await
            })
            .await
            .map_err(|e| match e {
                FetchError::Upstream(inner) => inner,
                // Keep the rate-limit classification so the monitor list cools down too.
                FetchError::RateLimited => UpstreamError::Http {
                    status: 429,
                    body: format!("downtime history for {} is rate limited", monitor_id),
                },
            })
    }

    fn emit_status_change(&self, monitor: &Monitor) {
        let previous = self
            .last_statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(monitor.id.clone(), monitor.status);

        let Some(event) = previous.and_then(|p| StatusChangeEvent::detect(p, monitor)) else {
            return;
        };

        tracing::info!(
            "Monitor {} changed status: {} -> {}",
            event.monitor_name,
            event.previous.as_str(),
            event.current.as_str()
        );
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            notifier.notify(&event).await;
        });
    }
}
