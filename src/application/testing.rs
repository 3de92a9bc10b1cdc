// In-process fakes for the upstream and notifier ports
use crate::application::upstream::{MonitorSource, Notifier, UpstreamError};
use crate::domain::monitor::{Downtime, MonitorRecord, NetworkStats, ServerStats};
use crate::domain::notification::StatusChangeEvent;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

pub struct FakeSource {
    pub records: Mutex<Result<Vec<MonitorRecord>, UpstreamError>>,
    pub downtimes: Mutex<HashMap<String, Result<Vec<Downtime>, UpstreamError>>>,
    pub list_calls: AtomicUsize,
    pub downtime_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(records: Vec<MonitorRecord>) -> Self {
        Self {
            records: Mutex::new(Ok(records)),
            downtimes: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            downtime_calls: AtomicUsize::new(0),
            stats_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_records(&self, records: Result<Vec<MonitorRecord>, UpstreamError>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn set_downtimes(&self, monitor_id: &str, downtimes: Result<Vec<Downtime>, UpstreamError>) {
        self.downtimes
            .lock()
            .unwrap()
            .insert(monitor_id.to_string(), downtimes);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn downtime_calls(&self) -> usize {
        self.downtime_calls.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MonitorSource for FakeSource {
    async fn list_monitors(&self) -> Result<Vec<MonitorRecord>, UpstreamError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.records.lock().unwrap().clone()
    }

    async fn fetch_downtimes(&self, monitor_id: &str) -> Result<Vec<Downtime>, UpstreamError> {
        self.downtime_calls.fetch_add(1, Ordering::SeqCst);
        self.downtimes
            .lock()
            .unwrap()
            .get(monitor_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_server_stats(&self, _monitor_id: &str) -> Result<ServerStats, UpstreamError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ServerStats {
            status: "SUCCESS".to_string(),
            cpu: 12.5,
            ram: 40.0,
            disk: 70.25,
            network: NetworkStats {
                inbound: 1.5,
                outbound: 0.5,
            },
            fetched_at: Utc::now(),
        })
    }
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<StatusChangeEvent>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &StatusChangeEvent) {
        let _ = self.tx.send(event.clone());
    }
}
