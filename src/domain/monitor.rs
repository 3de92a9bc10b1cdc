// Monitor domain models
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Category whose monitors run a server agent that reports resource stats.
pub const AGENT_CATEGORY: &str = "Nodes";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_MONITOR_NAME: &str = "Unknown Monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorStatus {
    Up,
    Down,
    Maintenance,
}

impl MonitorStatus {
    /// Parse an upstream status string. Anything unrecognised counts as down.
    pub fn from_upstream(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("up") => MonitorStatus::Up,
            Some("maintenance") => MonitorStatus::Maintenance,
            _ => MonitorStatus::Down,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Up => "up",
            MonitorStatus::Down => "down",
            MonitorStatus::Maintenance => "maintenance",
        }
    }
}

/// Status of a monitor as seen from one probing location.
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub response_time: Option<u64>,
    pub uptime_status: MonitorStatus,
    /// Epoch seconds, 0 when the location never checked.
    pub last_check: i64,
}

/// A reported `[start, end]` span in epoch seconds. `end >= start` is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downtime {
    pub id: String,
    pub start: i64,
    pub end: i64,
    pub maintenance: bool,
}

impl Downtime {
    pub fn new(id: impl Into<String>, start: i64, end: i64, maintenance: bool) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            maintenance,
        }
    }

    /// Length in seconds, zero for inverted or empty intervals.
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).max(0)
    }
}

/// A monitor record normalised from the upstream list, before downtimes are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorRecord {
    pub id: String,
    pub name: String,
    pub target: String,
    pub status: MonitorStatus,
    pub uptime: f64,
    pub last_check: i64,
    pub monitor_type: Option<String>,
    pub category: String,
    pub locations: BTreeMap<String, Info>,
}

impl MonitorRecord {
    /// A record without an id cannot be keyed for downtimes or stats.
    pub fn is_identifiable(&self) -> bool {
        !self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    pub id: String,
    pub name: String,
    pub target: String,
    pub status: MonitorStatus,
    pub uptime: f64,
    pub last_check: i64,
    pub monitor_type: Option<String>,
    pub category: String,
    pub locations: BTreeMap<String, Info>,
    pub downtimes: Vec<Downtime>,
}

impl Monitor {
    pub fn from_record(record: MonitorRecord, downtimes: Vec<Downtime>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            target: record.target,
            status: record.status,
            uptime: record.uptime,
            last_check: record.last_check,
            monitor_type: record.monitor_type,
            category: record.category,
            locations: record.locations,
            downtimes,
        }
    }

    pub fn has_agent(&self) -> bool {
        self.category == AGENT_CATEGORY
    }

    /// The downtime that ended last, if any were reported.
    pub fn latest_downtime(&self) -> Option<&Downtime> {
        self.downtimes.iter().max_by_key(|d| d.end)
    }
}

/// Clamp to [0, 100] and round to two decimals.
pub fn normalize_uptime(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkStats {
    pub inbound: f64,
    pub outbound: f64,
}

/// Resource usage reported by a server agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStats {
    pub status: String,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub network: NetworkStats,
    pub fetched_at: DateTime<Utc>,
}

/// Group monitors by category, categories in name order, monitors in input order.
pub fn group_by_category(monitors: &[Monitor]) -> BTreeMap<&str, Vec<&Monitor>> {
    let mut groups: BTreeMap<&str, Vec<&Monitor>> = BTreeMap::new();
    for monitor in monitors {
        groups.entry(monitor.category.as_str()).or_default().push(monitor);
    }
    groups
}

#[cfg(test)]
pub(crate) fn sample_record(id: &str, category: &str) -> MonitorRecord {
    MonitorRecord {
        id: id.to_string(),
        name: format!("monitor-{}", id),
        target: format!("https://{}.example.com", id),
        status: MonitorStatus::Up,
        uptime: 99.5,
        last_check: 1_700_000_000,
        monitor_type: Some("http".to_string()),
        category: category.to_string(),
        locations: BTreeMap::new(),
    }
}
