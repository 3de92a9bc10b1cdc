// Mapper to convert domain models to JSON views
use crate::application::dashboard_service::DashboardSnapshot;
use crate::domain::calendar::DayStatus;
use crate::domain::monitor::{Downtime, Info, Monitor, ServerStats, group_by_category};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorView {
    pub id: String,
    pub name: String,
    pub target: String,
    pub status: &'static str,
    pub uptime: f64,
    pub last_check: i64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub monitor_type: Option<String>,
    pub category: String,
    pub has_agent: bool,
    pub locations: BTreeMap<String, InfoView>,
    pub downtimes: Vec<DowntimeView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    pub uptime_status: &'static str,
    pub last_check: i64,
}

#[derive(Debug, Serialize)]
pub struct DowntimeView {
    pub id: String,
    pub start: i64,
    pub end: i64,
    pub maintenance: bool,
}

#[derive(Debug, Serialize)]
pub struct DayStatusView {
    pub date: String,
    pub status: &'static str,
    pub count: u32,
    /// Seconds of downtime within the day.
    pub downtime: u64,
}

#[derive(Debug, Serialize)]
pub struct MonitorsResponse {
    pub monitors: Vec<MonitorView>,
    pub degraded: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub name: String,
    pub monitors: Vec<MonitorView>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategoryView>,
    pub degraded: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerStatsView {
    pub status: String,
    pub data: ServerStatsData,
}

#[derive(Debug, Serialize)]
pub struct ServerStatsData {
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    pub network: NetworkView,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct NetworkView {
    #[serde(rename = "in")]
    pub inbound: f64,
    #[serde(rename = "out")]
    pub outbound: f64,
}

pub fn monitor_to_view(monitor: &Monitor) -> MonitorView {
    MonitorView {
        id: monitor.id.clone(),
        name: monitor.name.clone(),
        target: monitor.target.clone(),
        status: monitor.status.as_str(),
        uptime: monitor.uptime,
        last_check: monitor.last_check,
        monitor_type: monitor.monitor_type.clone(),
        category: monitor.category.clone(),
        has_agent: monitor.has_agent(),
        locations: monitor
            .locations
            .iter()
            .map(|(name, info)| (name.clone(), info_to_view(info)))
            .collect(),
        downtimes: monitor.downtimes.iter().map(downtime_to_view).collect(),
    }
}

fn info_to_view(info: &Info) -> InfoView {
    InfoView {
        response_time: info.response_time,
        uptime_status: info.uptime_status.as_str(),
        last_check: info.last_check,
    }
}

fn downtime_to_view(downtime: &Downtime) -> DowntimeView {
    DowntimeView {
        id: downtime.id.clone(),
        start: downtime.start,
        end: downtime.end,
        maintenance: downtime.maintenance,
    }
}

pub fn day_status_to_view(day: &DayStatus) -> DayStatusView {
    DayStatusView {
        date: day.date.format("%Y-%m-%d").to_string(),
        status: day.status.as_str(),
        count: day.count,
        downtime: day.downtime.as_secs(),
    }
}

pub fn snapshot_to_response(snapshot: &DashboardSnapshot) -> MonitorsResponse {
    MonitorsResponse {
        monitors: snapshot.monitors.iter().map(monitor_to_view).collect(),
        degraded: snapshot.degraded.clone(),
    }
}

pub fn snapshot_to_categories(snapshot: &DashboardSnapshot) -> CategoriesResponse {
    let categories = group_by_category(&snapshot.monitors)
        .into_iter()
        .map(|(name, monitors)| CategoryView {
            name: name.to_string(),
            monitors: monitors.into_iter().map(monitor_to_view).collect(),
        })
        .collect();

    CategoriesResponse {
        categories,
        degraded: snapshot.degraded.clone(),
    }
}

pub fn server_stats_to_view(stats: &ServerStats) -> ServerStatsView {
    ServerStatsView {
        status: stats.status.clone(),
        data: ServerStatsData {
            cpu: stats.cpu,
            ram: stats.ram,
            disk: stats.disk,
            network: NetworkView {
                inbound: stats.network.inbound,
                outbound: stats.network.outbound,
            },
            timestamp: stats.fetched_at.to_rfc3339(),
        },
    }
}
