// HetrixTools API client
use crate::application::upstream::{MonitorSource, UpstreamError};
use crate::domain::monitor::{
    DEFAULT_CATEGORY, DEFAULT_MONITOR_NAME, Downtime, Info, MonitorRecord, MonitorStatus,
    NetworkStats, ServerStats, normalize_uptime,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HetrixClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    downtime_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct RawMonitor {
    id: Option<Value>,
    #[serde(rename = "ID")]
    id_upper: Option<Value>,
    name: Option<Value>,
    #[serde(rename = "Name")]
    name_upper: Option<Value>,
    target: Option<String>,
    uptime_status: Option<String>,
    uptime: Option<Value>,
    last_check: Option<Value>,
    #[serde(rename = "type")]
    monitor_type: Option<String>,
    category: Option<String>,
    locations: Option<HashMap<String, RawLocation>>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    response_time: Option<Value>,
    uptime_status: Option<String>,
    last_check: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDowntime {
    id: Option<Value>,
    start: Option<Value>,
    end: Option<Value>,
    #[serde(default)]
    maintenance: bool,
}

impl HetrixClient {
    pub fn new(
        base_url: String,
        api_token: Option<String>,
        request_timeout: Duration,
        downtime_delay: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            downtime_delay,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, UpstreamError> {
        let token = self.api_token.as_deref().ok_or(UpstreamError::Config)?;
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!("{} responded with {}", path, status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Upstream request {} failed with status {}: {}", path, status, body);
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Format(format!("{} returned invalid JSON: {}", path, e)))
    }
}

#[async_trait]
impl MonitorSource for HetrixClient {
    async fn list_monitors(&self) -> Result<Vec<MonitorRecord>, UpstreamError> {
        let body = self.get_json("/uptime-monitors").await?;
        parse_monitor_list(body)
    }

    async fn fetch_downtimes(&self, monitor_id: &str) -> Result<Vec<Downtime>, UpstreamError> {
        tokio::time::sleep(self.downtime_delay).await;

        let path = format!("/uptime-monitors/{}/downtimes", urlencoding::encode(monitor_id));
        let body = self.get_json(&path).await?;
        let downtimes = parse_downtimes(body)?;
        tracing::debug!("Monitor {} has {} downtimes", monitor_id, downtimes.len());
        Ok(downtimes)
    }

    async fn fetch_server_stats(&self, monitor_id: &str) -> Result<ServerStats, UpstreamError> {
        let path = format!("/server-monitor/{}/stats", urlencoding::encode(monitor_id));
        let body = self.get_json(&path).await?;
        parse_server_stats(body)
    }
}

fn parse_monitor_list(body: Value) -> Result<Vec<MonitorRecord>, UpstreamError> {
    let raw = match body.get("monitors") {
        Some(Value::Array(items)) => items.clone(),
        other => {
            return Err(UpstreamError::Format(format!(
                "expected monitors array, got {}{}",
                other.map(json_type).unwrap_or("nothing"),
                error_message(&body)
                    .map(|m| format!(" ({})", m))
                    .unwrap_or_default()
            )));
        }
    };

    raw.into_iter()
        .map(|item| {
            serde_json::from_value::<RawMonitor>(item)
                .map(normalize_monitor)
                .map_err(|e| UpstreamError::Format(format!("invalid monitor record: {}", e)))
        })
        .collect()
}

fn normalize_monitor(raw: RawMonitor) -> MonitorRecord {
    let locations: BTreeMap<String, Info> = raw
        .locations
        .unwrap_or_default()
        .into_iter()
        .map(|(name, location)| {
            let info = Info {
                response_time: location
                    .response_time
                    .as_ref()
                    .and_then(as_number)
                    .map(|ms| ms.max(0.0).round() as u64),
                uptime_status: MonitorStatus::from_upstream(location.uptime_status.as_deref()),
                last_check: as_seconds(&location.last_check),
            };
            (name, info)
        })
        .collect();

    MonitorRecord {
        id: first_text(&[&raw.id, &raw.id_upper]).unwrap_or_default(),
        name: first_text(&[&raw.name, &raw.name_upper])
            .unwrap_or_else(|| DEFAULT_MONITOR_NAME.to_string()),
        target: raw.target.unwrap_or_default(),
        status: MonitorStatus::from_upstream(raw.uptime_status.as_deref()),
        uptime: normalize_uptime(raw.uptime.as_ref().and_then(as_number).unwrap_or(0.0)),
        last_check: as_seconds(&raw.last_check),
        monitor_type: raw.monitor_type.filter(|t| !t.is_empty()),
        category: raw
            .category
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        locations,
    }
}

fn parse_downtimes(body: Value) -> Result<Vec<Downtime>, UpstreamError> {
    let items = match body.get("downtimes") {
        Some(Value::Array(items)) => items.clone(),
        other => {
            return Err(UpstreamError::Format(format!(
                "expected downtimes array, got {}",
                other.map(json_type).unwrap_or("nothing")
            )));
        }
    };

    items
        .into_iter()
        .map(|item| {
            let raw: RawDowntime = serde_json::from_value(item)
                .map_err(|e| UpstreamError::Format(format!("invalid downtime record: {}", e)))?;
            Ok(Downtime {
                id: first_text(&[&raw.id]).unwrap_or_default(),
                start: as_seconds(&raw.start),
                end: as_seconds(&raw.end),
                maintenance: raw.maintenance,
            })
        })
        .collect()
}

fn parse_server_stats(body: Value) -> Result<ServerStats, UpstreamError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if status.eq_ignore_ascii_case("ERROR") {
        let message = error_message(&body)
            .unwrap_or("server stats request failed")
            .to_string();
        return Err(UpstreamError::Http {
            status: 200,
            body: message,
        });
    }

    let number = |v: Option<&Value>| v.and_then(as_number).unwrap_or(0.0);
    let network = body.get("network");

    Ok(ServerStats {
        status,
        cpu: number(body.get("cpu")),
        ram: number(body.get("ram")),
        disk: number(body.get("disk")),
        network: NetworkStats {
            inbound: number(network.and_then(|n| n.get("in"))),
            outbound: number(network.and_then(|n| n.get("out"))),
        },
        fetched_at: Utc::now(),
    })
}

/// First value that is a non-empty string or a number, as text.
fn first_text(candidates: &[&Option<Value>]) -> Option<String> {
    candidates.iter().find_map(|candidate| match candidate {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Epoch seconds from a number or numeric string, 0 when absent.
fn as_seconds(value: &Option<Value>) -> i64 {
    value.as_ref().and_then(as_number).map_or(0, |n| n as i64)
}

fn error_message(body: &Value) -> Option<&str> {
    body.get("error_message").and_then(Value::as_str)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
