// Discord webhook notifier for monitor status changes
use crate::application::upstream::Notifier;
use crate::domain::monitor::MonitorStatus;
use crate::domain::notification::StatusChangeEvent;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    username: String,
    avatar_url: Option<String>,
    dashboard_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    content: String,
    embeds: Vec<Embed>,
    allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize)]
struct AllowedMentions {
    parse: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    color: u32,
    fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

impl DiscordNotifier {
    pub fn new(
        client: reqwest::Client,
        webhook_url: Option<String>,
        username: String,
        avatar_url: Option<String>,
        dashboard_url: Option<String>,
    ) -> Self {
        Self {
            client,
            webhook_url,
            username,
            avatar_url,
            dashboard_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    fn build_payload(&self, event: &StatusChangeEvent) -> WebhookPayload {
        let mut fields = vec![
            EmbedField {
                name: "Service Name".to_string(),
                value: event.monitor_name.clone(),
                inline: false,
            },
            EmbedField {
                name: "Service URL".to_string(),
                value: event.target.clone(),
                inline: false,
            },
        ];

        if let Some(down_for) = event.down_for {
            fields.push(EmbedField {
                name: "Down for".to_string(),
                value: humanize_duration(down_for),
                inline: false,
            });
        }

        fields.extend(event.pings.iter().map(|ping| EmbedField {
            name: format!("Ping from {}", location_label(&ping.location)),
            value: ping
                .response_time
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "n/a".to_string()),
            inline: true,
        }));

        WebhookPayload {
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            content: "@everyone - The status of the service has changed".to_string(),
            embeds: vec![Embed {
                title: format!(
                    "Status Change: {} is now {} {}",
                    event.monitor_name,
                    event.current.as_str(),
                    status_emoji(event.current)
                ),
                url: self.dashboard_url.clone(),
                color: status_color(event.current),
                fields,
            }],
            allowed_mentions: AllowedMentions {
                parse: vec!["everyone"],
            },
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, event: &StatusChangeEvent) {
        let Some(webhook) = &self.webhook_url else {
            return;
        };

        let payload = self.build_payload(event);
        match self.client.post(webhook).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("Sent status change for {}", event.monitor_name);
            }
            Ok(resp) => tracing::warn!("Discord webhook send failed with status {}", resp.status()),
            Err(e) => tracing::warn!("Failed to send Discord notification: {}", e),
        }
    }
}

fn status_color(status: MonitorStatus) -> u32 {
    match status {
        MonitorStatus::Up => 0x00ff00,
        MonitorStatus::Down => 0xff0000,
        MonitorStatus::Maintenance => 0xffa500,
    }
}

fn status_emoji(status: MonitorStatus) -> &'static str {
    match status {
        MonitorStatus::Up => "✅",
        MonitorStatus::Maintenance => "⚠️",
        MonitorStatus::Down => "❌",
    }
}

/// "newYork" and "new_york" both become "New York".
fn location_label(key: &str) -> String {
    let mut spaced = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_uppercase() {
            spaced.push(' ');
            spaced.push(c);
        } else if c == '_' {
            spaced.push(' ');
        } else {
            spaced.push(c);
        }
    }

    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Rough human wording, e.g. "a few seconds", "5 minutes", "2 hours".
fn humanize_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    let minutes = secs / 60.0;
    let hours = minutes / 60.0;
    let days = hours / 24.0;

    if secs < 45.0 {
        "a few seconds".to_string()
    } else if secs < 90.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes.round())
    } else if minutes < 90.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{} hours", hours.round())
    } else if hours < 36.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{} days", days.round())
    } else if days < 45.0 {
        "a month".to_string()
    } else if days < 320.0 {
        format!("{} months", (days / 30.0).round())
    } else if days < 548.0 {
        "a year".to_string()
    } else {
        format!("{} years", (days / 365.0).round())
    }
}
