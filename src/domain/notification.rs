// Status change events handed to notifiers
use super::monitor::{Monitor, MonitorStatus};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPing {
    pub location: String,
    pub response_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeEvent {
    pub monitor_id: String,
    pub monitor_name: String,
    pub target: String,
    pub previous: MonitorStatus,
    pub current: MonitorStatus,
    /// Length of the most recent downtime, only set when recovering to `up`.
    pub down_for: Option<Duration>,
    pub pings: Vec<LocationPing>,
}

impl StatusChangeEvent {
    /// Build an event if the monitor's status differs from `previous`.
    pub fn detect(previous: MonitorStatus, monitor: &Monitor) -> Option<Self> {
        if previous == monitor.status {
            return None;
        }

        let down_for = match monitor.status {
            MonitorStatus::Up => monitor
                .latest_downtime()
                .map(|d| Duration::from_secs(d.duration_secs() as u64)),
            _ => None,
        };

        let pings = monitor
            .locations
            .iter()
            .map(|(location, info)| LocationPing {
                location: location.clone(),
                response_time: info.response_time,
            })
            .collect();

        Some(Self {
            monitor_id: monitor.id.clone(),
            monitor_name: monitor.name.clone(),
            target: monitor.target.clone(),
            previous,
            current: monitor.status,
            down_for,
            pings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitor::{Downtime, Info, sample_record};

    #[test]
    fn test_no_event_without_change() {
        let monitor = Monitor::from_record(sample_record("1", "Websites"), Vec::new());
        assert!(StatusChangeEvent::detect(MonitorStatus::Up, &monitor).is_none());
    }

    #[test]
    fn test_recovery_reports_latest_downtime() {
        let mut record = sample_record("1", "Websites");
        record.locations.insert(
            "newYork".to_string(),
            Info {
                response_time: Some(42),
                uptime_status: MonitorStatus::Up,
                last_check: 1_700_000_000,
            },
        );
        let monitor = Monitor::from_record(
            record,
            vec![
                Downtime::new("a", 1_000, 1_600, false),
                Downtime::new("b", 5_000, 5_300, false),
            ],
        );

        let event = StatusChangeEvent::detect(MonitorStatus::Down, &monitor).unwrap();
        assert_eq!(event.previous, MonitorStatus::Down);
        assert_eq!(event.current, MonitorStatus::Up);
        assert_eq!(event.down_for, Some(Duration::from_secs(300)));
        assert_eq!(event.pings.len(), 1);
        assert_eq!(event.pings[0].response_time, Some(42));
    }

    #[test]
    fn test_going_down_has_no_duration() {
        let mut record = sample_record("1", "Websites");
        record.status = MonitorStatus::Down;
        let monitor = Monitor::from_record(record, vec![Downtime::new("a", 1_000, 1_600, false)]);
        let event = StatusChangeEvent::detect(MonitorStatus::Up, &monitor).unwrap();
        assert_eq!(event.down_for, None);
    }
}
