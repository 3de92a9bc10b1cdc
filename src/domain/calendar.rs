// Status calendar - per-day downtime summaries
use super::monitor::{Downtime, MonitorStatus};
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::time::Duration;

/// Today plus the 60 preceding days.
pub const CALENDAR_DAYS: usize = 61;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq)]
pub struct DayStatus {
    pub date: NaiveDate,
    pub status: MonitorStatus,
    /// Number of downtime intervals overlapping the day.
    pub count: u32,
    /// Time the target was unavailable during the day. Overlapping intervals are merged first.
    pub downtime: Duration,
}

/// Bucket downtime intervals into UTC calendar days.
///
/// Returns exactly [`CALENDAR_DAYS`] entries, oldest first, the last one being the day
/// containing `reference_now`. A day is `maintenance` if any overlapping interval is a
/// maintenance window, otherwise `down` if anything overlaps, otherwise `up`. Inverted and
/// zero-length intervals are ignored.
pub fn bucket_downtimes(downtimes: &[Downtime], reference_now: DateTime<Utc>) -> Vec<DayStatus> {
    let today = reference_now.date_naive();

    (0..CALENDAR_DAYS as u64)
        .rev()
        .map(|days_back| {
            let date = today.checked_sub_days(Days::new(days_back)).unwrap_or(NaiveDate::MIN);
            summarize_day(date, downtimes)
        })
        .collect()
}

fn summarize_day(date: NaiveDate, downtimes: &[Downtime]) -> DayStatus {
    let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
    let day_end = day_start + SECONDS_PER_DAY;

    let mut count = 0;
    let mut maintenance = false;
    let mut clipped: Vec<(i64, i64)> = Vec::new();

    for downtime in downtimes {
        if downtime.end <= downtime.start {
            continue;
        }
        let start = downtime.start.max(day_start);
        let end = downtime.end.min(day_end);
        if start >= end {
            continue;
        }
        count += 1;
        maintenance |= downtime.maintenance;
        clipped.push((start, end));
    }

    let status = if maintenance {
        MonitorStatus::Maintenance
    } else if count > 0 {
        MonitorStatus::Down
    } else {
        MonitorStatus::Up
    };

    DayStatus {
        date,
        status,
        count,
        downtime: Duration::from_secs(union_length(clipped) as u64),
    }
}

/// Total length covered by a set of half-open intervals.
fn union_length(mut intervals: Vec<(i64, i64)>) -> i64 {
    intervals.sort_unstable();

    let mut total = 0;
    let mut current: Option<(i64, i64)> = None;
    for (start, end) in intervals {
        current = match current {
            Some((cur_start, cur_end)) if start <= cur_end => Some((cur_start, cur_end.max(end))),
            Some((cur_start, cur_end)) => {
                total += cur_end - cur_start;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((start, end)) = current {
        total += end - start;
    }
    total
}
