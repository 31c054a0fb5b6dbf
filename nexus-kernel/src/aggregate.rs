/**
 * WINDOW AGGREGATOR - Rolling totals and bucketed series over job events
 *
 * ROLE: turn the ordered event list of a full scan into the numbers shown on
 * the dashboard. Everything here is relative to a caller-supplied `now`, so
 * the output is fully determined by (events, now, window, bucket width).
 *
 * - Totals: assigned/completed over the trailing 1h and 24h.
 * - Series: one bucket per `bucket_minutes` step from floor(now - window) to
 *   floor(now), empty buckets included.
 */

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

use crate::events::{EventKind, JobEvent};

pub const LABEL_FORMAT: &str = "%H:%M";

/// Longest window a series may cover (one leap year).
pub const MAX_WINDOW_HOURS: f64 = 24.0 * 366.0;
/// Upper bound on the number of buckets in one series.
pub const MAX_SERIES_BUCKETS: usize = 100_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub assigned_1h: u64,
    pub completed_1h: u64,
    pub assigned_24h: u64,
    pub completed_24h: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub bucket_start: NaiveDateTime,
    pub assigned: u64,
    pub completed: u64,
}

impl Bucket {
    fn empty(bucket_start: NaiveDateTime) -> Self {
        Self { bucket_start, assigned: 0, completed: 0 }
    }

    fn record(&mut self, kind: EventKind) {
        match kind {
            EventKind::Assigned => self.assigned += 1,
            EventKind::Completed => self.completed += 1,
        }
    }

    pub fn label(&self) -> String {
        self.bucket_start.format(LABEL_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSeries {
    pub bucket_minutes: u32,
    pub buckets: Vec<Bucket>,
}

impl BucketSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.buckets.iter().map(Bucket::label).collect()
    }

    pub fn assigned(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.assigned).collect()
    }

    pub fn completed(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.completed).collect()
    }
}

pub fn window_totals(events: &[JobEvent], now: NaiveDateTime) -> WindowTotals {
    let since_1h = now - TimeDelta::hours(1);
    let since_24h = now - TimeDelta::hours(24);
    let mut totals = WindowTotals::default();

    for ev in events {
        if ev.timestamp >= since_1h {
            match ev.kind {
                EventKind::Assigned => totals.assigned_1h += 1,
                EventKind::Completed => totals.completed_1h += 1,
            }
        }
        if ev.timestamp >= since_24h {
            match ev.kind {
                EventKind::Assigned => totals.assigned_24h += 1,
                EventKind::Completed => totals.completed_24h += 1,
            }
        }
    }

    totals
}

/// Floors `t` to the start of its bucket: the minute is rounded down to a
/// multiple of `bucket_minutes` within the hour, seconds are dropped.
pub fn floor_to_bucket(t: NaiveDateTime, bucket_minutes: u32) -> NaiveDateTime {
    let width = bucket_minutes.max(1);
    let minute = t.minute() / width * width;
    t.date().and_hms_opt(t.hour(), minute, 0).unwrap_or(t)
}

/// Converts a window expressed in (possibly fractional) hours to a duration,
/// at millisecond precision.
/// Saturates at `TimeDelta::MAX` instead of overflowing.
pub fn window_span(window_hours: f64) -> TimeDelta {
    let millis = (window_hours.max(0.0) * 3_600_000.0).round() as i64;
    TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX)
}

/// Checks that a (window, width) pair describes a series of sane size.
pub fn check_series_shape(window_hours: f64, bucket_minutes: u32) -> Result<(), String> {
    if !(window_hours.is_finite() && window_hours > 0.0) {
        return Err("window_hours must be a positive number".into());
    }
    if window_hours > MAX_WINDOW_HOURS {
        return Err(format!("window_hours must be at most {MAX_WINDOW_HOURS}"));
    }
    if bucket_minutes == 0 {
        return Err("bucket_minutes must be at least 1".into());
    }
    let buckets = window_hours * 60.0 / f64::from(bucket_minutes);
    if buckets > MAX_SERIES_BUCKETS as f64 {
        return Err(format!(
            "window_hours={window_hours} with bucket_minutes={bucket_minutes} exceeds {MAX_SERIES_BUCKETS} buckets"
        ));
    }
    Ok(())
}

pub fn bucket_series(
    events: &[JobEvent],
    now: NaiveDateTime,
    window_hours: f64,
    bucket_minutes: u32,
) -> BucketSeries {
    let width_minutes = bucket_minutes.max(1);
    let width = TimeDelta::minutes(i64::from(width_minutes));
    // never walk more than MAX_SERIES_BUCKETS steps back
    let longest = TimeDelta::try_minutes(i64::from(width_minutes) * (MAX_SERIES_BUCKETS as i64 - 2))
        .unwrap_or(TimeDelta::MAX);
    let span = window_span(window_hours).min(longest);
    let window_start = now.checked_sub_signed(span).unwrap_or(NaiveDateTime::MIN);
    let first = floor_to_bucket(window_start, width_minutes);
    let last = floor_to_bucket(now, width_minutes);

    let mut buckets = Vec::new();
    let mut t = first;
    while t <= last && buckets.len() < MAX_SERIES_BUCKETS {
        buckets.push(Bucket::empty(t));
        match t.checked_add_signed(width) {
            Some(next) => t = next,
            None => break,
        }
    }

    let width_secs = width.num_seconds();
    for ev in events {
        if ev.timestamp < window_start || ev.timestamp > now {
            continue;
        }
        // latest boundary at or before the event
        let offset = (ev.timestamp - first).num_seconds() / width_secs;
        let idx = usize::try_from(offset).unwrap_or(0).min(buckets.len() - 1);
        buckets[idx].record(ev.kind);
    }

    BucketSeries { bucket_minutes: width_minutes, buckets }
}

/// Number of events at or after `since`.
pub fn count_since(events: &[JobEvent], since: NaiveDateTime) -> usize {
    events.iter().filter(|ev| ev.timestamp >= since).count()
}
