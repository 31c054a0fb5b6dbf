//! Entry point into the core for the HTTP layer: binds the configured log
//! path and limits to the snapshot queries and the live tail.
//!
//! Snapshot queries do a blocking full scan; call them from
//! `spawn_blocking` in async code.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::aggregate::{self, BucketSeries, WindowTotals};
use crate::config::DashboardConfig;
use crate::events::JobEvent;
use crate::reader;
use crate::tail::{self, TailSubscription};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub exists: bool,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Local>>,
    pub events_in_window: usize,
    pub ok: bool,
}

/// Totals and series computed from a single scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub totals: WindowTotals,
    pub series: BucketSeries,
}

#[derive(Debug, Clone)]
pub struct JobLog {
    config: Arc<DashboardConfig>,
}

impl JobLog {
    pub fn new(config: Arc<DashboardConfig>) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.log_path
    }

    /// Bounded full scan. Read failures are logged and yield no events.
    pub fn load_events(&self) -> Vec<JobEvent> {
        reader::read_events(self.path(), self.config.max_lines).unwrap_or_else(|e| {
            warn!(path = %self.path().display(), error = %e, "log scan failed");
            Vec::new()
        })
    }

    pub fn window_totals(&self, now: NaiveDateTime) -> WindowTotals {
        aggregate::window_totals(&self.load_events(), now)
    }

    pub fn bucket_series(&self, now: NaiveDateTime, window_hours: f64, bucket_minutes: u32) -> BucketSeries {
        aggregate::bucket_series(&self.load_events(), now, window_hours, bucket_minutes)
    }

    /// Totals plus the series for the given (or configured) window and width.
    pub fn stats(
        &self,
        now: NaiveDateTime,
        window_hours: Option<f64>,
        bucket_minutes: Option<u32>,
    ) -> StatsSnapshot {
        let events = self.load_events();
        StatsSnapshot {
            totals: aggregate::window_totals(&events, now),
            series: aggregate::bucket_series(
                &events,
                now,
                window_hours.unwrap_or(self.config.window_hours),
                bucket_minutes.unwrap_or(self.config.bucket_minutes),
            ),
        }
    }

    pub fn health(&self, now: NaiveDateTime) -> HealthSnapshot {
        let meta = match std::fs::metadata(self.path()) {
            Ok(meta) => meta,
            Err(_) => {
                return HealthSnapshot {
                    exists: false,
                    size_bytes: 0,
                    modified: None,
                    events_in_window: 0,
                    ok: false,
                }
            }
        };

        let since = now - aggregate::window_span(self.config.window_hours);
        HealthSnapshot {
            exists: true,
            size_bytes: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Local>::from),
            events_in_window: aggregate::count_since(&self.load_events(), since),
            ok: true,
        }
    }

    /// Starts a live tail from the current end of the log.
    pub fn subscribe_tail(&self, cancel: CancellationToken) -> TailSubscription {
        tail::subscribe(self.config.log_path.clone(), self.config.poll_interval, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = JobLog::new(Arc::new(DashboardConfig::for_log(dir.path().join("absent.log"))));

        let health = log.health(at(10, 0));
        assert!(!health.exists);
        assert!(!health.ok);
        assert_eq!(health.size_bytes, 0);
        assert_eq!(log.window_totals(at(10, 0)), WindowTotals::default());
        assert_eq!(log.bucket_series(at(10, 0), 2.0, 5).len(), 25);
    }

    #[test]
    fn test_health_counts_series_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexus.log");
        std::fs::write(
            &path,
            "[2025-03-14 06:00:00] job assigned\n[2025-03-14 09:00:00] job assigned\n[2025-03-14 09:30:00] proof completed\n",
        )
        .unwrap();
        let log = JobLog::new(Arc::new(DashboardConfig::for_log(&path)));

        let health = log.health(at(10, 0));
        assert!(health.exists && health.ok);
        assert_eq!(health.size_bytes, std::fs::metadata(&path).unwrap().len());
        assert!(health.modified.is_some());
        assert_eq!(health.events_in_window, 2);
    }

    #[test]
    fn test_stats_respects_max_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexus.log");
        let body: String = (0..10).map(|m| format!("[2025-03-14 09:{m:02}:00] job assigned\n")).collect();
        std::fs::write(&path, body).unwrap();

        let mut cfg = DashboardConfig::for_log(&path);
        cfg.max_lines = 4;
        let log = JobLog::new(Arc::new(cfg));

        let stats = log.stats(at(9, 30), None, None);
        assert_eq!(stats.totals.assigned_1h, 4);
        assert_eq!(stats.series.assigned().iter().sum::<u64>(), 4);
        assert_eq!(stats.series.bucket_minutes, 5);
    }
}
