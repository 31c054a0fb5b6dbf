/**
 * HTTP API - Dashboard server of the Nexus kernel
 *
 * ROLE: thin axum layer over `JobLog`. No business logic lives here, only
 * request parsing, blocking-scan offloading and JSON/SSE shaping.
 *
 * ROUTES:
 * - GET /         dashboard page
 * - GET /config   effective settings (LOG_PATH, BUCKET_MINUTES, ...)
 * - GET /stats    1h/24h totals + bucketed series (?window_hours=&bucket_minutes=)
 * - GET /health   log file state + stream counters
 * - GET /events   Server-Sent Events: `job` events and heartbeat comments
 */

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, NaiveDateTime};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregate::{check_series_shape, WindowTotals};
use crate::config::DashboardConfig;
use crate::error::ApiError;
use crate::events::JobEvent;
use crate::health::{KernelHealth, StreamTracker};
use crate::joblog::JobLog;
use crate::tail::TailItem;

const DASHBOARD_TEMPLATE: &str = include_str!("../assets/dashboard.html");
const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub joblog: JobLog,
    pub streams: StreamTracker,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Arc<DashboardConfig>, shutdown: CancellationToken) -> Self {
        Self {
            joblog: JobLog::new(config.clone()),
            config,
            streams: StreamTracker::new(),
            shutdown,
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/config", get(get_config))
        .route("/stats", get(get_stats))
        .route("/health", get(get_health))
        .route("/events", get(stream_events))
        .with_state(app_state)
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ConfigView {
    log_path: String,
    max_lines: usize,
    bucket_minutes: u32,
    window_hours: f64,
    port: u16,
    poll_interval_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
struct StatsParams {
    window_hours: Option<f64>,
    bucket_minutes: Option<u32>,
}

#[derive(Serialize)]
struct StatsView {
    totals: WindowTotals,
    series: SeriesView,
    window_hours: f64,
    bucket_minutes: u32,
    generated_at: String,
}

#[derive(Serialize)]
struct SeriesView {
    labels: Vec<String>,
    assigned: Vec<u64>,
    completed: Vec<u64>,
}

#[derive(Serialize)]
struct JobEventView {
    kind: &'static str,
    timestamp: String,
}

impl From<JobEvent> for JobEventView {
    fn from(ev: JobEvent) -> Self {
        Self {
            kind: ev.kind.as_str(),
            timestamp: ev.timestamp.format(EVENT_TIME_FORMAT).to_string(),
        }
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}", hours as i64)
    } else {
        format!("{hours}")
    }
}

fn render_dashboard(cfg: &DashboardConfig) -> String {
    DASHBOARD_TEMPLATE
        .replace("{{bucket}}", &cfg.bucket_minutes.to_string())
        .replace("{{window}}", &format_hours(cfg.window_hours))
}

// GET /
async fn index(State(app): State<AppState>) -> Html<String> {
    Html(render_dashboard(&app.config))
}

// GET /config
async fn get_config(State(app): State<AppState>) -> Json<ConfigView> {
    let cfg = &app.config;
    Json(ConfigView {
        log_path: cfg.log_path.display().to_string(),
        max_lines: cfg.max_lines,
        bucket_minutes: cfg.bucket_minutes,
        window_hours: cfg.window_hours,
        port: cfg.port,
        poll_interval_ms: cfg.poll_interval.as_millis() as u64,
    })
}

// GET /stats (totals + series, one scan)
async fn get_stats(
    State(app): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsView>, ApiError> {
    let window_hours = params.window_hours.unwrap_or(app.config.window_hours);
    let bucket_minutes = params.bucket_minutes.unwrap_or(app.config.bucket_minutes);
    check_series_shape(window_hours, bucket_minutes).map_err(ApiError::InvalidQuery)?;

    let now = local_now();
    let joblog = app.joblog.clone();
    let stats =
        task::spawn_blocking(move || joblog.stats(now, Some(window_hours), Some(bucket_minutes))).await?;

    Ok(Json(StatsView {
        totals: stats.totals,
        series: SeriesView {
            labels: stats.series.labels(),
            assigned: stats.series.assigned(),
            completed: stats.series.completed(),
        },
        window_hours,
        bucket_minutes: stats.series.bucket_minutes,
        generated_at: now.format(EVENT_TIME_FORMAT).to_string(),
    }))
}

// GET /health (always answers, even without a log file)
async fn get_health(State(app): State<AppState>) -> Result<Json<KernelHealth>, ApiError> {
    let now = local_now();
    let joblog = app.joblog.clone();
    let snapshot = task::spawn_blocking(move || joblog.health(now)).await?;
    let log_path = app.config.log_path.display().to_string();
    Ok(Json(app.streams.report(log_path, snapshot)))
}

// GET /events (one tail task per connected client)
async fn stream_events(
    State(app): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = app.joblog.subscribe_tail(app.shutdown.child_token());
    let guard = app.streams.open();
    info!(
        subscriber = %subscription.id(),
        active = app.streams.active_streams(),
        "event stream opened"
    );

    let events = stream::unfold((subscription, guard), |(mut subscription, guard)| async move {
        let item = subscription.recv().await?;
        Some((Ok(to_sse(item)), (subscription, guard)))
    });
    Sse::new(events)
}

fn to_sse(item: TailItem) -> Event {
    match item {
        TailItem::Event(ev) => Event::default()
            .event("job")
            .json_data(JobEventView::from(ev))
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to encode job event");
                Event::default().comment("encode error")
            }),
        TailItem::Heartbeat => Event::default().comment("heartbeat"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_dashboard_substitutes_placeholders() {
        let mut cfg = DashboardConfig::for_log("/tmp/nexus.log");
        cfg.bucket_minutes = 10;
        cfg.window_hours = 1.5;
        let html = render_dashboard(&cfg);
        assert!(html.contains("Jobs per 10 min (last 1.5h)"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(2.0), "2");
        assert_eq!(format_hours(0.25), "0.25");
    }
}
