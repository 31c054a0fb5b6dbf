use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::joblog::HealthSnapshot;

/// Kernel-side liveness: uptime and open `/events` streams.
#[derive(Clone)]
pub struct StreamTracker {
    start_time: Instant,
    active: Arc<AtomicUsize>,
    total: Arc<AtomicU64>,
}

/// Held by an open stream; dropping it marks the stream closed.
pub struct StreamGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

impl StreamTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            active: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn open(&self) -> StreamGuard {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        StreamGuard { active: self.active.clone() }
    }

    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn total_streams(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn report(&self, log_path: String, snapshot: HealthSnapshot) -> KernelHealth {
        KernelHealth {
            log_path,
            exists: snapshot.exists,
            size_bytes: snapshot.size_bytes,
            mtime: snapshot.modified.map(|t| t.to_rfc3339()),
            events_in_window: snapshot.events_in_window,
            ok: snapshot.ok,
            active_streams: self.active_streams(),
            total_streams: self.total_streams(),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for StreamTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub log_path: String,
    pub exists: bool,
    pub size_bytes: u64,
    pub mtime: Option<String>,
    pub events_in_window: usize,
    pub ok: bool,
    pub active_streams: usize,
    pub total_streams: u64,
    pub uptime_seconds: u64,
}
