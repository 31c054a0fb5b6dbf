/**
 * LIVE TAIL - Incremental reader feeding the /events stream
 *
 * ROLE: follow the prover log as it grows and hand out only the events of
 * newly appended, newline-terminated lines.
 *
 * HOW IT WORKS:
 * - `TailCursor` remembers a byte offset. A new cursor starts at the current
 *   end of file, so a subscriber never sees history.
 * - `poll()` reads from the offset to EOF and consumes complete lines only;
 *   a half-written last line is left for the next poll.
 * - If the file got shorter than the offset (truncated or rotated), the
 *   offset goes back to 0. A rotation to a file at least as large as the
 *   old offset is not detected.
 * - `subscribe()` runs one cursor per subscriber in its own task:
 *   sleep, poll, send events, send a heartbeat, repeat until cancelled or
 *   until the receiving side goes away.
 */

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{extract_event, JobEvent};
use crate::reader::trim_line_end;

const TAIL_CHANNEL_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct TailCursor {
    path: PathBuf,
    offset: u64,
    last_known_size: u64,
}

impl TailCursor {
    /// Cursor positioned at the current end of `path` (0 if it does not exist).
    pub fn at_end<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self { path, offset: size, last_known_size: size }
    }

    pub fn at_offset<P: Into<PathBuf>>(path: P, offset: u64) -> Self {
        Self { path: path.into(), offset, last_known_size: offset }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn last_known_size(&self) -> u64 {
        self.last_known_size
    }

    /// Reads what was appended since the last poll and returns its events in
    /// file order. A missing file is not an error: nothing is returned and the
    /// offset is kept until the file shows up again.
    pub async fn poll(&mut self) -> io::Result<Vec<JobEvent>> {
        let mut file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let size = file.metadata().await?.len();
        if size < self.offset {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                size,
                "log shrank, restarting tail from the beginning"
            );
            self.offset = 0;
        }
        self.last_known_size = size;

        if size == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::with_capacity((size - self.offset).min(1 << 20) as usize);
        file.take(size - self.offset).read_to_end(&mut buf).await?;

        let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        self.offset += (last_newline + 1) as u64;

        let events = buf[..last_newline]
            .split(|b| *b == b'\n')
            .map(trim_line_end)
            .filter(|raw| !raw.is_empty())
            .filter_map(|raw| extract_event(&String::from_utf8_lossy(raw)))
            .collect();
        Ok(events)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailItem {
    Event(JobEvent),
    /// Sent once per poll cycle so consumers can tell "idle" from "gone".
    Heartbeat,
}

/// Receiving end of one subscriber's tail task. Dropping it stops the task.
pub struct TailSubscription {
    id: Uuid,
    rx: mpsc::Receiver<TailItem>,
    cancel: CancellationToken,
}

impl TailSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next item, or `None` once the tail task has stopped.
    pub async fn recv(&mut self) -> Option<TailItem> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TailSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts following `path` from its current end. The task stops when `cancel`
/// fires or the subscription is dropped.
pub fn subscribe(path: PathBuf, interval: Duration, cancel: CancellationToken) -> TailSubscription {
    let (tx, rx) = mpsc::channel(TAIL_CHANNEL_BUFFER);
    let id = Uuid::new_v4();
    let cursor = TailCursor::at_end(path);

    tokio::spawn(run_tail(id, cursor, interval, tx, cancel.clone()));

    TailSubscription { id, rx, cancel }
}

async fn run_tail(
    id: Uuid,
    mut cursor: TailCursor,
    interval: Duration,
    tx: mpsc::Sender<TailItem>,
    cancel: CancellationToken,
) {
    debug!(subscriber = %id, path = %cursor.path().display(), offset = cursor.offset(), "tail started");
    let mut failing = false;

    'poll: loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tx.closed() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        match cursor.poll().await {
            Ok(events) => {
                if failing {
                    info!(subscriber = %id, "tail recovered");
                    failing = false;
                }
                for ev in events {
                    if !deliver(&tx, TailItem::Event(ev), &cancel).await {
                        break 'poll;
                    }
                }
            }
            Err(e) => {
                if !failing {
                    warn!(subscriber = %id, path = %cursor.path().display(), error = %e, "tail read failed, retrying");
                }
                failing = true;
            }
        }

        if !deliver(&tx, TailItem::Heartbeat, &cancel).await {
            break;
        }
    }

    debug!(subscriber = %id, offset = cursor.offset(), "tail stopped");
}

async fn deliver(tx: &mpsc::Sender<TailItem>, item: TailItem, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
