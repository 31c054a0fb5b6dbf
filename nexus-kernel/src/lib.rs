/*!
# Nexus Kernel

Live statistics over the Nexus prover log:
- `events`: one log line to zero or one `JobEvent`
- `reader`: bounded full scan of the log
- `aggregate`: 1h/24h totals and a gap-free bucketed series
- `tail`: per-subscriber incremental reader for live streaming
- `joblog`: the four operations the HTTP layer calls
*/

pub mod aggregate;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod http;
pub mod joblog;
pub mod logging;
pub mod reader;
pub mod shutdown;
pub mod tail;

pub use aggregate::{Bucket, BucketSeries, WindowTotals};
pub use config::DashboardConfig;
pub use events::{extract_event, EventKind, JobEvent};
pub use joblog::{HealthSnapshot, JobLog};
pub use tail::{TailCursor, TailItem, TailSubscription};
