use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use nexus_devkit::{init_test_logging, LogFixture, LogScript};
use nexus_kernel::{DashboardConfig, EventKind, JobEvent, JobLog, TailCursor, TailItem, TailSubscription};
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(25);

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(h, m, s).unwrap()
}

fn joblog_for(fixture: &LogFixture) -> JobLog {
    let mut cfg = DashboardConfig::for_log(fixture.path_buf());
    cfg.poll_interval = POLL;
    JobLog::new(Arc::new(cfg))
}

/// Next job event, skipping heartbeats. `None` on timeout or end of stream.
async fn next_event(sub: &mut TailSubscription, within: Duration) -> Option<JobEvent> {
    tokio::time::timeout(within, async {
        loop {
            match sub.recv().await? {
                TailItem::Event(ev) => return Some(ev),
                TailItem::Heartbeat => continue,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

#[tokio::test]
async fn test_subscriber_sees_only_lines_after_start() {
    init_test_logging();
    let fixture = LogFixture::empty().unwrap();
    fixture
        .append_script(&LogScript::new().assigned(at(9, 0, 0), 1).completed(at(9, 1, 0), 1))
        .unwrap();
    let size_at_start = fixture.size();

    let log = joblog_for(&fixture);
    let mut sub = log.subscribe_tail(CancellationToken::new());

    // a few poll cycles with nothing new: heartbeats only
    assert!(next_event(&mut sub, POLL * 4).await.is_none());

    fixture.append_script(&LogScript::new().assigned(at(9, 5, 0), 2)).unwrap();
    assert!(fixture.size() > size_at_start);

    let ev = next_event(&mut sub, POLL * 8).await.expect("new event within a poll interval");
    assert_eq!(ev, JobEvent { kind: EventKind::Assigned, timestamp: at(9, 5, 0) });
}

#[tokio::test]
async fn test_heartbeat_without_activity() {
    let fixture = LogFixture::empty().unwrap();
    let log = joblog_for(&fixture);
    let mut sub = log.subscribe_tail(CancellationToken::new());

    let item = tokio::time::timeout(POLL * 8, sub.recv()).await.unwrap();
    assert_eq!(item, Some(TailItem::Heartbeat));
}

#[tokio::test]
async fn test_events_arrive_in_file_order() {
    let fixture = LogFixture::empty().unwrap();
    let log = joblog_for(&fixture);
    let mut sub = log.subscribe_tail(CancellationToken::new());

    fixture
        .append_script(
            &LogScript::new()
                .assigned(at(10, 0, 0), 1)
                .noise(at(10, 0, 1), "loading circuit")
                .completed(at(10, 0, 2), 1)
                .raw("no stamp, job assigned")
                .assigned(at(10, 0, 3), 2),
        )
        .unwrap();

    let mut got = Vec::new();
    for _ in 0..3 {
        got.push(next_event(&mut sub, POLL * 8).await.unwrap());
    }
    let kinds: Vec<_> = got.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [EventKind::Assigned, EventKind::Completed, EventKind::Assigned]);
    assert_eq!(got[2].timestamp, at(10, 0, 3));
}

#[tokio::test]
async fn test_partial_line_waits_for_newline() {
    let fixture = LogFixture::empty().unwrap();
    let log = joblog_for(&fixture);
    let mut sub = log.subscribe_tail(CancellationToken::new());

    fixture.append_bytes(b"[2025-03-14 10:30:00] Job ass").unwrap();
    assert!(next_event(&mut sub, POLL * 4).await.is_none());

    fixture.append_bytes(b"igned: id=7\n").unwrap();
    let ev = next_event(&mut sub, POLL * 8).await.expect("event once the line is complete");
    assert_eq!(ev, JobEvent { kind: EventKind::Assigned, timestamp: at(10, 30, 0) });
}

#[tokio::test]
async fn test_subscribers_have_independent_cursors() {
    let fixture = LogFixture::empty().unwrap();
    let log = joblog_for(&fixture);

    let mut early = log.subscribe_tail(CancellationToken::new());
    fixture.append_script(&LogScript::new().assigned(at(11, 0, 0), 1)).unwrap();
    assert_eq!(next_event(&mut early, POLL * 8).await.unwrap().timestamp, at(11, 0, 0));

    let mut late = log.subscribe_tail(CancellationToken::new());
    fixture.append_script(&LogScript::new().completed(at(11, 0, 30), 1)).unwrap();

    assert_eq!(next_event(&mut early, POLL * 8).await.unwrap().timestamp, at(11, 0, 30));
    let first_for_late = next_event(&mut late, POLL * 8).await.unwrap();
    assert_eq!(first_for_late.kind, EventKind::Completed);
}

#[tokio::test]
async fn test_truncation_recovery() {
    let fixture = LogFixture::with_contents(
        &LogScript::new()
            .assigned(at(8, 0, 0), 1)
            .assigned(at(8, 0, 1), 2)
            .assigned(at(8, 0, 2), 3)
            .render(),
    )
    .unwrap();

    let mut cursor = TailCursor::at_end(fixture.path_buf());
    assert!(cursor.offset() > 0);

    fixture
        .replace(&LogScript::new().completed(at(12, 0, 0), 9).render())
        .unwrap();
    let events = cursor.poll().await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Completed);
    assert_eq!(cursor.offset(), fixture.size());
}

#[tokio::test]
async fn test_stream_survives_truncate_and_missing_file() {
    // the recreated file must come back smaller than the old offset to be noticed
    let history = LogScript::new()
        .assigned(at(7, 0, 0), 1)
        .assigned(at(7, 0, 1), 2)
        .assigned(at(7, 0, 2), 3);
    let fixture = LogFixture::with_contents(&history.render()).unwrap();
    let log = joblog_for(&fixture);
    let mut sub = log.subscribe_tail(CancellationToken::new());

    fixture.remove().unwrap();
    assert!(next_event(&mut sub, POLL * 4).await.is_none());

    fixture.append_script(&LogScript::new().completed(at(8, 30, 0), 1)).unwrap();
    let ev = next_event(&mut sub, POLL * 8).await.expect("event after the log came back");
    assert_eq!(ev.timestamp, at(8, 30, 0));

    fixture.truncate().unwrap();
    fixture.append_script(&LogScript::new().assigned(at(9, 0, 0), 2)).unwrap();
    let ev = next_event(&mut sub, POLL * 8).await.expect("event after truncation");
    assert_eq!(ev.timestamp, at(9, 0, 0));
}

#[tokio::test]
async fn test_cancellation_ends_stream() {
    let fixture = LogFixture::empty().unwrap();
    let log = joblog_for(&fixture);
    let shutdown = CancellationToken::new();
    let mut sub = log.subscribe_tail(shutdown.child_token());

    shutdown.cancel();
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        while sub.recv().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok());
}
