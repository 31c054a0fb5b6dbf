/**
 * JOB EVENTS - Extraction of typed events from raw prover log lines
 *
 * ROLE: one log line in, zero or one `JobEvent` out. Pure and infallible:
 * anything that does not look like a recognized event is simply skipped.
 *
 * LINE FORMAT: `[YYYY-MM-DD HH:MM:SS] free text ...`
 * The free text is matched case-insensitively against an ordered list of
 * classifiers; the first one that matches decides the event kind.
 */

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Length of `[YYYY-MM-DD HH:MM:SS]` including both brackets.
const STAMP_LEN: usize = 21;
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Assigned,
    Completed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Assigned => "assigned",
            EventKind::Completed => "completed",
        }
    }
}

/// A lifecycle event read from the log. Timestamps are local wall-clock time
/// exactly as the prover wrote them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
}

/// Classifiers in priority order. A line mentioning both an assignment and a
/// completion is an assignment.
const CLASSIFIERS: &[(EventKind, &[&str])] = &[
    (EventKind::Assigned, &["job assigned"]),
    (
        EventKind::Completed,
        &["proof completed", "completed proof", "job completed"],
    ),
];

/// Turns one line into an event, or `None` when the line has no valid
/// timestamp prefix or matches no classifier.
pub fn extract_event(line: &str) -> Option<JobEvent> {
    let timestamp = parse_stamp(line)?;
    let kind = classify(&line[STAMP_LEN..])?;
    Some(JobEvent { kind, timestamp })
}

/// Extracts events from a sequence of lines, preserving line order.
pub fn extract_events<I, S>(lines: I) -> Vec<JobEvent>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| extract_event(line.as_ref()))
        .collect()
}

fn classify(text: &str) -> Option<EventKind> {
    let text = text.to_lowercase();
    CLASSIFIERS
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| text.contains(p)))
        .map(|(kind, _)| *kind)
}

fn parse_stamp(line: &str) -> Option<NaiveDateTime> {
    let bytes = line.as_bytes();
    if bytes.len() < STAMP_LEN || bytes[0] != b'[' || bytes[STAMP_LEN - 1] != b']' {
        return None;
    }

    // chrono is lenient about field widths, so check the exact shape first
    let inner = &bytes[1..STAMP_LEN - 1];
    let shape_ok = inner.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b' ',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }

    NaiveDateTime::parse_from_str(&line[1..STAMP_LEN - 1], STAMP_FORMAT).ok()
}
