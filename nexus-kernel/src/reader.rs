//! Bounded full-scan reader for the prover log.
//!
//! Every call rescans the file from the start but only keeps the newest
//! `max_lines` non-empty lines, so memory stays O(max_lines) whatever the
//! size of the log.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::events::{extract_event, JobEvent};

/// Returns the newest `max_lines` non-empty lines of `path`, oldest first.
///
/// A missing file yields an empty list. Invalid UTF-8 is replaced rather than
/// rejected.
pub fn read_recent_lines(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut reader = BufReader::new(file);
    let mut window: VecDeque<String> = VecDeque::with_capacity(max_lines.min(4096));
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = trim_line_end(&buf);
        if line.is_empty() || max_lines == 0 {
            continue;
        }
        if window.len() == max_lines {
            window.pop_front();
        }
        window.push_back(String::from_utf8_lossy(line).into_owned());
    }

    Ok(window.into())
}

/// Full scan: bounded read followed by extraction, in file order.
pub fn read_events(path: &Path, max_lines: usize) -> io::Result<Vec<JobEvent>> {
    let lines = read_recent_lines(path, max_lines)?;
    Ok(lines.iter().filter_map(|l| extract_event(l)).collect())
}

pub(crate) fn trim_line_end(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}
