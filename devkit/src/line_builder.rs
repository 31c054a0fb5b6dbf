/*!
Builders for prover log lines.

`line_at` formats a single `[YYYY-MM-DD HH:MM:SS] text` line; `LogScript`
chains several of them so a test reads like the log it produces.
*/

use chrono::NaiveDateTime;

pub const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One log line, without trailing newline.
pub fn line_at(ts: NaiveDateTime, text: &str) -> String {
    format!("[{}] {}", ts.format(STAMP_FORMAT), text)
}

#[derive(Debug, Default, Clone)]
pub struct LogScript {
    lines: Vec<String>,
}

impl LogScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Job assigned` line in the prover's usual wording.
    pub fn assigned(mut self, ts: NaiveDateTime, job_id: u64) -> Self {
        self.lines.push(line_at(ts, &format!("Job assigned: id={job_id}")));
        self
    }

    /// `Proof completed` line in the prover's usual wording.
    pub fn completed(mut self, ts: NaiveDateTime, job_id: u64) -> Self {
        self.lines.push(line_at(ts, &format!("Proof completed for job {job_id}")));
        self
    }

    /// Stamped line that matches no classifier.
    pub fn noise(mut self, ts: NaiveDateTime, text: &str) -> Self {
        self.lines.push(line_at(ts, text));
        self
    }

    /// Line written verbatim (no stamp added).
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines, each terminated by `\n`.
    pub fn render(&self) -> String {
        self.lines.iter().map(|l| format!("{l}\n")).collect()
    }
}
