/*!
Log file fixture for kernel tests.

The file lives in its own temporary directory, removed when the fixture is
dropped. Every mutation goes straight to disk so the kernel sees exactly what
an external prover would produce: appends, truncation, replacement by a new
file, or no file at all.
*/

use crate::line_builder::LogScript;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct LogFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl LogFixture {
    /// Fixture whose log file does not exist yet.
    pub fn empty() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create temp dir")?;
        let path = dir.path().join("nexus.log");
        Ok(Self { _dir: dir, path })
    }

    /// Fixture whose log file starts with `contents`.
    pub fn with_contents(contents: &str) -> Result<Self> {
        let fixture = Self::empty()?;
        fixture.replace(contents)?;
        Ok(fixture)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_buf(&self) -> PathBuf {
        self.path.clone()
    }

    /// Appends raw text, creating the file if needed.
    pub fn append(&self, text: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        f.write_all(text.as_bytes())?;
        f.flush()?;
        Ok(())
    }

    pub fn append_line(&self, line: &str) -> Result<()> {
        self.append(&format!("{line}\n"))
    }

    pub fn append_script(&self, script: &LogScript) -> Result<()> {
        self.append(&script.render())
    }

    pub fn append_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path)?;
        f.write_all(bytes)?;
        Ok(())
    }

    /// Replaces the file by a new one holding `contents` (rotation).
    pub fn replace(&self, contents: &str) -> Result<()> {
        let staged = self.path.with_extension("rotating");
        fs::write(&staged, contents)?;
        fs::rename(&staged, &self.path).context("failed to swap log file")?;
        Ok(())
    }

    /// Truncates the file in place to zero bytes.
    pub fn truncate(&self) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .context("failed to truncate log")?;
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path).context("failed to remove log")?;
        Ok(())
    }

    /// Current size, 0 when the file does not exist.
    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

/// Routes `tracing` output through the test harness. Idempotent.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_lifecycle() {
        let fixture = LogFixture::empty().unwrap();
        assert_eq!(fixture.size(), 0);
        assert!(!fixture.path().exists());

        fixture.append_line("first").unwrap();
        fixture.append("second\n").unwrap();
        assert_eq!(fs::read_to_string(fixture.path()).unwrap(), "first\nsecond\n");

        fixture.replace("new\n").unwrap();
        assert_eq!(fixture.size(), 4);

        fixture.truncate().unwrap();
        assert_eq!(fixture.size(), 0);
        assert!(fixture.path().exists());

        fixture.remove().unwrap();
        assert!(!fixture.path().exists());
    }

    #[test]
    fn test_dir_removed_on_drop() {
        let fixture = LogFixture::with_contents("x\n").unwrap();
        let dir = fixture.path().parent().unwrap().to_path_buf();
        drop(fixture);
        assert!(!dir.exists());
    }
}
