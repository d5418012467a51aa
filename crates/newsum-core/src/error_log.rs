//! Append-only JSON Lines log of rows whose summary could not be produced.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// One failed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub error: String,
    pub attempts: u32,
    pub model: String,
    /// Seconds since the UNIX epoch.
    pub ts: u64,
}

impl ErrorRecord {
    pub fn now(
        id: impl Into<String>,
        error: impl Into<String>,
        attempts: u32,
        model: &str,
    ) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: id.into(),
            error: error.into(),
            attempts,
            model: model.to_string(),
            ts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line. The file is opened per call so
    /// earlier lines are on disk even if the run is interrupted.
    pub fn append(&self, record: &ErrorRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("serialize error record")?;
        line.push('\n');
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open error log {}", self.path.display()))?;
        f.write_all(line.as_bytes())
            .with_context(|| format!("write error log {}", self.path.display()))?;
        Ok(())
    }

    /// Read every record back (used by tests and tooling).
    pub fn read_all(&self) -> Result<Vec<ErrorRecord>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read error log {}", self.path.display()))
            }
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("parse error record"))
            .collect()
    }
}
