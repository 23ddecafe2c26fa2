//! Append-only context log backed by `ralph-context.md`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::debug;

use crate::io::paths::ensure_dir;

const LOG_TITLE: &str = "# Ralph Loop Context\n";

/// Free-text log with timestamped entries. Entries are never edited;
/// the whole log is either appended to or deleted.
#[derive(Debug, Clone)]
pub struct ContextLog {
    path: PathBuf,
}

impl ContextLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one timestamped entry, creating the file (with its title) and
    /// the state directory on first write.
    pub fn append(&self, text: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.append_entry(&timestamp, text)
    }

    fn append_entry(&self, timestamp: &str, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let fresh = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open context log {}", self.path.display()))?;

        let mut entry = String::new();
        if fresh {
            entry.push_str(LOG_TITLE);
        }
        entry.push_str("\n## ");
        entry.push_str(timestamp);
        entry.push_str("\n\n");
        entry.push_str(text.trim_end());
        entry.push('\n');

        file.write_all(entry.as_bytes())
            .with_context(|| format!("append to context log {}", self.path.display()))?;
        debug!(bytes = entry.len(), "context entry appended");
        Ok(())
    }

    /// Delete the log file entirely. An absent file is already clear.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "context log cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("remove context log {}", self.path.display()))
            }
        }
    }

    /// Full log contents, or `None` when no context has been recorded.
    pub fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("read context log {}", self.path.display()))
            }
        }
    }
}
