//! Exclusive lock guarding task store mutations.

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::{debug, warn};

use crate::io::paths::ensure_dir;

/// Held exclusive lock on the store's sidecar lock file.
///
/// `acquire` blocks until the lock is granted, so racing CLI invocations
/// serialize their read-modify-write cycles instead of failing. Released on
/// drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("lock {}", path.display()))?;
        debug!(path = %path.display(), "store lock acquired");
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(err = %err, "failed to release store lock");
        }
    }
}
