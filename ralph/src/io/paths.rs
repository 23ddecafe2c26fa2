//! Canonical paths within the `.ralph/` state directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// All state file locations for a project root.
///
/// The directory itself is created lazily on first write; read-only commands
/// treat an absent directory as empty state.
#[derive(Debug, Clone)]
pub struct RalphPaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub context_path: PathBuf,
    pub history_path: PathBuf,
    pub config_path: PathBuf,
    pub lock_path: PathBuf,
    pub stop_path: PathBuf,
    pub iterations_dir: PathBuf,
}

impl RalphPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".ralph");
        Self {
            tasks_path: state_dir.join("ralph-tasks.md"),
            context_path: state_dir.join("ralph-context.md"),
            history_path: state_dir.join("ralph-history.json"),
            config_path: state_dir.join("config.toml"),
            lock_path: state_dir.join("tasks.lock"),
            stop_path: state_dir.join("stop"),
            iterations_dir: state_dir.join("iterations"),
            root,
            state_dir,
        }
    }
}

/// Create `dir` (and parents) if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))
}

/// Atomically replace `path` with `contents` (temp file + rename).
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    ensure_dir(parent)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_hidden_state_dir() {
        let paths = RalphPaths::new("/work/project");
        assert!(paths.state_dir.ends_with(".ralph"));
        assert!(paths.tasks_path.ends_with(".ralph/ralph-tasks.md"));
        assert!(paths.context_path.ends_with(".ralph/ralph-context.md"));
        assert!(paths.history_path.ends_with(".ralph/ralph-history.json"));
        assert!(paths.stop_path.ends_with(".ralph/stop"));
        assert!(paths.iterations_dir.ends_with(".ralph/iterations"));
    }

    #[test]
    fn write_atomic_creates_parents_and_replaces() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/state.md");

        write_atomic(&path, "one\n").expect("first write");
        write_atomic(&path, "two\n").expect("second write");

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "two\n");
        assert!(!path.with_extension("tmp").exists());
    }
}
