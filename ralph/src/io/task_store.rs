//! Persistent checklist store backed by `ralph-tasks.md`.
//!
//! Every mutation runs a full lock, read, parse, mutate, render, write cycle
//! so concurrent CLI invocations cannot lose updates. Writes go through a
//! temp file + rename. Load and save are the only mutation path; nothing
//! edits the file in place.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::task::{self, Task, TaskStatus};
use crate::io::lock::StoreLock;
use crate::io::paths::write_atomic;

/// Index validation failure for `remove`/`mark` operations.
///
/// A dedicated type so callers can downcast and the "out of range" wording
/// stays a stable contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIndexError {
    pub index: usize,
    pub count: usize,
}

impl fmt::Display for TaskIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task index {} out of range ({} task(s) in the list)",
            self.index, self.count
        )
    }
}

impl std::error::Error for TaskIndexError {}

/// File-backed task store.
#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks_path: PathBuf,
    lock_path: PathBuf,
}

impl TaskStore {
    pub fn new(tasks_path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            tasks_path: tasks_path.into(),
            lock_path: lock_path.into(),
        }
    }

    /// Parse the current document. An absent file yields no tasks.
    pub fn load(&self) -> Result<Vec<Task>> {
        match fs::read_to_string(&self.tasks_path) {
            Ok(text) => Ok(task::parse_tasks(&text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => {
                Err(err).with_context(|| format!("read {}", self.tasks_path.display()))
            }
        }
    }

    /// Append a new top-level todo task and return it with its index.
    pub fn add(&self, description: &str) -> Result<Task> {
        let _lock = StoreLock::acquire(&self.lock_path)?;
        let mut tasks = self.load()?;
        let added = Task {
            index: tasks.len() + 1,
            description: description.to_string(),
            status: TaskStatus::Todo,
            depth: 0,
        };
        tasks.push(added.clone());
        self.save(&tasks)?;
        debug!(index = added.index, "task added");
        Ok(added)
    }

    /// Remove task `index` (1-based) and its indented sub-tree, returning
    /// the removed description. Out-of-range indexes leave the store
    /// untouched.
    pub fn remove(&self, index: usize) -> Result<String> {
        let _lock = StoreLock::acquire(&self.lock_path)?;
        let mut tasks = self.load()?;
        let count = tasks.len();
        let removed = task::remove_span(&mut tasks, index).ok_or(TaskIndexError { index, count })?;
        self.save(&tasks)?;
        debug!(index, "task removed");
        Ok(removed)
    }

    /// Set task `index` to in-progress without touching other tasks.
    pub fn mark_in_progress(&self, index: usize) -> Result<Task> {
        let _lock = StoreLock::acquire(&self.lock_path)?;
        let mut tasks = self.load()?;
        let count = tasks.len();
        let updated = {
            let entry = index
                .checked_sub(1)
                .and_then(|slot| tasks.get_mut(slot))
                .ok_or(TaskIndexError { index, count })?;
            entry.status = TaskStatus::InProgress;
            entry.clone()
        };
        self.save(&tasks)?;
        Ok(updated)
    }

    /// Mark tasks matching the given trimmed descriptions as done.
    /// Returns how many tasks transitioned.
    pub fn mark_done_matching(&self, descriptions: &[&str]) -> Result<usize> {
        if descriptions.is_empty() {
            return Ok(0);
        }
        let _lock = StoreLock::acquire(&self.lock_path)?;
        let mut tasks = self.load()?;
        let marked = task::mark_done_matching(&mut tasks, descriptions);
        if marked > 0 {
            self.save(&tasks)?;
            debug!(marked, "tasks marked done from agent output");
        }
        Ok(marked)
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        write_atomic(&self.tasks_path, &task::render_tasks(tasks))
    }
}
