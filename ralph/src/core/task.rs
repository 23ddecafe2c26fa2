//! Checklist task model: tolerant parsing, rendering, and pure mutations.
//!
//! The on-disk dialect is one task per line, `- [ ] description`, with two
//! columns of indentation per nesting level. Lines that do not match the
//! dialect (headers, prose, malformed brackets, blank lines) contribute no
//! task; parsing never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Task status derived from the checkbox marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Checkbox marker rendered for this status.
    pub fn marker(self) -> char {
        match self {
            TaskStatus::Todo => ' ',
            TaskStatus::InProgress => '/',
            TaskStatus::Done => 'x',
        }
    }

    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(TaskStatus::Todo),
            '/' => Some(TaskStatus::InProgress),
            'x' | 'X' => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// One checklist task in document order.
///
/// A task at `depth > 0` is a child of the nearest preceding task at
/// `depth - 1`. The relation is positional; nothing stores a parent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// 1-based position among parsed tasks. Recomputed on every parse and
    /// after every removal.
    pub index: usize,
    /// Verbatim description text.
    pub description: String,
    pub status: TaskStatus,
    /// Nesting level derived from leading indentation (0 = top-level).
    pub depth: usize,
}

static TASK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)- \[(.)\] (.*)$").expect("task line pattern"));

/// Parse a checklist document into tasks.
///
/// Each line is classified independently; non-matching lines are skipped.
pub fn parse_tasks(text: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    for line in text.lines() {
        if let Some((depth, status, description)) = classify_line(line) {
            tasks.push(Task {
                index: tasks.len() + 1,
                description: description.to_string(),
                status,
                depth,
            });
        }
    }
    tasks
}

/// Classify one line, returning `(depth, status, description)` for task lines.
fn classify_line(line: &str) -> Option<(usize, TaskStatus, &str)> {
    let caps = TASK_LINE_RE.captures(line)?;
    let marker = caps.get(2)?.as_str().chars().next()?;
    let status = TaskStatus::from_marker(marker)?;
    let description = caps.get(3)?.as_str();
    if description.trim().is_empty() {
        return None;
    }
    let indent = caps.get(1)?.as_str();
    // Tabs count as two columns so tab-indented documents still nest.
    let width: usize = indent.chars().map(|c| if c == '\t' { 2 } else { 1 }).sum();
    Some((width / 2, status, description))
}

/// Render tasks back to the checklist dialect.
///
/// Round-trips every parsed task: description, status, and depth are
/// preserved. Non-task lines from the source document are not re-emitted.
pub fn render_tasks(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        for _ in 0..task.depth {
            out.push_str("  ");
        }
        out.push_str("- [");
        out.push(task.status.marker());
        out.push_str("] ");
        out.push_str(&task.description);
        out.push('\n');
    }
    out
}

/// Remove the task at 1-based `index` together with its contiguous
/// deeper-indented sub-tree, regardless of the subtasks' own status.
///
/// Returns the removed task's description, or `None` when `index` is out of
/// range. Remaining tasks are renumbered contiguously from 1.
pub fn remove_span(tasks: &mut Vec<Task>, index: usize) -> Option<String> {
    if index < 1 || index > tasks.len() {
        return None;
    }
    let start = index - 1;
    let depth = tasks[start].depth;
    let mut end = start + 1;
    while end < tasks.len() && tasks[end].depth > depth {
        end += 1;
    }
    let removed = tasks.drain(start..end).next().map(|task| task.description);
    renumber(tasks);
    removed
}

/// Reassign contiguous 1-based indexes in document order.
pub fn renumber(tasks: &mut [Task]) {
    for (pos, task) in tasks.iter_mut().enumerate() {
        task.index = pos + 1;
    }
}

/// Whether the checklist counts as finished: at least one task, all done.
pub fn all_done(tasks: &[Task]) -> bool {
    !tasks.is_empty() && tasks.iter().all(|task| task.status == TaskStatus::Done)
}

/// Extract descriptions the agent declared finished via `COMPLETED:` lines.
pub fn completed_markers(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("COMPLETED:"))
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .collect()
}

/// Mark tasks whose trimmed description matches one of `descriptions` as
/// done. Returns how many tasks transitioned.
pub fn mark_done_matching(tasks: &mut [Task], descriptions: &[&str]) -> usize {
    let mut marked = 0;
    for task in tasks.iter_mut() {
        if task.status != TaskStatus::Done
            && descriptions
                .iter()
                .any(|description| *description == task.description.trim())
        {
            task.status = TaskStatus::Done;
            marked += 1;
        }
    }
    marked
}
