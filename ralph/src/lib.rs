//! Checklist-driven loop controller for an external coding agent.
//!
//! ralph keeps three files in a per-project `.ralph/` directory: a markdown
//! task checklist, an append-only context log, and a JSON iteration history.
//! Each loop iteration feeds the base prompt, the context log, and the
//! current checklist to the configured agent executable, observes the
//! invocation, and stops when the checklist completes, the iteration budget
//! is spent, the operator drops a stop file, or the agent cannot be started.
//!
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: pure, deterministic logic (checklist model, struggle
//!   detection). No I/O, fully testable in isolation.
//! - **[`io`]**: side-effecting operations (state files, locking, process
//!   execution), isolated behind narrow seams to enable mocking in tests.
//!
//! [`looping`] composes core logic with I/O into the per-iteration state
//! machine driven by the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
