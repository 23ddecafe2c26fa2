//! Stable exit codes for the ralph CLI.

/// Normal termination of a bounded operation, including loops that stop at
/// the iteration budget or an operator abort.
pub const OK: i32 = 0;
/// Validation error (no prompt, missing prompt file, bad index) or failure
/// to start the agent.
pub const ERROR: i32 = 1;
