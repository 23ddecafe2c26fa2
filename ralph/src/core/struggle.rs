//! Struggle detection over consecutive iteration outcomes.
//!
//! The detector is a pure function of the ordered signal window; thresholds
//! come from configuration so synthetic sequences stay cheap to test.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Reason tag recorded when the agent appears stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StruggleReason {
    NoProgress,
    RepeatedOutput,
    TimeoutExceeded,
}

impl StruggleReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StruggleReason::NoProgress => "no_progress",
            StruggleReason::RepeatedOutput => "repeated_output",
            StruggleReason::TimeoutExceeded => "timeout_exceeded",
        }
    }
}

/// Observable signals from one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationSignals {
    pub duration_ms: u64,
    /// Tasks that transitioned to done during the iteration.
    pub tasks_completed: usize,
    /// Digest of the agent's captured output, for repetition checks.
    pub output_digest: u64,
    /// The agent was force-killed at the iteration timeout.
    pub timed_out: bool,
}

/// Detector thresholds supplied by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StruggleThresholds {
    /// Consecutive zero-completion iterations before `NoProgress` fires.
    pub no_progress_iterations: u32,
}

/// Classify the latest iteration given the ordered window ending at it.
///
/// Precedence: a timeout beats a repeated output beats a no-progress streak.
pub fn detect_struggle(
    window: &[IterationSignals],
    thresholds: StruggleThresholds,
) -> Option<StruggleReason> {
    let latest = window.last()?;
    if latest.timed_out {
        return Some(StruggleReason::TimeoutExceeded);
    }
    if window.len() >= 2 && window[window.len() - 2].output_digest == latest.output_digest {
        return Some(StruggleReason::RepeatedOutput);
    }
    let streak = thresholds.no_progress_iterations as usize;
    if streak > 0
        && window.len() >= streak
        && window
            .iter()
            .rev()
            .take(streak)
            .all(|signals| signals.tasks_completed == 0)
    {
        return Some(StruggleReason::NoProgress);
    }
    None
}

/// Digest used for repeated-output comparison.
pub fn output_digest(output: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    output.trim().hash(&mut hasher);
    hasher.finish()
}
