//! Multi-iteration loop controller.
//!
//! Composes the task store, context log, history recorder, struggle
//! detector, and agent invoker into the per-iteration state machine:
//! build prompt, invoke agent, apply task deltas, record outcome, decide
//! whether to continue.

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::struggle::{self, IterationSignals, StruggleReason};
use crate::core::task::{self, TaskStatus};
use crate::io::config::RalphConfig;
use crate::io::context_log::ContextLog;
use crate::io::history::{HistoryRecorder, StruggleEvent};
use crate::io::invoker::{AgentInvoker, InvokeRequest, Invocation};
use crate::io::paths::{RalphPaths, ensure_dir};
use crate::io::prompt::{PromptEngine, PromptInputs};
use crate::io::task_store::TaskStore;

/// Reason the loop stopped.
///
/// A failure to start the agent is not a variant: it propagates as an error
/// and the caller reports it with exit code 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// Every task in the checklist is done.
    Completed { iterations: u32 },
    /// The configured iteration budget ran out.
    MaxIterationsReached { max_iterations: u32 },
    /// The operator dropped the stop file.
    Aborted { before_iteration: u32 },
}

/// Summary of one loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub iterations_run: u32,
    pub total_elapsed_ms: u64,
    pub stop: LoopStop,
}

/// Per-iteration report passed to the progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub iteration: u32,
    pub duration_ms: u64,
    pub agent_exit_code: Option<i32>,
    pub tasks_completed: usize,
    pub tasks_remaining: usize,
    pub struggle: Option<StruggleReason>,
}

/// Settings for one loop invocation.
#[derive(Debug, Clone)]
pub struct LoopRequest {
    pub base_prompt: String,
    pub max_iterations: u32,
}

/// Run the loop until the checklist completes, the iteration budget is
/// spent, or the operator aborts via the stop file.
///
/// Strictly sequential: iteration n+1 never starts before iteration n's
/// agent invocation has returned and its state updates are on disk.
pub fn run_loop<I: AgentInvoker, F: FnMut(&IterationReport)>(
    paths: &RalphPaths,
    invoker: &I,
    cfg: &RalphConfig,
    request: &LoopRequest,
    mut on_iteration: F,
) -> Result<LoopOutcome> {
    let store = TaskStore::new(&paths.tasks_path, &paths.lock_path);
    let context = ContextLog::new(&paths.context_path);
    let history = HistoryRecorder::new(&paths.history_path);
    let engine = PromptEngine::new();
    let thresholds = cfg.struggle_thresholds();

    let mut window: Vec<IterationSignals> = Vec::new();
    let mut iterations_run = 0u32;
    let mut total_elapsed_ms = 0u64;

    loop {
        let iteration = iterations_run + 1;

        if consume_stop_file(paths)? {
            info!(iteration, "stop file honored, aborting loop");
            return Ok(LoopOutcome {
                iterations_run,
                total_elapsed_ms,
                stop: LoopStop::Aborted {
                    before_iteration: iteration,
                },
            });
        }

        let before = store.load()?;
        if task::all_done(&before) {
            info!(iterations_run, "checklist complete");
            return Ok(LoopOutcome {
                iterations_run,
                total_elapsed_ms,
                stop: LoopStop::Completed {
                    iterations: iterations_run,
                },
            });
        }

        if iterations_run >= request.max_iterations {
            info!(
                max_iterations = request.max_iterations,
                "iteration budget spent"
            );
            return Ok(LoopOutcome {
                iterations_run,
                total_elapsed_ms,
                stop: LoopStop::MaxIterationsReached {
                    max_iterations: request.max_iterations,
                },
            });
        }

        let context_text = context.read()?;
        let prompt = engine.render_iteration(&PromptInputs {
            base_prompt: &request.base_prompt,
            context_log: context_text.as_deref(),
            tasks: &before,
        })?;

        debug!(iteration, prompt_bytes = prompt.len(), "invoking agent");
        let invocation = invoker.invoke(&InvokeRequest {
            prompt,
            workdir: paths.root.clone(),
            timeout: Duration::from_secs(cfg.iteration_timeout_secs),
            output_limit_bytes: cfg.agent_output_limit_bytes,
        })?;

        // Apply completion markers from the agent's reply, then re-read the
        // file to also pick up checkbox edits the agent made directly.
        let markers = task::completed_markers(&invocation.output);
        store.mark_done_matching(&markers)?;
        let after = store.load()?;
        let tasks_completed = done_count(&after).saturating_sub(done_count(&before));
        let tasks_remaining = after
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .count();

        window.push(IterationSignals {
            duration_ms: invocation.elapsed_ms,
            tasks_completed,
            output_digest: struggle::output_digest(&invocation.output),
            timed_out: invocation.timed_out,
        });
        let detected = struggle::detect_struggle(&window, thresholds);

        history.record_iteration(
            invocation.elapsed_ms,
            detected.map(|reason| StruggleEvent {
                iteration: u64::from(iteration),
                reason,
            }),
        )?;
        write_iteration_output(paths, iteration, &invocation.output)?;
        context.append(&iteration_summary(
            iteration,
            &invocation,
            tasks_completed,
            tasks_remaining,
            detected,
        ))?;

        iterations_run = iteration;
        total_elapsed_ms += invocation.elapsed_ms;

        on_iteration(&IterationReport {
            iteration,
            duration_ms: invocation.elapsed_ms,
            agent_exit_code: invocation.exit_code,
            tasks_completed,
            tasks_remaining,
            struggle: detected,
        });
    }
}

fn done_count(tasks: &[task::Task]) -> usize {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .count()
}

/// Check for the operator's stop marker and consume it when present, so the
/// next invocation starts cleanly.
fn consume_stop_file(paths: &RalphPaths) -> Result<bool> {
    if !paths.stop_path.exists() {
        return Ok(false);
    }
    fs::remove_file(&paths.stop_path)
        .with_context(|| format!("remove stop file {}", paths.stop_path.display()))?;
    Ok(true)
}

fn write_iteration_output(paths: &RalphPaths, iteration: u32, output: &str) -> Result<()> {
    ensure_dir(&paths.iterations_dir)?;
    let path = paths.iterations_dir.join(format!("{iteration}.log"));
    fs::write(&path, output).with_context(|| format!("write iteration log {}", path.display()))
}

fn iteration_summary(
    iteration: u32,
    invocation: &Invocation,
    tasks_completed: usize,
    tasks_remaining: usize,
    detected: Option<StruggleReason>,
) -> String {
    let exit = match invocation.exit_code {
        Some(code) => format!("exited with status {code}"),
        None => "was killed".to_string(),
    };
    let mut summary = format!(
        "Iteration {iteration}: agent {exit} after {:.1}s; {tasks_completed} task(s) completed, {tasks_remaining} remaining.",
        invocation.elapsed_ms as f64 / 1000.0
    );
    if invocation.timed_out {
        summary.push_str(" The agent hit the iteration timeout.");
    }
    if let Some(reason) = detected {
        summary.push_str(&format!(" Struggle detected: {}.", reason.as_str()));
    }
    summary
}
