//! ralph CLI: flag-based surface over the task store, context log, history
//! recorder, and loop controller.
//!
//! Every command execution is its own full read-modify-write cycle against
//! the `.ralph/` state directory; no process persists between invocations.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;

use ralph::core::task::Task;
use ralph::exit_codes;
use ralph::io::config::load_config;
use ralph::io::context_log::ContextLog;
use ralph::io::history::HistoryRecorder;
use ralph::io::invoker::CommandInvoker;
use ralph::io::paths::RalphPaths;
use ralph::io::task_store::TaskStore;
use ralph::looping::{IterationReport, LoopOutcome, LoopRequest, LoopStop, run_loop};

#[derive(Parser)]
#[command(
    name = "ralph",
    version,
    about = "Checklist-driven loop controller for an autonomous coding agent"
)]
struct Cli {
    /// Inline prompt for the main loop.
    prompt: Option<String>,

    /// Read the loop prompt from a file instead of the command line.
    #[arg(long, value_name = "PATH")]
    prompt_file: Option<PathBuf>,

    /// Iteration budget for this invocation (default from config).
    #[arg(long, value_name = "N")]
    max_iterations: Option<u32>,

    /// Print iteration history and state summary.
    #[arg(long)]
    status: bool,

    /// With --status: include the task list.
    #[arg(long)]
    tasks: bool,

    /// Append an entry to the context log.
    #[arg(long, value_name = "TEXT")]
    add_context: Option<String>,

    /// Delete the context log.
    #[arg(long)]
    clear_context: bool,

    /// Append a top-level todo task to the checklist.
    #[arg(long, value_name = "TEXT")]
    add_task: Option<String>,

    /// Print the current checklist.
    #[arg(long)]
    list_tasks: bool,

    /// Remove a task (and its subtasks) by 1-based index.
    #[arg(long, value_name = "INDEX")]
    remove_task: Option<String>,
}

fn main() {
    ralph::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::ERROR);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("resolve working directory")?;
    let paths = RalphPaths::new(cwd);
    let store = TaskStore::new(&paths.tasks_path, &paths.lock_path);

    if let Some(text) = cli.add_task.as_deref() {
        let added = store.add(text)?;
        println!("Added task {}: {}", added.index, added.description);
        return Ok(());
    }
    if let Some(raw) = cli.remove_task.as_deref() {
        let index = parse_index(raw)?;
        let removed = store.remove(index)?;
        println!("Removed task {index}: {removed}");
        return Ok(());
    }
    if cli.list_tasks {
        print_tasks(&store.load()?);
        return Ok(());
    }
    if let Some(text) = cli.add_context.as_deref() {
        ContextLog::new(&paths.context_path).append(text)?;
        println!("Context added.");
        return Ok(());
    }
    if cli.clear_context {
        ContextLog::new(&paths.context_path).clear()?;
        println!("Context cleared.");
        return Ok(());
    }
    if cli.status {
        return print_status(&paths, &store, cli.tasks);
    }

    run_main_loop(&cli, &paths)
}

/// Parse a 1-based task index; malformed input is a validation error, not a
/// usage error, so it exits 1 like every other bad input.
fn parse_index(raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| anyhow!("invalid task index '{raw}' (expected a positive number)"))
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    for task in tasks {
        println!(
            "{:>3}. {}[{}] {}",
            task.index,
            "  ".repeat(task.depth),
            task.status.marker(),
            task.description
        );
    }
}

fn print_status(paths: &RalphPaths, store: &TaskStore, include_tasks: bool) -> Result<()> {
    let history = HistoryRecorder::new(&paths.history_path).load()?;
    println!("Iterations: {}", history.iterations);
    println!(
        "Total agent time: {}",
        format_duration_ms(history.total_duration_ms)
    );
    if history.struggle_indicators.is_empty() {
        println!("Struggle indicators: none");
    } else {
        println!("Struggle indicators: {}", history.struggle_indicators.len());
        for event in &history.struggle_indicators {
            println!("  - iteration {}: {}", event.iteration, event.reason.as_str());
        }
    }
    match ContextLog::new(&paths.context_path).read()? {
        Some(text) => println!("Context log: {} bytes", text.len()),
        None => println!("Context log: absent"),
    }
    if include_tasks {
        println!();
        print_tasks(&store.load()?);
    }
    Ok(())
}

fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:03}s", secs, ms % 1000)
    }
}

fn run_main_loop(cli: &Cli, paths: &RalphPaths) -> Result<()> {
    let base_prompt = resolve_prompt(cli)?;
    let cfg = load_config(&paths.config_path)?;
    let max_iterations = cli.max_iterations.unwrap_or(cfg.max_iterations_default);
    let invoker = CommandInvoker::new(cfg.agent.command.clone());
    let request = LoopRequest {
        base_prompt,
        max_iterations,
    };

    let outcome = run_loop(paths, &invoker, &cfg, &request, print_iteration)?;
    print_outcome(&outcome);
    Ok(())
}

/// Resolve the base prompt: inline argument wins, then the prompt file.
/// Both absent is a validation error that never reaches the agent.
fn resolve_prompt(cli: &Cli) -> Result<String> {
    if let Some(prompt) = cli.prompt.as_deref() {
        let trimmed = prompt.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    if let Some(path) = cli.prompt_file.as_deref() {
        if !path.exists() {
            bail!("prompt file not found: {}", path.display());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read prompt file {}", path.display()))?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            bail!("prompt file {} is empty", path.display());
        }
        return Ok(trimmed.to_string());
    }
    bail!("No prompt provided (pass a prompt argument or --prompt-file)");
}

fn print_iteration(report: &IterationReport) {
    let exit = match report.agent_exit_code {
        Some(code) => code.to_string(),
        None => "killed".to_string(),
    };
    let mut line = format!(
        "iteration {}: exit {}, {:.1}s, {} completed, {} remaining",
        report.iteration,
        exit,
        report.duration_ms as f64 / 1000.0,
        report.tasks_completed,
        report.tasks_remaining
    );
    if let Some(reason) = report.struggle {
        line.push_str(&format!(" [struggle: {}]", reason.as_str()));
    }
    println!("{line}");
}

fn print_outcome(outcome: &LoopOutcome) {
    match &outcome.stop {
        LoopStop::Completed { iterations } => {
            println!("All tasks complete after {iterations} iteration(s).");
        }
        LoopStop::MaxIterationsReached { max_iterations } => {
            println!("Stopped after reaching the {max_iterations}-iteration budget.");
        }
        LoopStop::Aborted { before_iteration } => {
            println!("Aborted by stop file before iteration {before_iteration}.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_task_flags() {
        let cli = Cli::parse_from(["ralph", "--add-task", "write docs"]);
        assert_eq!(cli.add_task.as_deref(), Some("write docs"));
        assert!(cli.prompt.is_none());

        let cli = Cli::parse_from(["ralph", "--remove-task", "2"]);
        assert_eq!(cli.remove_task.as_deref(), Some("2"));
    }

    #[test]
    fn parse_loop_invocation() {
        let cli = Cli::parse_from(["ralph", "fix the build", "--max-iterations", "7"]);
        assert_eq!(cli.prompt.as_deref(), Some("fix the build"));
        assert_eq!(cli.max_iterations, Some(7));
    }

    #[test]
    fn parse_status_with_tasks() {
        let cli = Cli::parse_from(["ralph", "--status", "--tasks"]);
        assert!(cli.status);
        assert!(cli.tasks);
    }

    #[test]
    fn parse_index_rejects_garbage() {
        assert_eq!(parse_index(" 4 ").expect("number"), 4);
        let err = parse_index("two").expect_err("garbage");
        assert!(err.to_string().contains("invalid task index"));
    }

    #[test]
    fn resolve_prompt_requires_a_source() {
        let cli = Cli::parse_from(["ralph"]);
        let err = resolve_prompt(&cli).expect_err("no prompt");
        assert!(err.to_string().contains("No prompt provided"));
    }

    #[test]
    fn resolve_prompt_rejects_missing_file() {
        let cli = Cli::parse_from(["ralph", "--prompt-file", "/definitely/missing.md"]);
        let err = resolve_prompt(&cli).expect_err("missing file");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn format_duration_is_humane() {
        assert_eq!(format_duration_ms(1500), "1.500s");
        assert_eq!(format_duration_ms(83_000), "1m 23s");
    }
}
