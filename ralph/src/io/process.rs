//! Child process execution with a hard timeout and bounded capture.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured result of one child process run.
#[derive(Debug)]
pub struct CapturedRun {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded across both streams once the capture limit was hit.
    pub truncated_bytes: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// Spawn `cmd`, feed `stdin` to it, and wait at most `timeout`.
///
/// Both output streams are drained on dedicated threads so a chatty child
/// cannot deadlock on a full pipe; each stream keeps at most `limit` bytes
/// while still draining the rest. On timeout the child is killed and the
/// partial capture is returned with `timed_out` set.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), limit))]
pub fn run_captured(
    mut cmd: Command,
    stdin: &[u8],
    timeout: Duration,
    limit: usize,
) -> Result<CapturedRun> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let started = Instant::now();
    debug!("spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_reader = thread::spawn(move || drain_limited(stdout, limit));
    let stderr_reader = thread::spawn(move || drain_limited(stderr, limit));

    // Readers are already draining, so a large prompt cannot deadlock even
    // when the child interleaves reading stdin with writing output. A child
    // that exits without consuming stdin yields a broken pipe, which is not
    // an error for us.
    let mut child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    if let Err(err) = child_stdin.write_all(stdin) {
        if err.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(err).context("write child stdin");
        }
    }
    drop(child_stdin);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "child timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("join stdout reader")?;
    let (stderr, stderr_dropped) = join_reader(stderr_reader).context("join stderr reader")?;
    let truncated_bytes = stdout_dropped + stderr_dropped;
    if truncated_bytes > 0 {
        warn!(truncated_bytes, "child output truncated");
    }

    let elapsed = started.elapsed();
    debug!(exit_code = ?status.code(), timed_out, elapsed_ms = elapsed.as_millis() as u64, "child finished");
    Ok(CapturedRun {
        status,
        stdout,
        stderr,
        truncated_bytes,
        timed_out,
        elapsed,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Drain `reader` to completion, keeping at most `limit` bytes.
///
/// Returns the kept bytes and how many were dropped.
fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read child output")?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        let take = n.min(room);
        kept.extend_from_slice(&chunk[..take]);
        dropped += n - take;
    }

    Ok((kept, dropped))
}
