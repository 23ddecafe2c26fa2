//! Test-only helpers: scripted agent invocations without real processes.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::io::invoker::{AgentInvoker, InvokeRequest, Invocation};

/// One scripted reply for [`ScriptedInvoker`].
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub output: String,
    pub exit_code: i32,
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

impl ScriptedReply {
    /// A successful reply with the given output and a small fixed duration.
    pub fn ok(output: &str) -> Self {
        Self {
            output: output.to_string(),
            exit_code: 0,
            elapsed_ms: 10,
            timed_out: false,
        }
    }

    /// A reply that was killed at the iteration timeout.
    pub fn timed_out(elapsed_ms: u64) -> Self {
        Self {
            output: String::new(),
            exit_code: -1,
            elapsed_ms,
            timed_out: true,
        }
    }
}

/// Invoker that returns predetermined replies in order and fails when the
/// script runs dry.
pub struct ScriptedInvoker {
    replies: RefCell<VecDeque<ScriptedReply>>,
    requests: RefCell<Vec<InvokeRequest>>,
}

impl ScriptedInvoker {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests observed so far, for asserting on prompt contents.
    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.borrow().clone()
    }
}

impl AgentInvoker for ScriptedInvoker {
    fn invoke(&self, request: &InvokeRequest) -> Result<Invocation> {
        self.requests.borrow_mut().push(request.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted invoker ran out of replies"))?;
        let timed_out = reply.timed_out;
        Ok(Invocation {
            exit_code: (!timed_out).then_some(reply.exit_code),
            success: reply.exit_code == 0 && !timed_out,
            elapsed_ms: reply.elapsed_ms,
            output: reply.output,
            timed_out,
        })
    }
}

/// Invoker whose spawn always fails, mimicking a missing agent executable.
pub struct FailingInvoker;

impl AgentInvoker for FailingInvoker {
    fn invoke(&self, _request: &InvokeRequest) -> Result<Invocation> {
        Err(anyhow!("failed to start agent 'missing-agent'"))
    }
}
