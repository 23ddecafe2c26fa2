//! Iteration prompt rendering.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::task::{self, Task};

const ITERATION_TEMPLATE: &str = include_str!("prompts/iteration.md");

/// Inputs for one iteration's combined prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub base_prompt: &'a str,
    /// Current context log contents, if any.
    pub context_log: Option<&'a str>,
    /// Checklist snapshot taken at the start of the iteration.
    pub tasks: &'a [Task],
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("iteration", ITERATION_TEMPLATE)
            .expect("iteration template should be valid");
        Self { env }
    }

    /// Render the prompt fed to the agent for one iteration.
    pub fn render_iteration(&self, inputs: &PromptInputs<'_>) -> Result<String> {
        let checklist = task::render_tasks(inputs.tasks);
        let template = self.env.get_template("iteration")?;
        let rendered = template.render(context! {
            base => inputs.base_prompt.trim(),
            context => inputs.context_log.map(str::trim).filter(|s| !s.is_empty()),
            tasks => (!checklist.trim().is_empty()).then(|| checklist.trim()),
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
