//! Operator configuration stored under `.ralph/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::struggle::StruggleThresholds;
use crate::io::paths::write_atomic;

/// Loop configuration (TOML).
///
/// The file is edited by humans and must stay stable. Missing fields (or a
/// missing file) fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RalphConfig {
    /// Iteration budget used when `--max-iterations` is not given.
    pub max_iterations_default: u32,

    /// Per-iteration wall-clock budget for the agent subprocess, in seconds.
    /// The subprocess is killed at the deadline.
    pub iteration_timeout_secs: u64,

    /// Truncate captured agent output beyond this many bytes.
    pub agent_output_limit_bytes: usize,

    pub agent: AgentConfig,
    pub struggle: StruggleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Argv for the agent executable; the combined prompt is fed on stdin.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StruggleConfig {
    /// Consecutive iterations without a completed task before a
    /// `no_progress` struggle event is recorded.
    pub no_progress_iterations: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string(), "--print".to_string()],
        }
    }
}

impl Default for StruggleConfig {
    fn default() -> Self {
        Self {
            no_progress_iterations: 3,
        }
    }
}

impl Default for RalphConfig {
    fn default() -> Self {
        Self {
            max_iterations_default: 10,
            iteration_timeout_secs: 30 * 60,
            agent_output_limit_bytes: 100_000,
            agent: AgentConfig::default(),
            struggle: StruggleConfig::default(),
        }
    }
}

impl RalphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations_default == 0 {
            return Err(anyhow!("max_iterations_default must be > 0"));
        }
        if self.iteration_timeout_secs == 0 {
            return Err(anyhow!("iteration_timeout_secs must be > 0"));
        }
        if self.agent_output_limit_bytes == 0 {
            return Err(anyhow!("agent_output_limit_bytes must be > 0"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if self.struggle.no_progress_iterations == 0 {
            return Err(anyhow!("struggle.no_progress_iterations must be > 0"));
        }
        Ok(())
    }

    /// Detector thresholds derived from this config.
    pub fn struggle_thresholds(&self) -> StruggleThresholds {
        StruggleThresholds {
            no_progress_iterations: self.struggle.no_progress_iterations,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RalphConfig::default()`.
pub fn load_config(path: &Path) -> Result<RalphConfig> {
    if !path.exists() {
        let cfg = RalphConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RalphConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk.
pub fn write_config(path: &Path, cfg: &RalphConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RalphConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = RalphConfig {
            max_iterations_default: 25,
            agent: AgentConfig {
                command: vec!["codex".to_string(), "exec".to_string()],
            },
            ..RalphConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[struggle]\nno_progress_iterations = 5\n").expect("seed");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.struggle.no_progress_iterations, 5);
        assert_eq!(cfg.max_iterations_default, 10);
        assert_eq!(cfg.agent, AgentConfig::default());
    }

    #[test]
    fn validate_rejects_empty_agent_command() {
        let cfg = RalphConfig {
            agent: AgentConfig {
                command: Vec::new(),
            },
            ..RalphConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
