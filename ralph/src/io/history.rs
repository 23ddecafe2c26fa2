//! Iteration history persisted as `ralph-history.json`.
//!
//! The three top-level keys (`iterations`, `totalDurationMs`,
//! `struggleIndicators`) are an external contract: every persisted form
//! carries them, and loads are validated against the embedded JSON Schema
//! before parsing.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::struggle::StruggleReason;
use crate::io::paths::write_atomic;

const HISTORY_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/history/v1.schema.json"
));

static HISTORY_VALIDATOR: LazyLock<jsonschema::Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(HISTORY_SCHEMA).expect("embedded history schema should parse");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("embedded history schema should compile")
});

/// One recorded struggle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StruggleEvent {
    /// 1-based loop iteration the event was observed at.
    pub iteration: u64,
    pub reason: StruggleReason,
}

/// Cumulative record of loop iterations across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub iterations: u64,
    pub total_duration_ms: u64,
    pub struggle_indicators: Vec<StruggleEvent>,
}

/// File-backed recorder. Created lazily; only an explicit reset ever
/// removes the record (`--clear-context` does not touch it).
#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    path: PathBuf,
}

impl HistoryRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the record; a missing file yields the zero-valued record.
    pub fn load(&self) -> Result<HistoryRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HistoryRecord::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read history {}", self.path.display()));
            }
        };
        let json: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse history {}", self.path.display()))?;
        validate_schema(&json)?;
        let record = serde_json::from_value(json)
            .with_context(|| format!("parse history {}", self.path.display()))?;
        Ok(record)
    }

    /// Fold one iteration into the record and persist it.
    pub fn record_iteration(
        &self,
        duration_ms: u64,
        struggle: Option<StruggleEvent>,
    ) -> Result<HistoryRecord> {
        let mut record = self.load()?;
        record.iterations += 1;
        record.total_duration_ms += duration_ms;
        if let Some(event) = struggle {
            record.struggle_indicators.push(event);
        }
        self.write(&record)?;
        debug!(
            iterations = record.iterations,
            duration_ms, "iteration recorded"
        );
        Ok(record)
    }

    fn write(&self, record: &HistoryRecord) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(record).context("serialize history")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

fn validate_schema(instance: &Value) -> Result<()> {
    let messages: Vec<String> = HISTORY_VALIDATOR
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!(
            "history schema validation failed:\n- {}",
            messages.join("\n- ")
        );
    }
    Ok(())
}
