//! bs-logging: NDJSON events for simulation runs.
//!
//! Append-only, one JSON object per line, so a crashed run still leaves a
//! readable prefix for post-mortems.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bs_core::{BusinessState, ConstraintViolation, EffectLogEntry, StepOutcome};
use serde::Serialize;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of every event schema in this module.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}

pub fn hash_config_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn try_git_hash() -> Option<String> {
    use std::process::Command;

    let out = Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// First line of every log: what produced the events that follow.
#[derive(Debug, Clone, Serialize)]
pub struct RunStartEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub schema_version: u32,

    pub command: String,
    pub config_hash: Option<String>,
    pub git_hash: Option<String>,

    pub horizon_months: u32,
    pub policy_count: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildSummaryV1 {
    pub policy: String,
    pub visits: u32,
    pub mean_value: f64,
    pub survival_probability: f64,
}

/// One search recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct SearchDecisionEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub schema_version: u32,

    pub month: u32,
    pub chosen_policy: Option<String>,
    pub survival_probability: f64,
    pub visits: u32,
    pub mean_value: f64,
    pub used_fallback: bool,

    pub iterations: u32,
    pub node_count: usize,
    pub rollouts: u32,
    pub rollout_steps: u64,

    pub children: Vec<ChildSummaryV1>,
}

/// One executed month.
#[derive(Debug, Clone, Serialize)]
pub struct StepEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub schema_version: u32,

    pub month: u32,
    pub policy: String,
    pub state: BusinessState,
    pub ltv: f64,
    pub pending_effects: usize,
    pub effects: Vec<EffectLogEntry>,
    pub violations: Vec<ConstraintViolation>,
}

impl StepEventV1 {
    pub fn from_outcome(policy: &str, outcome: &StepOutcome) -> Self {
        Self {
            event: "step",
            ts_ms: now_ms(),
            schema_version: EVENT_SCHEMA_VERSION,
            month: outcome.state.month,
            policy: policy.to_string(),
            state: outcome.state.clone(),
            ltv: outcome.state.ltv(),
            pending_effects: outcome.effects.len(),
            effects: outcome.log.clone(),
            violations: outcome.report.violations.clone(),
        }
    }
}

/// Outcome of a Monte Carlo batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummaryEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub schema_version: u32,

    pub policy: String,
    pub runs: u32,
    pub months: u32,
    pub seed: u64,
    pub survival_probability: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug)]
pub enum NdjsonError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for NdjsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "ndjson io error: {e}"),
            Self::Json(e) => write!(f, "ndjson encode error: {e}"),
        }
    }
}

impl std::error::Error for NdjsonError {}

impl From<io::Error> for NdjsonError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for NdjsonError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Append-only NDJSON writer.
///
/// Contract: each call writes exactly one JSON object followed by a newline.
pub struct NdjsonWriter {
    w: BufWriter<File>,
    lines_since_flush: u64,
    flush_every_lines: u64,
}

impl NdjsonWriter {
    /// Open a file for append. Creates it if it doesn't exist.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, NdjsonError> {
        Self::open_append_with_flush(path, 0)
    }

    /// `flush_every_lines=0` disables periodic flushing.
    pub fn open_append_with_flush(
        path: impl AsRef<Path>,
        flush_every_lines: u64,
    ) -> Result<Self, NdjsonError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            w: BufWriter::new(f),
            lines_since_flush: 0,
            flush_every_lines,
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<(), NdjsonError> {
        let mut buf = serde_json::to_vec(event)?;
        buf.push(b'\n');
        self.w.write_all(&buf)?;
        self.lines_since_flush += 1;
        if self.flush_every_lines > 0 && self.lines_since_flush >= self.flush_every_lines {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), NdjsonError> {
        self.w.flush()?;
        self.lines_since_flush = 0;
        Ok(())
    }
}
