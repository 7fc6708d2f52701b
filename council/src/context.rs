//! Per-run state threaded through the council phases.
//!
//! Replaces module-level globals with an explicit context object: the run
//! id, wall-clock timing, and one-shot warning latches live here and travel
//! by shared reference down the recursion.

use std::cell::Cell;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// State shared across one council run.
#[derive(Debug)]
pub struct RunContext {
    /// Unique id for this run, stamped on logs and the final verdict.
    pub run_id: String,
    /// When the run started (UTC).
    pub started_at: DateTime<Utc>,
    started: Instant,
    decomposition_warned: Cell<bool>,
}

impl RunContext {
    /// Start a fresh run context.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            decomposition_warned: Cell::new(false),
        }
    }

    /// Milliseconds elapsed since the run started.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Warn about a malformed decomposition payload, at most once per run.
    ///
    /// Subsequent malformed payloads in the same run are silently treated
    /// the same way (zero sub-topics) without re-warning.
    pub fn warn_decomposition_once(&self, agent_style: &str, observed_keys: &[String]) {
        if self.decomposition_warned.replace(true) {
            return;
        }
        tracing::warn!(
            run_id = %self.run_id,
            agent_style,
            keys = ?observed_keys,
            "Unrecognized decomposition payload shape; treating as no sub-topics"
        );
    }

    /// Whether the malformed-decomposition warning has fired this run.
    pub fn decomposition_warned(&self) -> bool {
        self.decomposition_warned.get()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
