//! Process readiness ladder: `starting → listening → ready`, with
//! `error` as the terminal bad arm.
//!
//! Transitions are monotonic in list order; revisiting the current phase
//! is a no-op and each distinct phase is appended exactly once.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Starting,
    Listening,
    Ready,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseEntry {
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessSnapshot {
    pub phase: Phase,
    pub since: DateTime<Utc>,
    pub phases: Vec<PhaseEntry>,
}

/// Process-wide readiness state; safe under concurrent advancement.
pub struct Readiness {
    inner: Mutex<ReadinessSnapshot>,
}

impl Readiness {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            inner: Mutex::new(ReadinessSnapshot {
                phase: Phase::Starting,
                since: now,
                phases: vec![PhaseEntry {
                    phase: Phase::Starting,
                    at: now,
                }],
            }),
        }
    }

    /// Advance to `phase`. Going backwards or revisiting is a no-op;
    /// `Error` is reachable from anywhere but never left.
    pub fn advance(&self, phase: Phase) -> bool {
        let mut inner = self.inner.lock();
        if inner.phase == Phase::Error || phase <= inner.phase {
            return false;
        }
        let now = Utc::now();
        inner.phase = phase;
        inner.since = now;
        inner.phases.push(PhaseEntry { phase, at: now });
        tracing::info!(phase = ?phase, "readiness advanced");
        true
    }

    pub fn snapshot(&self) -> ReadinessSnapshot {
        self.inner.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
