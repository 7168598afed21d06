//! Run-wide counters, issue lists and the progress signal
//!
//! Every terminal track outcome increments exactly one of success, error,
//! unavailable or not-song; `total` is incremented once per track considered.
//! Counters only grow within a run.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::error::Severity;

/// Snapshot of the run counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Tracks considered
    pub total: u64,
    /// Tracks finished (including skips and already-present files)
    pub success: u64,
    /// Tracks that failed and may be retried
    pub error: u64,
    /// Tracks with no usable variant
    pub unavailable: u64,
    /// Song URLs that did not resolve to a song
    pub not_song: u64,
}

impl Counters {
    /// Unavailable and not-song outcomes, reported together as warnings
    pub fn warnings(&self) -> u64 {
        self.unavailable + self.not_song
    }
}

/// Human-readable warnings and errors collected during a pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Issues {
    /// Warning lines, in the order they were recorded
    pub warnings: Vec<String>,
    /// Error lines, in the order they were recorded
    pub errors: Vec<String>,
}

impl Issues {
    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

impl std::fmt::Display for Issues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }
        if !self.errors.is_empty() {
            writeln!(f, "Errors:")?;
            for error in &self.errors {
                writeln!(f, "  - {error}")?;
            }
        }
        Ok(())
    }
}

/// Final figures of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Counters at the end of the run
    pub counters: Counters,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = &self.counters;
        write!(
            f,
            "Completed: {}/{} | Warnings: {} | Errors: {}",
            c.success,
            c.total,
            c.warnings(),
            c.error
        )
    }
}

/// Shared run statistics
///
/// Safe to update from any worker. Each mutation also sends a best-effort signal
/// on the progress channel (capacity one); a signal is dropped when one is
/// already pending, so a slow renderer never blocks a worker.
#[derive(Debug, Default)]
pub struct RunStats {
    counters: Mutex<Counters>,
    issues: Mutex<Issues>,
    progress: Option<mpsc::Sender<()>>,
}

impl RunStats {
    /// Statistics without a progress listener
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics plus the receiving end of the progress signal
    pub fn with_progress() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let stats = Self {
            progress: Some(tx),
            ..Self::default()
        };
        (stats, rx)
    }

    /// Count a track as considered
    pub fn inc_total(&self) {
        self.bump(|c| c.total += 1);
    }

    /// Count a track as finished
    pub fn inc_success(&self) {
        self.bump(|c| c.success += 1);
    }

    /// Count a retryable failure
    pub fn inc_error(&self) {
        self.bump(|c| c.error += 1);
    }

    /// Count a track with no usable variant
    pub fn inc_unavailable(&self) {
        self.bump(|c| c.unavailable += 1);
    }

    /// Count a song URL that did not resolve
    pub fn inc_not_song(&self) {
        self.bump(|c| c.not_song += 1);
    }

    /// Increment the counter matching a failure severity
    pub fn record_failure(&self, severity: Severity) {
        match severity {
            Severity::Error => self.inc_error(),
            Severity::Unavailable => self.inc_unavailable(),
            Severity::NotSong => self.inc_not_song(),
        }
    }

    /// Record a warning line
    pub fn add_warning(&self, message: impl Into<String>) {
        lock(&self.issues).warnings.push(message.into());
        self.signal();
    }

    /// Record an error line
    pub fn add_error(&self, message: impl Into<String>) {
        lock(&self.issues).errors.push(message.into());
        self.signal();
    }

    /// Forget the recorded issues (counters are kept)
    pub fn clear_issues(&self) {
        *lock(&self.issues) = Issues::default();
    }

    /// Copy of the recorded issues
    pub fn issues(&self) -> Issues {
        lock(&self.issues).clone()
    }

    /// Copy of the counters
    pub fn counters(&self) -> Counters {
        *lock(&self.counters)
    }

    /// Summary of the counters so far
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            counters: self.counters(),
        }
    }

    fn bump(&self, update: impl FnOnce(&mut Counters)) {
        update(&mut lock(&self.counters));
        self.signal();
    }

    fn signal(&self) {
        if let Some(tx) = &self.progress {
            // Full means a redraw is already pending
            let _ = tx.try_send(());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
