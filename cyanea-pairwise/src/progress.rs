//! Progress accounting for long pairwise runs.
//!
//! The evaluator owns a [`ProgressCounter`] that other threads may poll at
//! any time, and pushes coarse updates (every `progress_interval` pairs,
//! plus one at the end) to a [`ProgressObserver`].

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// A snapshot of a run's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Pairs attempted so far, failed ones included.
    pub done: u64,
    /// Pairs that failed and were skipped.
    pub failed: u64,
    /// Pairs in the whole run.
    pub total: u64,
}

impl Progress {
    /// Completed fraction in [0, 1]; 1 for an empty run.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

/// Receives progress updates. Counts passed in are monotonically
/// non-decreasing within a run.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

/// Logs each update at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, p: Progress) {
        info!(
            done = p.done,
            total = p.total,
            failed = p.failed,
            percent = p.fraction() * 100.0,
            "pairwise progress"
        );
    }
}

/// Drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_progress(&self, _progress: Progress) {}
}

/// Lock-free counters shared between the evaluator and any reader.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    done: AtomicU64,
    failed: AtomicU64,
    total: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run of `total` pairs.
    pub(crate) fn reset(&self, total: u64) {
        self.done.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    /// Record a finished chunk and return the previous `done` count.
    pub(crate) fn record(&self, attempted: u64, failed: u64) -> u64 {
        self.failed.fetch_add(failed, Ordering::Relaxed);
        self.done.fetch_add(attempted, Ordering::Relaxed)
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Progress {
        Progress {
            done: self.done.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = ProgressCounter::new();
        c.reset(10);
        assert_eq!(c.record(4, 1), 0);
        assert_eq!(c.record(3, 0), 4);
        let p = c.snapshot();
        assert_eq!(p, Progress { done: 7, failed: 1, total: 10 });
        assert!((p.fraction() - 0.7).abs() < 1e-12);
        c.reset(0);
        assert_eq!(c.snapshot().fraction(), 1.0);
    }
}
