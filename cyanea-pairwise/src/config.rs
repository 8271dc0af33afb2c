//! Evaluator settings.

use cyanea_core::{CyaneaError, Result};

/// What to do when a single pair fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FailurePolicy {
    /// Log the failure with both item identities, leave the pair out of the
    /// output and keep going.
    #[default]
    Skip,
    /// Stop dispatching, discard everything collected so far and return the
    /// failure.
    Abort,
}

/// Configuration for [`ParallelPairEvaluator`](crate::ParallelPairEvaluator).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvaluatorConfig {
    /// Pairs per dispatched chunk.
    pub chunk_size: usize,
    /// Worker threads.
    pub workers: usize,
    /// Emit results in pair-enumeration order instead of completion order.
    pub ordered: bool,
    pub failure_policy: FailurePolicy,
    /// Pairs between progress notifications.
    pub progress_interval: u64,
    /// Chunks dispatched but not yet consumed, at most. `None` means twice
    /// the worker count; an explicit value may not be below `workers`.
    pub max_in_flight: Option<usize>,
}

impl Default for EvaluatorConfig {
    /// Chunks of 10 000 pairs over every available core, unordered, skipping
    /// failed pairs, progress every million pairs.
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            workers: default_workers(),
            ordered: false,
            failure_policy: FailurePolicy::Skip,
            progress_interval: 1_000_000,
            max_in_flight: None,
        }
    }
}

impl EvaluatorConfig {
    /// Reject settings the evaluator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CyaneaError::Configuration("chunk_size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(CyaneaError::Configuration("workers must be at least 1".into()));
        }
        if let Some(limit) = self.max_in_flight {
            if limit < self.workers {
                return Err(CyaneaError::Configuration(format!(
                    "max_in_flight ({limit}) must be at least workers ({})",
                    self.workers
                )));
            }
        }
        if self.progress_interval == 0 {
            return Err(CyaneaError::Configuration(
                "progress_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Effective cap on chunks in flight.
    pub fn in_flight_limit(&self) -> usize {
        self.max_in_flight.unwrap_or(self.workers * 2)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
