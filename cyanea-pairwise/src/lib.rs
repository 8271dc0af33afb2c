//! Parallel evaluation of a function over every unordered pair of items.
//!
//! - **Enumeration**: [`Combinations`] yields `(i, j)` with `i < j` lazily,
//!   [`pair_count`] gives the total up front
//! - **Evaluation**: [`ParallelPairEvaluator`] cuts the pair stream into
//!   chunks and runs them on a fixed pool of scoped threads, with bounded
//!   memory, optional ordering and a per-pair [`FailurePolicy`]
//! - **Control**: [`CancellationToken`] stops a run cooperatively,
//!   [`ProgressObserver`] receives coarse progress updates
//!
//! # Example
//!
//! ```
//! use cyanea_pairwise::{EvaluatorConfig, ParallelPairEvaluator};
//!
//! let values = [1.0_f64, 4.0, 9.0];
//! let config = EvaluatorConfig { ordered: true, ..EvaluatorConfig::default() };
//! let diffs = ParallelPairEvaluator::new(config)
//!     .evaluate_items(&values, |a, b| Ok(b - a))
//!     .unwrap();
//! assert_eq!(diffs, vec![3.0, 8.0, 5.0]);
//! ```

pub mod cancel;
pub mod config;
pub mod evaluator;
pub mod pairs;
pub mod progress;

pub use cancel::CancellationToken;
pub use config::{EvaluatorConfig, FailurePolicy};
pub use evaluator::{EvaluationSummary, FnObserver, ParallelPairEvaluator};
pub use pairs::{pair_count, Combinations};
pub use progress::{LogProgress, Progress, ProgressCounter, ProgressObserver, SilentProgress};
