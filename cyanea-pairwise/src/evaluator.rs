//! Parallel evaluation of a function over all unordered item pairs.
//!
//! Threads, all scoped to one call:
//!
//! ```text
//! dispatcher --jobs--> worker x N --outcomes--> collector (calling thread)
//!     ^                                              |
//!     +----------------- permits --------------------+
//! ```
//!
//! The dispatcher pulls `chunk_size` pairs at a time from a lazy
//! [`Combinations`] stream, but only after taking a permit; the collector
//! returns a permit for every chunk it has consumed. At most
//! [`EvaluatorConfig::in_flight_limit`] chunks therefore exist at once
//! (queued, running, or waiting to be consumed), regardless of the number
//! of pairs. The limit is never below the worker count, so every worker
//! can hold a chunk.
//!
//! Shared lookup data is simply borrowed by the pair function: it must be
//! `Sync`, it is never copied, and nothing in this module can mutate it.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use cyanea_core::{CyaneaError, Result};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::{EvaluatorConfig, FailurePolicy};
use crate::pairs::{pair_count, Combinations};
use crate::progress::{LogProgress, Progress, ProgressCounter, ProgressObserver};

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluationSummary {
    /// `n (n - 1) / 2`.
    pub pairs_total: u64,
    /// Pairs that produced a result.
    pub pairs_evaluated: u64,
    /// Pairs that failed and were skipped.
    pub pairs_failed: u64,
    /// Chunks consumed.
    pub chunks: u64,
}

// ── Internal messages ──────────────────────────────────────────────────────

struct Job {
    seq: u64,
    pairs: Vec<(usize, usize)>,
}

struct PairFailure {
    first: usize,
    second: usize,
    error: CyaneaError,
}

struct ChunkOutcome<R> {
    seq: u64,
    attempted: usize,
    results: Vec<R>,
    failures: Vec<PairFailure>,
}

impl<R> ChunkOutcome<R> {
    /// A chunk received after the run was stopped; nothing was evaluated.
    fn skipped(seq: u64) -> Self {
        Self {
            seq,
            attempted: 0,
            results: Vec::new(),
            failures: Vec::new(),
        }
    }
}

fn run_chunk<R, F>(job: Job, pair_fn: &F) -> ChunkOutcome<R>
where
    F: Fn(usize, usize) -> Result<R>,
{
    let mut results = Vec::with_capacity(job.pairs.len());
    let mut failures = Vec::new();
    for &(i, j) in &job.pairs {
        match panic::catch_unwind(AssertUnwindSafe(|| pair_fn(i, j))) {
            Ok(Ok(r)) => results.push(r),
            Ok(Err(error)) => failures.push(PairFailure {
                first: i,
                second: j,
                error,
            }),
            Err(payload) => failures.push(PairFailure {
                first: i,
                second: j,
                error: CyaneaError::Other(format!("panicked: {}", panic_message(&payload))),
            }),
        }
    }
    ChunkOutcome {
        seq: job.seq,
        attempted: job.pairs.len(),
        results,
        failures,
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ── Evaluator ──────────────────────────────────────────────────────────────

/// Evaluates a pair function over every unordered pair of `0..n` on a fixed
/// pool of worker threads.
pub struct ParallelPairEvaluator<'a> {
    config: EvaluatorConfig,
    cancel: CancellationToken,
    observer: Arc<dyn ProgressObserver>,
    counter: Arc<ProgressCounter>,
    labels: Option<&'a [String]>,
}

impl<'a> ParallelPairEvaluator<'a> {
    /// An evaluator that logs progress through `tracing`.
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            observer: Arc::new(LogProgress),
            counter: Arc::new(ProgressCounter::new()),
            labels: None,
        }
    }

    /// Stop when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Send progress updates to `observer` instead of the log.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Name items in failure reports: item `i` is reported as `labels[i]`
    /// instead of its index.
    pub fn with_labels(mut self, labels: &'a [String]) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// A handle that cancels this evaluator's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Live counters of the current (or last) run.
    pub fn progress(&self) -> Arc<ProgressCounter> {
        Arc::clone(&self.counter)
    }

    /// Evaluate `pair_fn` over all pairs and collect the results.
    ///
    /// Results come in completion order, or in enumeration order when
    /// `config.ordered` is set. Failed pairs are absent under
    /// [`FailurePolicy::Skip`].
    pub fn evaluate<R, F>(&self, item_count: usize, pair_fn: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize, usize) -> Result<R> + Sync,
    {
        let mut out = Vec::new();
        self.evaluate_into(item_count, pair_fn, |batch| {
            out.extend(batch);
            Ok(())
        })?;
        Ok(out)
    }

    /// [`evaluate`](Self::evaluate) over a slice, passing items instead of
    /// indices.
    pub fn evaluate_items<T, R, F>(&self, items: &[T], pair_fn: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T, &T) -> Result<R> + Sync,
    {
        self.evaluate(items.len(), |i, j| pair_fn(&items[i], &items[j]))
    }

    /// Evaluate `pair_fn` over all pairs, handing each consumed chunk's
    /// results to `sink` on the calling thread.
    ///
    /// # Errors
    ///
    /// - a configuration error for invalid settings, before any work;
    /// - the first pair failure under [`FailurePolicy::Abort`];
    /// - any error returned by `sink`;
    /// - [`CyaneaError::Cancelled`] if the token was cancelled before every
    ///   pair was consumed.
    ///
    /// In every error case dispatch stops, workers drain without evaluating,
    /// and results not yet handed to `sink` are discarded.
    pub fn evaluate_into<R, F, S>(
        &self,
        item_count: usize,
        pair_fn: F,
        mut sink: S,
    ) -> Result<EvaluationSummary>
    where
        R: Send,
        F: Fn(usize, usize) -> Result<R> + Sync,
        S: FnMut(Vec<R>) -> Result<()>,
    {
        let cfg = &self.config;
        cfg.validate()?;
        if self.cancel.is_cancelled() {
            return Err(CyaneaError::Cancelled);
        }

        let total = pair_count(item_count);
        self.counter.reset(total);
        info!(
            items = item_count,
            pairs = total,
            workers = cfg.workers,
            chunk_size = cfg.chunk_size,
            ordered = cfg.ordered,
            "starting pairwise evaluation"
        );

        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(cfg.workers);
        let job_rx = Mutex::new(job_rx);
        let (out_tx, out_rx) = mpsc::sync_channel::<ChunkOutcome<R>>(cfg.workers);
        let in_flight = cfg.in_flight_limit();
        let (permit_tx, permit_rx) = mpsc::sync_channel::<()>(in_flight);
        for _ in 0..in_flight {
            // Capacity equals the permit count, so this never blocks.
            permit_tx
                .send(())
                .map_err(|_| CyaneaError::Other("permit channel closed".into()))?;
        }
        let stop = AtomicBool::new(false);

        let (stop, job_rx, token, pair_fn) = (&stop, &job_rx, &self.cancel, &pair_fn);

        let result = thread::scope(|s| {
            s.spawn(move || {
                let mut pairs = Combinations::new(item_count);
                let mut seq = 0u64;
                while permit_rx.recv().is_ok() {
                    if stop.load(Ordering::Acquire) || token.is_cancelled() {
                        break;
                    }
                    let chunk: Vec<(usize, usize)> = pairs.by_ref().take(cfg.chunk_size).collect();
                    if chunk.is_empty() {
                        break;
                    }
                    if job_tx.send(Job { seq, pairs: chunk }).is_err() {
                        break;
                    }
                    seq += 1;
                }
                debug!(chunks = seq, "dispatcher finished");
            });

            for _ in 0..cfg.workers {
                let out_tx = out_tx.clone();
                s.spawn(move || loop {
                    let next = match job_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(job) = next else { break };
                    let outcome = if stop.load(Ordering::Acquire) || token.is_cancelled() {
                        ChunkOutcome::skipped(job.seq)
                    } else {
                        run_chunk(job, pair_fn)
                    };
                    if out_tx.send(outcome).is_err() {
                        break;
                    }
                });
            }
            drop(out_tx);

            self.collect(out_rx, permit_tx, stop, total, &mut sink)
        });

        match &result {
            Ok(summary) => info!(
                evaluated = summary.pairs_evaluated,
                failed = summary.pairs_failed,
                chunks = summary.chunks,
                "pairwise evaluation finished"
            ),
            Err(e) => warn!(error = %e, "pairwise evaluation aborted"),
        }
        result
    }

    /// Consume chunk outcomes until every worker has exited.
    fn collect<R, S>(
        &self,
        outcomes: mpsc::Receiver<ChunkOutcome<R>>,
        permit_tx: SyncSender<()>,
        stop: &AtomicBool,
        total: u64,
        sink: &mut S,
    ) -> Result<EvaluationSummary>
    where
        S: FnMut(Vec<R>) -> Result<()>,
    {
        let mut permits = Some(permit_tx);
        let mut pending: BTreeMap<u64, ChunkOutcome<R>> = BTreeMap::new();
        let mut next_seq = 0u64;
        let mut fatal: Option<CyaneaError> = None;
        let mut summary = EvaluationSummary {
            pairs_total: total,
            ..EvaluationSummary::default()
        };

        for outcome in outcomes {
            if fatal.is_none() && self.cancel.is_cancelled() {
                fatal = Some(CyaneaError::Cancelled);
            }
            if fatal.is_some() {
                stop.store(true, Ordering::Release);
                permits = None;
                continue;
            }

            let ready = if self.config.ordered {
                pending.insert(outcome.seq, outcome);
                let mut ready = Vec::new();
                while let Some(o) = pending.remove(&next_seq) {
                    ready.push(o);
                    next_seq += 1;
                }
                ready
            } else {
                vec![outcome]
            };

            for o in ready {
                if let Err(e) = self.absorb(o, &mut summary, sink) {
                    fatal = Some(e);
                    break;
                }
                if let Some(p) = &permits {
                    // The dispatcher may already have finished.
                    let _ = p.send(());
                }
            }
            if fatal.is_some() {
                stop.store(true, Ordering::Release);
                permits = None;
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        let consumed = summary.pairs_evaluated + summary.pairs_failed;
        if consumed != total {
            if self.cancel.is_cancelled() {
                return Err(CyaneaError::Cancelled);
            }
            return Err(CyaneaError::Other(format!(
                "pair stream ended early: {consumed} of {total} pairs consumed"
            )));
        }
        self.observer.on_progress(self.counter.snapshot());
        Ok(summary)
    }

    /// Apply the failure policy to one chunk and hand its results on.
    fn absorb<R, S>(
        &self,
        outcome: ChunkOutcome<R>,
        summary: &mut EvaluationSummary,
        sink: &mut S,
    ) -> Result<()>
    where
        S: FnMut(Vec<R>) -> Result<()>,
    {
        let failed = outcome.failures.len() as u64;
        for f in outcome.failures {
            let error = self.attribute(f);
            match self.config.failure_policy {
                FailurePolicy::Abort => return Err(error),
                FailurePolicy::Skip => warn!(error = %error, "pair skipped"),
            }
        }

        summary.chunks += 1;
        summary.pairs_evaluated += outcome.results.len() as u64;
        summary.pairs_failed += failed;
        if !outcome.results.is_empty() {
            sink(outcome.results)?;
        }

        let attempted = outcome.attempted as u64;
        let before = self.counter.record(attempted, failed);
        let interval = self.config.progress_interval;
        if (before + attempted) / interval > before / interval {
            self.observer.on_progress(self.counter.snapshot());
        }
        Ok(())
    }

    /// Name both items of a failed pair in its error.
    fn attribute(&self, failure: PairFailure) -> CyaneaError {
        match failure.error {
            e @ CyaneaError::Worker { .. } => e,
            e => CyaneaError::worker(
                self.label(failure.first),
                self.label(failure.second),
                e,
            ),
        }
    }

    fn label(&self, i: usize) -> String {
        self.labels
            .and_then(|l| l.get(i))
            .cloned()
            .unwrap_or_else(|| i.to_string())
    }
}

impl std::fmt::Debug for ParallelPairEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelPairEvaluator")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.counter.snapshot())
            .finish()
    }
}

/// Observer that forwards to a closure.
pub struct FnObserver<F>(pub F);

impl<F> ProgressObserver for FnObserver<F>
where
    F: Fn(Progress) + Send + Sync,
{
    fn on_progress(&self, progress: Progress) {
        (self.0)(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    fn config(chunk_size: usize, workers: usize, ordered: bool) -> EvaluatorConfig {
        EvaluatorConfig {
            chunk_size,
            workers,
            ordered,
            failure_policy: FailurePolicy::Skip,
            progress_interval: 1_000_000,
            max_in_flight: None,
        }
    }

    fn quiet<'a>(cfg: EvaluatorConfig) -> ParallelPairEvaluator<'a> {
        ParallelPairEvaluator::new(cfg).with_observer(Arc::new(crate::progress::SilentProgress))
    }

    #[test]
    fn four_items_in_order() {
        let eval = quiet(config(2, 3, true));
        let pairs = eval.evaluate(4, |i, j| Ok((i, j))).unwrap();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn ordered_output_matches_enumeration() {
        let eval = quiet(config(3, 4, true));
        let got = eval
            .evaluate(40, |i, j| {
                // Uneven work so chunks finish out of order.
                if (i + j) % 5 == 0 {
                    thread::yield_now();
                }
                Ok((i, j))
            })
            .unwrap();
        let expected: Vec<_> = Combinations::new(40).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn unordered_covers_every_pair_once() {
        let eval = quiet(config(7, 4, false));
        let got = eval.evaluate(50, |i, j| Ok((i, j))).unwrap();
        assert_eq!(got.len(), 1225);
        let unique: HashSet<_> = got.iter().copied().collect();
        assert_eq!(unique.len(), 1225);
        assert!(got.iter().all(|&(i, j)| i < j));
    }

    #[test]
    fn each_pair_evaluated_once() {
        let calls = AtomicUsize::new(0);
        let eval = quiet(config(5, 3, false));
        let summary = eval
            .evaluate_into(
                30,
                |_, _| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                },
                |_| Ok(()),
            )
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 435);
        assert_eq!(summary.pairs_total, 435);
        assert_eq!(summary.pairs_evaluated, 435);
        assert_eq!(summary.chunks, 87);
    }

    #[test]
    fn empty_and_single_item() {
        let eval = quiet(config(10, 2, false));
        assert!(eval.evaluate(0, |i, j| Ok((i, j))).unwrap().is_empty());
        assert!(eval.evaluate(1, |i, j| Ok((i, j))).unwrap().is_empty());
    }

    #[test]
    fn skip_policy_drops_failed_pair() {
        let eval = quiet(config(4, 2, true));
        let mut results = Vec::new();
        let summary = eval
            .evaluate_into(
                6,
                |i, j| {
                    if (i, j) == (1, 2) {
                        Err(CyaneaError::InvalidInput("bad pair".into()))
                    } else {
                        Ok((i, j))
                    }
                },
                |batch| {
                    results.extend(batch);
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(summary.pairs_failed, 1);
        assert_eq!(summary.pairs_evaluated, 14);
        assert_eq!(results.len(), 14);
        assert!(!results.contains(&(1, 2)));
        // Siblings in the same chunk survive.
        assert!(results.contains(&(1, 3)));
    }

    #[test]
    fn panicking_pair_is_contained() {
        let eval = quiet(config(3, 2, false));
        let got = eval
            .evaluate(5, |i, j| {
                if (i, j) == (0, 4) {
                    panic!("boom");
                }
                Ok((i, j))
            })
            .unwrap();
        assert_eq!(got.len(), 9);
    }

    #[test]
    fn abort_policy_names_items() {
        let labels: Vec<String> = ["TP53", "MDM2", "KRAS", "BRAF"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cfg = EvaluatorConfig {
            failure_policy: FailurePolicy::Abort,
            ..config(2, 2, false)
        };
        let eval = quiet(cfg).with_labels(&labels);
        let err = eval
            .evaluate(4, |i, j| {
                if (i, j) == (1, 2) {
                    Err(CyaneaError::InvalidInput("bad pair".into()))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        match err {
            CyaneaError::Worker { first, second, .. } => {
                assert_eq!(first, "MDM2");
                assert_eq!(second, "KRAS");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn abort_stops_dispatch() {
        let calls = AtomicUsize::new(0);
        let cfg = EvaluatorConfig {
            failure_policy: FailurePolicy::Abort,
            max_in_flight: Some(2),
            ..config(10, 1, false)
        };
        let eval = quiet(cfg);
        let result = eval.evaluate(1_000, |i, _| {
            calls.fetch_add(1, Ordering::Relaxed);
            if i == 0 {
                Err(CyaneaError::Other("fails at once".into()))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        // Far fewer than the 499 500 pairs of the full run.
        assert!(calls.load(Ordering::Relaxed) <= 40);
    }

    #[test]
    fn every_worker_runs_concurrently() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let eval = quiet(EvaluatorConfig {
            max_in_flight: None,
            ..config(1, 4, false)
        });
        eval.evaluate(30, |_, _| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn in_flight_below_workers_fails_before_work() {
        let calls = AtomicUsize::new(0);
        let eval = quiet(EvaluatorConfig {
            max_in_flight: Some(2),
            ..config(1, 4, false)
        });
        let err = eval
            .evaluate(10, |_, _| {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn pre_cancelled_run() {
        let token = CancellationToken::new();
        token.cancel();
        let eval = quiet(config(10, 2, false)).with_cancellation(token);
        assert!(matches!(
            eval.evaluate(10, |i, j| Ok((i, j))),
            Err(CyaneaError::Cancelled)
        ));
    }

    #[test]
    fn cancel_mid_run() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let eval = quiet(config(1, 2, false)).with_cancellation(token);
        let result = eval.evaluate(200, |i, j| {
            if (i, j) == (0, 10) {
                trigger.cancel();
            }
            Ok((i, j))
        });
        assert!(matches!(result, Err(CyaneaError::Cancelled)));
    }

    #[test]
    fn sink_error_aborts() {
        let eval = quiet(config(2, 2, false));
        let result = eval.evaluate_into(
            10,
            |i, j| Ok((i, j)),
            |_| Err(CyaneaError::Other("disk full".into())),
        );
        assert!(result.unwrap_err().to_string().contains("disk full"));
    }

    #[test]
    fn progress_is_monotonic_and_complete() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cfg = EvaluatorConfig {
            progress_interval: 50,
            ..config(7, 3, false)
        };
        let eval = ParallelPairEvaluator::new(cfg).with_observer(Arc::new(FnObserver(
            move |p: Progress| {
                sink.lock().unwrap().push(p.done);
            },
        )));
        eval.evaluate(40, |i, j| Ok((i, j))).unwrap();
        let seen = seen.lock().unwrap();
        assert!(seen.len() >= 2);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 780);
        assert_eq!(eval.progress().snapshot().done, 780);
    }

    #[test]
    fn evaluate_items_passes_values() {
        let eval = quiet(config(4, 2, true));
        let words = ["a", "b", "c"];
        let joined = eval
            .evaluate_items(&words, |a, b| Ok(format!("{a}{b}")))
            .unwrap();
        assert_eq!(joined, vec!["ab", "ac", "bc"]);
    }

    #[test]
    fn invalid_config_fails_before_work() {
        let calls = AtomicUsize::new(0);
        let eval = quiet(config(0, 2, false));
        let err = eval
            .evaluate(10, |_, _| {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn exactly_all_pairs(
            n in 0usize..40,
            chunk in 1usize..20,
            workers in 1usize..5,
            ordered in any::<bool>(),
        ) {
            let cfg = EvaluatorConfig {
                chunk_size: chunk,
                workers,
                ordered,
                failure_policy: FailurePolicy::Skip,
                progress_interval: 1_000,
                max_in_flight: Some(workers + 1),
            };
            let eval = ParallelPairEvaluator::new(cfg)
                .with_observer(Arc::new(crate::progress::SilentProgress));
            let got = eval.evaluate(n, |i, j| Ok((i, j))).unwrap();
            prop_assert_eq!(got.len() as u64, pair_count(n));
            let unique: HashSet<_> = got.iter().copied().collect();
            prop_assert_eq!(unique.len(), got.len());
            if ordered {
                let expected: Vec<_> = Combinations::new(n).collect();
                prop_assert_eq!(got, expected);
            }
        }
    }
}
