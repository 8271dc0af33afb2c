//! End-to-end pipelines.
//!
//! - [`SimilarityJob`]: ontology + annotations → propagation → gene-term
//!   index → all-pairs semantic similarity, streamed into `sem-sim/`.
//! - [`CorrelationJob`]: measurement table → all-pairs correlation → global
//!   FDR pass → `<table>/`.
//!
//! Both validate their configuration before loading anything and leave
//! their output table flagged incomplete when a run fails or is cancelled.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use cyanea_core::{CyaneaError, Result};
use cyanea_io::{write_gene_terms, write_term_table, ShardSummary, ShardedWriter};
use cyanea_omics::{MeasurementMatrix, MeasurementSource};
use cyanea_ontology::{
    AnnotationPropagator, AnnotationSource, GeneTermIndex, OntologyGraph, OntologySource,
    PairwiseSimilarityEngine, PropagationStats, SimilarityResult,
};
use cyanea_pairwise::{
    CancellationToken, EvaluationSummary, ParallelPairEvaluator, ProgressObserver,
};
use cyanea_stats::{CorrelationRecord, IndexedCorrelation};

use crate::config::PipelineConfig;
use crate::correlation::{finalize, CorrelationCounts, CorrelationEvaluator};

/// Output table of [`SimilarityJob`].
pub const SIMILARITY_TABLE: &str = "sem-sim";
/// Term table written by [`SimilarityJob`].
pub const TERM_TABLE_FILE: &str = "ontology.parquet";
/// Gene-term mapping written by [`SimilarityJob`].
pub const GENE_TERMS_FILE: &str = "gene_terms.json";

/// What a finished job did.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct JobSummary {
    /// Items paired (genes).
    pub items: usize,
    pub pairs_total: u64,
    pub pairs_evaluated: u64,
    /// Pairs skipped after a failure.
    pub pairs_failed: u64,
    /// Pairs with a sentinel outcome: no shared term, or an undefined
    /// correlation.
    pub pairs_undefined: u64,
    pub rows_written: u64,
    pub shards: usize,
    pub output: PathBuf,
}

impl JobSummary {
    fn new(items: usize, eval: &EvaluationSummary, undefined: u64, out: &ShardSummary) -> Self {
        Self {
            items,
            pairs_total: eval.pairs_total,
            pairs_evaluated: eval.pairs_evaluated,
            pairs_failed: eval.pairs_failed,
            pairs_undefined: undefined,
            rows_written: out.rows,
            shards: out.shards,
            output: out.dir.clone(),
        }
    }
}

fn evaluator<'a>(
    config: cyanea_pairwise::EvaluatorConfig,
    cancel: &CancellationToken,
    observer: &Option<Arc<dyn ProgressObserver>>,
    labels: &'a [String],
) -> ParallelPairEvaluator<'a> {
    let eval = ParallelPairEvaluator::new(config)
        .with_cancellation(cancel.clone())
        .with_labels(labels);
    match observer {
        Some(obs) => eval.with_observer(Arc::clone(obs)),
        None => eval,
    }
}

fn create_output_dir(config: &PipelineConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir).map_err(|e| {
        CyaneaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", config.output_dir.display(), e),
        ))
    })
}

// ── Similarity ─────────────────────────────────────────────────────────────

/// A propagated ontology and its gene-term index.
#[derive(Debug)]
pub struct PreparedOntology {
    pub graph: OntologyGraph,
    pub index: GeneTermIndex,
    pub stats: PropagationStats,
}

/// All-pairs semantic similarity over the genes of an annotated ontology.
pub struct SimilarityJob<'a> {
    config: &'a PipelineConfig,
    cancel: CancellationToken,
    observer: Option<Arc<dyn ProgressObserver>>,
    universe: Option<Vec<String>>,
}

impl<'a> SimilarityJob<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            observer: None,
            universe: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Only propagate annotations of these genes (e.g. the genes screened).
    pub fn with_universe<I, S>(mut self, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.universe = Some(genes.into_iter().map(Into::into).collect());
        self
    }

    /// Load, filter and propagate, then index.
    pub fn prepare<O, A>(&self, ontology: &O, annotations: &A) -> Result<PreparedOntology>
    where
        O: OntologySource + ?Sized,
        A: AnnotationSource + ?Sized,
    {
        let filter = self.config.namespace_filter()?;
        let graph = ontology.load_ontology(filter)?;
        if graph.is_empty() {
            return Err(CyaneaError::Configuration(format!(
                "ontology has no terms in namespace filter '{filter}'"
            )));
        }
        let records = annotations.load_annotations(filter, &self.config.evidence_filter())?;

        let propagator = match &self.universe {
            Some(genes) => AnnotationPropagator::with_universe(genes.iter().cloned()),
            None => AnnotationPropagator::new(),
        };
        let (graph, stats) = propagator.propagate_with_stats(records, graph)?;
        let index = GeneTermIndex::build(&graph)?;
        info!(
            namespace = %filter,
            terms = graph.len(),
            genes = index.len(),
            applied = stats.applied,
            unknown_term = stats.unknown_term,
            "ontology prepared"
        );
        Ok(PreparedOntology {
            graph,
            index,
            stats,
        })
    }

    /// Run the whole pipeline: prepare, export the ontology, then score
    /// every gene pair.
    pub fn run<O, A>(&self, ontology: &O, annotations: &A) -> Result<JobSummary>
    where
        O: OntologySource + ?Sized,
        A: AnnotationSource + ?Sized,
    {
        self.config.validate()?;
        let prepared = self.prepare(ontology, annotations)?;
        create_output_dir(self.config)?;
        // Claims `sem-sim/` first so a finished run is never half overwritten.
        let writer = self.similarity_writer()?;
        let exported = write_term_table(&prepared.graph, self.config.output_path(TERM_TABLE_FILE))
            .and_then(|_| {
                write_gene_terms(&prepared.index, self.config.output_path(GENE_TERMS_FILE))
            });
        if let Err(e) = exported {
            writer.abort();
            return Err(e);
        }
        self.score_into(&prepared, writer)
    }

    fn similarity_writer(&self) -> Result<ShardedWriter<SimilarityResult>> {
        ShardedWriter::create(
            self.config.output_path(SIMILARITY_TABLE),
            self.config.rows_per_shard,
        )
    }

    /// Score every pair of indexed genes into the sharded similarity table.
    pub fn run_prepared(&self, prepared: &PreparedOntology) -> Result<JobSummary> {
        let writer = self.similarity_writer()?;
        self.score_into(prepared, writer)
    }

    fn score_into(
        &self,
        prepared: &PreparedOntology,
        mut writer: ShardedWriter<SimilarityResult>,
    ) -> Result<JobSummary> {
        let index = &prepared.index;
        let engine = match PairwiseSimilarityEngine::new(index, &prepared.graph) {
            Ok(engine) => engine,
            Err(e) => {
                writer.abort();
                return Err(e);
            }
        };
        let eval = evaluator(
            self.config.similarity.clone(),
            &self.cancel,
            &self.observer,
            index.genes(),
        );

        let mut unrelated = 0u64;
        let outcome = eval.evaluate_into(
            index.len(),
            |i, j| Ok(engine.similarity_at(i, j)),
            |batch| {
                unrelated += batch.iter().filter(|r| !r.has_shared_term()).count() as u64;
                writer.extend(batch)
            },
        );

        match outcome {
            Ok(summary) => {
                let out = writer.finish()?;
                Ok(JobSummary::new(index.len(), &summary, unrelated, &out))
            }
            Err(e) => {
                writer.abort();
                Err(e)
            }
        }
    }
}

// ── Correlation ────────────────────────────────────────────────────────────

/// All-pairs correlation over the genes of one measurement table.
///
/// The FDR adjustment ranks every p-value of the run, so results are
/// collected in memory, keyed by row, and written with gene names only
/// after the last pair.
pub struct CorrelationJob<'a> {
    config: &'a PipelineConfig,
    table: String,
    cancel: CancellationToken,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl<'a> CorrelationJob<'a> {
    /// A job writing to `output_dir/table`, e.g. `exp_corr`.
    pub fn new(config: &'a PipelineConfig, table: impl Into<String>) -> Self {
        Self {
            config,
            table: table.into(),
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Load the table from `source` and run.
    pub fn run<S>(&self, source: &S) -> Result<JobSummary>
    where
        S: MeasurementSource + ?Sized,
    {
        self.config.validate()?;
        let matrix = source.load_measurements()?;
        self.run_matrix(&matrix)
    }

    /// Correlate every pair of rows of `matrix`.
    pub fn run_matrix(&self, matrix: &MeasurementMatrix) -> Result<JobSummary> {
        self.config.validate()?;
        let correlator = CorrelationEvaluator::new(matrix);
        let eval = evaluator(
            self.config.correlation.clone(),
            &self.cancel,
            &self.observer,
            matrix.gene_names(),
        );

        let mut results: Vec<IndexedCorrelation> = Vec::new();
        let summary = eval.evaluate_into(
            matrix.n_genes(),
            |i, j| correlator.correlate_indexed(i, j),
            |batch| {
                results.extend(batch);
                Ok(())
            },
        )?;

        let family = finalize(&mut results)?;
        let counts = CorrelationCounts::tally(results.iter().map(|r| &r.correlation));
        info!(
            table = %self.table,
            family,
            insufficient_data = counts.insufficient_data,
            constant_input = counts.constant_input,
            "FDR correction applied"
        );

        create_output_dir(self.config)?;
        let mut writer = ShardedWriter::<CorrelationRecord>::create(
            self.config.output_path(&self.table),
            self.config.rows_per_shard,
        )?;
        // Names are attached one shard at a time, never for the whole scan.
        let names = matrix.gene_names();
        let written = results
            .into_iter()
            .try_for_each(|r| writer.push(r.into_record(names)?));
        if let Err(e) = written {
            writer.abort();
            return Err(e);
        }
        let out = writer.finish()?;
        Ok(JobSummary::new(
            matrix.n_genes(),
            &summary,
            counts.insufficient_data + counts.constant_input,
            &out,
        ))
    }
}
