//! Gene-pair pipelines over DepMap-style screens.
//!
//! - **Configuration**: [`PipelineConfig`], JSON-loadable and validated
//!   before any input is read
//! - **Semantic similarity**: [`SimilarityJob`] runs GO propagation, gene-term
//!   index and all-pairs similarity into a sharded Parquet table
//! - **Correlation**: [`CorrelationJob`] over a [`MeasurementMatrix`]
//!   with a global Benjamini-Hochberg pass; [`CorrelationEvaluator`] as the
//!   pair function
//! - **Enrichment**: best-effort pathway lookup per gene cluster
//!   ([`enrich_clusters`], [`ReactomeLookup`])
//!
//! Libraries here only emit `tracing` events; installing a subscriber is
//! up to the binary.
//!
//! [`MeasurementMatrix`]: cyanea_omics::MeasurementMatrix

pub mod config;
pub mod correlation;
pub mod enrichment;
pub mod pipeline;

pub use config::PipelineConfig;
pub use correlation::{correlate, finalize, CorrelationCounts, CorrelationEvaluator};
pub use enrichment::{
    enrich_cluster, enrich_clusters, group_clusters, ClusterEnrichment, PathwayHit, PathwayLookup,
    ReactomeLookup, NO_PATHWAY,
};
pub use pipeline::{
    CorrelationJob, JobSummary, PreparedOntology, SimilarityJob, GENE_TERMS_FILE,
    SIMILARITY_TABLE, TERM_TABLE_FILE,
};
