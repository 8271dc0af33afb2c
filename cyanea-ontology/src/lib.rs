//! Gene Ontology annotation propagation and semantic similarity.
//!
//! - **Graph**: [`OntologyGraph`], an arena of [`Term`]s with parent and
//!   child adjacency, namespace-restricted via [`NamespaceFilter`]
//! - **Propagation**: [`AnnotationPropagator`] fills every term with the
//!   genes annotated to it or any descendant, then derives size and
//!   information content
//! - **Index**: [`GeneTermIndex`], gene → sorted term list
//! - **Similarity**: [`PairwiseSimilarityEngine`] scores a gene pair by its
//!   most specific shared term
//! - **Coverage**: [`coverage_report`] and [`gene_coverage_stats`] compare
//!   a query gene set against a background
//!
//! # Quick start
//!
//! ```
//! use cyanea_ontology::{
//!     AnnotationPropagator, AnnotationRecord, GeneTermIndex, Namespace, OntologyGraph,
//!     PairwiseSimilarityEngine, Term,
//! };
//!
//! let mut graph = OntologyGraph::new();
//! graph.add_term(Term::new("GO:0008150", "biological_process", Namespace::BiologicalProcess, 0)).unwrap();
//! graph.add_term(Term::new("GO:0006915", "apoptotic process", Namespace::BiologicalProcess, 1)).unwrap();
//! graph.add_edge("GO:0006915", "GO:0008150").unwrap();
//!
//! let annotations = vec![
//!     AnnotationRecord::new("TP53", "GO:0006915", "IDA"),
//!     AnnotationRecord::new("BAX", "GO:0006915", "IMP"),
//!     AnnotationRecord::new("ACTB", "GO:0008150", "TAS"),
//! ];
//! let graph = AnnotationPropagator::new().propagate(annotations, graph).unwrap();
//! let index = GeneTermIndex::build(&graph).unwrap();
//! let engine = PairwiseSimilarityEngine::new(&index, &graph).unwrap();
//!
//! let result = engine.similarity("TP53", "BAX");
//! assert_eq!(result.term_id(), "GO:0006915");
//! assert_eq!(result.similarity, 1.0);
//! ```

pub mod coverage;
pub mod graph;
pub mod index;
pub mod namespace;
pub mod propagate;
pub mod similarity;
pub mod source;
pub mod term;

pub use coverage::{
    coverage_report, coverage_report_in_universe, gene_coverage_stats, CoverageReport,
    GeneCoverageStats, TermCoverage,
};
pub use graph::{OntologyGraph, TermRow};
pub use index::GeneTermIndex;
pub use namespace::{Namespace, NamespaceFilter};
pub use propagate::{AnnotationPropagator, PropagationStats};
pub use similarity::{
    rank_by_specificity, similarity, PairwiseSimilarityEngine, SharedTerm, SimilarityResult,
    TermSizeLookup, NO_SHARED_TERM,
};
pub use source::{AnnotationSource, OntologySource};
pub use term::{AnnotationRecord, EvidenceFilter, GeneIdx, Term};
