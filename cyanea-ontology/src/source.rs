//! Loader interfaces for ontology and annotation inputs.
//!
//! Parsing OBO and GAF files is left to implementors; the pipeline only
//! needs a graph already restricted to the requested namespaces and a
//! filtered stream of annotation records. In-memory implementations are
//! provided for graphs and record lists built elsewhere.

use cyanea_core::Result;

use crate::graph::OntologyGraph;
use crate::namespace::NamespaceFilter;
use crate::term::{AnnotationRecord, EvidenceFilter};

/// Produces the ontology DAG.
pub trait OntologySource {
    /// Load the terms (and edges between them) of the namespaces accepted
    /// by `filter`.
    fn load_ontology(&self, filter: NamespaceFilter) -> Result<OntologyGraph>;
}

/// Produces raw gene → term annotations.
pub trait AnnotationSource {
    /// Load annotations of the namespaces accepted by `filter` that pass
    /// `evidence`.
    fn load_annotations(
        &self,
        filter: NamespaceFilter,
        evidence: &EvidenceFilter,
    ) -> Result<Vec<AnnotationRecord>>;
}

impl OntologySource for OntologyGraph {
    fn load_ontology(&self, filter: NamespaceFilter) -> Result<OntologyGraph> {
        Ok(self.restrict_namespace(filter))
    }
}

/// Records without a namespace pass any namespace filter; they are dropped
/// later if their term is not in the loaded graph.
impl AnnotationSource for [AnnotationRecord] {
    fn load_annotations(
        &self,
        filter: NamespaceFilter,
        evidence: &EvidenceFilter,
    ) -> Result<Vec<AnnotationRecord>> {
        Ok(self
            .iter()
            .filter(|r| r.namespace.map_or(true, |ns| filter.matches(ns)))
            .filter(|r| evidence.allows(r))
            .cloned()
            .collect())
    }
}

impl AnnotationSource for Vec<AnnotationRecord> {
    fn load_annotations(
        &self,
        filter: NamespaceFilter,
        evidence: &EvidenceFilter,
    ) -> Result<Vec<AnnotationRecord>> {
        self.as_slice().load_annotations(filter, evidence)
    }
}
