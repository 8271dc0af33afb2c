//! Annotation propagation.
//!
//! Every gene annotated to a term is also annotated to all of that term's
//! ancestors. [`AnnotationPropagator`] walks the DAG once in topological
//! order from the leaves upward (Kahn's algorithm over child counts), so a
//! term is finalized only after every descendant is: its set is its own
//! direct annotations united with the already-final sets of its children.
//! `size` and `information_content` are then derived in a second pass.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use cyanea_core::{CyaneaError, Result};
use tracing::{debug, info};

use crate::graph::OntologyGraph;
use crate::namespace::Namespace;
use crate::term::{AnnotationRecord, GeneIdx};

/// What a propagation run did, for logging and job summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Annotation records applied to a term.
    pub applied: usize,
    /// Records naming a term absent from the graph (obsolete ids or other
    /// namespaces).
    pub unknown_term: usize,
    /// Records for genes outside the universe.
    pub outside_universe: usize,
    /// Distinct genes annotated somewhere.
    pub genes: usize,
}

/// Fills every term's annotated-gene set from raw annotations.
#[derive(Debug, Clone, Default)]
pub struct AnnotationPropagator {
    universe: Option<HashSet<String>>,
}

impl AnnotationPropagator {
    /// Propagate every gene that appears in the annotations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only propagate genes from `genes` (the background of a screen);
    /// annotations for any other gene are ignored.
    pub fn with_universe<I, S>(genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            universe: Some(genes.into_iter().map(Into::into).collect()),
        }
    }

    /// Propagate `annotations` through `graph` and compute derived metrics.
    ///
    /// Any previous annotation state in the graph is replaced.
    ///
    /// # Errors
    ///
    /// Configuration errors, all raised before the graph is returned:
    /// the graph contains a cycle, a namespace has more than one root, or
    /// a root ends up with no annotated genes.
    pub fn propagate<I>(&self, annotations: I, graph: OntologyGraph) -> Result<OntologyGraph>
    where
        I: IntoIterator<Item = AnnotationRecord>,
    {
        self.propagate_with_stats(annotations, graph)
            .map(|(graph, _)| graph)
    }

    /// [`propagate`](Self::propagate), also returning what was applied.
    pub fn propagate_with_stats<I>(
        &self,
        annotations: I,
        mut graph: OntologyGraph,
    ) -> Result<(OntologyGraph, PropagationStats)>
    where
        I: IntoIterator<Item = AnnotationRecord>,
    {
        for term in &mut graph.terms {
            term.direct.clear();
            term.genes.clear();
        }
        graph.genes.clear();
        graph.gene_index.clear();

        let mut stats = PropagationStats::default();
        for record in annotations {
            if let Some(universe) = &self.universe {
                if !universe.contains(&record.gene) {
                    stats.outside_universe += 1;
                    continue;
                }
            }
            let Some(t) = graph.index_of(&record.term) else {
                debug!(gene = %record.gene, term = %record.term, "annotation to unknown term dropped");
                stats.unknown_term += 1;
                continue;
            };
            let g = graph.intern_gene(&record.gene);
            graph.terms[t].direct.insert(g);
            stats.applied += 1;
        }
        stats.genes = graph.n_genes();

        let order = topological_order(&graph)?;
        for &t in &order {
            let mut genes: BTreeSet<GeneIdx> = graph.terms[t].direct.clone();
            for &c in &graph.children[t] {
                genes.extend(graph.terms[c].genes.iter().copied());
            }
            graph.terms[t].genes = genes;
        }

        compute_metrics(&mut graph)?;
        graph.propagated = true;

        info!(
            terms = graph.len(),
            edges = graph.n_edges(),
            genes = stats.genes,
            applied = stats.applied,
            unknown_term = stats.unknown_term,
            "propagated annotations"
        );
        Ok((graph, stats))
    }
}

/// Term indices ordered leaves first: every term comes after all of its
/// children.
fn topological_order(graph: &OntologyGraph) -> Result<Vec<usize>> {
    let n = graph.len();
    let mut pending: Vec<usize> = graph.children.iter().map(Vec::len).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(t) = queue.pop_front() {
        order.push(t);
        for &p in &graph.parents[t] {
            pending[p] -= 1;
            if pending[p] == 0 {
                queue.push_back(p);
            }
        }
    }

    if order.len() < n {
        let stuck: Vec<&str> = (0..n)
            .filter(|&i| pending[i] > 0)
            .take(5)
            .map(|i| graph.terms[i].id())
            .collect();
        return Err(CyaneaError::Configuration(format!(
            "ontology is not acyclic: {} terms lie on or above a cycle (e.g. {})",
            n - order.len(),
            stuck.join(", ")
        )));
    }
    Ok(order)
}

/// Derive `size` and `information_content` from the final gene sets.
fn compute_metrics(graph: &mut OntologyGraph) -> Result<()> {
    let mut root_sizes: BTreeMap<Namespace, usize> = BTreeMap::new();
    for (ns, root) in graph.namespace_roots()? {
        let root_term = &graph.terms[root];
        let size = root_term.genes.len();
        if size == 0 {
            return Err(CyaneaError::Configuration(format!(
                "root term {} of {ns} has no annotated genes; information content is undefined",
                root_term.id()
            )));
        }
        debug!(namespace = %ns, root = root_term.id(), size, "namespace root");
        root_sizes.insert(ns, size);
    }

    for term in &mut graph.terms {
        term.size = term.genes.len();
        // Every namespace present in the graph has a root, and roots are
        // never empty at this point.
        let root_size = root_sizes.get(&term.namespace()).copied().unwrap_or(1);
        term.information_content = term.size as f64 / root_size as f64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn bp(id: &str, depth: u32) -> Term {
        Term::new(id, id, Namespace::BiologicalProcess, depth)
    }

    fn ann(gene: &str, term: &str) -> AnnotationRecord {
        AnnotationRecord::new(gene, term, "IDA")
    }

    /// root <- a <- b, root <- c
    fn chain() -> OntologyGraph {
        let mut g = OntologyGraph::new();
        g.add_term(bp("root", 0)).unwrap();
        g.add_term(bp("a", 1)).unwrap();
        g.add_term(bp("b", 2)).unwrap();
        g.add_term(bp("c", 1)).unwrap();
        g.add_edge("a", "root").unwrap();
        g.add_edge("b", "a").unwrap();
        g.add_edge("c", "root").unwrap();
        g
    }

    #[test]
    fn annotations_flow_to_ancestors() {
        let g = AnnotationPropagator::new()
            .propagate(vec![ann("g1", "b"), ann("g2", "a"), ann("g3", "c")], chain())
            .unwrap();
        assert_eq!(g.annotated_genes("b"), vec!["g1"]);
        assert_eq!(g.annotated_genes("a"), vec!["g1", "g2"]);
        assert_eq!(g.annotated_genes("root"), vec!["g1", "g2", "g3"]);
        assert_eq!(g.term("root").unwrap().size(), 3);
        assert!(g.is_propagated());
    }

    #[test]
    fn information_content_normalized_by_root() {
        let g = AnnotationPropagator::new()
            .propagate(vec![ann("g1", "b"), ann("g2", "a"), ann("g3", "c")], chain())
            .unwrap();
        assert_eq!(g.term("root").unwrap().information_content(), 1.0);
        assert!((g.term("a").unwrap().information_content() - 2.0 / 3.0).abs() < 1e-12);
        assert!((g.term("b").unwrap().information_content() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn diamond_counts_gene_once() {
        let mut g = chain();
        g.add_edge("b", "c").unwrap();
        let g = AnnotationPropagator::new()
            .propagate(vec![ann("g1", "b")], g)
            .unwrap();
        assert_eq!(g.term("root").unwrap().size(), 1);
        assert_eq!(g.term("c").unwrap().size(), 1);
    }

    #[test]
    fn unknown_terms_are_dropped() {
        let (g, stats) = AnnotationPropagator::new()
            .propagate_with_stats(vec![ann("g1", "b"), ann("g2", "GO:obsolete")], chain())
            .unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.unknown_term, 1);
        assert_eq!(g.n_genes(), 1);
    }

    #[test]
    fn universe_restricts_genes() {
        let (g, stats) = AnnotationPropagator::with_universe(["g1"])
            .propagate_with_stats(vec![ann("g1", "b"), ann("g2", "a")], chain())
            .unwrap();
        assert_eq!(stats.outside_universe, 1);
        assert_eq!(g.annotated_genes("root"), vec!["g1"]);
    }

    #[test]
    fn cycle_is_configuration_error() {
        let mut g = chain();
        g.add_edge("a", "b").unwrap();
        let err = AnnotationPropagator::new()
            .propagate(vec![ann("g1", "b")], g)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("not acyclic"));
    }

    #[test]
    fn multiple_roots_is_configuration_error() {
        let mut g = chain();
        g.add_term(bp("other_root", 0)).unwrap();
        let err = AnnotationPropagator::new()
            .propagate(vec![ann("g1", "b"), ann("g2", "other_root")], g)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn unannotated_root_is_configuration_error() {
        let err = AnnotationPropagator::new()
            .propagate(Vec::new(), chain())
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn unannotated_terms_are_kept_but_not_exported() {
        let g = AnnotationPropagator::new()
            .propagate(vec![ann("g1", "b")], chain())
            .unwrap();
        assert_eq!(g.len(), 4);
        assert_eq!(g.term("c").unwrap().size(), 0);
        let ids: Vec<String> = g.export_rows().into_iter().map(|r| r.term_id).collect();
        assert_eq!(ids, vec!["root", "a", "b"]);
    }

    #[test]
    fn repropagation_replaces_state() {
        let g = AnnotationPropagator::new()
            .propagate(vec![ann("g1", "b"), ann("g2", "c")], chain())
            .unwrap();
        let g = AnnotationPropagator::new()
            .propagate(vec![ann("g3", "c")], g)
            .unwrap();
        assert_eq!(g.annotated_genes("root"), vec!["g3"]);
        assert_eq!(g.term("b").unwrap().size(), 0);
    }
}
