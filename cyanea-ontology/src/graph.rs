//! The ontology DAG.
//!
//! [`OntologyGraph`] is an arena of [`Term`]s addressed by index, with two
//! adjacency lists: `parents` (descendant → ancestor edges, the direction
//! annotations travel) and `children`. Genes live in a separate table and
//! terms refer to them by index, so annotation sets stay compact.

use std::collections::{BTreeMap, HashMap};

use cyanea_core::{CyaneaError, Result, Summarizable};

use crate::namespace::{Namespace, NamespaceFilter};
use crate::term::{GeneIdx, Term};

/// A directed acyclic graph of GO terms.
#[derive(Debug, Clone, Default)]
pub struct OntologyGraph {
    pub(crate) terms: Vec<Term>,
    pub(crate) term_index: HashMap<String, usize>,
    pub(crate) parents: Vec<Vec<usize>>,
    pub(crate) children: Vec<Vec<usize>>,
    pub(crate) genes: Vec<String>,
    pub(crate) gene_index: HashMap<String, GeneIdx>,
    pub(crate) propagated: bool,
}

/// One row of the exported term table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermRow {
    pub term_id: String,
    pub name: String,
    pub namespace: Namespace,
    pub depth: u32,
    /// Annotated gene symbols, sorted.
    pub annots: Vec<String>,
    pub size: usize,
    pub information_content: f64,
}

impl OntologyGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term and return its arena index.
    ///
    /// # Errors
    ///
    /// Returns an error if a term with the same id already exists.
    pub fn add_term(&mut self, term: Term) -> Result<usize> {
        if self.term_index.contains_key(term.id()) {
            return Err(CyaneaError::InvalidInput(format!(
                "duplicate term id: {}",
                term.id()
            )));
        }
        let idx = self.terms.len();
        self.term_index.insert(term.id().to_string(), idx);
        self.terms.push(term);
        self.parents.push(Vec::new());
        self.children.push(Vec::new());
        Ok(idx)
    }

    /// Add an `is_a` / `part_of` edge from `child` to `parent`.
    ///
    /// Repeated edges are ignored. A self-loop can never be part of a DAG and
    /// is rejected as a configuration error; longer cycles are detected when
    /// the graph is propagated.
    pub fn add_edge(&mut self, child: &str, parent: &str) -> Result<()> {
        let c = self.require(child)?;
        let p = self.require(parent)?;
        if c == p {
            return Err(CyaneaError::Configuration(format!(
                "term {child} lists itself as a parent"
            )));
        }
        if !self.parents[c].contains(&p) {
            self.parents[c].push(p);
            self.children[p].push(c);
        }
        Ok(())
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.term_index
            .get(id)
            .copied()
            .ok_or_else(|| CyaneaError::InvalidInput(format!("unknown term id: {id}")))
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the graph has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of edges.
    pub fn n_edges(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    /// Look up a term by id.
    pub fn term(&self, id: &str) -> Option<&Term> {
        self.term_index.get(id).map(|&i| &self.terms[i])
    }

    /// Arena index of a term.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.term_index.get(id).copied()
    }

    /// Term at an arena index.
    pub fn term_at(&self, idx: usize) -> Option<&Term> {
        self.terms.get(idx)
    }

    /// All terms in insertion order.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    /// Direct parents of a term.
    pub fn parents_of(&self, id: &str) -> impl Iterator<Item = &Term> {
        self.adjacent(id, &self.parents)
    }

    /// Direct children of a term.
    pub fn children_of(&self, id: &str) -> impl Iterator<Item = &Term> {
        self.adjacent(id, &self.children)
    }

    fn adjacent<'a>(
        &'a self,
        id: &str,
        adjacency: &'a [Vec<usize>],
    ) -> impl Iterator<Item = &'a Term> + 'a {
        let neighbours: &[usize] = match self.term_index.get(id) {
            Some(&i) => &adjacency[i],
            None => &[],
        };
        neighbours.iter().map(move |&j| &self.terms[j])
    }

    /// Terms with no parents: one per namespace in a well-formed ontology.
    pub fn roots(&self) -> Vec<&Term> {
        self.root_indices().into_iter().map(|i| &self.terms[i]).collect()
    }

    pub(crate) fn root_indices(&self) -> Vec<usize> {
        (0..self.terms.len())
            .filter(|&i| self.parents[i].is_empty())
            .collect()
    }

    /// The unique root of each namespace present in the graph.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the graph is empty or if any
    /// namespace has more than one parentless term: normalizing by "the"
    /// root would then be ambiguous.
    pub fn namespace_roots(&self) -> Result<BTreeMap<Namespace, usize>> {
        if self.terms.is_empty() {
            return Err(CyaneaError::Configuration("ontology has no terms".into()));
        }
        let mut by_ns: BTreeMap<Namespace, Vec<usize>> = BTreeMap::new();
        for i in self.root_indices() {
            by_ns.entry(self.terms[i].namespace()).or_default().push(i);
        }
        let mut roots = BTreeMap::new();
        for (ns, candidates) in by_ns {
            if candidates.len() > 1 {
                let ids: Vec<&str> = candidates.iter().map(|&i| self.terms[i].id()).collect();
                return Err(CyaneaError::Configuration(format!(
                    "ambiguous ontology: namespace {ns} has {} root terms ({})",
                    ids.len(),
                    ids.join(", ")
                )));
            }
            roots.insert(ns, candidates[0]);
        }
        Ok(roots)
    }

    /// Whether annotations have been propagated into this graph.
    pub fn is_propagated(&self) -> bool {
        self.propagated
    }

    // ── Gene table ─────────────────────────────────────────────────────────

    /// Number of distinct genes seen by propagation.
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    /// Gene symbol for a gene index.
    pub fn gene_name(&self, idx: GeneIdx) -> Option<&str> {
        self.genes.get(idx).map(String::as_str)
    }

    /// Gene index for a symbol.
    pub fn gene_idx(&self, gene: &str) -> Option<GeneIdx> {
        self.gene_index.get(gene).copied()
    }

    pub(crate) fn intern_gene(&mut self, gene: &str) -> GeneIdx {
        if let Some(&idx) = self.gene_index.get(gene) {
            return idx;
        }
        let idx = self.genes.len();
        self.genes.push(gene.to_string());
        self.gene_index.insert(gene.to_string(), idx);
        idx
    }

    /// Sorted gene symbols annotated to a term.
    pub fn annotated_genes(&self, id: &str) -> Vec<&str> {
        let mut names: Vec<&str> = match self.term(id) {
            Some(t) => t.genes().iter().map(|&g| self.genes[g].as_str()).collect(),
            None => Vec::new(),
        };
        names.sort_unstable();
        names
    }

    // ── Sub-ontologies ─────────────────────────────────────────────────────

    /// The sub-ontology of terms for which `keep` returns true.
    ///
    /// Edges between kept terms survive; term annotation state and the gene
    /// table are carried over unchanged.
    pub fn subgraph<F>(&self, keep: F) -> OntologyGraph
    where
        F: Fn(&Term) -> bool,
    {
        let mut remap = vec![None; self.terms.len()];
        let mut out = OntologyGraph {
            genes: self.genes.clone(),
            gene_index: self.gene_index.clone(),
            propagated: self.propagated,
            ..OntologyGraph::default()
        };
        for (i, term) in self.terms.iter().enumerate() {
            if keep(term) {
                let j = out.terms.len();
                out.term_index.insert(term.id().to_string(), j);
                out.terms.push(term.clone());
                out.parents.push(Vec::new());
                out.children.push(Vec::new());
                remap[i] = Some(j);
            }
        }
        for (i, parents) in self.parents.iter().enumerate() {
            let Some(c) = remap[i] else { continue };
            for &p in parents {
                if let Some(p) = remap[p] {
                    out.parents[c].push(p);
                    out.children[p].push(c);
                }
            }
        }
        out
    }

    /// Keep only terms of the namespaces accepted by `filter`.
    pub fn restrict_namespace(&self, filter: NamespaceFilter) -> OntologyGraph {
        self.subgraph(|t| filter.matches(t.namespace()))
    }

    /// Keep only terms with at least one annotated gene (the background
    /// sub-ontology of a propagated graph).
    pub fn annotated_subgraph(&self) -> OntologyGraph {
        self.subgraph(|t| !t.genes().is_empty())
    }

    /// Keep only terms whose depth is listed in `depths`.
    pub fn filter_by_depth(&self, depths: &[u32]) -> OntologyGraph {
        self.subgraph(|t| depths.contains(&t.depth()))
    }

    // ── Export ─────────────────────────────────────────────────────────────

    /// One row per term with `size > 0`, in insertion order.
    ///
    /// Unannotated terms stay in the graph (they can be structural
    /// ancestors) but are not exported.
    pub fn export_rows(&self) -> Vec<TermRow> {
        self.terms
            .iter()
            .filter(|t| t.size() > 0)
            .map(|t| {
                let mut annots: Vec<String> =
                    t.genes().iter().map(|&g| self.genes[g].clone()).collect();
                annots.sort_unstable();
                TermRow {
                    term_id: t.id().to_string(),
                    name: t.name().to_string(),
                    namespace: t.namespace(),
                    depth: t.depth(),
                    annots,
                    size: t.size(),
                    information_content: t.information_content(),
                }
            })
            .collect()
    }
}

impl Summarizable for OntologyGraph {
    fn summary(&self) -> String {
        format!(
            "OntologyGraph: {} terms, {} edges, {} genes",
            self.len(),
            self.n_edges(),
            self.n_genes()
        )
    }
}
