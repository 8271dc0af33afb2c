//! Gene → term lookup built from a propagated ontology.
//!
//! [`GeneTermIndex`] is built once and only read afterwards; every pairwise
//! worker borrows the same instance. Term ids are interned into a sorted
//! table, so each gene's term list is a sorted `u32` slice whose order is
//! also lexicographic term-id order, and two genes' shared terms are found
//! with a linear merge.

use std::collections::{BTreeMap, HashMap};

use cyanea_core::{CyaneaError, Result, Summarizable};
use tracing::debug;

use crate::graph::OntologyGraph;

/// Read-only mapping gene → terms it is transitively annotated to.
#[derive(Debug, Clone, Default)]
pub struct GeneTermIndex {
    genes: Vec<String>,
    gene_lookup: HashMap<String, usize>,
    term_ids: Vec<String>,
    entries: Vec<Vec<u32>>,
}

impl GeneTermIndex {
    /// Build the index from a propagated graph. Only terms with `size > 0`
    /// contribute; genes are listed in sorted order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the graph has not been propagated.
    pub fn build(graph: &OntologyGraph) -> Result<Self> {
        if !graph.is_propagated() {
            return Err(CyaneaError::Configuration(
                "gene-term index requires a propagated ontology".into(),
            ));
        }

        let mut annotated: Vec<usize> = (0..graph.len())
            .filter(|&i| graph.terms[i].size() > 0)
            .collect();
        annotated.sort_unstable_by(|&a, &b| graph.terms[a].id().cmp(graph.terms[b].id()));
        let term_ids: Vec<String> = annotated
            .iter()
            .map(|&i| graph.terms[i].id().to_string())
            .collect();

        let mut per_gene: Vec<Vec<u32>> = vec![Vec::new(); graph.n_genes()];
        for (slot, &t) in annotated.iter().enumerate() {
            for &g in graph.terms[t].genes() {
                per_gene[g].push(slot as u32);
            }
        }

        let mut order: Vec<usize> = (0..graph.n_genes())
            .filter(|&g| !per_gene[g].is_empty())
            .collect();
        order.sort_unstable_by(|&a, &b| graph.genes[a].cmp(&graph.genes[b]));

        let genes: Vec<String> = order.iter().map(|&g| graph.genes[g].clone()).collect();
        let mut entries: Vec<Vec<u32>> = order
            .iter()
            .map(|&g| std::mem::take(&mut per_gene[g]))
            .collect();
        sort_entries(&mut entries);

        let gene_lookup = genes
            .iter()
            .enumerate()
            .map(|(i, g)| (g.clone(), i))
            .collect();

        debug!(genes = genes.len(), terms = term_ids.len(), "built gene-term index");
        Ok(Self {
            genes,
            gene_lookup,
            term_ids,
            entries,
        })
    }

    /// Build directly from a gene → term-id mapping (e.g. a previously
    /// exported `gene_terms.json`). A gene listed more than once gets the
    /// union of its term lists.
    pub fn from_mapping<I, G, T>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (G, Vec<T>)>,
        G: Into<String>,
        T: Into<String>,
    {
        let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (gene, terms) in mapping {
            merged
                .entry(gene.into())
                .or_default()
                .extend(terms.into_iter().map(Into::into));
        }
        let raw: Vec<(String, Vec<String>)> = merged
            .into_iter()
            .filter(|(_, ts)| !ts.is_empty())
            .collect();

        let mut term_ids: Vec<String> = raw.iter().flat_map(|(_, ts)| ts.iter().cloned()).collect();
        term_ids.sort_unstable();
        term_ids.dedup();
        let slot: HashMap<&str, u32> = term_ids
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i as u32))
            .collect();

        let mut entries: Vec<Vec<u32>> = raw
            .iter()
            .map(|(_, ts)| ts.iter().map(|t| slot[t.as_str()]).collect())
            .collect();
        sort_entries(&mut entries);
        for e in &mut entries {
            e.dedup();
        }

        let genes: Vec<String> = raw.into_iter().map(|(g, _)| g).collect();
        let gene_lookup = genes
            .iter()
            .enumerate()
            .map(|(i, g)| (g.clone(), i))
            .collect();
        Self {
            genes,
            gene_lookup,
            term_ids,
            entries,
        }
    }

    /// Indexed genes, sorted.
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Number of indexed genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Position of a gene in [`genes`](Self::genes).
    pub fn gene_position(&self, gene: &str) -> Option<usize> {
        self.gene_lookup.get(gene).copied()
    }

    /// Distinct terms referenced by the index, sorted.
    pub fn term_ids(&self) -> &[String] {
        &self.term_ids
    }

    /// Terms of a gene in lexicographic order. Empty for unknown genes.
    pub fn terms(&self, gene: &str) -> impl Iterator<Item = &str> + '_ {
        let slots: &[u32] = match self.gene_position(gene) {
            Some(i) => &self.entries[i],
            None => &[],
        };
        slots.iter().map(move |&s| self.term_ids[s as usize].as_str())
    }

    /// Term slots of the gene at `position`, sorted.
    pub(crate) fn slots_at(&self, position: usize) -> &[u32] {
        self.entries.get(position).map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn slots(&self, gene: &str) -> &[u32] {
        self.gene_position(gene)
            .map_or(&[][..], |i| self.entries[i].as_slice())
    }

    pub(crate) fn term_id(&self, slot: u32) -> &str {
        &self.term_ids[slot as usize]
    }

    /// The gene → terms mapping, in gene order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec<&str>)> + '_ {
        self.genes.iter().zip(&self.entries).map(move |(g, slots)| {
            (
                g.as_str(),
                slots.iter().map(|&s| self.term_ids[s as usize].as_str()).collect(),
            )
        })
    }
}

impl Summarizable for GeneTermIndex {
    fn summary(&self) -> String {
        let links: usize = self.entries.iter().map(Vec::len).sum();
        format!(
            "GeneTermIndex: {} genes, {} terms, {} links",
            self.genes.len(),
            self.term_ids.len(),
            links
        )
    }
}

#[cfg(feature = "parallel")]
fn sort_entries(entries: &mut [Vec<u32>]) {
    use rayon::prelude::*;
    entries.par_iter_mut().for_each(|e| e.sort_unstable());
}

#[cfg(not(feature = "parallel"))]
fn sort_entries(entries: &mut [Vec<u32>]) {
    for e in entries.iter_mut() {
        e.sort_unstable();
    }
}

/// Merge-intersect two sorted slot lists.
pub(crate) fn shared_slots<'a>(a: &'a [u32], b: &'a [u32]) -> impl Iterator<Item = u32> + 'a {
    let (mut i, mut j) = (0, 0);
    std::iter::from_fn(move || {
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    let s = a[i];
                    i += 1;
                    j += 1;
                    return Some(s);
                }
            }
        }
        None
    })
}
