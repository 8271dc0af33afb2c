//! Pairwise semantic similarity.
//!
//! Two genes are as similar as the most specific term they share: the
//! shared term with the fewest annotated genes wins (ties go to the
//! lexicographically smallest id) and the score is `2 / size`. Genes with no
//! shared term score 0 with a sentinel term that ranks as least specific.

use std::cmp::Ordering;

use cyanea_core::{CyaneaError, Result, Scored, Summarizable};

use crate::graph::OntologyGraph;
use crate::index::{shared_slots, GeneTermIndex};

/// Term id, and term name, reported when two genes share no term.
pub const NO_SHARED_TERM: &str = "None";

// ── Term lookup ────────────────────────────────────────────────────────────

/// Per-term size and name, as needed to score shared terms.
pub trait TermSizeLookup {
    /// Number of genes annotated to the term.
    fn term_size(&self, term_id: &str) -> Option<usize>;

    /// Human-readable name of the term.
    fn term_name(&self, term_id: &str) -> Option<&str>;
}

impl TermSizeLookup for OntologyGraph {
    fn term_size(&self, term_id: &str) -> Option<usize> {
        self.term(term_id).map(|t| t.size())
    }

    fn term_name(&self, term_id: &str) -> Option<&str> {
        self.term(term_id).map(|t| t.name())
    }
}

// ── Result rows ────────────────────────────────────────────────────────────

/// The most specific term two genes have in common.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SharedTerm {
    pub id: String,
    pub size: usize,
    pub name: String,
}

/// Similarity of one gene pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimilarityResult {
    pub gene_a: String,
    pub gene_b: String,
    /// `2 / shared.size`, or 0 when nothing is shared.
    pub similarity: f64,
    /// `None` when the genes share no term.
    pub shared: Option<SharedTerm>,
}

impl SimilarityResult {
    /// The result for a pair with no term in common.
    pub fn unrelated(gene_a: impl Into<String>, gene_b: impl Into<String>) -> Self {
        Self {
            gene_a: gene_a.into(),
            gene_b: gene_b.into(),
            similarity: 0.0,
            shared: None,
        }
    }

    fn from_shared(gene_a: &str, gene_b: &str, shared: SharedTerm) -> Self {
        Self {
            gene_a: gene_a.to_string(),
            gene_b: gene_b.to_string(),
            similarity: 2.0 / shared.size as f64,
            shared: Some(shared),
        }
    }

    /// Whether the genes share at least one term.
    pub fn has_shared_term(&self) -> bool {
        self.shared.is_some()
    }

    /// Shared term id, or [`NO_SHARED_TERM`].
    pub fn term_id(&self) -> &str {
        self.shared.as_ref().map_or(NO_SHARED_TERM, |t| t.id.as_str())
    }

    /// Shared term size, or `+inf` when nothing is shared.
    pub fn term_size(&self) -> f64 {
        self.shared.as_ref().map_or(f64::INFINITY, |t| t.size as f64)
    }

    /// Shared term name, or [`NO_SHARED_TERM`].
    pub fn term_name(&self) -> &str {
        self.shared.as_ref().map_or(NO_SHARED_TERM, |t| t.name.as_str())
    }

    /// Most specific first: smaller shared terms before larger ones, pairs
    /// without a shared term last; then by term id and gene names.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        self.term_size()
            .total_cmp(&other.term_size())
            .then_with(|| self.term_id().cmp(other.term_id()))
            .then_with(|| self.gene_a.cmp(&other.gene_a))
            .then_with(|| self.gene_b.cmp(&other.gene_b))
    }
}

impl Scored for SimilarityResult {
    fn score(&self) -> f64 {
        self.similarity
    }
}

impl Summarizable for SimilarityResult {
    fn summary(&self) -> String {
        format!(
            "{}-{}: sim={:.4} via {} ({})",
            self.gene_a,
            self.gene_b,
            self.similarity,
            self.term_id(),
            self.term_name()
        )
    }
}

/// Sort results from most to least specific shared term.
pub fn rank_by_specificity(results: &mut [SimilarityResult]) {
    results.sort_by(SimilarityResult::specificity_cmp);
}

// ── Scoring ────────────────────────────────────────────────────────────────

/// Similarity of one pair, looking every shared term up in `ontology`.
///
/// Genes absent from the index have no terms and score 0 against
/// everything.
///
/// # Errors
///
/// Returns an error if a shared term is unknown to `ontology` or has size 0,
/// which means the index was built from a different ontology.
pub fn similarity<L>(
    gene_a: &str,
    gene_b: &str,
    index: &GeneTermIndex,
    ontology: &L,
) -> Result<SimilarityResult>
where
    L: TermSizeLookup + ?Sized,
{
    let mut best: Option<(usize, u32)> = None;
    for slot in shared_slots(index.slots(gene_a), index.slots(gene_b)) {
        let size = checked_size(ontology, index.term_id(slot))?;
        // Slots ascend in term-id order, so `<` keeps the smallest id on ties.
        if best.map_or(true, |(s, _)| size < s) {
            best = Some((size, slot));
        }
    }

    Ok(match best {
        None => SimilarityResult::unrelated(gene_a, gene_b),
        Some((size, slot)) => {
            let id = index.term_id(slot);
            let name = ontology.term_name(id).unwrap_or_default();
            SimilarityResult::from_shared(
                gene_a,
                gene_b,
                SharedTerm {
                    id: id.to_string(),
                    size,
                    name: name.to_string(),
                },
            )
        }
    })
}

fn checked_size<L: TermSizeLookup + ?Sized>(ontology: &L, term_id: &str) -> Result<usize> {
    match ontology.term_size(term_id) {
        Some(0) => Err(CyaneaError::InvalidInput(format!(
            "indexed term {term_id} has no annotated genes in the ontology"
        ))),
        Some(size) => Ok(size),
        None => Err(CyaneaError::InvalidInput(format!(
            "indexed term {term_id} is missing from the ontology"
        ))),
    }
}

/// Scores gene pairs against one index with term sizes resolved up front.
///
/// Construction validates every indexed term once, so scoring a pair never
/// fails and never touches a hash map.
#[derive(Debug, Clone)]
pub struct PairwiseSimilarityEngine<'a> {
    index: &'a GeneTermIndex,
    sizes: Vec<usize>,
    names: Vec<String>,
}

impl<'a> PairwiseSimilarityEngine<'a> {
    /// Resolve size and name of every indexed term.
    pub fn new<L>(index: &'a GeneTermIndex, ontology: &L) -> Result<Self>
    where
        L: TermSizeLookup + ?Sized,
    {
        let mut sizes = Vec::with_capacity(index.term_ids().len());
        let mut names = Vec::with_capacity(index.term_ids().len());
        for id in index.term_ids() {
            sizes.push(checked_size(ontology, id)?);
            names.push(ontology.term_name(id).unwrap_or_default().to_string());
        }
        Ok(Self {
            index,
            sizes,
            names,
        })
    }

    /// The index pairs are drawn from.
    pub fn index(&self) -> &'a GeneTermIndex {
        self.index
    }

    /// Number of scorable genes.
    pub fn n_genes(&self) -> usize {
        self.index.len()
    }

    /// Similarity of two genes by identifier.
    pub fn similarity(&self, gene_a: &str, gene_b: &str) -> SimilarityResult {
        self.score(gene_a, gene_b, self.index.slots(gene_a), self.index.slots(gene_b))
    }

    /// Similarity of the genes at positions `i` and `j` of
    /// [`GeneTermIndex::genes`]. Out-of-range positions have no terms.
    pub fn similarity_at(&self, i: usize, j: usize) -> SimilarityResult {
        let genes = self.index.genes();
        let a = genes.get(i).map_or("", String::as_str);
        let b = genes.get(j).map_or("", String::as_str);
        self.score(a, b, self.index.slots_at(i), self.index.slots_at(j))
    }

    fn score(&self, gene_a: &str, gene_b: &str, a: &[u32], b: &[u32]) -> SimilarityResult {
        let best = shared_slots(a, b).min_by_key(|&s| (self.sizes[s as usize], s));
        match best {
            None => SimilarityResult::unrelated(gene_a, gene_b),
            Some(slot) => {
                let s = slot as usize;
                SimilarityResult::from_shared(
                    gene_a,
                    gene_b,
                    SharedTerm {
                        id: self.index.term_id(slot).to_string(),
                        size: self.sizes[s],
                        name: self.names[s].clone(),
                    },
                )
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn random_index() -> impl Strategy<Value = GeneTermIndex> {
        proptest::collection::vec(proptest::collection::vec(0u8..12, 0..6), 2..12).prop_map(
            |genes| {
                GeneTermIndex::from_mapping(genes.into_iter().enumerate().map(|(g, terms)| {
                    (
                        format!("G{g}"),
                        terms.into_iter().map(|t| format!("T{t:02}")).collect::<Vec<_>>(),
                    )
                }))
            },
        )
    }

    /// Sizes keyed by term number, some of them tied.
    struct Sizes;

    impl TermSizeLookup for Sizes {
        fn term_size(&self, term_id: &str) -> Option<usize> {
            term_id[1..].parse::<usize>().ok().map(|n| n % 4 + 1)
        }

        fn term_name(&self, _term_id: &str) -> Option<&str> {
            Some("t")
        }
    }

    proptest! {
        #[test]
        fn symmetric_and_exact((idx, a, b) in random_index().prop_flat_map(|idx| {
            let n = idx.len().max(1);
            (Just(idx), 0..n, 0..n)
        })) {
            let engine = PairwiseSimilarityEngine::new(&idx, &Sizes).unwrap();
            let ab = engine.similarity_at(a, b);
            let ba = engine.similarity_at(b, a);
            prop_assert_eq!(ab.similarity, ba.similarity);
            prop_assert_eq!(ab.term_id(), ba.term_id());

            let ga = idx.genes().get(a).cloned().unwrap_or_default();
            let gb = idx.genes().get(b).cloned().unwrap_or_default();
            let shared: Vec<&str> = idx.terms(&ga).filter(|t| idx.terms(&gb).any(|u| u == *t)).collect();
            match shared.iter().filter_map(|t| Sizes.term_size(t)).min() {
                None => {
                    prop_assert_eq!(ab.similarity, 0.0);
                    prop_assert_eq!(ab.term_id(), NO_SHARED_TERM);
                }
                Some(min) => {
                    prop_assert_eq!(ab.term_size(), min as f64);
                    prop_assert_eq!(ab.similarity, 2.0 / min as f64);
                }
            }
        }
    }
}
