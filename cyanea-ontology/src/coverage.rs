//! Coverage of a query gene set against a background ontology.
//!
//! Given a propagated background (e.g. every gene screened in an
//! experiment) and a query subset (e.g. the hits), each term reports how
//! many of its background genes the query covers. The report is an
//! auxiliary table keyed by term id; the graph itself is not touched.

use std::collections::{BTreeMap, HashSet};

use cyanea_core::{CyaneaError, Result};
use tracing::{debug, warn};

use crate::graph::OntologyGraph;
use crate::namespace::Namespace;

/// Coverage of one background term by the query genes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermCoverage {
    pub term_id: String,
    pub name: String,
    pub namespace: Namespace,
    pub depth: u32,
    /// Background genes annotated to the term.
    pub term_size: usize,
    /// Query genes annotated to the term.
    pub covered: usize,
    /// `covered / term_size`.
    pub ratio_covered: f64,
    /// Sorted.
    pub covered_genes: Vec<String>,
    /// Sorted.
    pub not_covered_genes: Vec<String>,
}

impl TermCoverage {
    /// Coverage as `"k/n"`.
    pub fn fraction_covered(&self) -> String {
        format!("{}/{}", self.covered, self.term_size)
    }
}

/// Per-term coverage, least covered terms first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageReport {
    pub rows: Vec<TermCoverage>,
    /// Query genes dropped because the background does not contain them.
    /// Without a universe, this is every query gene with no annotation.
    pub missing_from_background: Vec<String>,
    /// Query genes in the universe that carry no annotation. Always empty
    /// when no universe is given.
    pub unannotated: Vec<String>,
}

/// Compare `query_genes` against every annotated term of `background`.
///
/// Rows are sorted by `ratio_covered` ascending, then term size
/// descending, then term id. Query genes without an annotation in the
/// background are dropped with a warning. When the genes of the background
/// are known, [`coverage_report_in_universe`] tells those apart from genes
/// that were never screened.
///
/// # Errors
///
/// Returns a configuration error if `background` has not been propagated.
pub fn coverage_report<I, S>(background: &OntologyGraph, query_genes: I) -> Result<CoverageReport>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    build_report(background, None, query_genes)
}

/// [`coverage_report`] against an explicit background gene set, e.g. every
/// gene screened.
///
/// Only query genes outside `universe` are reported as missing from the
/// background (with a warning). Query genes in `universe` without any
/// annotation are listed in [`CoverageReport::unannotated`]; they cover no
/// term but are still part of the background.
pub fn coverage_report_in_universe<U, T, I, S>(
    background: &OntologyGraph,
    universe: U,
    query_genes: I,
) -> Result<CoverageReport>
where
    U: IntoIterator<Item = T>,
    T: AsRef<str>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let universe: HashSet<String> = universe
        .into_iter()
        .map(|g| g.as_ref().to_string())
        .collect();
    build_report(background, Some(&universe), query_genes)
}

fn build_report<I, S>(
    background: &OntologyGraph,
    universe: Option<&HashSet<String>>,
    query_genes: I,
) -> Result<CoverageReport>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if !background.is_propagated() {
        return Err(CyaneaError::Configuration(
            "coverage report requires a propagated background ontology".into(),
        ));
    }

    let mut query: HashSet<usize> = HashSet::new();
    let mut missing: Vec<String> = Vec::new();
    let mut unannotated: Vec<String> = Vec::new();
    for gene in query_genes {
        let gene = gene.as_ref();
        match (background.gene_idx(gene), universe) {
            (Some(g), _) => {
                query.insert(g);
            }
            (None, Some(u)) if u.contains(gene) => unannotated.push(gene.to_string()),
            (None, _) => missing.push(gene.to_string()),
        }
    }
    for list in [&mut missing, &mut unannotated] {
        list.sort_unstable();
        list.dedup();
    }
    if !missing.is_empty() {
        let reason = if universe.is_some() {
            "query genes absent from background dropped"
        } else {
            "query genes without background annotations dropped"
        };
        warn!(count = missing.len(), genes = %missing.join(","), "{reason}");
    }
    if !unannotated.is_empty() {
        debug!(count = unannotated.len(), "query genes in background without annotations");
    }

    let mut rows: Vec<TermCoverage> = background
        .terms()
        .filter(|t| t.size() > 0)
        .map(|t| {
            let mut covered_genes = Vec::new();
            let mut not_covered_genes = Vec::new();
            for &g in t.genes() {
                let name = background.gene_name(g).unwrap_or_default().to_string();
                if query.contains(&g) {
                    covered_genes.push(name);
                } else {
                    not_covered_genes.push(name);
                }
            }
            covered_genes.sort_unstable();
            not_covered_genes.sort_unstable();
            let covered = covered_genes.len();
            TermCoverage {
                term_id: t.id().to_string(),
                name: t.name().to_string(),
                namespace: t.namespace(),
                depth: t.depth(),
                term_size: t.size(),
                covered,
                ratio_covered: covered as f64 / t.size() as f64,
                covered_genes,
                not_covered_genes,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.ratio_covered
            .total_cmp(&b.ratio_covered)
            .then(b.term_size.cmp(&a.term_size))
            .then_with(|| a.term_id.cmp(&b.term_id))
    });

    Ok(CoverageReport {
        rows,
        missing_from_background: missing,
        unannotated,
    })
}

/// How a not-covered gene ranks across the coverage report.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneCoverageStats {
    pub gene: String,
    /// Mean 1-based rank of the report rows the gene is missing from.
    pub mean_term_rank: f64,
    /// Number of report rows the gene is missing from.
    pub term_count: usize,
    /// `term_count / mean_term_rank`.
    pub score: f64,
    pub term_ids: Vec<String>,
    pub term_names: Vec<String>,
}

/// Rank the genes the query misses: genes absent from many poorly covered
/// terms come first.
///
/// Sorted by score descending, term count descending, mean rank ascending,
/// then gene name.
pub fn gene_coverage_stats(report: &CoverageReport) -> Vec<GeneCoverageStats> {
    struct Acc<'a> {
        rank_sum: usize,
        terms: Vec<&'a TermCoverage>,
    }

    let mut per_gene: BTreeMap<&str, Acc<'_>> = BTreeMap::new();
    for (pos, row) in report.rows.iter().enumerate() {
        for gene in &row.not_covered_genes {
            let acc = per_gene.entry(gene.as_str()).or_insert_with(|| Acc {
                rank_sum: 0,
                terms: Vec::new(),
            });
            acc.rank_sum += pos + 1;
            acc.terms.push(row);
        }
    }

    let mut stats: Vec<GeneCoverageStats> = per_gene
        .into_iter()
        .map(|(gene, acc)| {
            let term_count = acc.terms.len();
            let mean_term_rank = acc.rank_sum as f64 / term_count as f64;
            GeneCoverageStats {
                gene: gene.to_string(),
                mean_term_rank,
                term_count,
                score: term_count as f64 / mean_term_rank,
                term_ids: acc.terms.iter().map(|t| t.term_id.clone()).collect(),
                term_names: acc.terms.iter().map(|t| t.name.clone()).collect(),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.term_count.cmp(&a.term_count))
            .then(a.mean_term_rank.total_cmp(&b.mean_term_rank))
            .then_with(|| a.gene.cmp(&b.gene))
    });
    stats
}
