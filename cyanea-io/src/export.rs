//! Export of a propagated ontology.
//!
//! Two files describe the ontology a similarity run used:
//!
//! - the term table (Parquet), one row per annotated term;
//! - `gene_terms.json`, a `{gene: [term_id, ...]}` object of the gene-term
//!   index, with genes and term lists sorted.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use cyanea_core::{CyaneaError, Result};
use cyanea_ontology::{GeneTermIndex, OntologyGraph, TermRow};

use crate::parquet::{pq_err, read_table, write_table};

/// Write the annotated terms of a propagated graph to a Parquet file.
///
/// Terms with no annotated genes are skipped.
pub fn write_term_table(graph: &OntologyGraph, path: impl AsRef<Path>) -> Result<usize> {
    if !graph.is_propagated() {
        return Err(CyaneaError::Configuration(
            "term table export requires a propagated ontology".into(),
        ));
    }
    let path = path.as_ref();
    let rows = graph.export_rows();
    write_table(&rows, path)?;
    info!(path = %path.display(), terms = rows.len(), "term table written");
    Ok(rows.len())
}

/// Read a term table written by [`write_term_table`].
pub fn read_term_table(path: impl AsRef<Path>) -> Result<Vec<TermRow>> {
    read_table(path)
}

/// Render a gene-term index as a JSON object.
pub fn gene_terms_to_json(index: &GeneTermIndex) -> Result<String> {
    let map: BTreeMap<&str, Vec<&str>> = index.iter().collect();
    serde_json::to_string(&map).map_err(|e| CyaneaError::Other(format!("gene_terms: {e}")))
}

/// Parse a `{gene: [term_id, ...]}` JSON object into an index.
pub fn gene_terms_from_json(json: &str) -> Result<GeneTermIndex> {
    let map: BTreeMap<String, Vec<String>> =
        serde_json::from_str(json).map_err(|e| CyaneaError::Parse(format!("gene_terms: {e}")))?;
    Ok(GeneTermIndex::from_mapping(map))
}

/// Write [`gene_terms_to_json`] output to `path`.
pub fn write_gene_terms(index: &GeneTermIndex, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = gene_terms_to_json(index)?;
    fs::write(path, json).map_err(|e| {
        CyaneaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    info!(path = %path.display(), genes = index.len(), "gene terms written");
    Ok(())
}

/// Read a file written by [`write_gene_terms`].
pub fn read_gene_terms(path: impl AsRef<Path>) -> Result<GeneTermIndex> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| {
        CyaneaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    gene_terms_from_json(&json).map_err(|e| pq_err(e, path))
}
