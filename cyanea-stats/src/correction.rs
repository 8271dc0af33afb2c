//! Multiple testing correction.
//!
//! A pairwise scan over N genes runs N(N-1)/2 tests at once, so raw p-values
//! are adjusted with the Benjamini-Hochberg procedure to control the false
//! discovery rate. The adjustment ranks every p-value of the run jointly: it
//! is a global pass that can only start once all pairs are evaluated.

use cyanea_core::{CyaneaError, Result};

use crate::correlation::{CorrelationRecord, IndexedCorrelation};

/// Benjamini-Hochberg procedure for controlling the false discovery rate.
///
/// Sorts p-values, adjusts as `p * n / rank`, enforces monotonicity
/// from right to left, and clamps to [0, 1]. The output is in input order.
pub fn benjamini_hochberg(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let indices = sorted_indices(p_values);

    let n_f = n as f64;
    let mut adjusted = vec![0.0; n];

    let mut prev = f64::INFINITY;
    for i in (0..n).rev() {
        let rank = (i + 1) as f64;
        let adj = (p_values[indices[i]] * n_f / rank).min(1.0).min(prev);
        adjusted[indices[i]] = adj;
        prev = adj;
    }

    Ok(adjusted)
}

/// Benjamini-Hochberg over a family where some tests produced no p-value.
///
/// `None` entries are left out of the family entirely (they do not count
/// towards `n`) and stay `None` in the output.
pub fn benjamini_hochberg_partial(p_values: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    let (positions, defined): (Vec<usize>, Vec<f64>) = p_values
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.map(|p| (i, p)))
        .unzip();
    let adjusted = benjamini_hochberg(&defined)?;

    let mut out = vec![None; p_values.len()];
    for (pos, adj) in positions.into_iter().zip(adjusted) {
        out[pos] = Some(adj);
    }
    Ok(out)
}

/// A test outcome that takes part in a global FDR pass.
pub trait FdrRecord {
    /// Raw p-value, `None` when the test is undefined.
    fn p_value(&self) -> Option<f64>;
    fn set_p_fdr(&mut self, adjusted: Option<f64>);
}

impl FdrRecord for CorrelationRecord {
    fn p_value(&self) -> Option<f64> {
        self.correlation.p_value()
    }

    fn set_p_fdr(&mut self, adjusted: Option<f64>) {
        self.p_fdr = adjusted;
    }
}

impl FdrRecord for IndexedCorrelation {
    fn p_value(&self) -> Option<f64> {
        self.correlation.p_value()
    }

    fn set_p_fdr(&mut self, adjusted: Option<f64>) {
        self.p_fdr = adjusted;
    }
}

/// Fill `p_fdr` on every record of a completed scan.
///
/// Returns the size of the correction family (records with a defined
/// p-value).
pub fn apply_fdr<T: FdrRecord>(records: &mut [T]) -> Result<usize> {
    let raw: Vec<Option<f64>> = records.iter().map(FdrRecord::p_value).collect();
    let family = raw.iter().filter(|p| p.is_some()).count();
    let adjusted = benjamini_hochberg_partial(&raw)?;
    for (record, adj) in records.iter_mut().zip(adjusted) {
        record.set_p_fdr(adj);
    }
    Ok(family)
}

#[cfg(feature = "parallel")]
fn sorted_indices(p_values: &[f64]) -> Vec<usize> {
    use rayon::prelude::*;
    let mut indices: Vec<usize> = (0..p_values.len()).collect();
    indices.par_sort_unstable_by(|&a, &b| p_values[a].total_cmp(&p_values[b]).then(a.cmp(&b)));
    indices
}

#[cfg(not(feature = "parallel"))]
fn sorted_indices(p_values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..p_values.len()).collect();
    indices.sort_unstable_by(|&a, &b| p_values[a].total_cmp(&p_values[b]).then(a.cmp(&b)));
    indices
}

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(CyaneaError::InvalidInput(format!(
                "p-value at index {} is out of range [0, 1]: {}",
                i, p,
            )));
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────
