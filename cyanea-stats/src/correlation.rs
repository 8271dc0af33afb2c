//! Correlation analysis over vectors with missing values.
//!
//! [`pearson`] works on complete paired series. [`paired_pearson`] first
//! drops every position where either vector is missing (tracked with a
//! [`ValidityMask`], never a numeric sentinel), then reports the coefficient,
//! its two-tailed p-value and the number of positions that remained, or a
//! distinct undefined outcome when the correlation cannot be computed.

use cyanea_core::{CyaneaError, Result, Scored, Summarizable, ValidityMask};

use crate::distribution::StudentT;

/// Pearson product-moment correlation coefficient between `x` and `y`.
///
/// Returns 0.0 if either series is constant (zero variance).
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    validate_paired(x, y)?;
    let (r, _) = pearson_moments(x.iter().copied().zip(y.iter().copied()), x.len());
    Ok(r.unwrap_or(0.0))
}

fn validate_paired(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(CyaneaError::InvalidInput(format!(
            "correlation: x and y must have the same length ({} vs {})",
            x.len(),
            y.len(),
        )));
    }
    if x.len() < 2 {
        return Err(CyaneaError::InvalidInput(
            "correlation: need at least 2 observations".into(),
        ));
    }
    Ok(())
}

/// Two-pass Pearson over an iterator of pairs. Returns `None` when either
/// side has zero variance.
fn pearson_moments<I>(pairs: I, n: usize) -> (Option<f64>, usize)
where
    I: Iterator<Item = (f64, f64)> + Clone,
{
    let nf = n as f64;
    let (sum_x, sum_y) = pairs
        .clone()
        .fold((0.0, 0.0), |(sx, sy), (xi, yi)| (sx + xi, sy + yi));
    let mean_x = sum_x / nf;
    let mean_y = sum_y / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in pairs {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return (None, n);
    }
    (Some((cov / denom).clamp(-1.0, 1.0)), n)
}

/// Two-tailed p-value for a Pearson coefficient `r` over `n` pairs
/// (t-test with `n - 2` degrees of freedom).
///
/// `n == 2` always fits perfectly and carries no evidence, so it yields 1.0.
pub fn pearson_p_value(r: f64, n: usize) -> Result<f64> {
    if n < 2 {
        return Err(CyaneaError::InvalidInput(format!(
            "pearson_p_value: need at least 2 observations, got {n}"
        )));
    }
    if n == 2 {
        return Ok(1.0);
    }
    if r.abs() >= 1.0 {
        return Ok(0.0);
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    Ok(StudentT::new(df)?.two_tailed_p(t))
}

// ── Missing-aware correlation ──────────────────────────────────────────────

/// Outcome of correlating two vectors after removing missing positions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PairedCorrelation {
    /// A well-defined coefficient.
    Defined {
        /// Pearson coefficient in [-1, 1].
        coefficient: f64,
        /// Two-tailed p-value.
        p_value: f64,
        /// Positions present in both vectors.
        n: usize,
    },
    /// Fewer than two positions present in both vectors.
    InsufficientData {
        /// Positions present in both vectors.
        n: usize,
    },
    /// At least one vector is constant over the shared positions.
    ConstantInput {
        /// Positions present in both vectors.
        n: usize,
    },
}

impl PairedCorrelation {
    /// Number of positions present in both vectors.
    pub fn n(&self) -> usize {
        match *self {
            PairedCorrelation::Defined { n, .. }
            | PairedCorrelation::InsufficientData { n }
            | PairedCorrelation::ConstantInput { n } => n,
        }
    }

    /// The coefficient, if defined.
    pub fn coefficient(&self) -> Option<f64> {
        match *self {
            PairedCorrelation::Defined { coefficient, .. } => Some(coefficient),
            _ => None,
        }
    }

    /// The p-value, if defined.
    pub fn p_value(&self) -> Option<f64> {
        match *self {
            PairedCorrelation::Defined { p_value, .. } => Some(p_value),
            _ => None,
        }
    }

    /// Whether a coefficient could be computed.
    pub fn is_defined(&self) -> bool {
        matches!(self, PairedCorrelation::Defined { .. })
    }
}

/// Pearson correlation over the positions present in both `x` and `y`.
///
/// `x_mask` / `y_mask` mark which positions of `x` / `y` hold real values;
/// values at missing positions are never read.
///
/// # Errors
///
/// Returns an error if the vectors and masks do not all share one length.
pub fn paired_pearson(
    x: &[f64],
    x_mask: &ValidityMask,
    y: &[f64],
    y_mask: &ValidityMask,
) -> Result<PairedCorrelation> {
    if x.len() != y.len() || x.len() != x_mask.len() || y.len() != y_mask.len() {
        return Err(CyaneaError::InvalidInput(format!(
            "paired_pearson: vectors and masks must share one length \
             (x={}, x_mask={}, y={}, y_mask={})",
            x.len(),
            x_mask.len(),
            y.len(),
            y_mask.len(),
        )));
    }

    let common = x_mask.and(y_mask)?;
    let n = common.count_present();
    if n < 2 {
        return Ok(PairedCorrelation::InsufficientData { n });
    }

    let pairs = common.iter_present().map(|i| (x[i], y[i]));
    match pearson_moments(pairs, n) {
        (Some(coefficient), n) => Ok(PairedCorrelation::Defined {
            coefficient,
            p_value: pearson_p_value(coefficient, n)?,
            n,
        }),
        (None, n) => Ok(PairedCorrelation::ConstantInput { n }),
    }
}

/// [`paired_pearson`] over `Option` slices, `None` marking a missing value.
pub fn paired_pearson_opt(x: &[Option<f64>], y: &[Option<f64>]) -> Result<PairedCorrelation> {
    let x_mask = ValidityMask::build(&x.iter().map(Option::is_some).collect::<Vec<_>>());
    let y_mask = ValidityMask::build(&y.iter().map(Option::is_some).collect::<Vec<_>>());
    let xv: Vec<f64> = x.iter().map(|v| v.unwrap_or(0.0)).collect();
    let yv: Vec<f64> = y.iter().map(|v| v.unwrap_or(0.0)).collect();
    paired_pearson(&xv, &x_mask, &yv, &y_mask)
}

// ── Result rows ────────────────────────────────────────────────────────────

/// One row of a pairwise correlation table.
///
/// `p_fdr` stays `None` until the global correction pass has run, and stays
/// `None` for pairs whose correlation is undefined.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorrelationRecord {
    /// First gene of the pair.
    pub gene_a: String,
    /// Second gene of the pair.
    pub gene_b: String,
    /// Correlation outcome.
    pub correlation: PairedCorrelation,
    /// Benjamini-Hochberg adjusted p-value.
    pub p_fdr: Option<f64>,
}

impl CorrelationRecord {
    /// A record whose adjusted p-value has not been computed yet.
    pub fn new(
        gene_a: impl Into<String>,
        gene_b: impl Into<String>,
        correlation: PairedCorrelation,
    ) -> Self {
        Self {
            gene_a: gene_a.into(),
            gene_b: gene_b.into(),
            correlation,
            p_fdr: None,
        }
    }
}

/// A correlation outcome keyed by row positions instead of gene names.
///
/// This is the in-memory form of a full scan: it holds no heap data, so a
/// scan of `N` genes costs a fixed few dozen bytes per pair until names are
/// attached with [`into_record`](Self::into_record) on the way out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedCorrelation {
    /// Row of the first gene.
    pub a: u32,
    /// Row of the second gene.
    pub b: u32,
    pub correlation: PairedCorrelation,
    pub p_fdr: Option<f64>,
}

impl IndexedCorrelation {
    pub fn new(a: u32, b: u32, correlation: PairedCorrelation) -> Self {
        Self {
            a,
            b,
            correlation,
            p_fdr: None,
        }
    }

    /// Attach gene names by row.
    pub fn into_record(self, names: &[String]) -> Result<CorrelationRecord> {
        let name = |row: u32| {
            names.get(row as usize).ok_or_else(|| {
                CyaneaError::InvalidInput(format!(
                    "row {row} out of range for {} gene names",
                    names.len()
                ))
            })
        };
        Ok(CorrelationRecord {
            gene_a: name(self.a)?.clone(),
            gene_b: name(self.b)?.clone(),
            correlation: self.correlation,
            p_fdr: self.p_fdr,
        })
    }
}

impl Scored for CorrelationRecord {
    fn score(&self) -> f64 {
        self.correlation.coefficient().unwrap_or(f64::NAN)
    }
}

impl Summarizable for CorrelationRecord {
    fn summary(&self) -> String {
        match self.correlation {
            PairedCorrelation::Defined {
                coefficient,
                p_value,
                n,
            } => format!(
                "{}-{}: r={:.4}, p={:.3e}, n={}",
                self.gene_a, self.gene_b, coefficient, p_value, n
            ),
            PairedCorrelation::InsufficientData { n } => {
                format!("{}-{}: insufficient data (n={})", self.gene_a, self.gene_b, n)
            }
            PairedCorrelation::ConstantInput { n } => {
                format!("{}-{}: constant input (n={})", self.gene_a, self.gene_b, n)
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    #[test]
    fn pearson_perfect_positive() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < TOL);
    }

    #[test]
    fn pearson_perfect_negative() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [10.0, 8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y).unwrap() - (-1.0)).abs() < TOL);
    }

    #[test]
    fn pearson_constant_series() {
        let x = [3.0, 3.0, 3.0];
        let y = [1.0, 2.0, 3.0];
        assert!((pearson(&x, &y).unwrap()).abs() < TOL);
    }

    #[test]
    fn pearson_length_mismatch() {
        assert!(pearson(&[1.0, 2.0], &[1.0]).is_err());
        assert!(pearson(&[1.0], &[2.0]).is_err());
    }

    #[test]
    fn p_value_matches_reference() {
        // scipy.stats.pearsonr([1,2,3,4,5], [2,1,4,3,5]) -> r=0.8, p=0.10408803866182788
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        let r = pearson(&x, &y).unwrap();
        assert!((r - 0.8).abs() < TOL);
        let p = pearson_p_value(r, 5).unwrap();
        assert!((p - 0.104_088_038_661_827_88).abs() < 1e-8);
    }

    #[test]
    fn p_value_edge_cases() {
        assert_eq!(pearson_p_value(0.3, 2).unwrap(), 1.0);
        assert_eq!(pearson_p_value(1.0, 10).unwrap(), 0.0);
        assert!((pearson_p_value(0.0, 10).unwrap() - 1.0).abs() < 1e-12);
        assert!(pearson_p_value(0.5, 1).is_err());
    }

    #[test]
    fn paired_drops_missing_positions() {
        let x = [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(100.0)];
        let y = [Some(2.0), Some(1.0), Some(7.0), Some(3.0), Some(5.0), None];
        // Positions 2 and 5 are dropped, leaving the 4-point series
        // [1,2,4,5] vs [2,1,3,5].
        let outcome = paired_pearson_opt(&x, &y).unwrap();
        assert_eq!(outcome.n(), 4);
        let expected = pearson(&[1.0, 2.0, 4.0, 5.0], &[2.0, 1.0, 3.0, 5.0]).unwrap();
        assert!((outcome.coefficient().unwrap() - expected).abs() < TOL);
        assert!(outcome.p_value().is_some());
    }

    #[test]
    fn paired_insufficient_data_is_distinct() {
        let x = [Some(1.0), None, Some(3.0)];
        let y = [None, Some(2.0), Some(4.0)];
        let outcome = paired_pearson_opt(&x, &y).unwrap();
        assert_eq!(outcome, PairedCorrelation::InsufficientData { n: 1 });
        assert!(outcome.coefficient().is_none());
        assert!(outcome.p_value().is_none());
        assert!(!outcome.is_defined());
    }

    #[test]
    fn paired_constant_input_is_distinct() {
        let x = [Some(1.0), Some(1.0), Some(1.0)];
        let y = [Some(1.0), Some(2.0), Some(3.0)];
        assert_eq!(
            paired_pearson_opt(&x, &y).unwrap(),
            PairedCorrelation::ConstantInput { n: 3 }
        );
    }

    #[test]
    fn paired_length_mismatch() {
        let mask = ValidityMask::all_present(3);
        let short = ValidityMask::all_present(2);
        assert!(paired_pearson(&[1.0, 2.0, 3.0], &mask, &[1.0, 2.0], &short).is_err());
    }

    #[test]
    fn paired_ignores_values_under_missing_positions() {
        let x = [1.0, 2.0, f64::NAN, 4.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        let x_mask = ValidityMask::build(&[true, true, false, true]);
        let y_mask = ValidityMask::all_present(4);
        let outcome = paired_pearson(&x, &x_mask, &y, &y_mask).unwrap();
        assert!((outcome.coefficient().unwrap() - 1.0).abs() < TOL);
        assert_eq!(outcome.n(), 3);
    }

    #[test]
    fn record_summary() {
        let rec = CorrelationRecord::new("A", "B", PairedCorrelation::InsufficientData { n: 0 });
        assert_eq!(rec.summary(), "A-B: insufficient data (n=0)");
        assert!(rec.score().is_nan());
        assert!(rec.p_fdr.is_none());
    }

    #[test]
    fn indexed_record_takes_names_by_row() {
        let names = vec!["TP53".to_string(), "MDM2".to_string(), "KRAS".to_string()];
        let mut ix = IndexedCorrelation::new(0, 2, PairedCorrelation::ConstantInput { n: 4 });
        ix.p_fdr = Some(0.5);
        let rec = ix.into_record(&names).unwrap();
        assert_eq!(rec.gene_a, "TP53");
        assert_eq!(rec.gene_b, "KRAS");
        assert_eq!(rec.p_fdr, Some(0.5));
        assert!(ix.into_record(&names[..2]).is_err());
        assert!(std::mem::size_of::<IndexedCorrelation>() <= 64);
    }
}
