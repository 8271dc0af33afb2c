//! Correlation as a pair function over a measurement table.

use cyanea_core::{CyaneaError, Result};
use cyanea_omics::{MeasurementMatrix, MeasurementRow};
use cyanea_stats::{
    apply_fdr, paired_pearson, CorrelationRecord, FdrRecord, IndexedCorrelation, PairedCorrelation,
};

/// Pearson correlation of two measurement rows over the samples both have.
pub fn correlate(a: &MeasurementRow<'_>, b: &MeasurementRow<'_>) -> Result<PairedCorrelation> {
    paired_pearson(a.values, a.mask, b.values, b.mask)
}

/// Correlates genes of one table by position.
///
/// Borrowed by every worker of a parallel run; the table is never copied.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationEvaluator<'a> {
    matrix: &'a MeasurementMatrix,
}

impl<'a> CorrelationEvaluator<'a> {
    pub fn new(matrix: &'a MeasurementMatrix) -> Self {
        Self { matrix }
    }

    pub fn n_genes(&self) -> usize {
        self.matrix.n_genes()
    }

    pub fn gene_names(&self) -> &'a [String] {
        self.matrix.gene_names()
    }

    /// Correlate the genes at rows `i` and `j`, keyed by row.
    ///
    /// Pairs with too few shared samples, or a constant row, give an
    /// undefined correlation rather than an error.
    pub fn correlate_indexed(&self, i: usize, j: usize) -> Result<IndexedCorrelation> {
        let row = |k: usize| {
            let r = self
                .matrix
                .row(k)
                .ok_or_else(|| CyaneaError::InvalidInput(format!("no gene at row {k}")))?;
            let key = u32::try_from(k)
                .map_err(|_| CyaneaError::InvalidInput(format!("row {k} exceeds u32")))?;
            Ok::<_, CyaneaError>((key, r))
        };
        let ((ka, a), (kb, b)) = (row(i)?, row(j)?);
        Ok(IndexedCorrelation::new(ka, kb, correlate(&a, &b)?))
    }

    /// Correlate the genes at rows `i` and `j`, with names attached.
    pub fn correlate_at(&self, i: usize, j: usize) -> Result<CorrelationRecord> {
        self.correlate_indexed(i, j)?.into_record(self.gene_names())
    }

    /// Correlate two genes by name.
    pub fn correlate_genes(&self, gene_a: &str, gene_b: &str) -> Result<CorrelationRecord> {
        let index = |g: &str| {
            self.matrix
                .gene_index(g)
                .ok_or_else(|| CyaneaError::InvalidInput(format!("unknown gene '{g}'")))
        };
        self.correlate_at(index(gene_a)?, index(gene_b)?)
    }
}

/// Outcome counts of a finished correlation scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelationCounts {
    pub defined: u64,
    pub insufficient_data: u64,
    pub constant_input: u64,
}

impl CorrelationCounts {
    pub fn tally<'r, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'r PairedCorrelation>,
    {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome {
                PairedCorrelation::Defined { .. } => counts.defined += 1,
                PairedCorrelation::InsufficientData { .. } => counts.insufficient_data += 1,
                PairedCorrelation::ConstantInput { .. } => counts.constant_input += 1,
            }
        }
        counts
    }
}

/// Global FDR pass over a complete scan. Returns the family size.
///
/// Takes the records by mutable slice so it can only run once the whole
/// result set has been collected.
pub fn finalize<T: FdrRecord>(records: &mut [T]) -> Result<usize> {
    apply_fdr(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn matrix() -> MeasurementMatrix {
        MeasurementMatrix::new(
            vec![
                vec![Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)],
                vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0), None],
                vec![None, None, Some(1.0), None, None],
                vec![Some(7.0), Some(7.0), Some(7.0), Some(7.0), Some(7.0)],
            ],
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            (0..5).map(|i| format!("s{i}")).collect(),
        )
        .unwrap()
    }

    #[test]
    fn missing_positions_are_excluded() {
        let m = matrix();
        let eval = CorrelationEvaluator::new(&m);
        let r = eval.correlate_genes("A", "B").unwrap();
        // Shared samples s0, s1, s2.
        assert_eq!(r.correlation.n(), 3);
        assert!((r.correlation.coefficient().unwrap() - 1.0).abs() < TOL);
        assert_eq!(r.gene_a, "A");
        assert_eq!(r.gene_b, "B");
    }

    #[test]
    fn insufficient_overlap_is_not_a_number() {
        let m = matrix();
        let r = CorrelationEvaluator::new(&m).correlate_at(0, 2).unwrap();
        assert_eq!(r.correlation, PairedCorrelation::InsufficientData { n: 1 });
        assert_eq!(r.correlation.coefficient(), None);
    }

    #[test]
    fn constant_row() {
        let m = matrix();
        let r = CorrelationEvaluator::new(&m).correlate_at(0, 3).unwrap();
        assert_eq!(r.correlation, PairedCorrelation::ConstantInput { n: 4 });
    }

    #[test]
    fn unknown_gene_or_row() {
        let m = matrix();
        let eval = CorrelationEvaluator::new(&m);
        assert!(eval.correlate_genes("A", "Z").is_err());
        assert!(eval.correlate_at(0, 9).is_err());
    }

    #[test]
    fn fdr_only_over_defined_pairs() {
        let m = matrix();
        let eval = CorrelationEvaluator::new(&m);
        let mut records: Vec<_> = [(0, 1), (0, 2), (0, 3), (1, 3)]
            .iter()
            .map(|&(i, j)| eval.correlate_at(i, j).unwrap())
            .collect();
        let counts = CorrelationCounts::tally(records.iter().map(|r| &r.correlation));
        assert_eq!(counts.defined, 1);
        assert_eq!(counts.insufficient_data, 1);
        assert_eq!(counts.constant_input, 2);

        assert_eq!(finalize(&mut records).unwrap(), 1);
        assert!(records[0].p_fdr.is_some());
        assert!(records[1..].iter().all(|r| r.p_fdr.is_none()));
    }

    #[test]
    fn indexed_scan_resolves_names_after_fdr() {
        let m = matrix();
        let eval = CorrelationEvaluator::new(&m);
        let mut indexed: Vec<IndexedCorrelation> = [(0, 1), (0, 2), (1, 3)]
            .iter()
            .map(|&(i, j)| eval.correlate_indexed(i, j).unwrap())
            .collect();
        assert_eq!((indexed[2].a, indexed[2].b), (1, 3));
        assert_eq!(finalize(&mut indexed).unwrap(), 1);

        let named: Vec<CorrelationRecord> = indexed
            .into_iter()
            .map(|r| r.into_record(eval.gene_names()).unwrap())
            .collect();
        assert_eq!(named[0].gene_a, "A");
        assert_eq!(named[0].gene_b, "B");
        assert!(named[0].p_fdr.is_some());
        assert_eq!(named[2].gene_b, "D");
        let direct = eval.correlate_genes("A", "B").unwrap();
        assert_eq!(named[0].correlation, direct.correlation);
    }
}
