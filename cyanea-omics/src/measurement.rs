//! Gene × sample measurement tables with explicit missing values.
//!
//! [`MeasurementMatrix`] stores a row-major dense matrix of `f64` values
//! (n_genes × n_samples) together with one [`ValidityMask`] per gene. A
//! missing cell is a cleared mask bit, never a reserved number, so a real
//! measurement of `0.0` or `-1.0` is never confused with "not measured".
//! Typical inputs are CRISPR knockout effect screens and expression panels.

use std::collections::HashMap;

use cyanea_core::{CyaneaError, Result, Summarizable, ValidityMask};

/// One gene's measurements: values plus the mask of positions present.
///
/// Values at missing positions are unspecified and must not be read.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementRow<'a> {
    /// Gene identifier.
    pub gene: &'a str,
    /// Values across all samples.
    pub values: &'a [f64],
    /// Which samples hold a measurement.
    pub mask: &'a ValidityMask,
}

impl MeasurementRow<'_> {
    /// Number of samples with a measurement.
    pub fn present(&self) -> usize {
        self.mask.count_present()
    }
}

/// A dense, row-major measurement matrix (genes × samples) with a
/// per-row presence mask.
#[derive(Debug, Clone)]
pub struct MeasurementMatrix {
    data: Vec<f64>,
    masks: Vec<ValidityMask>,
    n_genes: usize,
    n_samples: usize,
    gene_names: Vec<String>,
    sample_names: Vec<String>,
    gene_lookup: HashMap<String, usize>,
}

impl MeasurementMatrix {
    /// Create a matrix from rows of optional values.
    ///
    /// Each inner `Vec` is one gene with `n_samples` entries; `None` marks
    /// a missing measurement. `Some(NaN)` is rejected: use `None`.
    pub fn new(
        rows: Vec<Vec<Option<f64>>>,
        gene_names: Vec<String>,
        sample_names: Vec<String>,
    ) -> Result<Self> {
        let n_genes = rows.len();
        let n_samples = sample_names.len();
        if gene_names.len() != n_genes {
            return Err(CyaneaError::InvalidInput(format!(
                "gene_names length ({}) does not match row count ({n_genes})",
                gene_names.len()
            )));
        }

        let mut data = Vec::with_capacity(n_genes * n_samples);
        let mut masks = Vec::with_capacity(n_genes);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_samples {
                return Err(CyaneaError::InvalidInput(format!(
                    "row {i} ({}) has {} columns, expected {n_samples}",
                    gene_names[i],
                    row.len()
                )));
            }
            let mut present = Vec::with_capacity(n_samples);
            for (j, v) in row.iter().enumerate() {
                match v {
                    Some(x) if x.is_nan() => {
                        return Err(CyaneaError::InvalidInput(format!(
                            "NaN at ({}, {}); missing values must be None",
                            gene_names[i], sample_names[j]
                        )));
                    }
                    Some(x) => {
                        data.push(*x);
                        present.push(true);
                    }
                    None => {
                        data.push(0.0);
                        present.push(false);
                    }
                }
            }
            masks.push(ValidityMask::build(&present));
        }

        let gene_lookup = build_lookup(&gene_names)?;
        Ok(Self {
            data,
            masks,
            n_genes,
            n_samples,
            gene_names,
            sample_names,
            gene_lookup,
        })
    }

    /// Create a matrix from float rows where NaN encodes "not measured",
    /// the convention of most columnar exports. NaN cells become missing.
    pub fn from_nan_rows(
        rows: Vec<Vec<f64>>,
        gene_names: Vec<String>,
        sample_names: Vec<String>,
    ) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|x| if x.is_nan() { None } else { Some(x) })
                    .collect()
            })
            .collect();
        Self::new(rows, gene_names, sample_names)
    }

    /// Build a matrix from long-format `(gene, sample, value)` records.
    ///
    /// Genes and samples are ordered by first appearance; cells with no
    /// record are missing. A repeated `(gene, sample)` cell is an error.
    pub fn from_records<I, G, S>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (G, S, f64)>,
        G: Into<String>,
        S: Into<String>,
    {
        let mut gene_names: Vec<String> = Vec::new();
        let mut sample_names: Vec<String> = Vec::new();
        let mut gene_idx: HashMap<String, usize> = HashMap::new();
        let mut sample_idx: HashMap<String, usize> = HashMap::new();
        let mut cells: HashMap<(usize, usize), f64> = HashMap::new();

        for (gene, sample, value) in records {
            let gene = gene.into();
            let sample = sample.into();
            let g = *gene_idx.entry(gene.clone()).or_insert_with(|| {
                gene_names.push(gene.clone());
                gene_names.len() - 1
            });
            let s = *sample_idx.entry(sample.clone()).or_insert_with(|| {
                sample_names.push(sample.clone());
                sample_names.len() - 1
            });
            if cells.insert((g, s), value).is_some() {
                return Err(CyaneaError::InvalidInput(format!(
                    "duplicate measurement for ({gene}, {sample})"
                )));
            }
        }

        let rows = (0..gene_names.len())
            .map(|g| {
                (0..sample_names.len())
                    .map(|s| cells.get(&(g, s)).copied())
                    .collect()
            })
            .collect();
        Self::new(rows, gene_names, sample_names)
    }

    /// (n_genes, n_samples).
    pub fn shape(&self) -> (usize, usize) {
        (self.n_genes, self.n_samples)
    }

    /// Number of genes (rows).
    pub fn n_genes(&self) -> usize {
        self.n_genes
    }

    /// Number of samples (columns).
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Gene identifiers in row order.
    pub fn gene_names(&self) -> &[String] {
        &self.gene_names
    }

    /// Sample identifiers in column order.
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    /// Row index of a gene.
    pub fn gene_index(&self, gene: &str) -> Option<usize> {
        self.gene_lookup.get(gene).copied()
    }

    /// A single value. `None` when out of bounds or not measured.
    pub fn get(&self, gene_idx: usize, sample_idx: usize) -> Option<f64> {
        if gene_idx >= self.n_genes || sample_idx >= self.n_samples {
            return None;
        }
        if !self.masks[gene_idx].get(sample_idx) {
            return None;
        }
        Some(self.data[gene_idx * self.n_samples + sample_idx])
    }

    /// Set or clear a single value.
    pub fn set(&mut self, gene_idx: usize, sample_idx: usize, value: Option<f64>) -> Result<()> {
        if gene_idx >= self.n_genes || sample_idx >= self.n_samples {
            return Err(CyaneaError::InvalidInput(format!(
                "index ({gene_idx}, {sample_idx}) out of bounds for ({}, {})",
                self.n_genes, self.n_samples
            )));
        }
        match value {
            Some(x) if x.is_nan() => Err(CyaneaError::InvalidInput(
                "NaN is not a measurement; use None".into(),
            )),
            Some(x) => {
                self.data[gene_idx * self.n_samples + sample_idx] = x;
                self.masks[gene_idx].set(sample_idx, true)
            }
            None => self.masks[gene_idx].set(sample_idx, false),
        }
    }

    /// One gene's values and presence mask.
    pub fn row(&self, gene_idx: usize) -> Option<MeasurementRow<'_>> {
        if gene_idx >= self.n_genes {
            return None;
        }
        let start = gene_idx * self.n_samples;
        Some(MeasurementRow {
            gene: &self.gene_names[gene_idx],
            values: &self.data[start..start + self.n_samples],
            mask: &self.masks[gene_idx],
        })
    }

    /// [`row`](Self::row) by gene identifier.
    pub fn row_by_name(&self, gene: &str) -> Option<MeasurementRow<'_>> {
        self.gene_index(gene).and_then(|i| self.row(i))
    }

    /// Total number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.masks.iter().map(ValidityMask::count_missing).sum()
    }

    /// Subset the matrix to the given gene (row) indices.
    pub fn filter_genes(&self, indices: &[usize]) -> Result<MeasurementMatrix> {
        let mut data = Vec::with_capacity(indices.len() * self.n_samples);
        let mut masks = Vec::with_capacity(indices.len());
        let mut names = Vec::with_capacity(indices.len());

        for &i in indices {
            if i >= self.n_genes {
                return Err(CyaneaError::InvalidInput(format!(
                    "gene index {i} out of bounds (n_genes={})",
                    self.n_genes
                )));
            }
            let start = i * self.n_samples;
            data.extend_from_slice(&self.data[start..start + self.n_samples]);
            masks.push(self.masks[i].clone());
            names.push(self.gene_names[i].clone());
        }

        let gene_lookup = build_lookup(&names)?;
        Ok(MeasurementMatrix {
            data,
            masks,
            n_genes: indices.len(),
            n_samples: self.n_samples,
            gene_names: names,
            sample_names: self.sample_names.clone(),
            gene_lookup,
        })
    }

    /// Keep only genes measured in at least `min_present` samples.
    pub fn retain_measured(&self, min_present: usize) -> Result<MeasurementMatrix> {
        let keep: Vec<usize> = (0..self.n_genes)
            .filter(|&i| self.masks[i].count_present() >= min_present)
            .collect();
        self.filter_genes(&keep)
    }
}

fn build_lookup(names: &[String]) -> Result<HashMap<String, usize>> {
    let mut lookup = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        if lookup.insert(name.clone(), i).is_some() {
            return Err(CyaneaError::InvalidInput(format!(
                "duplicate gene identifier: {name}"
            )));
        }
    }
    Ok(lookup)
}

impl Summarizable for MeasurementMatrix {
    fn summary(&self) -> String {
        format!(
            "MeasurementMatrix: {} genes \u{00d7} {} samples ({} missing)",
            self.n_genes,
            self.n_samples,
            self.missing_count()
        )
    }
}

// ── Loader interface ───────────────────────────────────────────────────────

/// Something that can produce a measurement table: a columnar file reader,
/// a database query, or an in-memory fixture.
pub trait MeasurementSource {
    /// Load the full gene × sample table.
    fn load_measurements(&self) -> Result<MeasurementMatrix>;
}

impl MeasurementSource for MeasurementMatrix {
    fn load_measurements(&self) -> Result<MeasurementMatrix> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> MeasurementMatrix {
        MeasurementMatrix::new(
            vec![
                vec![Some(1.0), None, Some(3.0)],
                vec![Some(4.0), Some(5.0), Some(0.0)],
            ],
            vec!["TP53".into(), "MDM2".into()],
            vec!["s1".into(), "s2".into(), "s3".into()],
        )
        .unwrap()
    }

    #[test]
    fn construction() {
        let m = sample_matrix();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.missing_count(), 1);
        assert_eq!(m.gene_index("MDM2"), Some(1));
        assert_eq!(m.gene_index("KRAS"), None);
    }

    #[test]
    fn missing_is_not_zero() {
        let m = sample_matrix();
        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.get(1, 2), Some(0.0));
        assert_eq!(m.get(5, 0), None);
    }

    #[test]
    fn nan_rejected() {
        let result = MeasurementMatrix::new(
            vec![vec![Some(f64::NAN)]],
            vec!["A".into()],
            vec!["s1".into()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn from_nan_rows_marks_missing() {
        let m = MeasurementMatrix::from_nan_rows(
            vec![vec![1.0, f64::NAN]],
            vec!["A".into()],
            vec!["s1".into(), "s2".into()],
        )
        .unwrap();
        assert_eq!(m.get(0, 0), Some(1.0));
        assert_eq!(m.get(0, 1), None);
    }

    #[test]
    fn dimension_mismatch() {
        let result = MeasurementMatrix::new(
            vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0)]],
            vec!["A".into(), "B".into()],
            vec!["s1".into(), "s2".into()],
        );
        assert!(result.is_err());

        let result = MeasurementMatrix::new(
            vec![vec![Some(1.0)]],
            vec!["A".into(), "B".into()],
            vec!["s1".into()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_gene_rejected() {
        let result = MeasurementMatrix::new(
            vec![vec![Some(1.0)], vec![Some(2.0)]],
            vec!["A".into(), "A".into()],
            vec!["s1".into()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn row_view() {
        let m = sample_matrix();
        let row = m.row_by_name("TP53").unwrap();
        assert_eq!(row.gene, "TP53");
        assert_eq!(row.values.len(), 3);
        assert_eq!(row.present(), 2);
        assert!(!row.mask.get(1));
        assert!(m.row(2).is_none());
    }

    #[test]
    fn set_and_clear() {
        let mut m = sample_matrix();
        m.set(0, 1, Some(7.0)).unwrap();
        assert_eq!(m.get(0, 1), Some(7.0));
        m.set(0, 1, None).unwrap();
        assert_eq!(m.get(0, 1), None);
        assert!(m.set(0, 0, Some(f64::NAN)).is_err());
        assert!(m.set(9, 0, None).is_err());
    }

    #[test]
    fn from_long_records() {
        let m = MeasurementMatrix::from_records(vec![
            ("A", "s1", 1.0),
            ("B", "s2", 2.0),
            ("A", "s2", 3.0),
        ])
        .unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.get(0, 0), Some(1.0));
        assert_eq!(m.get(0, 1), Some(3.0));
        assert_eq!(m.get(1, 0), None);
        assert_eq!(m.get(1, 1), Some(2.0));

        let dup = MeasurementMatrix::from_records(vec![("A", "s1", 1.0), ("A", "s1", 2.0)]);
        assert!(dup.is_err());
    }

    #[test]
    fn filter_and_retain() {
        let m = sample_matrix();
        let filtered = m.filter_genes(&[1]).unwrap();
        assert_eq!(filtered.shape(), (1, 3));
        assert_eq!(filtered.gene_index("MDM2"), Some(0));
        assert!(m.filter_genes(&[5]).is_err());

        let retained = m.retain_measured(3).unwrap();
        assert_eq!(retained.gene_names(), &["MDM2".to_string()]);
    }

    #[test]
    fn source_returns_copy() {
        let m = sample_matrix();
        let loaded = m.load_measurements().unwrap();
        assert_eq!(loaded.shape(), m.shape());
    }

    #[test]
    fn summary() {
        let m = sample_matrix();
        assert_eq!(
            m.summary(),
            "MeasurementMatrix: 2 genes \u{00d7} 3 samples (1 missing)"
        );
    }

    #[test]
    fn empty_matrix() {
        let m = MeasurementMatrix::new(vec![], vec![], vec![]).unwrap();
        assert_eq!(m.shape(), (0, 0));
        assert_eq!(m.missing_count(), 0);
    }
}
