//! Parquet tables for pairwise results and the propagated ontology.
//!
//! Each row type implements [`ShardRecord`], which fixes its Arrow schema
//! and converts between row slices and record batches. The same
//! conversions back single-file tables ([`write_table`], [`read_table`]) and
//! the sharded output of [`crate::shard`].
//!
//! | Row type | Columns |
//! |----------|---------|
//! | [`SimilarityResult`] | `gene1, gene2, sem_sim, term, term_size, term_name` |
//! | [`CorrelationRecord`] | `corr, p, gene1, gene2, n, p_fdr` |
//! | [`TermRow`] | `term_id, name, namespace, depth, annots, size, IC` |

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array as ArrowArray, ArrayRef, Float64Array, ListArray, ListBuilder, StringArray,
    StringBuilder, UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use cyanea_core::{CyaneaError, Result};
use cyanea_ontology::{Namespace, SharedTerm, SimilarityResult, TermRow, NO_SHARED_TERM};
use cyanea_stats::{CorrelationRecord, PairedCorrelation};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        CyaneaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

pub(crate) fn create_file(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| {
        CyaneaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

pub(crate) fn pq_err(e: impl std::fmt::Display, path: &Path) -> CyaneaError {
    CyaneaError::Parse(format!("{}: {e}", path.display()))
}

fn batch_err(e: impl std::fmt::Display) -> CyaneaError {
    CyaneaError::Parse(format!("record batch: {e}"))
}

/// Look up a column by name and downcast it.
fn column<'b, A: ArrowArray + 'static>(batch: &'b RecordBatch, name: &str) -> Result<&'b A> {
    batch
        .column_by_name(name)
        .ok_or_else(|| CyaneaError::Parse(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| CyaneaError::Parse(format!("unexpected type for column '{name}'")))
}

fn nullable(values: &Float64Array, i: usize) -> Option<f64> {
    (!values.is_null(i)).then(|| values.value(i))
}

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// A row type with a fixed Arrow schema.
pub trait ShardRecord: Sized {
    /// Schema every batch of this type uses.
    fn schema() -> SchemaRef;

    /// Convert rows into one record batch.
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;

    /// Convert a record batch back into rows. Columns are looked up by name.
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

// ---------------------------------------------------------------------------
// Similarity table
// ---------------------------------------------------------------------------

impl ShardRecord for SimilarityResult {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("gene1", DataType::Utf8, false),
            Field::new("gene2", DataType::Utf8, false),
            Field::new("sem_sim", DataType::Float64, false),
            Field::new("term", DataType::Utf8, false),
            // +inf when the pair shares no term.
            Field::new("term_size", DataType::Float64, false),
            Field::new("term_name", DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.gene_a))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.gene_b))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.similarity))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.term_id()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.term_size()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.term_name()))),
        ];
        RecordBatch::try_new(Self::schema(), columns).map_err(batch_err)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let gene1 = column::<StringArray>(batch, "gene1")?;
        let gene2 = column::<StringArray>(batch, "gene2")?;
        let sem_sim = column::<Float64Array>(batch, "sem_sim")?;
        let term = column::<StringArray>(batch, "term")?;
        let term_size = column::<Float64Array>(batch, "term_size")?;
        let term_name = column::<StringArray>(batch, "term_name")?;

        Ok((0..batch.num_rows())
            .map(|i| {
                if term.value(i) == NO_SHARED_TERM {
                    return SimilarityResult::unrelated(gene1.value(i), gene2.value(i));
                }
                SimilarityResult {
                    gene_a: gene1.value(i).to_string(),
                    gene_b: gene2.value(i).to_string(),
                    similarity: sem_sim.value(i),
                    shared: Some(SharedTerm {
                        id: term.value(i).to_string(),
                        size: term_size.value(i) as usize,
                        name: term_name.value(i).to_string(),
                    }),
                }
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Correlation table
// ---------------------------------------------------------------------------

impl ShardRecord for CorrelationRecord {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("corr", DataType::Float64, true),
            Field::new("p", DataType::Float64, true),
            Field::new("gene1", DataType::Utf8, false),
            Field::new("gene2", DataType::Utf8, false),
            Field::new("n", DataType::UInt64, false),
            Field::new("p_fdr", DataType::Float64, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let corr: Float64Array = rows.iter().map(|r| r.correlation.coefficient()).collect();
        let p: Float64Array = rows.iter().map(|r| r.correlation.p_value()).collect();
        let p_fdr: Float64Array = rows.iter().map(|r| r.p_fdr).collect();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(corr),
            Arc::new(p),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.gene_a))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.gene_b))),
            Arc::new(UInt64Array::from_iter_values(
                rows.iter().map(|r| r.correlation.n() as u64),
            )),
            Arc::new(p_fdr),
        ];
        RecordBatch::try_new(Self::schema(), columns).map_err(batch_err)
    }

    /// A null coefficient reads back as insufficient data when fewer than
    /// two samples were paired, and as constant input otherwise.
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let corr = column::<Float64Array>(batch, "corr")?;
        let p = column::<Float64Array>(batch, "p")?;
        let gene1 = column::<StringArray>(batch, "gene1")?;
        let gene2 = column::<StringArray>(batch, "gene2")?;
        let n = column::<UInt64Array>(batch, "n")?;
        let p_fdr = column::<Float64Array>(batch, "p_fdr")?;

        Ok((0..batch.num_rows())
            .map(|i| {
                let n = n.value(i) as usize;
                let correlation = match (nullable(corr, i), nullable(p, i)) {
                    (Some(coefficient), Some(p_value)) => PairedCorrelation::Defined {
                        coefficient,
                        p_value,
                        n,
                    },
                    _ if n < 2 => PairedCorrelation::InsufficientData { n },
                    _ => PairedCorrelation::ConstantInput { n },
                };
                CorrelationRecord {
                    gene_a: gene1.value(i).to_string(),
                    gene_b: gene2.value(i).to_string(),
                    correlation,
                    p_fdr: nullable(p_fdr, i),
                }
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Ontology term table
// ---------------------------------------------------------------------------

impl ShardRecord for TermRow {
    fn schema() -> SchemaRef {
        let gene = Arc::new(Field::new("item", DataType::Utf8, true));
        Arc::new(Schema::new(vec![
            Field::new("term_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("namespace", DataType::Utf8, false),
            Field::new("depth", DataType::UInt32, false),
            Field::new("annots", DataType::List(gene), false),
            Field::new("size", DataType::UInt64, false),
            Field::new("IC", DataType::Float64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let mut annots = ListBuilder::new(StringBuilder::new());
        for row in rows {
            for gene in &row.annots {
                annots.values().append_value(gene);
            }
            annots.append(true);
        }
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.term_id))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.name))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.namespace.as_str()),
            )),
            Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.depth))),
            Arc::new(annots.finish()),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.size as u64))),
            Arc::new(Float64Array::from_iter_values(
                rows.iter().map(|r| r.information_content),
            )),
        ];
        RecordBatch::try_new(Self::schema(), columns).map_err(batch_err)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let term_id = column::<StringArray>(batch, "term_id")?;
        let name = column::<StringArray>(batch, "name")?;
        let namespace = column::<StringArray>(batch, "namespace")?;
        let depth = column::<UInt32Array>(batch, "depth")?;
        let annots = column::<ListArray>(batch, "annots")?;
        let size = column::<UInt64Array>(batch, "size")?;
        let ic = column::<Float64Array>(batch, "IC")?;

        (0..batch.num_rows())
            .map(|i| {
                let genes = annots.value(i);
                let genes = genes
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| CyaneaError::Parse("expected Utf8 items in annots".into()))?;
                Ok(TermRow {
                    term_id: term_id.value(i).to_string(),
                    name: name.value(i).to_string(),
                    namespace: namespace.value(i).parse::<Namespace>()?,
                    depth: depth.value(i),
                    annots: genes.iter().flatten().map(str::to_string).collect(),
                    size: size.value(i) as usize,
                    information_content: ic.value(i),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Single-file tables
// ---------------------------------------------------------------------------

pub(crate) fn writer_properties(max_row_group_size: usize) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(max_row_group_size.max(1))
        .build()
}

/// Write `rows` to one Parquet file.
pub fn write_table<T: ShardRecord>(rows: &[T], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let batch = T::to_batch(rows)?;
    let file = create_file(path)?;
    let props = writer_properties(rows.len());
    let mut writer =
        ArrowWriter::try_new(file, T::schema(), Some(props)).map_err(|e| pq_err(e, path))?;
    writer.write(&batch).map_err(|e| pq_err(e, path))?;
    writer.close().map_err(|e| pq_err(e, path))?;
    Ok(())
}

/// Read every row of one Parquet file.
pub fn read_table<T: ShardRecord>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = open_file(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| pq_err(e, path))?
        .build()
        .map_err(|e| pq_err(e, path))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| pq_err(e, path))?;
        rows.extend(T::from_batch(&batch).map_err(|e| pq_err(e, path))?);
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Parquet info
// ---------------------------------------------------------------------------

/// Metadata about a Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetInfo {
    /// Total number of rows across all row groups.
    pub num_rows: usize,
    /// Column names from the schema.
    pub column_names: Vec<String>,
    /// Number of row groups in the file.
    pub num_row_groups: usize,
}

/// Extract metadata from a Parquet file without reading its data.
pub fn parquet_info(path: impl AsRef<Path>) -> Result<ParquetInfo> {
    let path = path.as_ref();
    let file = open_file(path)?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| pq_err(e, path))?;
    let metadata = builder.metadata();
    let file_meta = metadata.file_metadata();

    Ok(ParquetInfo {
        num_rows: file_meta.num_rows() as usize,
        column_names: builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect(),
        num_row_groups: metadata.num_row_groups(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_parquet() -> (NamedTempFile, std::path::PathBuf) {
        let f = NamedTempFile::new().unwrap();
        let p = f.path().with_extension("parquet");
        (f, p)
    }

    fn sample_similarities() -> Vec<SimilarityResult> {
        vec![
            SimilarityResult {
                gene_a: "TP53".into(),
                gene_b: "BAX".into(),
                similarity: 0.5,
                shared: Some(SharedTerm {
                    id: "GO:0006915".into(),
                    size: 4,
                    name: "apoptotic process".into(),
                }),
            },
            SimilarityResult::unrelated("TP53", "ACTB"),
        ]
    }

    fn sample_correlations() -> Vec<CorrelationRecord> {
        let mut defined = CorrelationRecord::new(
            "KRAS",
            "BRAF",
            PairedCorrelation::Defined {
                coefficient: 0.8,
                p_value: 0.01,
                n: 12,
            },
        );
        defined.p_fdr = Some(0.03);
        vec![
            defined,
            CorrelationRecord::new("KRAS", "MYC", PairedCorrelation::InsufficientData { n: 1 }),
            CorrelationRecord::new("BRAF", "MYC", PairedCorrelation::ConstantInput { n: 9 }),
        ]
    }

    #[test]
    fn similarity_roundtrip_keeps_sentinel() {
        let (_tmp, path) = temp_parquet();
        let rows = sample_similarities();
        write_table(&rows, &path).unwrap();
        let loaded: Vec<SimilarityResult> = read_table(&path).unwrap();
        assert_eq!(loaded, rows);
        assert_eq!(loaded[1].term_id(), NO_SHARED_TERM);
        assert!(loaded[1].term_size().is_infinite());
    }

    #[test]
    fn similarity_columns() {
        let (_tmp, path) = temp_parquet();
        write_table(&sample_similarities(), &path).unwrap();
        let info = parquet_info(&path).unwrap();
        assert_eq!(info.num_rows, 2);
        assert_eq!(
            info.column_names,
            vec!["gene1", "gene2", "sem_sim", "term", "term_size", "term_name"]
        );
    }

    #[test]
    fn correlation_roundtrip_with_nulls() {
        let (_tmp, path) = temp_parquet();
        let rows = sample_correlations();
        write_table(&rows, &path).unwrap();
        let loaded: Vec<CorrelationRecord> = read_table(&path).unwrap();
        assert_eq!(loaded, rows);
        assert_eq!(loaded[1].p_fdr, None);
        assert_eq!(
            parquet_info(&path).unwrap().column_names,
            vec!["corr", "p", "gene1", "gene2", "n", "p_fdr"]
        );
    }

    #[test]
    fn term_table_roundtrip() {
        let (_tmp, path) = temp_parquet();
        let rows = vec![
            TermRow {
                term_id: "GO:0008150".into(),
                name: "biological_process".into(),
                namespace: Namespace::BiologicalProcess,
                depth: 0,
                annots: vec!["ACTB".into(), "BAX".into(), "TP53".into()],
                size: 3,
                information_content: 1.0,
            },
            TermRow {
                term_id: "GO:0006915".into(),
                name: "apoptotic process".into(),
                namespace: Namespace::BiologicalProcess,
                depth: 1,
                annots: vec!["BAX".into(), "TP53".into()],
                size: 2,
                information_content: 2.0 / 3.0,
            },
        ];
        write_table(&rows, &path).unwrap();
        let loaded: Vec<TermRow> = read_table(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn empty_table() {
        let (_tmp, path) = temp_parquet();
        write_table::<CorrelationRecord>(&[], &path).unwrap();
        let loaded: Vec<CorrelationRecord> = read_table(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(parquet_info(&path).unwrap().num_rows, 0);
    }

    #[test]
    fn wrong_schema_is_a_parse_error() {
        let (_tmp, path) = temp_parquet();
        write_table(&sample_similarities(), &path).unwrap();
        let err = read_table::<CorrelationRecord>(&path).unwrap_err();
        assert!(err.to_string().contains("missing column 'corr'"));
    }

    #[test]
    fn nonexistent_file_error() {
        assert!(read_table::<SimilarityResult>("/nonexistent/file.parquet").is_err());
    }
}
