//! Storage and exchange formats for the Cyanea pipelines.
//!
//! - **Parquet tables**: [`ShardRecord`] schemas for similarity,
//!   correlation and ontology term rows, via the `parquet` feature
//!   (enabled by default)
//! - **Sharded output**: [`ShardedWriter`] and [`read_shards`], result
//!   tables split into row-limited shards with completion markers
//! - **Ontology export**: term table and `gene_terms.json`
//! - **Reactome**: analysis URL builder and response parser (no HTTP
//!   client)

#[cfg(feature = "parquet")]
pub mod parquet;

#[cfg(feature = "parquet")]
pub mod shard;

#[cfg(feature = "parquet")]
pub mod export;

pub mod reactome;

#[cfg(feature = "parquet")]
pub use parquet::{parquet_info, read_table, write_table, ParquetInfo, ShardRecord};

#[cfg(feature = "parquet")]
pub use shard::{
    is_complete, read_manifest, read_shards, ReadOptions, ShardManifest, ShardSummary,
    ShardedWriter, INCOMPLETE_MARKER, SUCCESS_MARKER,
};

#[cfg(feature = "parquet")]
pub use export::{
    gene_terms_from_json, gene_terms_to_json, read_gene_terms, read_term_table,
    write_gene_terms, write_term_table,
};

pub use reactome::{parse_reactome_pathways, ReactomePathway, ReactomeUrl};
