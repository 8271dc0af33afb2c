//! Pipeline settings, loadable from JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cyanea_core::{CyaneaError, Result};
use cyanea_ontology::{EvidenceFilter, NamespaceFilter};
use cyanea_pairwise::EvaluatorConfig;

/// Settings shared by the similarity and correlation jobs.
///
/// Every field has a default, so a JSON file only needs the fields it
/// changes. An evaluator section given in JSON replaces the whole default
/// section; its own missing fields fall back to [`EvaluatorConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `p`, `f`, `c`, `all` or a full namespace name. Default `p`.
    pub namespace: String,
    /// Evidence codes dropped before propagation. Default `IEA`, `ND`.
    pub excluded_evidence: Vec<String>,
    /// Keep annotations that carry a qualifier (`NOT`, ...). Default off.
    pub keep_qualified: bool,
    /// Similarity evaluator. Default chunk 10 000, unordered.
    pub similarity: EvaluatorConfig,
    /// Correlation evaluator. Default chunk 100 000, unordered.
    pub correlation: EvaluatorConfig,
    /// Rows per output shard. Default 5 000 000.
    pub rows_per_shard: usize,
    /// Directory receiving every output table.
    pub output_dir: PathBuf,
    /// Species passed to the pathway lookup.
    pub species: String,
    /// Include disease pathways in enrichment.
    pub include_disease: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespace: "p".into(),
            excluded_evidence: vec!["IEA".into(), "ND".into()],
            keep_qualified: false,
            similarity: EvaluatorConfig::default(),
            correlation: EvaluatorConfig {
                chunk_size: 100_000,
                ..EvaluatorConfig::default()
            },
            rows_per_shard: 5_000_000,
            output_dir: PathBuf::from("processed_data"),
            species: "Homo sapiens".into(),
            include_disease: false,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CyaneaError::Configuration(format!("pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CyaneaError::Configuration(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Check every setting. Runs before any input is loaded.
    pub fn validate(&self) -> Result<()> {
        self.namespace_filter()?;
        self.similarity.validate()?;
        self.correlation.validate()?;
        if self.rows_per_shard == 0 {
            return Err(CyaneaError::Configuration(
                "rows_per_shard must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn namespace_filter(&self) -> Result<NamespaceFilter> {
        self.namespace.parse()
    }

    pub fn evidence_filter(&self) -> EvidenceFilter {
        EvidenceFilter {
            keep_qualified: self.keep_qualified,
            ..EvidenceFilter::excluding(self.excluded_evidence.iter().cloned())
        }
    }

    /// `output_dir/name`.
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}
