//! GO terms and the annotation records attached to them.

use std::collections::BTreeSet;

use cyanea_core::{Annotated, Summarizable};

use crate::namespace::Namespace;

/// Index of a gene in an [`OntologyGraph`](crate::OntologyGraph)'s gene table.
pub type GeneIdx = usize;

/// A node of the ontology.
///
/// The annotated-gene set is empty until the graph has been propagated;
/// `size` and `information_content` are derived from it in a second pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    id: String,
    name: String,
    namespace: Namespace,
    depth: u32,
    pub(crate) direct: BTreeSet<GeneIdx>,
    pub(crate) genes: BTreeSet<GeneIdx>,
    pub(crate) size: usize,
    pub(crate) information_content: f64,
}

impl Term {
    /// A term with no annotations yet.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        namespace: Namespace,
        depth: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            namespace,
            depth,
            direct: BTreeSet::new(),
            genes: BTreeSet::new(),
            size: 0,
            information_content: 0.0,
        }
    }

    /// Term identifier, e.g. `GO:0008150`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable term name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Distance from the namespace root (root = 0).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Genes annotated directly to this term.
    pub fn direct_genes(&self) -> &BTreeSet<GeneIdx> {
        &self.direct
    }

    /// Genes annotated to this term or any descendant.
    pub fn genes(&self) -> &BTreeSet<GeneIdx> {
        &self.genes
    }

    /// Number of (transitively) annotated genes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// `size / size(root)` of the term's namespace.
    pub fn information_content(&self) -> f64 {
        self.information_content
    }
}

impl Annotated for Term {
    fn name(&self) -> &str {
        Term::name(self)
    }
}

impl Summarizable for Term {
    fn summary(&self) -> String {
        format!(
            "{} {} [{}] depth={} size={}",
            self.id, self.name, self.namespace, self.depth, self.size
        )
    }
}

/// One raw gene → term assertion, as read from an annotation file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationRecord {
    /// Gene symbol.
    pub gene: String,
    /// Annotated term identifier.
    pub term: String,
    /// Evidence code, e.g. `IDA` or `IEA`.
    pub evidence: String,
    /// Qualifier column (`NOT`, `contributes_to`, ...), if any.
    pub qualifier: Option<String>,
    /// Branch the assertion belongs to, when the source records it.
    pub namespace: Option<Namespace>,
}

impl AnnotationRecord {
    /// An unqualified annotation with no recorded namespace.
    pub fn new(
        gene: impl Into<String>,
        term: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            gene: gene.into(),
            term: term.into(),
            evidence: evidence.into(),
            qualifier: None,
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

/// Evidence-code and qualifier filter applied before propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvidenceFilter {
    /// Evidence codes to drop.
    pub excluded_codes: BTreeSet<String>,
    /// Keep annotations that carry a qualifier.
    pub keep_qualified: bool,
}

impl Default for EvidenceFilter {
    /// Drops electronic (`IEA`) and no-data (`ND`) annotations and every
    /// qualified annotation.
    fn default() -> Self {
        Self::excluding(["IEA", "ND"])
    }
}

impl EvidenceFilter {
    /// Drop the given evidence codes and qualified annotations.
    pub fn excluding<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_codes: codes.into_iter().map(Into::into).collect(),
            keep_qualified: false,
        }
    }

    /// Keep everything.
    pub fn permissive() -> Self {
        Self {
            excluded_codes: BTreeSet::new(),
            keep_qualified: true,
        }
    }

    /// Whether `record` survives the filter.
    pub fn allows(&self, record: &AnnotationRecord) -> bool {
        if !self.keep_qualified && record.qualifier.is_some() {
            return false;
        }
        !self.excluded_codes.contains(&record.evidence)
    }
}
