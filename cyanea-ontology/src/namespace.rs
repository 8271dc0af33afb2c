//! GO namespaces and the namespace filter applied when loading.

use std::fmt;
use std::str::FromStr;

use cyanea_core::{CyaneaError, Result};

/// One of the three independent GO branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Namespace {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
}

impl Namespace {
    /// All namespaces, in GAF aspect order (P, F, C).
    pub const ALL: [Namespace; 3] = [
        Namespace::BiologicalProcess,
        Namespace::MolecularFunction,
        Namespace::CellularComponent,
    ];

    /// Full OBO name, e.g. `biological_process`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::BiologicalProcess => "biological_process",
            Namespace::MolecularFunction => "molecular_function",
            Namespace::CellularComponent => "cellular_component",
        }
    }

    /// Single-letter GAF aspect code.
    pub fn aspect(&self) -> char {
        match self {
            Namespace::BiologicalProcess => 'P',
            Namespace::MolecularFunction => 'F',
            Namespace::CellularComponent => 'C',
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = CyaneaError;

    /// Accepts full names and aspect codes, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "biological_process" | "p" => Ok(Namespace::BiologicalProcess),
            "molecular_function" | "f" => Ok(Namespace::MolecularFunction),
            "cellular_component" | "c" => Ok(Namespace::CellularComponent),
            other => Err(CyaneaError::Configuration(format!(
                "unknown GO namespace '{other}'"
            ))),
        }
    }
}

/// Which namespaces a run considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NamespaceFilter {
    /// A single branch.
    Only(Namespace),
    /// Every branch.
    #[default]
    All,
}

impl NamespaceFilter {
    /// Whether terms of `namespace` pass the filter.
    pub fn matches(&self, namespace: Namespace) -> bool {
        match self {
            NamespaceFilter::Only(ns) => *ns == namespace,
            NamespaceFilter::All => true,
        }
    }
}

impl fmt::Display for NamespaceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceFilter::Only(ns) => write!(f, "{ns}"),
            NamespaceFilter::All => f.write_str("all"),
        }
    }
}

impl FromStr for NamespaceFilter {
    type Err = CyaneaError;

    /// Accepts `p`, `f`, `c`, `all` or a full namespace name. Anything else
    /// is a configuration error.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(NamespaceFilter::All);
        }
        trimmed.parse::<Namespace>().map(NamespaceFilter::Only).map_err(|_| {
            CyaneaError::Configuration(format!(
                "namespace filter must be one of p, f, c, all, biological_process, \
                 molecular_function, cellular_component; got '{s}'"
            ))
        })
    }
}
