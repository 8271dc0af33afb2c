//! Best-effort pathway enrichment of gene clusters.
//!
//! Enrichment annotates an otherwise finished clustering, so a failed or
//! empty lookup never fails the caller: the cluster gets the
//! [`NO_PATHWAY`] sentinel with p-value 1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cyanea_core::{CyaneaError, Result};
use cyanea_io::{parse_reactome_pathways, ReactomeUrl};

/// Term id and name reported for a cluster without enrichment.
pub const NO_PATHWAY: &str = "None";

/// One enriched pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayHit {
    pub id: String,
    pub name: String,
    pub p_value: f64,
}

/// Over-representation lookup: genes in, pathways out.
pub trait PathwayLookup {
    fn enrich(&self, genes: &[String], species: &str, include_disease: bool)
        -> Result<Vec<PathwayHit>>;
}

/// [`PathwayLookup`] against the Reactome Analysis Service.
///
/// The HTTP round trip is supplied by the caller as a `transport` closure
/// taking the URL and the request body and returning the response text.
pub struct ReactomeLookup<T> {
    transport: T,
    page_size: usize,
}

impl<T> ReactomeLookup<T>
where
    T: Fn(&str, &str) -> Result<String>,
{
    /// Ask for the single best pathway per query.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            page_size: 1,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl<T> PathwayLookup for ReactomeLookup<T>
where
    T: Fn(&str, &str) -> Result<String>,
{
    fn enrich(
        &self,
        genes: &[String],
        species: &str,
        include_disease: bool,
    ) -> Result<Vec<PathwayHit>> {
        let url = ReactomeUrl::identifiers(species, include_disease, self.page_size);
        let body = ReactomeUrl::identifiers_body(genes);
        let response = (self.transport)(&url, &body)
            .map_err(|e| CyaneaError::ExternalService(format!("Reactome request: {e}")))?;
        let pathways = parse_reactome_pathways(&response)
            .map_err(|e| CyaneaError::ExternalService(e.to_string()))?;
        Ok(pathways
            .into_iter()
            .map(|p| PathwayHit {
                id: p.st_id,
                name: p.name,
                p_value: p.p_value,
            })
            .collect())
    }
}

/// Enrichment columns of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEnrichment {
    pub cluster_id: String,
    pub size: usize,
    pub reactome_term: String,
    pub reactome_name: String,
    pub reactome_pval: f64,
}

impl ClusterEnrichment {
    fn none(cluster_id: &str, size: usize) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            size,
            reactome_term: NO_PATHWAY.into(),
            reactome_name: NO_PATHWAY.into(),
            reactome_pval: 1.0,
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.reactome_term != NO_PATHWAY
    }
}

/// Enrich one cluster with its lowest p-value pathway.
pub fn enrich_cluster<L>(
    lookup: &L,
    cluster_id: &str,
    genes: &[String],
    species: &str,
    include_disease: bool,
) -> ClusterEnrichment
where
    L: PathwayLookup + ?Sized,
{
    if genes.is_empty() {
        return ClusterEnrichment::none(cluster_id, 0);
    }
    debug!(cluster = cluster_id, genes = genes.len(), "enriching cluster");
    match lookup.enrich(genes, species, include_disease) {
        Ok(hits) => match hits.into_iter().min_by(|a, b| a.p_value.total_cmp(&b.p_value)) {
            Some(best) => ClusterEnrichment {
                cluster_id: cluster_id.to_string(),
                size: genes.len(),
                reactome_term: best.id,
                reactome_name: best.name,
                reactome_pval: best.p_value,
            },
            None => ClusterEnrichment::none(cluster_id, genes.len()),
        },
        Err(e) => {
            warn!(cluster = cluster_id, error = %e, "pathway lookup failed");
            ClusterEnrichment::none(cluster_id, genes.len())
        }
    }
}

/// Enrich every cluster, in iteration order.
pub fn enrich_clusters<'c, L, I>(
    lookup: &L,
    clusters: I,
    species: &str,
    include_disease: bool,
) -> Vec<ClusterEnrichment>
where
    L: PathwayLookup + ?Sized,
    I: IntoIterator<Item = (&'c String, &'c Vec<String>)>,
{
    clusters
        .into_iter()
        .map(|(id, genes)| enrich_cluster(lookup, id, genes, species, include_disease))
        .collect()
}

/// Group `(gene, cluster)` assignments into clusters, genes in input order.
pub fn group_clusters<I, G, C>(assignments: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = (G, C)>,
    G: Into<String>,
    C: Into<String>,
{
    let mut clusters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (gene, cluster) in assignments {
        clusters.entry(cluster.into()).or_default().push(gene.into());
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fixed(Vec<PathwayHit>);

    impl PathwayLookup for Fixed {
        fn enrich(&self, _: &[String], _: &str, _: bool) -> Result<Vec<PathwayHit>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl PathwayLookup for Failing {
        fn enrich(&self, _: &[String], _: &str, _: bool) -> Result<Vec<PathwayHit>> {
            Err(CyaneaError::ExternalService("503".into()))
        }
    }

    fn genes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn hit(id: &str, p: f64) -> PathwayHit {
        PathwayHit {
            id: id.into(),
            name: format!("{id} name"),
            p_value: p,
        }
    }

    #[test]
    fn best_hit_wins() {
        let lookup = Fixed(vec![hit("R-1", 0.2), hit("R-2", 0.001), hit("R-3", 0.05)]);
        let e = enrich_cluster(&lookup, "7", &genes(&["TP53", "BAX"]), "Homo sapiens", false);
        assert!(e.is_enriched());
        assert_eq!(e.reactome_term, "R-2");
        assert_eq!(e.reactome_name, "R-2 name");
        assert_eq!(e.reactome_pval, 0.001);
        assert_eq!(e.size, 2);
    }

    #[test]
    fn empty_result_gives_sentinel() {
        let e = enrich_cluster(&Fixed(vec![]), "1", &genes(&["A"]), "Homo sapiens", false);
        assert!(!e.is_enriched());
        assert_eq!(e.reactome_term, NO_PATHWAY);
        assert_eq!(e.reactome_name, NO_PATHWAY);
        assert_eq!(e.reactome_pval, 1.0);
    }

    #[test]
    fn service_error_gives_sentinel() {
        let e = enrich_cluster(&Failing, "1", &genes(&["A"]), "Homo sapiens", false);
        assert_eq!(e.reactome_term, NO_PATHWAY);
        assert_eq!(e.size, 1);
    }

    #[test]
    fn clusters_grouped_and_enriched() {
        let clusters = group_clusters([("TP53", "0"), ("KRAS", "1"), ("BAX", "0")]);
        assert_eq!(clusters["0"], vec!["TP53", "BAX"]);
        let lookup = Fixed(vec![hit("R-9", 0.01)]);
        let rows = enrich_clusters(&lookup, &clusters, "Homo sapiens", false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cluster_id, "0");
        assert_eq!(rows[0].size, 2);
        assert_eq!(rows[1].reactome_term, "R-9");
    }

    #[test]
    fn reactome_lookup_through_transport() {
        let calls = Cell::new(0);
        let lookup = ReactomeLookup::new(|url: &str, body: &str| {
            calls.set(calls.get() + 1);
            assert!(url.contains("pageSize=1"));
            assert_eq!(body, "TP53\nBAX");
            Ok(r#"{"pathways": [{"stId": "R-HSA-109581", "name": "Apoptosis",
                    "entities": {"pValue": 0.0004}}]}"#
                .to_string())
        });
        let e = enrich_cluster(&lookup, "0", &genes(&["TP53", "BAX"]), "Homo sapiens", false);
        assert_eq!(calls.get(), 1);
        assert_eq!(e.reactome_term, "R-HSA-109581");
        assert_eq!(e.reactome_pval, 0.0004);
    }

    #[test]
    fn reactome_garbage_is_external_error() {
        let lookup = ReactomeLookup::new(|_: &str, _: &str| Ok("<html>busy</html>".to_string()));
        let err = lookup
            .enrich(&genes(&["A"]), "Homo sapiens", false)
            .unwrap_err();
        assert!(matches!(err, CyaneaError::ExternalService(_)));
        let e = enrich_cluster(&lookup, "0", &genes(&["A"]), "Homo sapiens", false);
        assert!(!e.is_enriched());
    }
}
