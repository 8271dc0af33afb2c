//! Reactome Analysis Service: URL builder and response parser.
//!
//! No HTTP client is included. Callers POST [`ReactomeUrl::identifiers_body`]
//! to [`ReactomeUrl::identifiers`] with whatever client they use, then hand
//! the JSON response to [`parse_reactome_pathways`].

use serde::Deserialize;

use cyanea_core::{CyaneaError, Result};

// ---------------------------------------------------------------------------
// Percent-encoding helper
// ---------------------------------------------------------------------------

/// Percent-encode common special characters in a query string value.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 2);
    for b in input.bytes() {
        match b {
            b' ' => out.push_str("%20"),
            b'&' => out.push_str("%26"),
            b'=' => out.push_str("%3D"),
            b'+' => out.push_str("%2B"),
            b'#' => out.push_str("%23"),
            _ => out.push(b as char),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// URL builder
// ---------------------------------------------------------------------------

/// URL builder for the Reactome Analysis Service.
pub struct ReactomeUrl;

impl ReactomeUrl {
    const BASE: &'static str = "https://reactome.org/AnalysisService";

    /// Over-representation analysis of an identifier list, projected to
    /// human, best pathways first.
    ///
    /// ```
    /// use cyanea_io::reactome::ReactomeUrl;
    /// let url = ReactomeUrl::identifiers("Homo sapiens", false, 1);
    /// assert!(url.contains("species=Homo%20sapiens"));
    /// assert!(url.contains("includeDisease=false"));
    /// ```
    pub fn identifiers(species: &str, include_disease: bool, page_size: usize) -> String {
        format!(
            "{}/identifiers/projection?interactors=false&pageSize={}&page=1\
             &sortBy=ENTITIES_PVALUE&order=ASC&resource=TOTAL&species={}&includeDisease={}",
            Self::BASE,
            page_size,
            percent_encode(species),
            include_disease,
        )
    }

    /// Request body for [`identifiers`](Self::identifiers): one identifier
    /// per line.
    pub fn identifiers_body<S: AsRef<str>>(genes: &[S]) -> String {
        genes
            .iter()
            .map(|g| g.as_ref().trim())
            .filter(|g| !g.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Response parser
// ---------------------------------------------------------------------------

/// One enriched pathway.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactomePathway {
    /// Stable identifier, e.g. `R-HSA-109581`.
    pub st_id: String,
    pub name: String,
    /// Entities p-value.
    pub p_value: f64,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    pathways: Vec<PathwayEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathwayEntry {
    st_id: String,
    name: String,
    entities: Entities,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entities {
    p_value: f64,
}

/// Parse an analysis response into pathways sorted by p-value, smallest
/// first. A response without pathways gives an empty list.
pub fn parse_reactome_pathways(json: &str) -> Result<Vec<ReactomePathway>> {
    let response: AnalysisResponse = serde_json::from_str(json)
        .map_err(|e| CyaneaError::Parse(format!("Reactome response: {e}")))?;
    let mut pathways: Vec<ReactomePathway> = response
        .pathways
        .into_iter()
        .map(|p| ReactomePathway {
            st_id: p.st_id,
            name: p.name,
            p_value: p.entities.p_value,
        })
        .collect();
    pathways.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
    Ok(pathways)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "summary": {"token": "abc", "type": "OVERREPRESENTATION"},
        "pathways": [
            {"stId": "R-HSA-69488", "name": "Cell Cycle", "entities": {"pValue": 0.02, "found": 3}},
            {"stId": "R-HSA-109581", "name": "Apoptosis", "entities": {"pValue": 0.0004, "found": 5}}
        ]
    }"#;

    #[test]
    fn identifiers_url() {
        let url = ReactomeUrl::identifiers("Homo sapiens", true, 5);
        assert!(url.starts_with("https://reactome.org/AnalysisService/identifiers/projection?"));
        assert!(url.contains("pageSize=5"));
        assert!(url.contains("includeDisease=true"));
    }

    #[test]
    fn body_is_one_gene_per_line() {
        assert_eq!(
            ReactomeUrl::identifiers_body(&["TP53", " BAX ", ""]),
            "TP53\nBAX"
        );
    }

    #[test]
    fn pathways_sorted_by_p_value() {
        let pathways = parse_reactome_pathways(RESPONSE).unwrap();
        assert_eq!(pathways.len(), 2);
        assert_eq!(pathways[0].st_id, "R-HSA-109581");
        assert_eq!(pathways[0].name, "Apoptosis");
        assert_eq!(pathways[0].p_value, 0.0004);
    }

    #[test]
    fn no_pathways() {
        assert!(parse_reactome_pathways(r#"{"pathways": []}"#).unwrap().is_empty());
        assert!(parse_reactome_pathways("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_response() {
        assert!(parse_reactome_pathways("<html>").is_err());
        assert!(parse_reactome_pathways(r#"{"pathways": [{"stId": "x"}]}"#).is_err());
    }
}
