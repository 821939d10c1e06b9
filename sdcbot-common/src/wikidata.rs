//! Wikidata vocabulary and item lookup
//!
//! Property and item identifiers the bots emit, plus a SPARQL client for
//! the one read the pipeline needs: "which items carry this external id".

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Properties used in emitted statements and discovery queries.
pub mod properties {
    pub const CREATOR: &str = "P170";
    pub const AUTHOR_NAME_STRING: &str = "P2093";
    pub const URL: &str = "P2699";
    pub const DESCRIBED_AT_URL: &str = "P973";
    pub const OPERATOR: &str = "P137";
    pub const SOURCE_OF_FILE: &str = "P7482";
    pub const INCEPTION: &str = "P571";
    pub const SOURCING_CIRCUMSTANCES: &str = "P1480";
    pub const PUBLICATION_DATE: &str = "P577";
    pub const PUBLISHED_IN: &str = "P1433";
    pub const COORDINATES_OF_POINT_OF_VIEW: &str = "P1259";
    pub const DEPICTS: &str = "P180";
    pub const STATED_IN: &str = "P248";
    pub const COPYRIGHT_LICENSE: &str = "P275";
    pub const TITLE: &str = "P1476";

    pub const FLICKR_PHOTO_ID: &str = "P12120";
    pub const FLICKR_USER_ID: &str = "P3267";
    pub const INATURALIST_TAXON_ID: &str = "P3151";
    pub const INATURALIST_OBSERVATION_ID: &str = "P5683";
    pub const INATURALIST_PHOTO_ID: &str = "P11693";
    pub const INATURALIST_USER_ID: &str = "P10626";
    pub const YOUTUBE_VIDEO_ID: &str = "P1651";
    pub const YOUTUBE_CHANNEL_ID: &str = "P2397";
    pub const YOUTUBE_HANDLE: &str = "P11245";
    pub const PAS_IMAGE_ID: &str = "P9324";
}

/// Items used as statement values and qualifier targets.
pub mod entities {
    pub const FILE_AVAILABLE_ON_INTERNET: &str = "Q74228490";
    pub const CIRCA: &str = "Q5727902";
    pub const FLICKR: &str = "Q103204";
    pub const INATURALIST: &str = "Q16958215";
    pub const YOUTUBE: &str = "Q866";
    pub const USACE: &str = "Q1049334";
}

/// Item lookup by external identifier.
#[async_trait]
pub trait WikidataApi: Send + Sync {
    /// All items whose `property` statement equals `value`. Zero, one and
    /// many results are all meaningful to callers.
    async fn items_with_external_id(&self, property: &str, value: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

#[derive(Debug, Deserialize)]
struct SparqlBinding {
    item: SparqlValue,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

/// SPARQL-backed implementation against the public query service.
pub struct WikidataClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl WikidataClient {
    pub fn new(endpoint: &str, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(WikidataClient {
            http_client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl WikidataApi for WikidataClient {
    async fn items_with_external_id(&self, property: &str, value: &str) -> Result<Vec<String>> {
        let query = format!(
            "SELECT DISTINCT ?item WHERE {{ ?item wdt:{} \"{}\". }}",
            property,
            value.replace('\\', "\\\\").replace('"', "\\\"")
        );

        tracing::debug!(property, value, "Querying the SPARQL endpoint");

        let start = Instant::now();
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("query", query.as_str()), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                code: status.as_u16().to_string(),
                info: body,
            });
        }

        let parsed: SparqlResponse = response.json().await?;

        let items: Vec<String> = parsed
            .results
            .bindings
            .into_iter()
            .filter_map(|binding| {
                binding
                    .item
                    .value
                    .rsplit('/')
                    .next()
                    .map(|id| id.to_string())
            })
            .collect();

        tracing::debug!(
            property,
            value,
            matches = items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "SPARQL lookup complete"
        );

        Ok(items)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = WikidataClient::new("https://query.wikidata.org/sparql", "test-agent");
        assert!(client.is_ok());
    }

    #[test]
    fn test_sparql_response_parsing() {
        let body = r#"{
            "results": {
                "bindings": [
                    {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q158942"}}
                ]
            }
        }"#;

        let parsed: SparqlResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.bindings.len(), 1);
        assert_eq!(
            parsed.results.bindings[0].item.value,
            "http://www.wikidata.org/entity/Q158942"
        );
    }
}
