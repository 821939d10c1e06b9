//! iNaturalist API client
//!
//! Wraps the public v1 observations endpoint. The payload is decoded
//! into typed structs and flattened into the few fields the bot reads:
//! attached photo ids, the observer, the quality grade and the chosen
//! taxon's ancestor chain.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

use sdcbot_common::{FetchError, Result};

const INATURALIST_API_URL: &str = "https://api.inaturalist.org/v1";

/// Observation data the bot consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Ids of the photos attached to this observation.
    pub photo_ids: Vec<String>,
    pub observer: Option<Observer>,
    /// Community vetting state; only `research` grade observations are
    /// trusted for depicts statements.
    pub quality_grade: String,
    /// Ancestor chain of the identified taxon, most specific last.
    pub ancestor_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
    pub id: String,
    /// Real name when set, login otherwise. Can be empty when the
    /// account carries neither.
    pub display_name: String,
}

/// The observation lookup the bot performs per record.
#[async_trait]
pub trait InaturalistApi: Send + Sync {
    async fn get_observation(
        &self,
        observation_id: &str,
    ) -> std::result::Result<Observation, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    #[serde(default)]
    results: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    #[serde(default)]
    observation_photos: Vec<RawObservationPhoto>,
    user: Option<RawUser>,
    #[serde(default)]
    quality_grade: String,
    #[serde(default)]
    preferences: RawPreferences,
    community_taxon: Option<RawTaxon>,
    taxon: Option<RawTaxon>,
}

#[derive(Debug, Deserialize)]
struct RawObservationPhoto {
    photo_id: u64,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: u64,
    login: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPreferences {
    prefers_community_taxon: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawTaxon {
    #[serde(default)]
    ancestor_ids: Vec<u64>,
}

impl RawObservation {
    fn normalize(self) -> Observation {
        let photo_ids = self
            .observation_photos
            .iter()
            .map(|p| p.photo_id.to_string())
            .collect();

        let observer = self.user.map(|user| Observer {
            id: user.id.to_string(),
            display_name: user
                .name
                .filter(|name| !name.trim().is_empty())
                .or(user.login)
                .unwrap_or_default(),
        });

        // The observer can pin the community's identification over their
        // own; honor that choice when picking the taxon to walk.
        let prefers_community = self.preferences.prefers_community_taxon.unwrap_or(false);
        let taxon = if prefers_community {
            debug!("Using the community taxon");
            self.community_taxon.or(self.taxon)
        } else {
            self.taxon
        };

        Observation {
            photo_ids,
            observer,
            quality_grade: self.quality_grade,
            ancestor_ids: taxon.map(|t| t.ancestor_ids).unwrap_or_default(),
        }
    }
}

pub struct InaturalistClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl InaturalistClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(InaturalistClient {
            http_client,
            api_url: INATURALIST_API_URL.to_string(),
        })
    }
}

#[async_trait]
impl InaturalistApi for InaturalistClient {
    async fn get_observation(
        &self,
        observation_id: &str,
    ) -> std::result::Result<Observation, FetchError> {
        let start = Instant::now();

        let response = self
            .http_client
            .get(format!("{}/observations/{}", self.api_url, observation_id))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(format!(
                "observation {} does not exist",
                observation_id
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "iNaturalist returned HTTP {}",
                status
            )));
        }

        let parsed: ObservationResponse = response.json().await?;
        let observation = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| {
                FetchError::NotFound(format!("observation {} has no results", observation_id))
            })?
            .normalize();

        debug!(
            observation_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved observation"
        );
        Ok(observation)
    }
}

// ============================================================================
// Tests
// ============================================================================
