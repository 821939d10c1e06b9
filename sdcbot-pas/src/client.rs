//! Portable Antiquities Scheme database client
//!
//! Two calls per record: the image's JSON metadata, used to confirm the
//! id actually exists under the artefacts record type, and the image
//! download itself, hashed for comparison against the hosted file.

use async_trait::async_trait;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::time::{Duration, Instant};
use tracing::debug;

use sdcbot_common::{FetchError, Result};

const PAS_BASE_URL: &str = "https://finds.org.uk";

/// The database lookups the bot performs per record.
#[async_trait]
pub trait PasApi: Send + Sync {
    /// The id the database itself reports for this image record.
    async fn image_record_id(&self, image_id: &str) -> std::result::Result<String, FetchError>;

    /// SHA-1 hex digest of the downloadable image file.
    async fn download_sha1(&self, image_id: &str) -> std::result::Result<String, FetchError>;
}

pub struct PasClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PasClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(PasClient {
            http_client,
            base_url: PAS_BASE_URL.to_string(),
        })
    }

    async fn get(&self, path: &str) -> std::result::Result<reqwest::Response, FetchError> {
        let response = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(format!("{} does not exist", path)));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "PAS returned HTTP {}",
                status
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl PasApi for PasClient {
    async fn image_record_id(&self, image_id: &str) -> std::result::Result<String, FetchError> {
        let start = Instant::now();

        let response = self
            .get(&format!(
                "/database/images/image/id/{}/recordtype/artefacts/format/json",
                image_id
            ))
            .await?;
        let value: Value = response.json().await?;

        let id = value
            .pointer("/image/0/id")
            .and_then(scalar_text)
            .ok_or_else(|| {
                FetchError::Transient(format!("unexpected payload shape for image {}", image_id))
            })?;

        debug!(
            image_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved image record"
        );
        Ok(id)
    }

    async fn download_sha1(&self, image_id: &str) -> std::result::Result<String, FetchError> {
        let start = Instant::now();

        let response = self
            .get(&format!("/database/ajax/download/id/{}", image_id))
            .await?;
        let bytes = response.bytes().await?;

        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        debug!(
            image_id,
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Hashed image download"
        );
        Ok(digest)
    }
}

/// The database serializes ids as strings or numbers depending on the
/// endpoint.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_extraction() {
        let value = json!({"image": [{"id": "510624", "filename": "fincop.jpg"}]});
        assert_eq!(
            value.pointer("/image/0/id").and_then(scalar_text),
            Some("510624".to_string())
        );

        let numeric = json!({"image": [{"id": 510624}]});
        assert_eq!(
            numeric.pointer("/image/0/id").and_then(scalar_text),
            Some("510624".to_string())
        );

        let empty = json!({"image": []});
        assert_eq!(empty.pointer("/image/0/id").and_then(scalar_text), None);
    }

    #[test]
    fn test_sha1_digest_matches_known_value() {
        let mut hasher = Sha1::new();
        hasher.update(b"abc");
        assert_eq!(
            hex::encode(hasher.finalize()),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }
}
