//! Flickr API client
//!
//! Wraps `flickr.photos.getInfo`, the one call the bot needs. Flickr's
//! JSON serializes most scalars as strings and some as numbers depending
//! on the field and era of the photo, so the payload is normalized
//! leniently instead of decoded into a rigid shape.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use sdcbot_common::builder::{CameraLocation, CaptureDate, DateGranularity};
use sdcbot_common::{FetchError, Result};

const FLICKR_API_URL: &str = "https://api.flickr.com/services/rest/";

/// Flickr's failure codes for `getInfo`.
const CODE_NOT_FOUND: i64 = 1;
const CODE_PERMISSION_DENIED: i64 = 2;

/// Photo metadata the bot consumes, normalized from the API payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FlickrPhoto {
    pub id: String,
    pub owner: FlickrUser,
    /// Photo page URL, the canonical place the file is described.
    pub page_url: String,
    pub taken: Option<CaptureDate>,
    pub posted: Option<NaiveDate>,
    pub location: Option<CameraLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlickrUser {
    /// NSID, the stable account identifier.
    pub id: String,
    pub username: String,
    pub realname: Option<String>,
    pub profile_url: String,
}

impl FlickrUser {
    /// Real name when the account has one, handle otherwise.
    pub fn display_name(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.username)
    }
}

/// The Flickr lookup the bot performs per record.
#[async_trait]
pub trait FlickrApi: Send + Sync {
    async fn get_photo(&self, photo_id: &str) -> std::result::Result<FlickrPhoto, FetchError>;
}

pub struct FlickrClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl FlickrClient {
    pub fn new(api_key: &str, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(FlickrClient {
            http_client,
            api_url: FLICKR_API_URL.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl FlickrApi for FlickrClient {
    async fn get_photo(&self, photo_id: &str) -> std::result::Result<FlickrPhoto, FetchError> {
        let start = Instant::now();

        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[
                ("method", "flickr.photos.getInfo"),
                ("api_key", self.api_key.as_str()),
                ("photo_id", photo_id),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "Flickr returned HTTP {}",
                status
            )));
        }

        let value: Value = response.json().await?;
        if let Some(failure) = api_failure(&value) {
            return Err(failure);
        }

        let photo = value
            .get("photo")
            .and_then(normalize_photo)
            .ok_or_else(|| {
                FetchError::Transient(format!("unexpected payload shape for photo {}", photo_id))
            })?;

        debug!(
            photo_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved Flickr photo"
        );
        Ok(photo)
    }
}

// ============================================================================
// Payload normalization
// ============================================================================

/// The error envelope, when `stat` is not `ok`.
fn api_failure(value: &Value) -> Option<FetchError> {
    if value.get("stat").and_then(Value::as_str) == Some("ok") {
        return None;
    }

    let code = value.get("code").and_then(Value::as_i64).unwrap_or(-1);
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown failure")
        .to_string();

    Some(match code {
        CODE_NOT_FOUND => FetchError::NotFound(message),
        CODE_PERMISSION_DENIED => FetchError::Forbidden(message),
        _ => FetchError::Transient(format!("Flickr error {}: {}", code, message)),
    })
}

fn normalize_photo(photo: &Value) -> Option<FlickrPhoto> {
    let id = text(photo.get("id")?)?;
    let owner = normalize_owner(photo.get("owner")?)?;

    let page_url = photo
        .pointer("/urls/url")
        .and_then(Value::as_array)
        .and_then(|urls| {
            urls.iter()
                .find(|u| u.get("type").and_then(Value::as_str) == Some("photopage"))
        })
        .and_then(|u| u.get("_content"))
        .and_then(text)
        .unwrap_or_else(|| format!("https://www.flickr.com/photos/{}/{}/", owner.id, id));

    let dates = photo.get("dates");
    let taken = dates.and_then(normalize_taken);
    let posted = dates
        .and_then(|d| d.get("posted"))
        .and_then(integer)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.date_naive());

    let location = photo.get("location").and_then(normalize_location);

    Some(FlickrPhoto {
        id,
        owner,
        page_url,
        taken,
        posted,
        location,
    })
}

fn normalize_owner(owner: &Value) -> Option<FlickrUser> {
    let id = text(owner.get("nsid")?)?;
    let username = owner
        .get("username")
        .and_then(text)
        .unwrap_or_default();
    let realname = owner
        .get("realname")
        .and_then(text)
        .filter(|name| !name.trim().is_empty());
    let path_alias = owner
        .get("path_alias")
        .and_then(text)
        .filter(|alias| !alias.is_empty());

    let profile_url = format!(
        "https://www.flickr.com/people/{}/",
        path_alias.as_deref().unwrap_or(&id)
    );

    Some(FlickrUser {
        id,
        username,
        realname,
        profile_url,
    })
}

fn normalize_taken(dates: &Value) -> Option<CaptureDate> {
    let raw = dates.get("taken").and_then(text)?;
    let code = dates.get("takengranularity").and_then(integer)?;

    let granularity = match code {
        0 => DateGranularity::Second,
        4 => DateGranularity::Month,
        6 => DateGranularity::Year,
        8 => DateGranularity::Approximate,
        other => {
            error!(granularity = other, taken = %raw, "Unrecognised date granularity");
            return None;
        }
    };

    Some(CaptureDate {
        date: parse_taken(&raw)?,
        granularity,
    })
}

/// Parse a `taken` timestamp. Coarse-granularity photos can carry zeroed
/// month or day components, which stand in for "unknown".
fn parse_taken(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }

    let mut parts = raw.split(|c| c == '-' || c == ' ');
    let year: i32 = parts.next()?.parse().ok()?;
    let month = parts
        .next()
        .and_then(|p| p.parse().ok())
        .filter(|&m| m >= 1)
        .unwrap_or(1);
    let day = parts
        .next()
        .and_then(|p| p.parse().ok())
        .filter(|&d| d >= 1)
        .unwrap_or(1);

    NaiveDate::from_ymd_opt(year, month, day)
}

fn normalize_location(location: &Value) -> Option<CameraLocation> {
    let latitude = location.get("latitude").and_then(number)?;
    let longitude = location.get("longitude").and_then(number)?;
    let accuracy = location.get("accuracy").and_then(integer)?;

    Some(CameraLocation {
        latitude,
        longitude,
        // Out-of-range levels become 0, which the statement builder
        // rejects visibly.
        accuracy: u8::try_from(accuracy).unwrap_or(0),
    })
}

/// String out of a JSON scalar that may be either a string or a number.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
