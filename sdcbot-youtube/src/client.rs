//! YouTube Data API client
//!
//! Wraps the two `snippet` lookups the bot needs: one for the video and
//! one for the channel's handle. Quota exhaustion surfaces as an HTTP
//! failure and is treated as transient, so affected records are retried
//! on a later run instead of being written off.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

use sdcbot_common::{FetchError, Result};

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Video metadata the bot consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct YouTubeVideo {
    pub id: String,
    /// Localized title when the API serves one, plain title otherwise.
    pub title: String,
    pub published: Option<NaiveDate>,
    pub channel_id: String,
    pub channel_title: String,
}

/// The YouTube lookups the bot performs per record.
#[async_trait]
pub trait YouTubeApi: Send + Sync {
    async fn get_video(&self, video_id: &str) -> std::result::Result<YouTubeVideo, FetchError>;

    /// The channel's handle without its `@` prefix. `None` when the
    /// channel is gone or carries no custom URL.
    async fn get_channel_handle(
        &self,
        channel_id: &str,
    ) -> std::result::Result<Option<String>, FetchError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoListResponse {
    page_info: PageInfoPayload,
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelListResponse {
    page_info: PageInfoPayload,
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfoPayload {
    #[serde(default)]
    total_results: i64,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    published_at: String,
    channel_id: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    title: String,
    localized: Option<LocalizedText>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    custom_url: Option<String>,
}

pub struct YouTubeClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_key: &str, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(YouTubeClient {
            http_client,
            api_url: YOUTUBE_API_URL.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn list(&self, resource: &str, id: &str) -> std::result::Result<reqwest::Response, FetchError> {
        let response = self
            .http_client
            .get(format!("{}/{}", self.api_url, resource))
            .query(&[
                ("part", "snippet"),
                ("id", id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Includes quota errors; never a statement about the video.
            return Err(FetchError::Transient(format!(
                "YouTube returned HTTP {}",
                status
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl YouTubeApi for YouTubeClient {
    async fn get_video(&self, video_id: &str) -> std::result::Result<YouTubeVideo, FetchError> {
        let start = Instant::now();

        let response = self.list("videos", video_id).await?;
        let parsed: VideoListResponse = response.json().await?;

        if parsed.page_info.total_results == 0 {
            return Err(FetchError::NotFound(format!(
                "video {} does not exist or is private",
                video_id
            )));
        }

        let snippet = parsed
            .items
            .into_iter()
            .next()
            .map(|item| item.snippet)
            .ok_or_else(|| {
                FetchError::Transient(format!("video {} listed but not returned", video_id))
            })?;

        let published = DateTime::parse_from_rfc3339(&snippet.published_at)
            .ok()
            .map(|dt| dt.date_naive());

        let title = match snippet.localized {
            Some(localized) if !localized.title.is_empty() => localized.title,
            _ => snippet.title,
        };

        debug!(
            video_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieved video"
        );

        Ok(YouTubeVideo {
            id: video_id.to_string(),
            title,
            published,
            channel_id: snippet.channel_id,
            channel_title: snippet.channel_title,
        })
    }

    async fn get_channel_handle(
        &self,
        channel_id: &str,
    ) -> std::result::Result<Option<String>, FetchError> {
        let response = self.list("channels", channel_id).await?;
        let parsed: ChannelListResponse = response.json().await?;

        // Anything but exactly one channel means the handle is unusable.
        if parsed.page_info.total_results != 1 {
            return Ok(None);
        }

        let handle = parsed
            .items
            .into_iter()
            .next()
            .and_then(|item| item.snippet.custom_url)
            .map(|url| url.trim_start_matches('@').to_string())
            .filter(|handle| !handle.is_empty());

        debug!(channel_id, handle = handle.as_deref(), "Retrieved channel");
        Ok(handle)
    }
}

// ============================================================================
// Tests
// ============================================================================
