//! YouTube record treatment
//!
//! Candidates come from a search over license-reviewed video files that
//! still lack a video id statement. Besides the usual additive
//! statements this bot performs the one sanctioned edit of existing
//! data: filling in missing title and author qualifiers on a lone
//! license statement, with the title's language detected from its text.

use async_trait::async_trait;
use lingua::{LanguageDetector, LanguageDetectorBuilder};
use std::sync::Arc;
use tracing::{debug, info};

use sdcbot_common::builder::{Creator, StatementBuilder, StatementHooks};
use sdcbot_common::pipeline::{Record, RecordSource, SourceBot, TreatContext};
use sdcbot_common::statement::{Snak, Statement};
use sdcbot_common::wikidata::{entities, properties};
use sdcbot_common::wikitext;
use sdcbot_common::RecordError;

use crate::client::YouTubeApi;

/// Review template carrying the video id.
const REVIEW_TEMPLATE: &str = "YouTubeReview";

pub struct YouTubeBot {
    youtube: Arc<dyn YouTubeApi>,
    detector: LanguageDetector,
}

/// Creator statements get the channel's handle and id as qualifiers.
struct YouTubeHooks {
    handle: Option<String>,
    channel_id: String,
}

impl StatementHooks for YouTubeHooks {
    fn on_build_creator(&self, statement: &mut Statement) {
        if let Some(handle) = &self.handle {
            statement.add_qualifier(Snak::string(properties::YOUTUBE_HANDLE, handle));
        }
        statement.add_qualifier(Snak::string(
            properties::YOUTUBE_CHANNEL_ID,
            &self.channel_id,
        ));
    }
}

impl YouTubeBot {
    pub fn new(youtube: Arc<dyn YouTubeApi>) -> Self {
        // Building the detector loads every language model; one instance
        // serves the whole run.
        let detector = LanguageDetectorBuilder::from_all_languages().build();
        YouTubeBot { youtube, detector }
    }

    /// ISO 639-1 code of the title's language, when detection comes to a
    /// verdict. Titles in undetectable languages get no title qualifier.
    fn title_language(&self, title: &str) -> Option<String> {
        let language = self.detector.detect_language_of(title)?;
        let code = language.iso_code_639_1().to_string().to_lowercase();
        debug!(title, code, "Detected title language");
        Some(code)
    }
}

#[async_trait]
impl SourceBot for YouTubeBot {
    fn name(&self) -> &str {
        "youtube"
    }

    fn record_source(&self) -> RecordSource {
        RecordSource::Search(format!(
            "file: deepcat:\"License reviewed by YouTubeReviewBot\" filemime:video \
             hastemplate:\"YouTubeReview\" -haswbstatement:{}",
            properties::YOUTUBE_VIDEO_ID
        ))
    }

    fn edit_summary(&self) -> String {
        "add [[Commons:Structured data|SDC]] based on metadata from YouTube. Test run."
            .to_string()
    }

    async fn treat(
        &self,
        record: &Record,
        ctx: &TreatContext,
    ) -> std::result::Result<Vec<Statement>, RecordError> {
        let text = ctx.commons.wikitext(&record.title).await?;

        let video_id = wikitext::first_template_value(&text, &[REVIEW_TEMPLATE], &["id"])
            .ok_or_else(|| {
                RecordError::Permanent("review template has no video id".to_string())
            })?;
        info!(video_id, "Transfer source");

        let video = self.youtube.get_video(&video_id).await?;
        let handle = self.youtube.get_channel_handle(&video.channel_id).await?;

        let index = ctx.commons.statements(&record.mid()).await?;
        let creator_item = ctx
            .resolver
            .resolve_one(properties::YOUTUBE_CHANNEL_ID, &video.channel_id)
            .await?;

        let hooks = YouTubeHooks {
            handle,
            channel_id: video.channel_id.clone(),
        };
        let mut builder = StatementBuilder::new(&index, &hooks);

        builder.id_statement(properties::YOUTUBE_VIDEO_ID, &video.id);
        builder.published_in_statement(entities::YOUTUBE, video.published);
        builder.creator_statement(&Creator {
            display_name: video.channel_title.clone(),
            profile_url: None,
            item: creator_item,
        });
        builder.source_statement(
            &format!("https://www.youtube.com/watch?v={}", video.id),
            entities::YOUTUBE,
        );

        // Only detect a language when there is a license statement to
        // complete.
        let language = if index.has(properties::COPYRIGHT_LICENSE) {
            self.title_language(&video.title)
        } else {
            None
        };
        builder.complete_license_qualifiers(
            language.as_deref().map(|code| (video.title.as_str(), code)),
            &video.channel_title,
        );

        Ok(builder.finish())
    }
}
