//! Flickr record treatment
//!
//! Candidates come from a maintenance category. A record is only usable
//! when it passed license review and its review template names a single
//! photo the Flickr API still serves; everything else is settled
//! permanently so the category drains over time.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use sdcbot_common::builder::{Creator, StatementBuilder, StatementHooks};
use sdcbot_common::cache::photo_key;
use sdcbot_common::pipeline::{Record, RecordSource, SourceBot, TreatContext};
use sdcbot_common::statement::{Snak, Statement};
use sdcbot_common::wikidata::{entities, properties};
use sdcbot_common::wikitext;
use sdcbot_common::{FetchError, RecordError};

use crate::client::{FlickrApi, FlickrPhoto};
use crate::url::{parse_photo_url, FlickrUrl};

/// Maintenance category listing candidate records.
const SOURCE_CATEGORY: &str = "Flickr images missing SDC creator";
/// Only files with a completed license review are safe to describe.
const REVIEWED_CATEGORY: &str = "Flickr images reviewed by FlickreviewR 2";
/// Review template carrying the transfer source URL.
const REVIEW_TEMPLATE: &str = "FlickreviewR";

pub struct FlickrBot {
    flickr: Arc<dyn FlickrApi>,
}

/// Creator statements get the owner's account id as a qualifier.
struct FlickrHooks {
    owner_id: String,
}

impl StatementHooks for FlickrHooks {
    fn on_build_creator(&self, statement: &mut Statement) {
        statement.add_qualifier(Snak::string(properties::FLICKR_USER_ID, &self.owner_id));
    }
}

impl FlickrBot {
    pub fn new(flickr: Arc<dyn FlickrApi>) -> Self {
        FlickrBot { flickr }
    }

    /// Photo lookup with the negative cache in front of it. Permanently
    /// unavailable photos are remembered under their own key, so the
    /// lookup is not repeated even from another record.
    async fn fetch_photo(
        &self,
        photo_id: &str,
        ctx: &TreatContext,
    ) -> Result<FlickrPhoto, RecordError> {
        let key = photo_key(self.name(), photo_id);

        if ctx.cache.is_marked(&key).await? {
            return Err(RecordError::Permanent(format!(
                "photo {} known to be unavailable",
                photo_id
            )));
        }

        match self.flickr.get_photo(photo_id).await {
            Ok(photo) => Ok(photo),
            Err(err @ (FetchError::NotFound(_) | FetchError::Forbidden(_))) => {
                warn!(photo_id, error = %err, "Photo unavailable");
                ctx.cache.mark(&key).await?;
                Err(err.into_record_error())
            }
            Err(err) => Err(err.into_record_error()),
        }
    }
}

#[async_trait]
impl SourceBot for FlickrBot {
    fn name(&self) -> &str {
        "flickr"
    }

    fn record_source(&self) -> RecordSource {
        RecordSource::Category(SOURCE_CATEGORY.to_string())
    }

    fn edit_summary(&self) -> String {
        "add [[Commons:Structured data|SDC]] based on metadata from Flickr. Task #2".to_string()
    }

    async fn treat(
        &self,
        record: &Record,
        ctx: &TreatContext,
    ) -> Result<Vec<Statement>, RecordError> {
        let categories = ctx.commons.categories(&record.title).await?;
        if !categories.iter().any(|c| c == REVIEWED_CATEGORY) {
            return Err(RecordError::Permanent(
                "file has not passed license review".to_string(),
            ));
        }

        let text = ctx.commons.wikitext(&record.title).await?;
        let reviews: Vec<_> = wikitext::templates(&text)
            .into_iter()
            .filter(|t| t.matches(&[REVIEW_TEMPLATE]))
            .collect();

        let review = match reviews.as_slice() {
            [single] => single,
            _ => {
                return Err(RecordError::Permanent(
                    "expected exactly one review template".to_string(),
                ))
            }
        };

        let source_url = review.get("sourceurl").ok_or_else(|| {
            RecordError::Permanent("review template has no source URL".to_string())
        })?;
        info!(url = source_url, "Transfer source");

        let photo_id = match parse_photo_url(source_url) {
            FlickrUrl::SinglePhoto { photo_id } => photo_id,
            FlickrUrl::Other => {
                return Err(RecordError::Permanent(
                    "source URL does not point at a single photo".to_string(),
                ))
            }
        };

        let photo = self.fetch_photo(&photo_id, ctx).await?;

        let index = ctx.commons.statements(&record.mid()).await?;
        let creator_item = ctx
            .resolver
            .resolve_one(properties::FLICKR_USER_ID, &photo.owner.id)
            .await?;

        let hooks = FlickrHooks {
            owner_id: photo.owner.id.clone(),
        };
        let mut builder = StatementBuilder::new(&index, &hooks);

        builder.id_statement(properties::FLICKR_PHOTO_ID, &photo.id);
        builder.creator_statement(&Creator {
            display_name: photo.owner.display_name().to_string(),
            profile_url: Some(photo.owner.profile_url.clone()),
            item: creator_item,
        });
        builder.source_statement(&photo.page_url, entities::FLICKR);

        if let Some(location) = &photo.location {
            builder.location_statement(location);
        }
        if let Some(taken) = &photo.taken {
            builder.inception_statement(taken);
        }
        builder.published_in_statement(entities::FLICKR, photo.posted);

        Ok(builder.finish())
    }
}
