//! Portable Antiquities Scheme record treatment
//!
//! The database id is recovered from the file description's external
//! links. The claim is only written when the description names exactly
//! one image and the database's copy of that image hashes to the same
//! SHA-1 as the hosted file, so mislinked transfers never get an id.

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{info, warn};

use sdcbot_common::builder::{NoHooks, StatementBuilder};
use sdcbot_common::pipeline::{Record, RecordSource, SourceBot, TreatContext};
use sdcbot_common::statement::Statement;
use sdcbot_common::wikidata::properties;
use sdcbot_common::wikitext;
use sdcbot_common::RecordError;

use crate::client::PasApi;

/// Link shapes that carry the database image id.
fn id_regexes() -> &'static [Regex; 2] {
    static RES: OnceLock<[Regex; 2]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"^https?://finds\.org\.uk/database/ajax/download/id/(\d+)/?")
                .expect("valid regex"),
            Regex::new(
                r"^https?://finds\.org\.uk/database/images/image/id/(\d+)/recordtype/artefacts/?",
            )
            .expect("valid regex"),
        ]
    })
}

pub struct PasBot {
    pas: Arc<dyn PasApi>,
}

impl PasBot {
    pub fn new(pas: Arc<dyn PasApi>) -> Self {
        PasBot { pas }
    }

    /// Image ids named by the record's external links, deduplicated.
    fn linked_image_ids(text: &str) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();

        for link in wikitext::external_links(text) {
            let url = link.trim();
            for regex in id_regexes() {
                if let Some(captures) = regex.captures(url) {
                    if let Some(id) = captures.get(1) {
                        ids.insert(id.as_str().to_string());
                        break;
                    }
                }
            }
        }

        ids
    }
}

#[async_trait]
impl SourceBot for PasBot {
    fn name(&self) -> &str {
        "pas"
    }

    fn record_source(&self) -> RecordSource {
        RecordSource::Search(format!(
            "file: incategory:\"Portable Antiquities Scheme\" -haswbstatement:{}",
            properties::PAS_IMAGE_ID
        ))
    }

    fn edit_summary(&self) -> String {
        "add [[Commons:Structured data|SDC]] based on metadata from Portable Antiquities Scheme Database"
            .to_string()
    }

    async fn treat(
        &self,
        record: &Record,
        ctx: &TreatContext,
    ) -> std::result::Result<Vec<Statement>, RecordError> {
        let text = ctx.commons.wikitext(&record.title).await?;

        let ids = Self::linked_image_ids(&text);
        let mut iter = ids.iter();
        let image_id = match (iter.next(), iter.next()) {
            (Some(id), None) => id.clone(),
            _ => {
                warn!(ids = ?ids, "Expected exactly one linked image id");
                return Err(RecordError::Permanent(format!(
                    "found {} image ids in external links",
                    ids.len()
                )));
            }
        };
        info!(image_id, "Linked image");

        let reported_id = self.pas.image_record_id(&image_id).await?;
        if reported_id != image_id {
            warn!(image_id, reported_id = %reported_id, "Database reports a different id");
            return Err(RecordError::Permanent(format!(
                "database reports id {} for image {}",
                reported_id, image_id
            )));
        }

        let download_hash = self.pas.download_sha1(&image_id).await?;
        let file_hash = ctx
            .commons
            .file_sha1(&record.title)
            .await?
            .ok_or_else(|| RecordError::Permanent("file has no hash".to_string()))?;

        if download_hash != file_hash {
            warn!(
                image_id,
                download_hash = %download_hash,
                file_hash = %file_hash,
                "Download does not match the hosted file"
            );
            return Err(RecordError::Permanent(
                "database image differs from the hosted file".to_string(),
            ));
        }

        let index = ctx.commons.statements(&record.mid()).await?;
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.id_statement(properties::PAS_IMAGE_ID, &image_id);

        Ok(builder.finish())
    }
}

// ============================================================================
// Tests
// ============================================================================
