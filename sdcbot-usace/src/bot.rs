//! USACE record treatment
//!
//! Everything the statements need is already on the record: the batch
//! transfer wrote the Digital Library date and landing page into a
//! Photograph or Book template, so treatment is wikitext in, wikitext
//! out, with no platform fetch in between.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use sdcbot_common::builder::{NoHooks, StatementBuilder};
use sdcbot_common::pipeline::{Record, RecordSource, SourceBot, TreatContext};
use sdcbot_common::statement::Statement;
use sdcbot_common::wikidata::{entities, properties};
use sdcbot_common::wikitext;
use sdcbot_common::{RecordError, Result};

use crate::dates;

/// Account that performed the batch transfer. Files uploaded by anyone
/// else carry hand-written descriptions with no reliable field layout.
const TRANSFER_ACCOUNT: &str = "CuratorBot";

/// Templates the transfer wrote the metadata into.
const METADATA_TEMPLATES: [&str; 2] = ["Photograph", "Book"];

/// Landing pages in the USACE Digital Library.
fn source_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://usace\.contentdm\.oclc\.org/digital/collection/p\d+coll\d+/id/\d+$")
            .expect("valid regex")
    })
}

#[derive(Default)]
pub struct UsaceBot;

impl UsaceBot {
    pub fn new() -> Self {
        UsaceBot
    }
}

#[async_trait]
impl SourceBot for UsaceBot {
    fn name(&self) -> &str {
        "usace"
    }

    fn record_source(&self) -> RecordSource {
        RecordSource::Search(format!(
            "deepcat:\"Images from USACE\" -haswbstatement:{}",
            properties::SOURCE_OF_FILE
        ))
    }

    fn edit_summary(&self) -> String {
        "add [[Commons:Structured data|SDC]] based on metadata. Task #3".to_string()
    }

    async fn should_process(&self, record: &Record, ctx: &TreatContext) -> Result<bool> {
        let uploader = ctx.commons.first_uploader(&record.title).await?;
        Ok(uploader.as_deref() == Some(TRANSFER_ACCOUNT))
    }

    async fn treat(
        &self,
        record: &Record,
        ctx: &TreatContext,
    ) -> std::result::Result<Vec<Statement>, RecordError> {
        let text = ctx.commons.wikitext(&record.title).await?;

        let invocation = wikitext::templates(&text)
            .into_iter()
            .find(|t| t.matches(&METADATA_TEMPLATES))
            .ok_or_else(|| {
                warn!("No Photograph or Book template");
                RecordError::Permanent("record has no metadata template".to_string())
            })?;

        let date = invocation.get("date");
        let source = invocation.get("source").unwrap_or_default();

        let index = ctx.commons.statements(&record.mid()).await?;
        let mut builder = StatementBuilder::new(&index, &NoHooks);

        match date {
            Some(field) => match dates::parse_inception(field) {
                Some(parsed) => {
                    builder.inception_with_precision(parsed.date, parsed.precision, parsed.circa)
                }
                None => warn!(date = field, "Unusable date field"),
            },
            None => debug!("No date field"),
        }

        if source_url_regex().is_match(source) {
            builder.source_statement(source, entities::USACE);
        } else if !source.is_empty() {
            debug!(source, "Source is not a Digital Library landing page");
        }

        Ok(builder.finish())
    }
}

// ============================================================================
// Tests
// ============================================================================
