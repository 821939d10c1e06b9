//! iNaturalist record treatment
//!
//! Candidates come from a search for files carrying both the source
//! template and the review template but no photo id statement yet. The
//! depicts statement is derived from the observation's taxon: the
//! ancestor chain is walked from the most specific level upward until
//! exactly one knowledge-base item matches.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{info, warn};

use sdcbot_common::builder::{Creator, StatementBuilder, StatementHooks};
use sdcbot_common::pipeline::{Record, RecordSource, SourceBot, TreatContext};
use sdcbot_common::resolver::Resolution;
use sdcbot_common::statement::{Snak, Statement};
use sdcbot_common::wikidata::{entities, properties};
use sdcbot_common::wikitext;
use sdcbot_common::{RecordError, Result};

use crate::client::{InaturalistApi, Observation};

/// Review states under which the upload is trusted.
const ACCEPTED_STATUSES: [&str; 2] = ["pass", "pass-change"];

fn photo_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://www\.inaturalist\.org/photos/(\d+)").expect("valid regex")
    })
}

pub struct INaturalistBot {
    inaturalist: Arc<dyn InaturalistApi>,
}

/// Creator statements get the observer's account id as a qualifier;
/// depicts statements get a stated-in reference, since the taxon comes
/// from the platform's identification rather than the file itself.
struct INaturalistHooks {
    observer_id: Option<String>,
}

impl StatementHooks for INaturalistHooks {
    fn on_build_creator(&self, statement: &mut Statement) {
        if let Some(id) = &self.observer_id {
            statement.add_qualifier(Snak::string(properties::INATURALIST_USER_ID, id));
        }
    }

    fn on_build_depicts(&self, statement: &mut Statement) {
        statement.add_reference(vec![Snak::item(
            properties::STATED_IN,
            entities::INATURALIST,
        )]);
    }
}

impl INaturalistBot {
    pub fn new(inaturalist: Arc<dyn InaturalistApi>) -> Self {
        INaturalistBot { inaturalist }
    }

    /// Walk the ancestor chain from the most specific taxon upward and
    /// return the first level with exactly one matching item. A level
    /// with no match falls through to the next coarser one; a level
    /// matching several items ends the walk with nothing, because
    /// picking one would be a guess.
    async fn resolve_depicts(
        &self,
        observation: &Observation,
        ctx: &TreatContext,
    ) -> Result<Option<String>> {
        if observation.quality_grade != "research" {
            warn!(
                grade = %observation.quality_grade,
                "Observation is not research grade, leaving depicts out"
            );
            return Ok(None);
        }

        for &taxon_id in observation.ancestor_ids.iter().rev() {
            let resolution = ctx
                .resolver
                .resolve(properties::INATURALIST_TAXON_ID, &taxon_id.to_string())
                .await?;

            match resolution {
                Resolution::None => continue,
                Resolution::One(item) => {
                    info!(taxon_id, item = %item, "Resolved taxon");
                    return Ok(Some(item));
                }
                Resolution::Ambiguous => {
                    warn!(taxon_id, "Taxon id matches multiple items, not guessing");
                    return Ok(None);
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl SourceBot for INaturalistBot {
    fn name(&self) -> &str {
        "inaturalist"
    }

    fn record_source(&self) -> RecordSource {
        RecordSource::Search(format!(
            "file: hastemplate:iNaturalist hastemplate:iNaturalistReview -haswbstatement:{}",
            properties::INATURALIST_PHOTO_ID
        ))
    }

    fn edit_summary(&self) -> String {
        "add [[Commons:Structured data|SDC]] based on metadata from iNaturalist. Test run."
            .to_string()
    }

    /// Files this account already edited are left alone, without a cache
    /// mark: a later upload pass may make them treatable again.
    async fn should_process(&self, record: &Record, ctx: &TreatContext) -> Result<bool> {
        let contributors = ctx.commons.contributors(&record.title).await?;
        Ok(!contributors.iter().any(|c| c == ctx.commons.username()))
    }

    async fn treat(
        &self,
        record: &Record,
        ctx: &TreatContext,
    ) -> std::result::Result<Vec<Statement>, RecordError> {
        let text = ctx.commons.wikitext(&record.title).await?;

        let status = wikitext::first_template_value(&text, &["iNaturalistReview"], &["status"])
            .ok_or_else(|| {
                RecordError::Permanent("review template has no status".to_string())
            })?;
        if !ACCEPTED_STATUSES.contains(&status.as_str()) {
            warn!(status = %status, "Review did not pass");
            return Err(RecordError::Permanent(format!(
                "review status is {}",
                status
            )));
        }

        let observation_id =
            wikitext::first_template_value(&text, &["iNaturalist"], &["id", "1"]).ok_or_else(
                || RecordError::Permanent("source template has no observation id".to_string()),
            )?;
        let photo_url = wikitext::first_template_value(&text, &["iNaturalistReview"], &["sourceurl"])
            .ok_or_else(|| {
                RecordError::Permanent("review template has no source URL".to_string())
            })?;

        let photo_id = photo_url_regex()
            .captures(&photo_url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                warn!(url = %photo_url, "Source URL is not an observation photo");
                RecordError::Permanent("source URL is not an observation photo".to_string())
            })?;
        info!(photo_id, observation_id, "Transfer source");

        let observation = self.inaturalist.get_observation(&observation_id).await?;

        if !observation.photo_ids.contains(&photo_id) {
            return Err(RecordError::Permanent(
                "photo is not attached to the observation".to_string(),
            ));
        }

        let index = ctx.commons.statements(&record.mid()).await?;
        let depicts = self.resolve_depicts(&observation, ctx).await?;

        let creator_item = match &observation.observer {
            Some(observer) => {
                ctx.resolver
                    .resolve_one(properties::INATURALIST_USER_ID, &observer.id)
                    .await?
            }
            None => None,
        };

        let hooks = INaturalistHooks {
            observer_id: observation.observer.as_ref().map(|o| o.id.clone()),
        };
        let mut builder = StatementBuilder::new(&index, &hooks);

        builder.id_statement(properties::INATURALIST_PHOTO_ID, &photo_id);
        builder.id_statement(properties::INATURALIST_OBSERVATION_ID, &observation_id);
        builder.source_statement(
            &format!("https://www.inaturalist.org/photos/{}", photo_id),
            entities::INATURALIST,
        );
        builder.depicts_statement(depicts.as_deref());

        if let Some(observer) = &observation.observer {
            builder.creator_statement(&Creator {
                display_name: observer.display_name.clone(),
                profile_url: None,
                item: creator_item,
            });
        }

        Ok(builder.finish())
    }
}
