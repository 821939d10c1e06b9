//! Record discovery and processing loop
//!
//! `BotRunner` owns the shared machinery of a run: listing records,
//! consulting the skip cache, pacing requests, calling the bot's
//! per-record treatment and acting on its outcome. Bots implement
//! [`SourceBot`] and only decide what a single record needs.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::{record_key, DryRunCache, SkipCache};
use crate::commons::CommonsApi;
use crate::error::{RecordError, Result};
use crate::resolver::ItemResolver;
use crate::statement::Statement;

/// How a bot discovers its records.
pub enum RecordSource {
    /// CirrusSearch query over the file namespace.
    Search(String),
    /// A maintenance category, bare name without the namespace prefix.
    Category(String),
}

/// One file under treatment.
#[derive(Debug, Clone)]
pub struct Record {
    pub pageid: u64,
    pub title: String,
}

impl Record {
    /// The media entity id of this file.
    pub fn mid(&self) -> String {
        format!("M{}", self.pageid)
    }
}

/// Collaborators a bot works through while treating a record.
pub struct TreatContext {
    pub commons: Arc<dyn CommonsApi>,
    pub cache: Arc<dyn SkipCache>,
    pub resolver: Arc<ItemResolver>,
}

/// A source-platform bot: discovery plus per-record treatment.
#[async_trait]
pub trait SourceBot: Send + Sync {
    /// Short name, also the skip-cache key prefix.
    fn name(&self) -> &str;

    fn record_source(&self) -> RecordSource;

    fn edit_summary(&self) -> String;

    /// Cheap pre-gate before treatment. Returning `false` skips the
    /// record without marking it, so it is re-examined next run.
    async fn should_process(&self, _record: &Record, _ctx: &TreatContext) -> Result<bool> {
        Ok(true)
    }

    /// Produce the statement delta for one record. An empty delta means
    /// the record is settled; errors say whether it is settled for good.
    async fn treat(
        &self,
        record: &Record,
        ctx: &TreatContext,
    ) -> std::result::Result<Vec<Statement>, RecordError>;
}

/// Knobs for one run.
pub struct RunOptions {
    /// Report the first delta instead of submitting, and write nothing.
    pub dry_run: bool,
    /// Cap on records taken from the listing.
    pub limit: Option<usize>,
    /// Minimum spacing between record treatments.
    pub delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            dry_run: false,
            limit: None,
            delay: Duration::from_secs(10),
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Records treated to completion.
    pub processed: u64,
    /// Records that received an edit.
    pub edited: u64,
    /// Records skipped, via cache, pre-gate or permanent outcome.
    pub skipped: u64,
    /// Records abandoned on a transient failure.
    pub failed: u64,
}

/// Drives one bot over its record listing.
pub struct BotRunner {
    commons: Arc<dyn CommonsApi>,
    cache: Arc<dyn SkipCache>,
    resolver: Arc<ItemResolver>,
    options: RunOptions,
}

impl BotRunner {
    pub fn new(
        commons: Arc<dyn CommonsApi>,
        cache: Arc<dyn SkipCache>,
        resolver: Arc<ItemResolver>,
        options: RunOptions,
    ) -> Self {
        // In a dry run every cache write is discarded, including the ones
        // bots issue themselves during treatment.
        let cache: Arc<dyn SkipCache> = if options.dry_run {
            Arc::new(DryRunCache::new(cache))
        } else {
            cache
        };

        BotRunner {
            commons,
            cache,
            resolver,
            options,
        }
    }

    pub async fn run(&self, bot: &dyn SourceBot) -> Result<RunStats> {
        let records = self.list_records(bot).await?;
        info!(bot = bot.name(), records = records.len(), "Starting run");

        let ctx = TreatContext {
            commons: self.commons.clone(),
            cache: self.cache.clone(),
            resolver: self.resolver.clone(),
        };

        let mut stats = RunStats::default();
        let mut last_treat: Option<Instant> = None;

        for record in records {
            let key = record_key(bot.name(), &record.mid());

            if self.cache.is_marked(&key).await? {
                debug!(title = %record.title, "Skipping, already settled");
                stats.skipped += 1;
                continue;
            }

            match bot.should_process(&record, &ctx).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(title = %record.title, "Skipping, pre-gate declined");
                    stats.skipped += 1;
                    continue;
                }
                Err(err) => {
                    warn!(title = %record.title, error = %err, "Pre-gate failed");
                    stats.failed += 1;
                    continue;
                }
            }

            self.pace(&mut last_treat).await;

            info!(title = %record.title, mid = %record.mid(), "Treating record");

            match bot.treat(&record, &ctx).await {
                Ok(delta) if delta.is_empty() => {
                    info!(title = %record.title, "Nothing to add");
                    self.cache.mark(&key).await?;
                    stats.processed += 1;

                    if self.options.dry_run {
                        break;
                    }
                }
                Ok(delta) => {
                    stats.processed += 1;

                    if self.options.dry_run {
                        let rendered = serde_json::to_string_pretty(&delta)?;
                        info!(
                            title = %record.title,
                            statements = delta.len(),
                            "Dry run, would submit:\n{}",
                            rendered
                        );
                        break;
                    }

                    match self
                        .commons
                        .submit_statements(&record.mid(), &delta, &bot.edit_summary())
                        .await
                    {
                        Ok(()) => {
                            self.cache.mark(&key).await?;
                            stats.edited += 1;
                        }
                        Err(err) => {
                            error!(title = %record.title, error = %err, "Submission failed");
                            stats.failed += 1;
                        }
                    }
                }
                Err(err) => {
                    warn!(title = %record.title, error = %err, "Record abandoned");
                    if err.marks_cache() {
                        self.cache.mark(&key).await?;
                        stats.skipped += 1;
                    } else {
                        stats.failed += 1;
                    }
                }
            }
        }

        info!(
            bot = bot.name(),
            processed = stats.processed,
            edited = stats.edited,
            skipped = stats.skipped,
            failed = stats.failed,
            "Run finished"
        );
        Ok(stats)
    }

    async fn list_records(&self, bot: &dyn SourceBot) -> Result<Vec<Record>> {
        let hits = match bot.record_source() {
            RecordSource::Search(query) => {
                self.commons.search_files(&query, self.options.limit).await?
            }
            RecordSource::Category(category) => {
                self.commons
                    .category_members(&category, self.options.limit)
                    .await?
            }
        };

        Ok(hits
            .into_iter()
            .map(|hit| Record {
                pageid: hit.pageid,
                title: hit.title,
            })
            .collect())
    }

    /// Enforce the inter-record spacing.
    async fn pace(&self, last_treat: &mut Option<Instant>) {
        if let Some(previous) = *last_treat {
            let elapsed = previous.elapsed();
            if elapsed < self.options.delay {
                let wait = self.options.delay - elapsed;
                debug!("Pacing: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last_treat = Some(Instant::now());
    }
}
