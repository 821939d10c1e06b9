//! Portable Antiquities Scheme source bot - Main entry point
//!
//! Walks the PAS category for files that still lack a database image id
//! and links them to their verified database record.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdcbot_common::cache::SqliteSkipCache;
use sdcbot_common::commons::CommonsClient;
use sdcbot_common::config::BotConfig;
use sdcbot_common::pipeline::{BotRunner, RunOptions};
use sdcbot_common::resolver::ItemResolver;
use sdcbot_common::wikidata::WikidataClient;

use sdcbot_pas::client::PasClient;
use sdcbot_pas::PasBot;

/// Command-line arguments for sdcbot-pas
#[derive(Parser, Debug)]
#[command(name = "sdcbot-pas")]
#[command(about = "Adds structured data to Portable Antiquities Scheme files")]
#[command(version)]
struct Args {
    /// Report the first delta without editing or caching
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of records to take from the listing
    #[arg(long)]
    limit: Option<usize>,

    /// Configuration file
    #[arg(short, long, env = "SDCBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sdcbot_pas=debug,sdcbot_common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config =
        BotConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.require_credentials()?;
    let user_agent = config.user_agent();

    let commons = Arc::new(CommonsClient::new(
        &config.commons.api_url,
        &config.commons.username,
        &user_agent,
    )?);
    commons
        .login(&config.commons.password)
        .await
        .context("Login failed")?;

    let cache = Arc::new(
        SqliteSkipCache::open(&config.cache.path)
            .await
            .context("Failed to open the skip cache")?,
    );
    let wikidata = Arc::new(WikidataClient::new(
        &config.wikidata.sparql_url,
        &user_agent,
    )?);
    let resolver = Arc::new(ItemResolver::new(wikidata));

    let pas = Arc::new(PasClient::new(&user_agent)?);
    let bot = PasBot::new(pas);

    let options = RunOptions {
        dry_run: args.dry_run,
        limit: args.limit,
        delay: Duration::from_secs(config.run.delay_seconds),
    };

    let runner = BotRunner::new(commons, cache, resolver, options);
    let stats = runner.run(&bot).await?;

    info!(
        processed = stats.processed,
        edited = stats.edited,
        skipped = stats.skipped,
        failed = stats.failed,
        "PAS run complete"
    );
    Ok(())
}
