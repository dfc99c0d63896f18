use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpick_core::cancel::CancelFlag;
use stockpick_core::config::Settings;
use stockpick_core::enrich::{self, EnrichOptions, Enricher};
use stockpick_core::fundamentals::alphavantage::AlphaVantageClient;
use stockpick_core::ingest::provider::{FeedClient, HttpFeedClient};
use stockpick_core::ingest::sync::{StockSyncer, SyncOptions};
use stockpick_core::recommend::{self, Recommender};
use stockpick_core::storage::memory::MemoryStockRepository;
use stockpick_core::storage::stocks::PgStockRepository;
use stockpick_core::storage::StockRepository;

#[derive(Debug, Parser)]
#[command(name = "stockpick_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull the full analyst feed and upsert it.
    Sync {
        /// Fetch and validate only; nothing is written.
        #[arg(long)]
        dry_run: bool,
    },
    /// Attach fundamentals to stale tickers.
    Enrich {
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print ranked recommendations as JSON.
    Recommend {
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Report `(ticker, time)` groups holding more than one row.
    Duplicates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("ctrl-c received; stopping at the next checkpoint");
                cancel.cancel();
            }
        });
    }

    let result = run(&settings, args.command, &cancel).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run(settings: &Settings, command: Command, cancel: &CancelFlag) -> anyhow::Result<()> {
    match command {
        Command::Sync { dry_run: true } => {
            let feed: Arc<dyn FeedClient> = Arc::new(HttpFeedClient::from_settings(settings)?);
            let syncer = StockSyncer::new(
                feed,
                Arc::new(MemoryStockRepository::new()),
                SyncOptions::from_env(),
            );
            let (valid, fetched) = syncer.fetch_validated(cancel).await?;
            tracing::info!(
                fetched,
                valid = valid.len(),
                discarded = fetched - valid.len(),
                dry_run = true,
                "analyst feed sync (dry-run)"
            );
            Ok(())
        }
        Command::Sync { dry_run: false } => {
            let pool = connect(settings).await?;
            let feed: Arc<dyn FeedClient> = Arc::new(HttpFeedClient::from_settings(settings)?);
            let provider = feed.provider_name();
            let repo: Arc<dyn StockRepository> = Arc::new(PgStockRepository::new(pool.clone()));

            let result = StockSyncer::new(feed, repo, SyncOptions::from_env())
                .sync_all(cancel)
                .await;

            let err_text = result.as_ref().err().map(|e| format!("{e:#}"));
            let run_id = stockpick_core::storage::sync_runs::record_sync_run(
                &pool,
                provider,
                result.as_ref().ok(),
                err_text.as_deref(),
            )
            .await?;

            let report = result?;
            tracing::info!(
                %run_id,
                upserted = report.upserted,
                skipped = report.skipped,
                "sync run recorded"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Enrich { limit } => {
            let pool = connect(settings).await?;
            let repo: Arc<dyn StockRepository> = Arc::new(PgStockRepository::new(pool));
            let client = Arc::new(AlphaVantageClient::from_settings(settings)?);

            let stats = Enricher::new(repo, client, EnrichOptions::from_env())
                .enrich(enrich::resolve_limit(limit), cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::Recommend { limit } => {
            let pool = connect(settings).await?;
            let repo: Arc<dyn StockRepository> = Arc::new(PgStockRepository::new(pool));
            let client = Arc::new(AlphaVantageClient::from_settings(settings)?);

            let response = Recommender::new(repo, client)
                .recommend(recommend::resolve_limit(limit))
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Duplicates => {
            let pool = connect(settings).await?;
            let repo = PgStockRepository::new(pool);
            let groups = repo.count_key_duplicates().await?;
            if groups > 0 {
                tracing::warn!(groups, "duplicate (ticker, time) groups found");
            } else {
                tracing::info!("no duplicate (ticker, time) groups");
            }
            println!("{groups}");
            Ok(())
        }
    }
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stockpick_core::storage::migrate(&pool).await?;
    Ok(pool)
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
