use crate::cancel::CancelFlag;
use crate::config::env_or;
use crate::domain::stock::NewAnalystAction;
use crate::ingest::provider::{fetch_all_pages, FeedClient, PaginationOptions};
use crate::ingest::types::FeedItem;
use crate::storage::StockRepository;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_BATCH_PAUSE_MS: u64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub pagination: PaginationOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: Duration::from_millis(DEFAULT_BATCH_PAUSE_MS),
            pagination: PaginationOptions::default(),
        }
    }
}

impl SyncOptions {
    pub fn from_env() -> Self {
        Self {
            batch_size: env_or("SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            batch_pause: Duration::from_millis(env_or(
                "SYNC_BATCH_PAUSE_MS",
                DEFAULT_BATCH_PAUSE_MS,
            )),
            pagination: PaginationOptions::from_env(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub valid: usize,
    pub discarded: usize,
    pub batches: usize,
    pub upserted: u64,
    pub skipped: u64,
}

/// Pulls the full analyst feed and upserts it into the store.
pub struct StockSyncer {
    feed: Arc<dyn FeedClient>,
    repo: Arc<dyn StockRepository>,
    opts: SyncOptions,
}

impl StockSyncer {
    pub fn new(
        feed: Arc<dyn FeedClient>,
        repo: Arc<dyn StockRepository>,
        opts: SyncOptions,
    ) -> Self {
        Self { feed, repo, opts }
    }

    /// Fetches and validates without touching the store.
    pub async fn fetch_validated(
        &self,
        cancel: &CancelFlag,
    ) -> anyhow::Result<(Vec<NewAnalystAction>, usize)> {
        let items = fetch_all_pages(self.feed.as_ref(), self.opts.pagination, cancel)
            .await
            .with_context(|| format!("fetch from {} failed", self.feed.provider_name()))?;
        let fetched = items.len();
        let valid = validate_actions(items);
        Ok((valid, fetched))
    }

    pub async fn sync_all(&self, cancel: &CancelFlag) -> anyhow::Result<SyncReport> {
        let (valid, fetched) = self.fetch_validated(cancel).await?;

        let mut report = SyncReport {
            fetched,
            valid: valid.len(),
            discarded: fetched - valid.len(),
            ..Default::default()
        };

        if report.discarded > 0 {
            tracing::warn!(
                discarded = report.discarded,
                fetched,
                "discarded invalid feed records"
            );
        }

        let total_batches = valid.len().div_ceil(self.opts.batch_size);
        for (idx, chunk) in valid.chunks(self.opts.batch_size).enumerate() {
            let batch_idx = idx + 1;
            let t0 = std::time::Instant::now();

            let outcome = self
                .repo
                .upsert_batch(chunk)
                .await
                .with_context(|| format!("upsert batch {batch_idx}/{total_batches} failed"))?;

            report.batches += 1;
            report.upserted += outcome.upserted;
            report.skipped += outcome.skipped;

            tracing::debug!(
                batch_idx,
                total_batches,
                batch_size = chunk.len(),
                upserted = outcome.upserted,
                skipped = outcome.skipped,
                elapsed_ms = t0.elapsed().as_millis(),
                "analyst action batch upsert"
            );

            if batch_idx < total_batches {
                tokio::time::sleep(self.opts.batch_pause).await;
            }
        }

        tracing::info!(
            fetched = report.fetched,
            valid = report.valid,
            discarded = report.discarded,
            batches = report.batches,
            upserted = report.upserted,
            skipped = report.skipped,
            "analyst feed sync finished"
        );

        Ok(report)
    }
}

/// Feed timestamps at or before the Unix epoch are placeholders for "unset"; this covers both
/// `1970-01-01T00:00:00Z` and `0001-01-01T00:00:00Z`.
const MIN_VALID_TIMESTAMP: i64 = 0;

/// Keeps records with a non-empty ticker and company and a real timestamp, preserving order.
pub fn validate_actions(items: Vec<FeedItem>) -> Vec<NewAnalystAction> {
    items
        .into_iter()
        .filter_map(|item| {
            let ticker = item.ticker.trim();
            let company = item.company.trim();
            if ticker.is_empty() || company.is_empty() {
                return None;
            }
            let time = item.time.filter(|t| t.timestamp() > MIN_VALID_TIMESTAMP)?;

            Some(NewAnalystAction {
                ticker: ticker.to_string(),
                company: company.to_string(),
                action: item.action,
                brokerage: item.brokerage,
                rating_from: item.rating_from,
                rating_to: item.rating_to,
                target_from: item.target_from,
                target_to: item.target_to,
                time,
            })
        })
        .collect()
}
