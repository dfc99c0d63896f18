use crate::domain::stock::{AnalystAction, BatchOutcome, NewAnalystAction};
use anyhow::Context;

pub mod memory;
pub mod stocks;
pub mod sync_runs;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Keyed storage for analyst actions. Upserts are keyed on `(ticker, time)`.
#[async_trait::async_trait]
pub trait StockRepository: Send + Sync {
    /// All rows, newest event first.
    async fn get_all(&self) -> anyhow::Result<Vec<AnalystAction>>;

    /// Newest row for `ticker`, if any.
    async fn get_by_ticker(&self, ticker: &str) -> anyhow::Result<Option<AnalystAction>>;

    /// Insert-or-overwrite of the non-key, non-fundamentals fields.
    ///
    /// A failure on an individual row is logged and counted in `skipped`; an `Err` means the
    /// whole batch was rolled back.
    async fn upsert_batch(&self, items: &[NewAnalystAction]) -> anyhow::Result<BatchOutcome>;

    /// Overwrites every mutable field of the row with `action.id`.
    async fn update(&self, action: &AnalystAction) -> anyhow::Result<()>;

    /// Number of `(ticker, time)` groups holding more than one row.
    async fn count_key_duplicates(&self) -> anyhow::Result<i64>;

    /// Newest buy-side actions ("Buy", "Strong Buy", "Upgrade").
    async fn top_rated(&self, limit: i64) -> anyhow::Result<Vec<AnalystAction>>;
}

pub(crate) const TOP_RATED_ACTIONS: [&str; 3] = ["Buy", "Strong Buy", "Upgrade"];
