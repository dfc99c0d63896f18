use crate::domain::stock::{AnalystAction, BatchOutcome, Fundamentals, NewAnalystAction};
use crate::storage::{StockRepository, TOP_RATED_ACTIONS};
use anyhow::Context;
use chrono::{DateTime, Utc};

const SELECT_COLUMNS: &str = "SELECT id, ticker, company, action, brokerage, \
     rating_from, rating_to, target_from, target_to, time, created_at, updated_at, \
     current_price, volume, market_cap, pe_ratio, week_high_52, week_low_52, eps, book_value, \
     dividend_yield, sector, industry, enriched_at \
     FROM stocks";

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: i64,
    ticker: String,
    company: String,
    action: String,
    brokerage: String,
    rating_from: String,
    rating_to: String,
    target_from: String,
    target_to: String,
    time: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    current_price: Option<f64>,
    volume: Option<i64>,
    market_cap: Option<i64>,
    pe_ratio: Option<f64>,
    week_high_52: Option<f64>,
    week_low_52: Option<f64>,
    eps: Option<f64>,
    book_value: Option<f64>,
    dividend_yield: Option<f64>,
    sector: Option<String>,
    industry: Option<String>,
    enriched_at: Option<DateTime<Utc>>,
}

impl From<StockRow> for AnalystAction {
    fn from(row: StockRow) -> Self {
        Self {
            id: row.id,
            ticker: row.ticker,
            company: row.company,
            action: row.action,
            brokerage: row.brokerage,
            rating_from: row.rating_from,
            rating_to: row.rating_to,
            target_from: row.target_from,
            target_to: row.target_to,
            time: row.time,
            created_at: row.created_at,
            updated_at: row.updated_at,
            fundamentals: Fundamentals {
                current_price: row.current_price,
                volume: row.volume,
                market_cap: row.market_cap,
                pe_ratio: row.pe_ratio,
                week_high_52: row.week_high_52,
                week_low_52: row.week_low_52,
                eps: row.eps,
                book_value: row.book_value,
                dividend_yield: row.dividend_yield,
                sector: row.sector,
                industry: row.industry,
                enriched_at: row.enriched_at,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgStockRepository {
    pool: sqlx::PgPool,
}

impl PgStockRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StockRepository for PgStockRepository {
    async fn get_all(&self) -> anyhow::Result<Vec<AnalystAction>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY time DESC, id ASC"
        ))
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select stocks failed")?;

        Ok(rows.into_iter().map(AnalystAction::from).collect())
    }

    async fn get_by_ticker(&self, ticker: &str) -> anyhow::Result<Option<AnalystAction>> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            "{SELECT_COLUMNS} WHERE ticker = $1 ORDER BY time DESC LIMIT 1"
        ))
        .persistent(false)
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select stock by ticker {ticker} failed"))?;

        Ok(row.map(AnalystAction::from))
    }

    async fn upsert_batch(&self, items: &[NewAnalystAction]) -> anyhow::Result<BatchOutcome> {
        if items.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        let mut outcome = BatchOutcome::default();

        for item in items {
            // A failed statement poisons the surrounding Postgres transaction, so each row gets
            // its own savepoint and a bad row is rolled back alone.
            sqlx::query("SAVEPOINT upsert_item")
                .execute(&mut *tx)
                .await
                .context("savepoint failed")?;

            let res = sqlx::query(
                "INSERT INTO stocks (ticker, company, action, brokerage, rating_from, rating_to, \
                                     target_from, target_to, time, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now()) \
                 ON CONFLICT (ticker, time) DO UPDATE SET \
                   company = EXCLUDED.company, \
                   action = EXCLUDED.action, \
                   brokerage = EXCLUDED.brokerage, \
                   rating_from = EXCLUDED.rating_from, \
                   rating_to = EXCLUDED.rating_to, \
                   target_from = EXCLUDED.target_from, \
                   target_to = EXCLUDED.target_to, \
                   updated_at = now()",
            )
            .persistent(false)
            .bind(&item.ticker)
            .bind(&item.company)
            .bind(&item.action)
            .bind(&item.brokerage)
            .bind(&item.rating_from)
            .bind(&item.rating_to)
            .bind(&item.target_from)
            .bind(&item.target_to)
            .bind(item.time)
            .execute(&mut *tx)
            .await;

            match res {
                Ok(_) => {
                    sqlx::query("RELEASE SAVEPOINT upsert_item")
                        .execute(&mut *tx)
                        .await
                        .context("release savepoint failed")?;
                    outcome.upserted += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        ticker = %item.ticker,
                        time = %item.time,
                        error = %err,
                        "analyst action upsert failed; skipping row"
                    );
                    sqlx::query("ROLLBACK TO SAVEPOINT upsert_item")
                        .execute(&mut *tx)
                        .await
                        .context("rollback to savepoint failed")?;
                    outcome.skipped += 1;
                }
            }
        }

        tx.commit().await.context("commit transaction failed")?;
        Ok(outcome)
    }

    async fn update(&self, action: &AnalystAction) -> anyhow::Result<()> {
        let f = &action.fundamentals;
        let res = sqlx::query(
            "UPDATE stocks SET \
               company = $2, action = $3, brokerage = $4, rating_from = $5, rating_to = $6, \
               target_from = $7, target_to = $8, \
               current_price = $9, volume = $10, market_cap = $11, pe_ratio = $12, \
               week_high_52 = $13, week_low_52 = $14, eps = $15, book_value = $16, \
               dividend_yield = $17, sector = $18, industry = $19, enriched_at = $20, \
               updated_at = now() \
             WHERE id = $1",
        )
        .persistent(false)
        .bind(action.id)
        .bind(&action.company)
        .bind(&action.action)
        .bind(&action.brokerage)
        .bind(&action.rating_from)
        .bind(&action.rating_to)
        .bind(&action.target_from)
        .bind(&action.target_to)
        .bind(f.current_price)
        .bind(f.volume)
        .bind(f.market_cap)
        .bind(f.pe_ratio)
        .bind(f.week_high_52)
        .bind(f.week_low_52)
        .bind(f.eps)
        .bind(f.book_value)
        .bind(f.dividend_yield)
        .bind(&f.sector)
        .bind(&f.industry)
        .bind(f.enriched_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("update stock id={} failed", action.id))?;

        anyhow::ensure!(
            res.rows_affected() == 1,
            "update stock id={} matched no row",
            action.id
        );
        Ok(())
    }

    async fn count_key_duplicates(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ( \
               SELECT ticker, time FROM stocks GROUP BY ticker, time HAVING COUNT(*) > 1 \
             ) AS duplicates",
        )
        .persistent(false)
        .fetch_one(&self.pool)
        .await
        .context("count duplicate stock keys failed")?;
        Ok(count)
    }

    async fn top_rated(&self, limit: i64) -> anyhow::Result<Vec<AnalystAction>> {
        let actions: Vec<String> = TOP_RATED_ACTIONS.iter().map(|s| s.to_string()).collect();
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "{SELECT_COLUMNS} WHERE action = ANY($1) ORDER BY time DESC LIMIT $2"
        ))
        .persistent(false)
        .bind(actions)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select top rated stocks failed")?;

        Ok(rows.into_iter().map(AnalystAction::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_action(ticker: &str, hour: u32) -> NewAnalystAction {
        NewAnalystAction {
            ticker: ticker.to_string(),
            company: format!("{ticker} Inc."),
            action: "Buy".to_string(),
            brokerage: "Barclays".to_string(),
            rating_from: "Hold".to_string(),
            rating_to: "Buy".to_string(),
            target_from: "$10.00".to_string(),
            target_to: "$12.00".to_string(),
            time: Utc.with_ymd_and_hms(2026, 2, 10, hour, 0, 0).unwrap(),
        }
    }

    /// Needs a live Postgres; returns early when `DATABASE_URL` is unset.
    #[tokio::test]
    async fn rejected_row_is_skipped_and_the_batch_commits() {
        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let pool = sqlx::PgPool::connect(&db_url).await.unwrap();
        crate::storage::migrate(&pool).await.unwrap();
        let repo = PgStockRepository::new(pool.clone());

        let prefix = format!("T{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let good_a = format!("{prefix}A");
        let good_b = format!("{prefix}B");
        // Postgres text columns reject NUL bytes.
        let bad = format!("{prefix}\0X");

        let outcome = repo
            .upsert_batch(&[
                new_action(&good_a, 1),
                new_action(&bad, 2),
                new_action(&good_b, 3),
            ])
            .await
            .unwrap();

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks WHERE ticker LIKE $1")
            .bind(format!("{prefix}%"))
            .fetch_one(&pool)
            .await
            .unwrap();

        sqlx::query("DELETE FROM stocks WHERE ticker LIKE $1")
            .bind(format!("{prefix}%"))
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(outcome.upserted, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(stored, 2);
    }
}
