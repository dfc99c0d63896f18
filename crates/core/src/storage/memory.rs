use crate::domain::stock::{AnalystAction, BatchOutcome, Fundamentals, NewAnalystAction};
use crate::storage::{StockRepository, TOP_RATED_ACTIONS};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Process-local [`StockRepository`] with the same ordering and upsert rules as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryStockRepository {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    rows: Vec<AnalystAction>,
}

impl MemoryStockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds rows as-is, assigning ids in order.
    pub async fn with_rows(rows: Vec<AnalystAction>) -> Self {
        let repo = Self::new();
        {
            let mut state = repo.state.lock().await;
            for mut row in rows {
                state.next_id += 1;
                row.id = state.next_id;
                state.rows.push(row);
            }
        }
        repo
    }
}

fn sorted_newest_first(rows: &[AnalystAction]) -> Vec<AnalystAction> {
    let mut out = rows.to_vec();
    out.sort_by(|a, b| b.time.cmp(&a.time).then(a.id.cmp(&b.id)));
    out
}

#[async_trait::async_trait]
impl StockRepository for MemoryStockRepository {
    async fn get_all(&self) -> anyhow::Result<Vec<AnalystAction>> {
        let state = self.state.lock().await;
        Ok(sorted_newest_first(&state.rows))
    }

    async fn get_by_ticker(&self, ticker: &str) -> anyhow::Result<Option<AnalystAction>> {
        let state = self.state.lock().await;
        Ok(sorted_newest_first(&state.rows)
            .into_iter()
            .find(|row| row.ticker == ticker))
    }

    async fn upsert_batch(&self, items: &[NewAnalystAction]) -> anyhow::Result<BatchOutcome> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut outcome = BatchOutcome::default();

        for item in items {
            let existing = state
                .rows
                .iter()
                .position(|row| row.ticker == item.ticker && row.time == item.time);

            match existing {
                Some(idx) => {
                    let row = &mut state.rows[idx];
                    row.company = item.company.clone();
                    row.action = item.action.clone();
                    row.brokerage = item.brokerage.clone();
                    row.rating_from = item.rating_from.clone();
                    row.rating_to = item.rating_to.clone();
                    row.target_from = item.target_from.clone();
                    row.target_to = item.target_to.clone();
                    row.updated_at = now;
                }
                None => {
                    state.next_id += 1;
                    let id = state.next_id;
                    state.rows.push(AnalystAction {
                        id,
                        ticker: item.ticker.clone(),
                        company: item.company.clone(),
                        action: item.action.clone(),
                        brokerage: item.brokerage.clone(),
                        rating_from: item.rating_from.clone(),
                        rating_to: item.rating_to.clone(),
                        target_from: item.target_from.clone(),
                        target_to: item.target_to.clone(),
                        time: item.time,
                        created_at: now,
                        updated_at: now,
                        fundamentals: Fundamentals::default(),
                    });
                }
            }
            outcome.upserted += 1;
        }

        Ok(outcome)
    }

    async fn update(&self, action: &AnalystAction) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let Some(row) = state.rows.iter_mut().find(|row| row.id == action.id) else {
            anyhow::bail!("update stock id={} matched no row", action.id);
        };

        let created_at = row.created_at;
        *row = action.clone();
        row.created_at = created_at;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn count_key_duplicates(&self) -> anyhow::Result<i64> {
        let state = self.state.lock().await;
        let mut groups: HashMap<(&str, DateTime<Utc>), usize> = HashMap::new();
        for row in &state.rows {
            *groups.entry((row.ticker.as_str(), row.time)).or_default() += 1;
        }
        Ok(groups.values().filter(|n| **n > 1).count() as i64)
    }

    async fn top_rated(&self, limit: i64) -> anyhow::Result<Vec<AnalystAction>> {
        let state = self.state.lock().await;
        Ok(sorted_newest_first(&state.rows)
            .into_iter()
            .filter(|row| TOP_RATED_ACTIONS.contains(&row.action.as_str()))
            .take(limit.max(0) as usize)
            .collect())
    }
}
