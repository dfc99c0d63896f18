use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored analyst rating action. The natural key is `(ticker, time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystAction {
    pub id: i64,
    pub ticker: String,
    pub company: String,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    pub target_from: String,
    pub target_to: String,
    pub time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fundamentals: Fundamentals,
}

/// Third-party market data attached to an action. Every field is written only by enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_high_52: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_low_52: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_at: Option<DateTime<Utc>>,
}

impl Fundamentals {
    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        matches!(self.enriched_at, Some(at) if now - at < window)
    }
}

/// A validated action ready to be upserted. Carries no fundamentals: ingestion never writes them.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalystAction {
    pub ticker: String,
    pub company: String,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    pub target_from: String,
    pub target_to: String,
    pub time: DateTime<Utc>,
}

/// Per-batch upsert result: rows written versus rows skipped after an individual failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub upserted: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockStats {
    pub total_stocks: usize,
    pub unique_tickers: usize,
    pub unique_companies: usize,
    pub unique_brokerages: usize,
    pub latest_entry: Option<DateTime<Utc>>,
    pub oldest_entry: Option<DateTime<Utc>>,
}

impl StockStats {
    pub fn from_actions(actions: &[AnalystAction]) -> Self {
        use std::collections::HashSet;

        let tickers: HashSet<&str> = actions.iter().map(|a| a.ticker.as_str()).collect();
        let companies: HashSet<&str> = actions.iter().map(|a| a.company.as_str()).collect();
        let brokerages: HashSet<&str> = actions
            .iter()
            .map(|a| a.brokerage.as_str())
            .filter(|b| !b.is_empty())
            .collect();

        Self {
            total_stocks: actions.len(),
            unique_tickers: tickers.len(),
            unique_companies: companies.len(),
            unique_brokerages: brokerages.len(),
            latest_entry: actions.iter().map(|a| a.time).max(),
            oldest_entry: actions.iter().map(|a| a.time).min(),
        }
    }
}
