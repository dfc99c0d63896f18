use anyhow::Result;
use serde::{Deserialize, Serialize};

pub mod alphavantage;
pub mod error;

pub use error::{is_rate_limited, FundamentalsApiError, FundamentalsErrorKind};

#[async_trait::async_trait]
pub trait FundamentalsClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn company_overview(&self, ticker: &str) -> Result<CompanyOverview>;

    async fn top_movers(&self) -> Result<TopMovers>;
}

/// Company overview payload. Numeric values arrive as strings and may be "None" or "-".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyOverview {
    #[serde(rename = "Symbol", default)]
    pub symbol: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Sector", default)]
    pub sector: String,
    #[serde(rename = "Industry", default)]
    pub industry: String,
    #[serde(rename = "MarketCapitalization", default)]
    pub market_capitalization: String,
    #[serde(rename = "PERatio", default)]
    pub pe_ratio: String,
    #[serde(rename = "EPS", default)]
    pub eps: String,
    #[serde(rename = "BookValue", default)]
    pub book_value: String,
    #[serde(rename = "DividendYield", default)]
    pub dividend_yield: String,
    #[serde(rename = "52WeekHigh", default)]
    pub week_high_52: String,
    #[serde(rename = "52WeekLow", default)]
    pub week_low_52: String,
    #[serde(rename = "AnalystTargetPrice", default)]
    pub analyst_target_price: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopMovers {
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub top_gainers: Vec<MarketMover>,
    #[serde(default)]
    pub top_losers: Vec<MarketMover>,
    #[serde(default)]
    pub most_actively_traded: Vec<MarketMover>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMover {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub change_amount: String,
    #[serde(default)]
    pub change_percentage: String,
    #[serde(default)]
    pub volume: String,
}
