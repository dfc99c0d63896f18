use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendationType {
    Buy,
    Hold,
    Watch,
}

impl RecommendationType {
    pub const BUY_THRESHOLD: f64 = 70.0;
    pub const HOLD_THRESHOLD: f64 = 50.0;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::BUY_THRESHOLD {
            Self::Buy
        } else if score >= Self::HOLD_THRESHOLD {
            Self::Hold
        } else {
            Self::Watch
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Watch => "WATCH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecommendation {
    pub symbol: String,
    pub name: String,
    pub score: f64,
    pub reason: String,
    pub current_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub recommendation_type: RecommendationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<StockRecommendation>,
    pub summary: RecommendationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSummary {
    pub total_analyzed: usize,
    pub buy_recommendations: usize,
    pub hold_recommendations: usize,
    pub generated_at: DateTime<Utc>,
    pub data_source: String,
}
