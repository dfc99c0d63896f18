use crate::domain::recommendation::{
    RecommendationResponse, RecommendationSummary, RecommendationType, StockRecommendation,
};
use crate::domain::stock::AnalystAction;
use crate::fundamentals::{FundamentalsClient, MarketMover};
use crate::storage::StockRepository;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

pub mod scoring;

pub const DATA_SOURCE: &str = "Alpha Vantage + Database";
pub const MAX_GAINERS: usize = 5;
pub const MAX_STORED: usize = 10;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

/// Maps a caller-supplied limit onto `1..=MAX_LIMIT`; missing or non-positive values fall back
/// to [`DEFAULT_LIMIT`].
pub fn resolve_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(n) if n >= 1 => (n as usize).min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

pub struct Recommender {
    repo: Arc<dyn StockRepository>,
    client: Arc<dyn FundamentalsClient>,
}

impl Recommender {
    pub fn new(repo: Arc<dyn StockRepository>, client: Arc<dyn FundamentalsClient>) -> Self {
        Self { repo, client }
    }

    /// Ranks today's top gainers together with stored analyst actions. `limit == 0` keeps every
    /// candidate.
    pub async fn recommend(&self, limit: usize) -> anyhow::Result<RecommendationResponse> {
        let stored = self
            .repo
            .get_all()
            .await
            .context("failed to get stocks from database")?;

        if stored.is_empty() {
            return Ok(build_response(Vec::new(), 0));
        }

        let mut candidates = match self.client.top_movers().await {
            Ok(movers) => score_gainers(&movers.top_gainers),
            Err(err) => {
                tracing::warn!(
                    provider = self.client.provider_name(),
                    error = %err,
                    "market movers unavailable; ranking stored actions only"
                );
                Vec::new()
            }
        };
        candidates.extend(score_stored(&stored));

        // Stable: equal scores keep movers ahead of stored actions.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        if limit > 0 {
            candidates.truncate(limit);
        }

        let response = build_response(candidates, stored.len());
        tracing::info!(
            total_analyzed = response.summary.total_analyzed,
            returned = response.recommendations.len(),
            buy = response.summary.buy_recommendations,
            hold = response.summary.hold_recommendations,
            "recommendations generated"
        );
        Ok(response)
    }
}

fn build_response(
    recommendations: Vec<StockRecommendation>,
    total_analyzed: usize,
) -> RecommendationResponse {
    let count = |kind: RecommendationType| {
        recommendations
            .iter()
            .filter(|r| r.recommendation_type == kind)
            .count()
    };
    let summary = RecommendationSummary {
        total_analyzed,
        buy_recommendations: count(RecommendationType::Buy),
        hold_recommendations: count(RecommendationType::Hold),
        generated_at: Utc::now(),
        data_source: DATA_SOURCE.to_string(),
    };
    RecommendationResponse {
        recommendations,
        summary,
    }
}

pub fn score_gainers(gainers: &[MarketMover]) -> Vec<StockRecommendation> {
    gainers
        .iter()
        .take(MAX_GAINERS)
        .filter_map(|g| {
            let change = g.change_percentage.trim().trim_end_matches('%').parse::<f64>().ok()?;
            let score = scoring::gainer_score(change, &g.volume);
            Some(StockRecommendation {
                symbol: g.ticker.clone(),
                name: g.ticker.clone(),
                score,
                reason: scoring::gainer_reason(change, &g.volume),
                current_price: non_empty(&g.price),
                target_price: None,
                pe_ratio: None,
                dividend_yield: None,
                market_cap: None,
                sector: None,
                recommendation_type: RecommendationType::from_score(score),
            })
        })
        .collect()
}

pub fn score_stored(actions: &[AnalystAction]) -> Vec<StockRecommendation> {
    actions
        .iter()
        .take(MAX_STORED)
        .map(|a| {
            let score = scoring::action_score(a);
            let f = &a.fundamentals;
            StockRecommendation {
                symbol: a.ticker.clone(),
                name: a.company.clone(),
                score,
                reason: scoring::action_reason(a, score),
                current_price: f.current_price.map(|p| format!("{p:.2}")),
                target_price: scoring::target_price(a).map(|p| format!("{p:.2}")),
                pe_ratio: f.pe_ratio.map(|v| format!("{v:.2}")),
                dividend_yield: f.dividend_yield.map(|v| format!("{:.2}%", v * 100.0)),
                market_cap: f.market_cap.map(|v| v.to_string()),
                sector: f.sector.clone(),
                recommendation_type: RecommendationType::from_score(score),
            }
        })
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}
