use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

use stockpick_core::cancel::{is_cancelled, CancelFlag};
use stockpick_core::domain::recommendation::RecommendationResponse;
use stockpick_core::domain::stock::{AnalystAction, StockStats};
use stockpick_core::enrich::{self, EnrichOptions, Enricher, EnrichmentStats};
use stockpick_core::fundamentals::FundamentalsClient;
use stockpick_core::ingest::provider::FeedClient;
use stockpick_core::ingest::sync::{StockSyncer, SyncOptions, SyncReport};
use stockpick_core::recommend::{self, Recommender};
use stockpick_core::storage::StockRepository;

const DEFAULT_TOP_LIMIT: i64 = 10;
const MAX_TOP_LIMIT: i64 = 50;

/// Shared handler state. Each component is optional so the API can come up degraded when the
/// database or an upstream is not configured.
#[derive(Clone)]
pub struct AppState {
    pub repo: Option<Arc<dyn StockRepository>>,
    pub pool: Option<PgPool>,
    pub feed: Option<Arc<dyn FeedClient>>,
    pub fundamentals: Option<Arc<dyn FundamentalsClient>>,
    pub sync_options: SyncOptions,
    pub enrich_options: EnrichOptions,
    pub shutdown: CancelFlag,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(healthz))
        .route("/api/stocks", get(list_stocks))
        .route("/api/stocks/top", get(top_stocks))
        .route("/api/stocks/stats", get(stock_stats))
        .route("/api/stocks/duplicates", get(duplicate_keys))
        .route("/api/stocks/sync", post(sync_stocks))
        .route("/api/stocks/enrich", post(enrich_stocks))
        .route("/api/recommendations", get(recommendations))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// `?limit=` is taken as text so a malformed value falls back to the route default instead of
/// rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

impl LimitQuery {
    pub fn limit(&self) -> Option<i64> {
        self.limit.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Serialize)]
pub struct StocksResponse {
    pub stocks: Vec<AnalystAction>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DuplicatesResponse {
    pub duplicate_keys: i64,
}

fn repo(state: &AppState) -> Result<&Arc<dyn StockRepository>, StatusCode> {
    state.repo.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

fn fundamentals(state: &AppState) -> Result<&Arc<dyn FundamentalsClient>, StatusCode> {
    state
        .fundamentals
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

fn failure(err: anyhow::Error) -> StatusCode {
    if is_cancelled(&err) {
        tracing::warn!(error = %err, "request aborted by shutdown");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = ?err, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn list_stocks(State(state): State<AppState>) -> Result<Json<StocksResponse>, StatusCode> {
    let stocks = repo(&state)?.get_all().await.map_err(failure)?;
    Ok(Json(StocksResponse {
        count: stocks.len(),
        stocks,
    }))
}

async fn top_stocks(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<StocksResponse>, StatusCode> {
    let limit = match q.limit() {
        Some(n) if n >= 1 => n.min(MAX_TOP_LIMIT),
        _ => DEFAULT_TOP_LIMIT,
    };
    let stocks = repo(&state)?.top_rated(limit).await.map_err(failure)?;
    Ok(Json(StocksResponse {
        count: stocks.len(),
        stocks,
    }))
}

async fn stock_stats(State(state): State<AppState>) -> Result<Json<StockStats>, StatusCode> {
    let stocks = repo(&state)?.get_all().await.map_err(failure)?;
    Ok(Json(StockStats::from_actions(&stocks)))
}

async fn duplicate_keys(
    State(state): State<AppState>,
) -> Result<Json<DuplicatesResponse>, StatusCode> {
    let duplicate_keys = repo(&state)?
        .count_key_duplicates()
        .await
        .map_err(failure)?;
    Ok(Json(DuplicatesResponse { duplicate_keys }))
}

async fn sync_stocks(State(state): State<AppState>) -> Result<Json<SyncReport>, StatusCode> {
    let repo = repo(&state)?.clone();
    let feed = state.feed.clone().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let provider = feed.provider_name();

    let syncer = StockSyncer::new(feed, repo, state.sync_options);
    let result = syncer.sync_all(&state.shutdown).await;

    if let Some(pool) = &state.pool {
        let err_text = result.as_ref().err().map(|e| format!("{e:#}"));
        if let Err(e) = stockpick_core::storage::sync_runs::record_sync_run(
            pool,
            provider,
            result.as_ref().ok(),
            err_text.as_deref(),
        )
        .await
        {
            tracing::warn!(error = %e, "failed to record sync run");
        }
    }

    result.map(Json).map_err(failure)
}

async fn enrich_stocks(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<EnrichmentStats>, StatusCode> {
    let repo = repo(&state)?.clone();
    let client = fundamentals(&state)?.clone();
    let limit = enrich::resolve_limit(q.limit());

    let enricher = Enricher::new(repo, client, state.enrich_options);
    let stats = enricher
        .enrich(limit, &state.shutdown)
        .await
        .map_err(failure)?;
    Ok(Json(stats))
}

async fn recommendations(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<RecommendationResponse>, StatusCode> {
    let repo = repo(&state)?.clone();
    let client = fundamentals(&state)?.clone();
    let limit = recommend::resolve_limit(q.limit());

    let response = Recommender::new(repo, client)
        .recommend(limit)
        .await
        .map_err(failure)?;
    Ok(Json(response))
}
