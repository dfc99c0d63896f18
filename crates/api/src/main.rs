use axum::http::{HeaderValue, Method};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpick_core::cancel::CancelFlag;
use stockpick_core::config::Settings;
use stockpick_core::enrich::EnrichOptions;
use stockpick_core::fundamentals::alphavantage::AlphaVantageClient;
use stockpick_core::fundamentals::FundamentalsClient;
use stockpick_core::ingest::provider::{FeedClient, HttpFeedClient};
use stockpick_core::ingest::sync::SyncOptions;
use stockpick_core::storage::stocks::PgStockRepository;
use stockpick_core::storage::StockRepository;

mod routes;

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

    let pool = connect_pool(&settings).await;
    let repo = pool
        .clone()
        .map(|pool| Arc::new(PgStockRepository::new(pool)) as Arc<dyn StockRepository>);

    let feed = match HttpFeedClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn FeedClient>),
        Err(e) => {
            tracing::warn!(error = %e, "feed client not configured; sync disabled");
            None
        }
    };

    let fundamentals = match AlphaVantageClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn FundamentalsClient>),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "fundamentals client not configured; enrichment and recommendations disabled"
            );
            None
        }
    };

    let shutdown = CancelFlag::new();
    let state = routes::AppState {
        repo,
        pool,
        feed,
        fundamentals,
        sync_options: SyncOptions::from_env(),
        enrich_options: EnrichOptions::from_env(),
        shutdown: shutdown.clone(),
    };

    let app = routes::router(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Connects and migrates; any failure leaves the API running without a database.
async fn connect_pool(settings: &Settings) -> Option<PgPool> {
    let db_url = match settings.require_database_url() {
        Ok(url) => url,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            return None;
        }
    };

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            return None;
        }
    };

    match stockpick_core::storage::migrate(&pool).await {
        Ok(()) => Some(pool),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
            None
        }
    }
}

fn cors_layer() -> CorsLayer {
    let origin = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(v) if !v.trim().is_empty() && v.trim() != "*" => match v.trim().parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!(origin = %v, "invalid CORS_ALLOW_ORIGIN; allowing any origin");
                AllowOrigin::from(Any)
            }
        },
        _ => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Waits for ctrl-c and flips the shared flag so in-flight jobs stop at their next checkpoint.
async fn shutdown_signal(shutdown: CancelFlag) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested");
    shutdown.cancel();
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
