use crate::ingest::sync::SyncReport;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Appends one row to the `stock_sync_runs` audit table.
pub async fn record_sync_run(
    pool: &sqlx::PgPool,
    provider: &str,
    report: Option<&SyncReport>,
    error: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let finished_at: DateTime<Utc> = Utc::now();
    let status = if error.is_some() { "error" } else { "success" };
    let raw_report = report.map(serde_json::to_value).transpose()?;

    sqlx::query(
        "INSERT INTO stock_sync_runs (id, finished_at, provider, status, error, report) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .persistent(false)
    .bind(id)
    .bind(finished_at)
    .bind(provider)
    .bind(status)
    .bind(error)
    .bind(raw_report)
    .execute(pool)
    .await
    .context("insert stock_sync_runs failed")?;

    Ok(id)
}
