use crate::cancel::CancelFlag;
use crate::config::env_or;
use crate::domain::stock::{AnalystAction, Fundamentals};
use crate::fundamentals::{is_rate_limited, CompanyOverview, FundamentalsClient};
use crate::storage::StockRepository;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 20;
const DEFAULT_DELAY_SECS: u64 = 15;
const FRESHNESS_WINDOW_HOURS: i64 = 24;

/// Maps a caller-supplied ticker limit onto `1..=MAX_LIMIT`; missing or non-positive values
/// fall back to [`DEFAULT_LIMIT`].
pub fn resolve_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(n) if n >= 1 => (n as usize).min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    pub total_stocks: usize,
    pub already_enriched: usize,
    pub newly_enriched: usize,
    pub failed: usize,
    pub rate_limit_reached: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    /// Pause after each successful overview call except the last one.
    pub call_delay: Duration,
    pub freshness_window: chrono::Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            call_delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            freshness_window: chrono::Duration::hours(FRESHNESS_WINDOW_HOURS),
        }
    }
}

impl EnrichOptions {
    pub fn from_env() -> Self {
        Self {
            call_delay: Duration::from_secs(env_or("ENRICH_DELAY_SECS", DEFAULT_DELAY_SECS)),
            ..Self::default()
        }
    }
}

/// Fundamentals parsed out of an overview. `None` means the upstream value was missing or
/// unparseable and the stored value must be left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFundamentals {
    pub market_cap: Option<i64>,
    pub pe_ratio: Option<f64>,
    pub week_high_52: Option<f64>,
    pub week_low_52: Option<f64>,
    pub eps: Option<f64>,
    pub book_value: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl ParsedFundamentals {
    pub fn from_overview(overview: &CompanyOverview) -> Self {
        Self {
            market_cap: parse_number(&overview.market_capitalization).map(|v| v as i64),
            pe_ratio: parse_number(&overview.pe_ratio),
            week_high_52: parse_number(&overview.week_high_52),
            week_low_52: parse_number(&overview.week_low_52),
            eps: parse_number(&overview.eps),
            book_value: parse_number(&overview.book_value),
            dividend_yield: parse_number(&overview.dividend_yield),
            sector: parse_label(&overview.sector),
            industry: parse_label(&overview.industry),
        }
    }

    pub fn apply_to(&self, target: &mut Fundamentals, enriched_at: DateTime<Utc>) {
        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        set(&mut target.market_cap, &self.market_cap);
        set(&mut target.pe_ratio, &self.pe_ratio);
        set(&mut target.week_high_52, &self.week_high_52);
        set(&mut target.week_low_52, &self.week_low_52);
        set(&mut target.eps, &self.eps);
        set(&mut target.book_value, &self.book_value);
        set(&mut target.dividend_yield, &self.dividend_yield);
        set(&mut target.sector, &self.sector);
        set(&mut target.industry, &self.industry);
        target.enriched_at = Some(enriched_at);
    }
}

/// Parses an upstream numeric string. Empty, "None", "-" and anything non-finite are absent.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("none") || t == "-" {
        return None;
    }
    let cleaned: String = t.chars().filter(|c| *c != ',' && *c != '$').collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_label(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("none") || t == "-" {
        return None;
    }
    Some(t.to_string())
}

/// Attaches company fundamentals to stored actions, one ticker at a time.
pub struct Enricher {
    repo: Arc<dyn StockRepository>,
    client: Arc<dyn FundamentalsClient>,
    opts: EnrichOptions,
}

impl Enricher {
    pub fn new(
        repo: Arc<dyn StockRepository>,
        client: Arc<dyn FundamentalsClient>,
        opts: EnrichOptions,
    ) -> Self {
        Self { repo, client, opts }
    }

    /// Enriches up to `limit` stale tickers. Calls are strictly sequential; the run stops at the
    /// first rate-limit signal.
    pub async fn enrich(
        &self,
        limit: usize,
        cancel: &CancelFlag,
    ) -> anyhow::Result<EnrichmentStats> {
        let limit = limit.min(MAX_LIMIT);
        let mut stats = EnrichmentStats::default();

        let tickers = self
            .select_candidates(limit)
            .await
            .context("failed to get tickers for enrichment")?;
        stats.total_stocks = tickers.len();
        tracing::info!(candidates = tickers.len(), limit, "starting enrichment");

        for (idx, ticker) in tickers.iter().enumerate() {
            cancel.check("enrich_candidate")?;

            if self.is_fresh(ticker).await {
                stats.already_enriched += 1;
                tracing::info!(%ticker, "ticker enriched recently; skipping");
                continue;
            }

            let overview = match self.client.company_overview(ticker).await {
                Ok(overview) => overview,
                Err(err) => {
                    stats.failed += 1;
                    if is_rate_limited(&err) {
                        stats.rate_limit_reached = true;
                        tracing::warn!(
                            %ticker,
                            error = %err,
                            "rate limit reached; stopping enrichment"
                        );
                        break;
                    }
                    tracing::warn!(%ticker, error = %err, "overview fetch failed; skipping ticker");
                    continue;
                }
            };

            let parsed = ParsedFundamentals::from_overview(&overview);
            match self.apply(ticker, &parsed).await {
                Ok(rows) => {
                    stats.newly_enriched += 1;
                    tracing::info!(
                        %ticker,
                        rows,
                        progress = idx + 1,
                        total = tickers.len(),
                        "enriched ticker"
                    );
                }
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!(%ticker, error = %err, "failed to store fundamentals");
                    continue;
                }
            }

            if idx + 1 < tickers.len() {
                tokio::time::sleep(self.opts.call_delay).await;
            }
        }

        tracing::info!(
            total = stats.total_stocks,
            already_enriched = stats.already_enriched,
            newly_enriched = stats.newly_enriched,
            failed = stats.failed,
            rate_limit_reached = stats.rate_limit_reached,
            "enrichment finished"
        );
        Ok(stats)
    }

    async fn select_candidates(&self, limit: usize) -> anyhow::Result<Vec<String>> {
        let now = Utc::now();
        let rows = self.repo.get_all().await?;
        Ok(stale_tickers(&rows, limit, now, self.opts.freshness_window))
    }

    /// True when any row of `ticker` was enriched inside the freshness window. A failed store
    /// read counts as stale so the run carries on.
    async fn is_fresh(&self, ticker: &str) -> bool {
        let rows = match self.repo.get_all().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "freshness check failed; treating as stale");
                return false;
            }
        };
        let now = Utc::now();
        rows.iter()
            .filter(|row| row.ticker == ticker)
            .any(|row| row.fundamentals.is_fresh(now, self.opts.freshness_window))
    }

    /// Writes the same snapshot to every row of `ticker`; returns how many rows were updated.
    async fn apply(&self, ticker: &str, parsed: &ParsedFundamentals) -> anyhow::Result<usize> {
        let enriched_at = Utc::now();
        let rows: Vec<AnalystAction> = self
            .repo
            .get_all()
            .await?
            .into_iter()
            .filter(|row| row.ticker == ticker)
            .collect();
        anyhow::ensure!(!rows.is_empty(), "no stocks found for ticker {ticker}");

        let n = rows.len();
        for mut row in rows {
            parsed.apply_to(&mut row.fundamentals, enriched_at);
            self.repo.update(&row).await?;
        }
        Ok(n)
    }
}

/// Distinct tickers in first-seen order whose row is unenriched or older than `window`.
pub fn stale_tickers(
    rows: &[AnalystAction],
    limit: usize,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        if out.len() >= limit {
            break;
        }
        if row.ticker.is_empty() || seen.contains(row.ticker.as_str()) {
            continue;
        }
        if !row.fundamentals.is_fresh(now, window) {
            seen.insert(row.ticker.as_str());
            out.push(row.ticker.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::NewAnalystAction;
    use crate::fundamentals::{FundamentalsApiError, FundamentalsErrorKind, TopMovers};
    use crate::storage::memory::MemoryStockRepository;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, h, 0, 0).unwrap()
    }

    fn new_action(ticker: &str, time: DateTime<Utc>) -> NewAnalystAction {
        NewAnalystAction {
            ticker: ticker.to_string(),
            company: format!("{ticker} Inc."),
            action: "Buy".to_string(),
            brokerage: String::new(),
            rating_from: String::new(),
            rating_to: String::new(),
            target_from: String::new(),
            target_to: String::new(),
            time,
        }
    }

    fn overview(symbol: &str) -> CompanyOverview {
        CompanyOverview {
            symbol: symbol.to_string(),
            sector: "TECHNOLOGY".to_string(),
            industry: "None".to_string(),
            market_capitalization: "2,500,000,000".to_string(),
            pe_ratio: "18.5".to_string(),
            eps: "-".to_string(),
            dividend_yield: "0.031".to_string(),
            week_high_52: "120".to_string(),
            week_low_52: "80".to_string(),
            ..Default::default()
        }
    }

    /// Answers overview calls in order from a script; records the tickers asked for.
    struct ScriptedFundamentals {
        calls: Mutex<Vec<String>>,
        failures: Vec<(usize, FundamentalsErrorKind)>,
    }

    impl ScriptedFundamentals {
        fn ok() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failures: Vec::new(),
            }
        }

        fn failing_at(call: usize, kind: FundamentalsErrorKind) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failures: vec![(call, kind)],
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl FundamentalsClient for ScriptedFundamentals {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn company_overview(&self, ticker: &str) -> anyhow::Result<CompanyOverview> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(ticker.to_string());
                calls.len()
            };
            if let Some((_, kind)) = self.failures.iter().find(|(at, _)| *at == n) {
                return Err(FundamentalsApiError::new("OVERVIEW", *kind, "scripted failure").into());
            }
            Ok(overview(ticker))
        }

        async fn top_movers(&self) -> anyhow::Result<TopMovers> {
            anyhow::bail!("not scripted")
        }
    }

    fn enricher(repo: Arc<MemoryStockRepository>, client: Arc<ScriptedFundamentals>) -> Enricher {
        Enricher::new(
            repo,
            client,
            EnrichOptions {
                call_delay: Duration::ZERO,
                ..EnrichOptions::default()
            },
        )
    }

    async fn seeded(tickers: &[&str]) -> Arc<MemoryStockRepository> {
        let repo = Arc::new(MemoryStockRepository::new());
        let items: Vec<_> = tickers
            .iter()
            .enumerate()
            .map(|(i, t)| new_action(t, ts(20 - i as u32)))
            .collect();
        repo.upsert_batch(&items).await.unwrap();
        repo
    }

    #[test]
    fn parse_number_treats_sentinels_as_absent() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("None"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("1,234,567"), Some(1_234_567.0));
        assert_eq!(parse_number(" $12.50 "), Some(12.5));
        assert_eq!(parse_number("-0.45"), Some(-0.45));
    }

    #[test]
    fn apply_leaves_absent_fields_untouched() {
        let parsed = ParsedFundamentals::from_overview(&overview("AAPL"));
        assert_eq!(parsed.market_cap, Some(2_500_000_000));
        assert_eq!(parsed.eps, None);
        assert_eq!(parsed.industry, None);

        let mut f = Fundamentals {
            eps: Some(3.2),
            industry: Some("Consumer Electronics".to_string()),
            ..Default::default()
        };
        parsed.apply_to(&mut f, ts(12));

        assert_eq!(f.eps, Some(3.2));
        assert_eq!(f.industry.as_deref(), Some("Consumer Electronics"));
        assert_eq!(f.pe_ratio, Some(18.5));
        assert_eq!(f.sector.as_deref(), Some("TECHNOLOGY"));
        assert_eq!(f.enriched_at, Some(ts(12)));
    }

    #[test]
    fn resolves_limit_defaults_and_cap() {
        assert_eq!(resolve_limit(None), 5);
        assert_eq!(resolve_limit(Some(0)), 5);
        assert_eq!(resolve_limit(Some(-3)), 5);
        assert_eq!(resolve_limit(Some(7)), 7);
        assert_eq!(resolve_limit(Some(500)), 20);
    }

    #[test]
    fn stale_tickers_are_distinct_and_skip_fresh_rows() {
        let now = ts(23);
        let window = chrono::Duration::hours(24);
        let mk = |id: i64, ticker: &str, enriched_at: Option<DateTime<Utc>>| AnalystAction {
            id,
            ticker: ticker.to_string(),
            company: "Co".to_string(),
            action: String::new(),
            brokerage: String::new(),
            rating_from: String::new(),
            rating_to: String::new(),
            target_from: String::new(),
            target_to: String::new(),
            time: ts(1),
            created_at: ts(1),
            updated_at: ts(1),
            fundamentals: Fundamentals {
                enriched_at,
                ..Default::default()
            },
        };
        let rows = vec![
            mk(1, "AAPL", None),
            mk(2, "MSFT", Some(now - chrono::Duration::hours(1))),
            mk(3, "AAPL", None),
            mk(4, "NVDA", Some(now - chrono::Duration::hours(30))),
            mk(5, "", None),
            mk(6, "TSLA", None),
        ];

        assert_eq!(stale_tickers(&rows, 10, now, window), vec!["AAPL", "NVDA", "TSLA"]);
        assert_eq!(stale_tickers(&rows, 2, now, window), vec!["AAPL", "NVDA"]);
    }

    #[tokio::test]
    async fn limit_bounds_processed_tickers() {
        let repo = seeded(&["A", "B", "C", "D", "E"]).await;
        let client = Arc::new(ScriptedFundamentals::ok());

        let stats = enricher(repo.clone(), client.clone())
            .enrich(3, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(stats.total_stocks, 3);
        assert_eq!(stats.newly_enriched, 3);
        assert_eq!(client.calls(), vec!["A", "B", "C"]);

        for t in ["D", "E"] {
            let row = repo.get_by_ticker(t).await.unwrap().unwrap();
            assert!(row.fundamentals.enriched_at.is_none());
        }
        let row = repo.get_by_ticker("A").await.unwrap().unwrap();
        assert!(row.fundamentals.enriched_at.is_some());
        assert_eq!(row.fundamentals.pe_ratio, Some(18.5));
    }

    #[tokio::test]
    async fn rate_limit_stops_the_run() {
        let repo = seeded(&["A", "B", "C", "D"]).await;
        let client = Arc::new(ScriptedFundamentals::failing_at(
            2,
            FundamentalsErrorKind::RateLimited,
        ));

        let stats = enricher(repo.clone(), client.clone())
            .enrich(4, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(stats.total_stocks, 4);
        assert_eq!(stats.newly_enriched, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.rate_limit_reached);
        assert_eq!(client.calls(), vec!["A", "B"]);
        assert!(repo.get_by_ticker("C").await.unwrap().unwrap().fundamentals.enriched_at.is_none());
    }

    #[tokio::test]
    async fn other_failures_continue_with_next_ticker() {
        let repo = seeded(&["A", "B", "C"]).await;
        let client = Arc::new(ScriptedFundamentals::failing_at(2, FundamentalsErrorKind::Http));

        let stats = enricher(repo, client.clone())
            .enrich(5, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.newly_enriched, 2);
        assert!(!stats.rate_limit_reached);
        assert_eq!(client.calls(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn fundamentals_reach_every_row_of_a_ticker() {
        let repo = Arc::new(MemoryStockRepository::new());
        repo.upsert_batch(&[
            new_action("AAPL", ts(3)),
            new_action("MSFT", ts(2)),
            new_action("AAPL", ts(1)),
        ])
        .await
        .unwrap();
        let client = Arc::new(ScriptedFundamentals::ok());

        let stats = enricher(repo.clone(), client.clone())
            .enrich(1, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(stats.newly_enriched, 1);

        let rows = repo.get_all().await.unwrap();
        let aapl: Vec<_> = rows.iter().filter(|r| r.ticker == "AAPL").collect();
        assert_eq!(aapl.len(), 2);
        assert!(aapl.iter().all(|r| r.fundamentals.market_cap == Some(2_500_000_000)));
        assert!(aapl[0].fundamentals.enriched_at.is_some());
        assert_eq!(aapl[0].fundamentals.enriched_at, aapl[1].fundamentals.enriched_at);
        let msft = rows.iter().find(|r| r.ticker == "MSFT").unwrap();
        assert!(msft.fundamentals.enriched_at.is_none());
    }

    #[tokio::test]
    async fn second_run_skips_fresh_tickers() {
        let repo = seeded(&["A", "B"]).await;
        let client = Arc::new(ScriptedFundamentals::ok());
        let enricher = enricher(repo, client.clone());

        enricher.enrich(5, &CancelFlag::new()).await.unwrap();
        let stats = enricher.enrich(5, &CancelFlag::new()).await.unwrap();

        assert_eq!(stats.total_stocks, 0);
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_keeps_nothing_half_done() {
        let repo = seeded(&["A", "B"]).await;
        let client = Arc::new(ScriptedFundamentals::ok());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = enricher(repo, client.clone())
            .enrich(5, &cancel)
            .await
            .unwrap_err();
        assert!(crate::cancel::is_cancelled(&err));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn any_fresh_row_makes_the_ticker_fresh() {
        let repo = Arc::new(MemoryStockRepository::new());
        repo.upsert_batch(&[new_action("AAPL", ts(1)), new_action("AAPL", ts(5))])
            .await
            .unwrap();
        let mut older = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.time == ts(1))
            .unwrap();
        older.fundamentals.enriched_at = Some(Utc::now() - chrono::Duration::hours(1));
        repo.update(&older).await.unwrap();
        let client = Arc::new(ScriptedFundamentals::ok());

        let stats = enricher(repo, client.clone())
            .enrich(5, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(stats.total_stocks, 1);
        assert_eq!(stats.already_enriched, 1);
        assert_eq!(stats.newly_enriched, 0);
        assert!(client.calls().is_empty());
    }

    fn delayed(repo: Arc<MemoryStockRepository>, client: Arc<ScriptedFundamentals>) -> Enricher {
        Enricher::new(
            repo,
            client,
            EnrichOptions {
                call_delay: Duration::from_secs(15),
                ..EnrichOptions::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_successful_calls_but_not_after_the_last() {
        let repo = seeded(&["A", "B", "C"]).await;
        let client = Arc::new(ScriptedFundamentals::ok());

        let started = tokio::time::Instant::now();
        let stats = delayed(repo, client).enrich(5, &CancelFlag::new()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(stats.newly_enriched, 3);
        assert!(elapsed >= Duration::from_secs(30), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(45), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_stop_skips_the_trailing_wait() {
        let repo = seeded(&["A", "B", "C"]).await;
        let client = Arc::new(ScriptedFundamentals::failing_at(
            2,
            FundamentalsErrorKind::RateLimited,
        ));

        let started = tokio::time::Instant::now();
        let stats = delayed(repo, client).enrich(5, &CancelFlag::new()).await.unwrap();
        let elapsed = started.elapsed();

        assert!(stats.rate_limit_reached);
        assert_eq!(stats.newly_enriched, 1);
        assert!(elapsed >= Duration::from_secs(15), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(30), "elapsed {elapsed:?}");
    }

    /// Fails exactly the `fail_on`-th `get_all` call.
    struct OneBadRead {
        inner: MemoryStockRepository,
        reads: Mutex<usize>,
        fail_on: usize,
    }

    #[async_trait::async_trait]
    impl StockRepository for OneBadRead {
        async fn get_all(&self) -> anyhow::Result<Vec<AnalystAction>> {
            let n = {
                let mut reads = self.reads.lock().unwrap();
                *reads += 1;
                *reads
            };
            anyhow::ensure!(n != self.fail_on, "connection reset");
            self.inner.get_all().await
        }

        async fn get_by_ticker(&self, ticker: &str) -> anyhow::Result<Option<AnalystAction>> {
            self.inner.get_by_ticker(ticker).await
        }

        async fn upsert_batch(
            &self,
            items: &[NewAnalystAction],
        ) -> anyhow::Result<crate::domain::stock::BatchOutcome> {
            self.inner.upsert_batch(items).await
        }

        async fn update(&self, action: &AnalystAction) -> anyhow::Result<()> {
            self.inner.update(action).await
        }

        async fn count_key_duplicates(&self) -> anyhow::Result<i64> {
            self.inner.count_key_duplicates().await
        }

        async fn top_rated(&self, limit: i64) -> anyhow::Result<Vec<AnalystAction>> {
            self.inner.top_rated(limit).await
        }
    }

    #[tokio::test]
    async fn failed_freshness_read_counts_as_stale() {
        let inner = MemoryStockRepository::new();
        inner.upsert_batch(&[new_action("AAPL", ts(1))]).await.unwrap();
        // Read 1 selects candidates, read 2 is the freshness check.
        let repo = Arc::new(OneBadRead {
            inner,
            reads: Mutex::new(0),
            fail_on: 2,
        });
        let client = Arc::new(ScriptedFundamentals::ok());
        let enricher = Enricher::new(
            repo.clone(),
            client.clone(),
            EnrichOptions {
                call_delay: Duration::ZERO,
                ..EnrichOptions::default()
            },
        );

        let stats = enricher.enrich(5, &CancelFlag::new()).await.unwrap();

        assert_eq!(stats.newly_enriched, 1);
        assert_eq!(client.calls(), vec!["AAPL"]);
        let row = repo.inner.get_by_ticker("AAPL").await.unwrap().unwrap();
        assert!(row.fundamentals.enriched_at.is_some());
    }
}
