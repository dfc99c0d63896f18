use crate::cancel::CancelFlag;
use crate::config::{env_or, Settings};
use crate::ingest::types::{FeedItem, FeedPage};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/production/swechallenge/list";
const DEFAULT_PAGE_DELAY_MS: u64 = 100;
const DEFAULT_MAX_PAGES: usize = 1000;

#[async_trait::async_trait]
pub trait FeedClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Fetches a single page. `cursor` is the opaque `next_page` token from the previous page.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage>;
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationOptions {
    pub page_delay: Duration,
    pub max_pages: usize,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl PaginationOptions {
    pub fn from_env() -> Self {
        Self {
            page_delay: Duration::from_millis(env_or("FEED_PAGE_DELAY_MS", DEFAULT_PAGE_DELAY_MS)),
            max_pages: env_or("FEED_MAX_PAGES", DEFAULT_MAX_PAGES).max(1),
        }
    }
}

/// Follows `next_page` cursors until the feed returns an empty page or an empty cursor.
///
/// Fails when more than `max_pages` pages would be needed, which guards against a feed
/// that keeps handing out cursors forever.
pub async fn fetch_all_pages(
    client: &dyn FeedClient,
    opts: PaginationOptions,
    cancel: &CancelFlag,
) -> Result<Vec<FeedItem>> {
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;

    for page in 1..=opts.max_pages {
        cancel.check("feed_page")?;

        let resp = client
            .fetch_page(cursor.as_deref())
            .await
            .with_context(|| format!("failed to fetch feed page {page}"))?;

        if resp.items.is_empty() {
            tracing::debug!(page, total = all.len(), "feed returned empty page; done");
            return Ok(all);
        }

        let page_len = resp.items.len();
        let next = resp.next_cursor().map(str::to_string);
        all.extend(resp.items);

        tracing::debug!(page, page_len, total = all.len(), "fetched feed page");

        match next {
            Some(next) => cursor = Some(next),
            None => return Ok(all),
        }

        tokio::time::sleep(opts.page_delay).await;
    }

    anyhow::bail!(
        "reached maximum page limit ({}), possible infinite pagination",
        opts.max_pages
    )
}

#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
}

impl HttpFeedClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_feed_base_url()?.to_string();
        let api_key = settings
            .feed_api_key
            .clone()
            .filter(|s| !s.trim().is_empty());

        let timeout_secs = env_or("FEED_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        let path = std::env::var("FEED_LIST_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build feed http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl FeedClient for HttpFeedClient {
    fn provider_name(&self) -> &'static str {
        "analyst_feed_http"
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage> {
        let mut req = self.http.get(self.url()).headers(self.headers()?);
        if let Some(cursor) = cursor {
            req = req.query(&[("next_page", cursor)]);
        }

        let res = req.send().await.context("feed request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read feed response")?;
        if !status.is_success() {
            anyhow::bail!("feed HTTP {status}: {text}");
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("feed response is not valid JSON: {text}"))?;
        serde_json::from_value::<FeedPage>(raw_json)
            .context("failed to parse feed response into FeedPage")
    }
}
