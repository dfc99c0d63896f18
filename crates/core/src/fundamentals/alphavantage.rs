use crate::config::{env_or, Settings};
use crate::fundamentals::error::{FundamentalsApiError, FundamentalsErrorKind};
use crate::fundamentals::{CompanyOverview, FundamentalsClient, TopMovers};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Keys Alpha Vantage uses for in-band notices on an otherwise successful response.
const NOTICE_KEYS: [&str; 3] = ["Note", "Information", "Error Message"];

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_alpha_vantage_api_key()?.to_string();
        let base_url = settings
            .alpha_vantage_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = env_or("ALPHA_VANTAGE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        Self::new(base_url, api_key, Duration::from_secs(timeout_secs))
    }

    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Alpha Vantage http client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        function: &'static str,
        params: &[(&str, &str)],
    ) -> Result<(T, Value)> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[("function", function), ("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| transport_error(function, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| transport_error(function, e))?;

        if !status.is_success() {
            return Err(FundamentalsApiError::new(
                function,
                FundamentalsErrorKind::Http,
                format!("HTTP {status}: {text}"),
            )
            .into());
        }

        let raw_json = serde_json::from_str::<Value>(&text).map_err(|e| {
            FundamentalsApiError::new(
                function,
                FundamentalsErrorKind::Decode,
                format!("{e}: {text}"),
            )
        })?;

        if let Some(notice) = find_notice(&raw_json) {
            return Err(FundamentalsApiError::notice(function, notice).into());
        }

        let parsed = serde_json::from_value::<T>(raw_json.clone()).map_err(|e| {
            FundamentalsApiError::new(function, FundamentalsErrorKind::Decode, e.to_string())
        })?;
        Ok((parsed, raw_json))
    }
}

fn transport_error(function: &'static str, e: reqwest::Error) -> FundamentalsApiError {
    FundamentalsApiError::new(function, FundamentalsErrorKind::Http, e.to_string())
}

fn find_notice(v: &Value) -> Option<&str> {
    let obj = v.as_object()?;
    NOTICE_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
}

#[async_trait::async_trait]
impl FundamentalsClient for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        "alpha_vantage"
    }

    async fn company_overview(&self, ticker: &str) -> Result<CompanyOverview> {
        let (overview, raw) = self
            .query::<CompanyOverview>("OVERVIEW", &[("symbol", ticker)])
            .await?;

        // Unknown symbols come back as `{}` with status 200.
        if raw.as_object().map_or(true, |o| o.is_empty()) {
            return Err(FundamentalsApiError::new(
                "OVERVIEW",
                FundamentalsErrorKind::Empty,
                format!("no overview data for {ticker}"),
            )
            .into());
        }

        Ok(overview)
    }

    async fn top_movers(&self) -> Result<TopMovers> {
        let (movers, _) = self.query::<TopMovers>("TOP_GAINERS_LOSERS", &[]).await?;
        Ok(movers)
    }
}
