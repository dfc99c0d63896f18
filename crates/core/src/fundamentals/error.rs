use std::fmt;

/// Text the upstream puts in its throttling notices.
pub const RATE_LIMIT_MARKERS: [&str; 3] = [
    "Thank you for using Alpha Vantage",
    "higher API call frequency",
    "rate limit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundamentalsErrorKind {
    RateLimited,
    Http,
    Upstream,
    Decode,
    Empty,
}

#[derive(Debug, Clone)]
pub struct FundamentalsApiError {
    pub function: &'static str,
    pub kind: FundamentalsErrorKind,
    pub detail: String,
}

impl FundamentalsApiError {
    pub fn new(
        function: &'static str,
        kind: FundamentalsErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            function,
            kind,
            detail: detail.into(),
        }
    }

    /// Upstream notice; classified as rate-limited when it carries one of the markers.
    pub fn notice(function: &'static str, text: &str) -> Self {
        let kind = if contains_rate_limit_marker(text) {
            FundamentalsErrorKind::RateLimited
        } else {
            FundamentalsErrorKind::Upstream
        };
        Self::new(function, kind, text)
    }
}

impl fmt::Display for FundamentalsApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fundamentals error (function={}, kind={:?}): {}",
            self.function, self.kind, self.detail
        )
    }
}

impl std::error::Error for FundamentalsApiError {}

fn contains_rate_limit_marker(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    RATE_LIMIT_MARKERS
        .iter()
        .any(|m| lower.contains(&m.to_ascii_lowercase()))
}

/// True when `err` is the upstream's throttling signal, either as a typed
/// [`FundamentalsApiError`] or as plain error text carrying a marker.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    if let Some(api) = err.downcast_ref::<FundamentalsApiError>() {
        return api.kind == FundamentalsErrorKind::RateLimited;
    }
    contains_rate_limit_marker(&format!("{err:#}"))
}
