use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of the analyst-action feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<FeedItem>,
    #[serde(default)]
    pub next_page: Option<String>,
}

impl FeedPage {
    /// The cursor for the following page, if the feed handed out a non-empty one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_page
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Raw feed record. Every field is lenient here; validation happens in the sync pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub brokerage: String,
    #[serde(default)]
    pub rating_from: String,
    #[serde(default)]
    pub rating_to: String,
    #[serde(default)]
    pub target_from: String,
    #[serde(default)]
    pub target_to: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}
