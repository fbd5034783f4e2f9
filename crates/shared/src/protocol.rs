use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::ArticleId;

/// Page size of the listing request.
pub const LIST_LIMIT: u32 = 30;
/// Offset of the listing request; only the first page is ever requested.
pub const LIST_OFFSET: u32 = 0;
/// Result cap sent with every search request.
pub const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl Article {
    pub fn published_at_parsed(&self) -> Option<DateTime<FixedOffset>> {
        self.published_at.as_deref().and_then(parse_timestamp)
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM[:SS[.f]]` (read as UTC) or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().with_timezone(&utc));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().with_timezone(&utc))
}

/// Body of create and update requests. Optional fields are always sent,
/// as explicit `null` when absent, so an update replaces every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleWrite {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    pub article: Article,
}

impl SearchHit {
    pub fn score_or_default(&self) -> f64 {
        self.score.unwrap_or_default()
    }

    pub fn distance_or_default(&self) -> f64 {
        self.distance.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
}
