//! Wire models exchanged with the tickerwatch backend

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Placeholder the backend returns while an AI summary is still being produced
pub const SUMMARY_PENDING: &str = "generating...";

/// One ticker on a user's watchlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub id: i64,
    pub ticker: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub added_at: DateTime<Utc>,
    #[serde(rename = "user_id")]
    pub owner_id: i64,
}

/// Latest price for a ticker as returned by the batch price endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Filled in from the response map key
    #[serde(default, skip_serializing)]
    pub ticker: String,
    pub price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub change_percent: f64,
}

/// Price quotes keyed by uppercase ticker
pub type Quotes = BTreeMap<String, PriceQuote>;

/// Key statistics plus the AI analysis for one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDetail {
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub change_percent: f64,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default)]
    pub pe_ratio: f64,
    #[serde(default)]
    pub eps: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub summary: String,
}

/// Whether a stock detail's summary is final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryState<'a> {
    Pending,
    Final(&'a str),
}

impl StockDetail {
    /// A summary equal to [`SUMMARY_PENDING`] is never terminal
    pub fn is_summary_pending(&self) -> bool {
        self.summary == SUMMARY_PENDING
    }

    pub fn summary_state(&self) -> SummaryState<'_> {
        if self.is_summary_pending() {
            SummaryState::Pending
        } else {
            SummaryState::Final(&self.summary)
        }
    }
}

/// Backend user record, created on first sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub firebase_uid: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A summary the user chose to keep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSummary {
    pub id: i64,
    pub ticker: String,
    pub summary_text: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
}

/// Result of summarizing an earnings-call transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTickerRequest<'a> {
    pub ticker: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeRequest<'a> {
    pub ticker: &'a str,
    pub transcript_text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterUserRequest<'a> {
    pub email: &'a str,
    pub firebase_uid: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveSummaryRequest<'a> {
    pub ticker: &'a str,
    pub summary_text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilingSummaryRequest<'a> {
    pub ticker: &'a str,
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

/// Accept RFC 3339 as well as the naive ISO timestamps the backend emits for
/// UTC columns (`2024-05-01T12:30:00.123456`).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
