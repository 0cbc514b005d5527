//! Backend API gateway
//!
//! [`Backend`] is the surface the view-models poll and mutate; [`ApiClient`]
//! implements it over HTTP against the configured base URL, attaching a
//! fresh bearer token to every authenticated call.

use crate::error::{ClientError, Result};
use crate::session::Session;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tickerwatch_core::models::{
    AddTickerRequest, FilingSummaryRequest, RegisterUserRequest, SaveSummaryRequest,
    SummarizeRequest,
};
use tickerwatch_core::{
    Quotes, SavedSummary, StockDetail, Ticker, TranscriptSummary, UserProfile, WatchlistEntry,
};
use tracing::debug;
use url::Url;

/// Operations the dashboard, detail and summarizer screens depend on
#[async_trait]
pub trait Backend: Send + Sync {
    /// The signed-in user's watchlist
    async fn watchlist(&self) -> Result<Vec<WatchlistEntry>>;

    /// Add a ticker; the backend stores it uppercased
    async fn add_to_watchlist(&self, ticker: &Ticker) -> Result<WatchlistEntry>;

    /// Remove a ticker, returning the backend's confirmation body
    async fn remove_from_watchlist(&self, ticker: &str) -> Result<serde_json::Value>;

    /// Latest quotes keyed by ticker; tickers the backend could not price are absent
    async fn stock_prices(&self, tickers: &[String]) -> Result<Quotes>;

    /// Full detail for one ticker, including the AI summary
    async fn stock_detail(&self, ticker: &str) -> Result<StockDetail>;

    /// Summarize an earnings call transcript
    async fn summarize_transcript(
        &self,
        ticker: &str,
        transcript_text: &str,
    ) -> Result<TranscriptSummary>;
}

/// HTTP gateway to the tickerwatch backend
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base: Url,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base: Url, session: Arc<Session>) -> Self {
        Self {
            transport,
            base,
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Register the signed-in user with the backend
    pub async fn register_user(&self, email: &str, firebase_uid: &str) -> Result<UserProfile> {
        let request = HttpRequest::post(self.url(&["users"])?.as_str())
            .with_json(&RegisterUserRequest {
                email,
                firebase_uid,
            })?;
        let response = self.send_authed(request).await?;
        parse(&response, "Failed to register user")
    }

    /// The backend's profile of the signed-in user
    pub async fn me(&self) -> Result<UserProfile> {
        let request = HttpRequest::get(self.url(&["me"])?.as_str());
        let response = self.send_authed(request).await?;
        parse(&response, "Failed to fetch user")
    }

    /// Summaries the signed-in user has saved
    pub async fn summaries(&self) -> Result<Vec<SavedSummary>> {
        let request = HttpRequest::get(self.url(&["summaries"])?.as_str());
        let response = self.send_authed(request).await?;
        parse(&response, "Failed to fetch summaries")
    }

    pub async fn save_summary(&self, ticker: &str, summary_text: &str) -> Result<SavedSummary> {
        let request = HttpRequest::post(self.url(&["summaries"])?.as_str()).with_json(
            &SaveSummaryRequest {
                ticker,
                summary_text,
            },
        )?;
        let response = self.send_authed(request).await?;
        parse(&response, "Failed to save summary")
    }

    /// Summary of the latest 10-Q filing; the shape is backend-defined
    pub async fn filing_summary(&self, ticker: &str, debug: bool) -> Result<serde_json::Value> {
        let request = HttpRequest::post(self.url(&["summary-by-ticker"])?.as_str())
            .with_json(&FilingSummaryRequest { ticker, debug })?;
        let response = self.transport.execute(request).await?;
        parse(&response, "API call failed")
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("{} cannot be used as a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_authed(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.session.fresh_credential().await?;
        self.transport.execute(request.with_bearer(&token)).await
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        let request = HttpRequest::get(self.url(&["watchlist"])?.as_str());
        let response = self.send_authed(request).await?;
        parse(&response, "Failed to fetch watchlist")
    }

    async fn add_to_watchlist(&self, ticker: &Ticker) -> Result<WatchlistEntry> {
        let request = HttpRequest::post(self.url(&["watchlist"])?.as_str()).with_json(
            &AddTickerRequest {
                ticker: ticker.as_str(),
            },
        )?;
        let response = self.send_authed(request).await?;
        parse(&response, "Failed to add to watchlist")
    }

    async fn remove_from_watchlist(&self, ticker: &str) -> Result<serde_json::Value> {
        let request = HttpRequest::delete(self.url(&["watchlist", ticker])?.as_str());
        let response = self.send_authed(request).await?;
        if response.is_success() && response.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        parse(&response, "Failed to delete from watchlist")
    }

    async fn stock_prices(&self, tickers: &[String]) -> Result<Quotes> {
        if tickers.is_empty() {
            return Ok(Quotes::new());
        }

        let mut url = self.url(&["stock-prices"])?;
        url.query_pairs_mut()
            .append_pair("symbols", &tickers.join(","));

        let response = self.transport.execute(HttpRequest::get(url.as_str())).await?;
        let mut quotes: Quotes = parse(&response, "Failed to fetch prices")?;
        for (ticker, quote) in &mut quotes {
            quote.ticker.clone_from(ticker);
        }

        debug!("Priced {} of {} tickers", quotes.len(), tickers.len());
        Ok(quotes)
    }

    async fn stock_detail(&self, ticker: &str) -> Result<StockDetail> {
        let request = HttpRequest::get(self.url(&["stock", ticker])?.as_str());
        let response = self.send_authed(request).await?;
        parse(&response, "Failed to fetch stock details")
    }

    async fn summarize_transcript(
        &self,
        ticker: &str,
        transcript_text: &str,
    ) -> Result<TranscriptSummary> {
        // The backend routes this one with a trailing slash
        let request = HttpRequest::post(self.url(&["summarize", ""])?.as_str()).with_json(
            &SummarizeRequest {
                ticker,
                transcript_text,
            },
        )?;
        let response = self.transport.execute(request).await?;
        let mut summary: TranscriptSummary = parse(&response, "API call failed")?;
        if summary.ticker.is_empty() {
            summary.ticker = ticker.to_string();
        }
        Ok(summary)
    }
}

/// Decode a 2xx body, or turn anything else into a server error
fn parse<T: DeserializeOwned>(response: &HttpResponse, default_message: &str) -> Result<T> {
    if !response.is_success() {
        let body = response.body.trim();
        return Err(ClientError::Server {
            status: response.status,
            message: if body.is_empty() {
                default_message.to_string()
            } else {
                body.to_string()
            },
        });
    }

    serde_json::from_str(&response.body)
        .map_err(|e| ClientError::Data(format!("{default_message}: unexpected response: {e}")))
}
