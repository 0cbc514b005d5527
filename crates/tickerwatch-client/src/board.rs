//! Watchlist dashboard view-model

use crate::api::Backend;
use crate::error::{ClientError, Result};
use crate::format;
use std::sync::Arc;
use tickerwatch_core::{Quotes, Ticker, WatchlistEntry};
use tracing::{info, warn};

/// One dashboard line, ready to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchlistRow {
    pub ticker: String,
    pub price: String,
    pub change: String,
    /// Badge colour: true for a gain, false for a loss, no change or no quote
    pub positive: bool,
}

/// The signed-in user's watchlist with the latest quotes
///
/// Failures are kept in [`error`](Self::error) as the message the dashboard
/// shows, and also returned to the caller.
pub struct WatchlistBoard {
    backend: Arc<dyn Backend>,
    entries: Vec<WatchlistEntry>,
    quotes: Quotes,
    error: Option<String>,
    loading: bool,
}

impl WatchlistBoard {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            entries: Vec::new(),
            quotes: Quotes::new(),
            error: None,
            loading: false,
        }
    }

    pub fn entries(&self) -> &[WatchlistEntry] {
        &self.entries
    }

    pub fn quotes(&self) -> &Quotes {
        &self.quotes
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Fetch the watchlist, then quotes for its tickers
    pub async fn load(&mut self) -> Result<()> {
        self.loading = true;
        self.error = None;

        let fetched = self.backend.watchlist().await;
        self.loading = false;
        let entries = fetched.map_err(|e| self.fail(e))?;
        self.entries = entries;

        self.refresh_prices().await;
        Ok(())
    }

    /// Re-fetch quotes; a failure keeps the previous quotes
    pub async fn refresh_prices(&mut self) {
        if self.entries.is_empty() {
            self.quotes.clear();
            return;
        }

        let tickers: Vec<String> = self.entries.iter().map(|e| e.ticker.clone()).collect();
        match self.backend.stock_prices(&tickers).await {
            Ok(quotes) => self.quotes = quotes,
            Err(e) => warn!("Failed to fetch prices for {}: {}", tickers.join(","), e),
        }
    }

    /// Add the ticker typed by the user, then reload
    ///
    /// Blank input is ignored and returns `Ok(None)`.
    pub async fn add(&mut self, input: &str) -> Result<Option<WatchlistEntry>> {
        if input.trim().is_empty() {
            return Ok(None);
        }

        let ticker = Ticker::parse(input).map_err(|e| self.fail(e.into()))?;
        let added = self.backend.add_to_watchlist(&ticker).await;
        let entry = added.map_err(|e| self.fail(e))?;
        info!("Added {} to watchlist", entry.ticker);

        self.load().await?;
        Ok(Some(entry))
    }

    /// Remove a ticker, then reload; on failure the list is left as it was
    pub async fn remove(&mut self, ticker: &str) -> Result<()> {
        let removed = self.backend.remove_from_watchlist(ticker).await;
        removed.map_err(|e| self.fail(e))?;
        info!("Removed {} from watchlist", ticker);

        self.load().await
    }

    pub fn rows(&self) -> Vec<WatchlistRow> {
        self.entries
            .iter()
            .map(|entry| {
                let quote = self.quotes.get(&entry.ticker.to_uppercase());
                WatchlistRow {
                    ticker: entry.ticker.clone(),
                    price: format::price(quote.map(|q| q.price)),
                    change: quote.map_or_else(
                        || format::MISSING.to_string(),
                        |q| format::change_badge(q.change_percent),
                    ),
                    positive: quote.is_some_and(|q| q.change_percent > 0.0),
                }
            })
            .collect()
    }

    fn fail(&mut self, error: ClientError) -> ClientError {
        self.error = Some(error.to_string());
        error
    }
}
