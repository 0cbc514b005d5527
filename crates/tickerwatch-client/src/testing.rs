//! In-memory backend for view-model tests

use crate::api::Backend;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tickerwatch_core::{
    PriceQuote, Quotes, SUMMARY_PENDING, StockDetail, Ticker, TranscriptSummary, WatchlistEntry,
};
use tokio::time::Instant;

/// Scripted stock detail response
#[derive(Debug, Clone)]
pub(crate) enum DetailReply {
    Detail(StockDetail),
    Fail(u16, &'static str),
}

#[derive(Default)]
struct FakeState {
    watchlist: Vec<WatchlistEntry>,
    next_id: i64,
    quotes: Quotes,
    fail_prices: bool,
    details: HashMap<String, VecDeque<DetailReply>>,
    detail_delays: HashMap<String, Duration>,
    detail_calls: Vec<(String, Instant)>,
    added: Vec<String>,
    summary: Option<String>,
    fail_summary: bool,
}

/// Backend that keeps its watchlist in memory and replays scripted details
#[derive(Default)]
pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
}

pub(crate) fn detail(price: f64, summary: &str) -> StockDetail {
    StockDetail {
        price,
        change: 1.25,
        change_percent: 0.66,
        market_cap: 2_950_000_000_000.0,
        pe_ratio: 29.4,
        eps: 6.43,
        volume: 51_234_000.0,
        summary: summary.to_string(),
    }
}

pub(crate) fn pending(price: f64) -> StockDetail {
    detail(price, SUMMARY_PENDING)
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_tickers(self, tickers: &[&str]) -> Self {
        {
            let mut state = self.lock();
            for ticker in tickers {
                let id = state.next_id + 1;
                state.next_id = id;
                state.watchlist.push(entry(id, ticker));
            }
        }
        self
    }

    pub(crate) fn with_quote(self, ticker: &str, price: f64, change_percent: f64) -> Self {
        self.lock().quotes.insert(
            ticker.to_string(),
            PriceQuote {
                ticker: ticker.to_string(),
                price,
                change: price * change_percent / 100.0,
                change_percent,
            },
        );
        self
    }

    pub(crate) fn failing_prices(self) -> Self {
        self.lock().fail_prices = true;
        self
    }

    /// Replies for `ticker` in order; the last one repeats
    pub(crate) fn script(self, ticker: &str, replies: Vec<DetailReply>) -> Self {
        self.lock()
            .details
            .insert(ticker.to_string(), replies.into_iter().collect());
        self
    }

    /// Every detail fetch for `ticker` takes this long
    pub(crate) fn delay(self, ticker: &str, delay: Duration) -> Self {
        self.lock().detail_delays.insert(ticker.to_string(), delay);
        self
    }

    pub(crate) fn with_summary(self, summary: Option<&str>) -> Self {
        self.lock().summary = summary.map(str::to_string);
        self
    }

    pub(crate) fn failing_summary(self) -> Self {
        self.lock().fail_summary = true;
        self
    }

    pub(crate) fn detail_calls(&self) -> Vec<(String, Instant)> {
        self.lock().detail_calls.clone()
    }

    pub(crate) fn detail_call_count(&self, ticker: &str) -> usize {
        self.lock()
            .detail_calls
            .iter()
            .filter(|(t, _)| t == ticker)
            .count()
    }

    /// Tickers exactly as they were sent to add
    pub(crate) fn added(&self) -> Vec<String> {
        self.lock().added.clone()
    }

    pub(crate) fn tickers(&self) -> Vec<String> {
        self.lock()
            .watchlist
            .iter()
            .map(|e| e.ticker.clone())
            .collect()
    }
}

fn entry(id: i64, ticker: &str) -> WatchlistEntry {
    WatchlistEntry {
        id,
        ticker: ticker.to_string(),
        added_at: Utc::now(),
        owner_id: 1,
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        Ok(self.lock().watchlist.clone())
    }

    async fn add_to_watchlist(&self, ticker: &Ticker) -> Result<WatchlistEntry> {
        let mut state = self.lock();
        state.added.push(ticker.to_string());
        let normalized = ticker.as_str().to_uppercase();
        if let Some(existing) = state.watchlist.iter().find(|e| e.ticker == normalized) {
            return Ok(existing.clone());
        }
        let id = state.next_id + 1;
        state.next_id = id;
        let created = entry(id, &normalized);
        state.watchlist.push(created.clone());
        Ok(created)
    }

    async fn remove_from_watchlist(&self, ticker: &str) -> Result<serde_json::Value> {
        let mut state = self.lock();
        let before = state.watchlist.len();
        state.watchlist.retain(|e| e.ticker != ticker);
        if state.watchlist.len() == before {
            return Err(ClientError::Server {
                status: 404,
                message: r#"{"detail":"Ticker not in watchlist"}"#.to_string(),
            });
        }
        Ok(serde_json::json!({ "message": format!("Removed {ticker} from watchlist") }))
    }

    async fn stock_prices(&self, tickers: &[String]) -> Result<Quotes> {
        let state = self.lock();
        if state.fail_prices {
            return Err(ClientError::Network("connection refused".to_string()));
        }
        let wanted: HashSet<&String> = tickers.iter().collect();
        Ok(state
            .quotes
            .iter()
            .filter(|(ticker, _)| wanted.contains(ticker))
            .map(|(ticker, quote)| (ticker.clone(), quote.clone()))
            .collect())
    }

    async fn stock_detail(&self, ticker: &str) -> Result<StockDetail> {
        let delay = {
            let mut state = self.lock();
            state.detail_calls.push((ticker.to_string(), Instant::now()));
            state.detail_delays.get(ticker).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut state = self.lock();
            let queue = state.details.get_mut(ticker);
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(DetailReply::Detail(detail)) => Ok(detail),
            Some(DetailReply::Fail(status, message)) => Err(ClientError::Server {
                status,
                message: message.to_string(),
            }),
            None => Err(ClientError::Server {
                status: 404,
                message: format!(r#"{{"detail":"Could not fetch details for {ticker}"}}"#),
            }),
        }
    }

    async fn summarize_transcript(
        &self,
        ticker: &str,
        _transcript_text: &str,
    ) -> Result<TranscriptSummary> {
        let state = self.lock();
        if state.fail_summary {
            return Err(ClientError::Server {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        Ok(TranscriptSummary {
            ticker: ticker.to_string(),
            summary: state.summary.clone(),
        })
    }
}
