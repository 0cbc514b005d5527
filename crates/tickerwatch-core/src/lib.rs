//! Core domain types for tickerwatch
//!
//! This crate provides the data shapes exchanged with the tickerwatch
//! backend (watchlist entries, price quotes, stock details and saved
//! summaries), ticker normalization, and the validation error type.

pub mod error;
pub mod models;
pub mod ticker;

pub use error::{Error, Result};
pub use models::{
    PriceQuote, Quotes, SUMMARY_PENDING, SavedSummary, StockDetail, SummaryState,
    TranscriptSummary, UserProfile, WatchlistEntry,
};
pub use ticker::Ticker;
