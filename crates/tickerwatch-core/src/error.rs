//! Error types for tickerwatch-core

use thiserror::Error;

/// Result type alias for tickerwatch-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for domain validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Ticker input was empty after trimming
    #[error("Ticker must not be empty")]
    EmptyTicker,

    /// Ticker contains characters no exchange symbol uses
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),
}
