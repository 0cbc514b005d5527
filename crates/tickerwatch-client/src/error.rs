//! Error types for client operations

use thiserror::Error;

/// Errors surfaced by the gateway, the session and the view-models
#[derive(Debug, Error)]
pub enum ClientError {
    /// An authenticated call was attempted without a signed-in user
    #[error("User not authenticated")]
    NotAuthenticated,

    /// The request could not complete (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status
    ///
    /// `message` is the response body text when the backend sent one.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Missing or unexpected resource
    #[error("Data error: {0}")]
    Data(String),

    /// The identity provider rejected the request
    #[error("Identity provider error: {0}")]
    Identity(String),

    /// User input failed validation before any request was made
    #[error(transparent)]
    Invalid(#[from] tickerwatch_core::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Status code of a server error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Network(format!("request timeout: {err}"))
        } else if err.is_connect() {
            ClientError::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            ClientError::Data(format!("failed to decode response: {err}"))
        } else {
            ClientError::Network(format!("request failed: {err}"))
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("invalid URL: {err}"))
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
