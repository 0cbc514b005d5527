//! Client for the tickerwatch backend
//!
//! This crate is everything between a tickerwatch front end and the backend:
//!
//! - Session handling over an identity provider (sign-in, sign-up, token refresh)
//! - A gateway for the watchlist, price, stock detail and summary endpoints
//! - View-models for the dashboard, the stock detail screen and the
//!   transcript summarizer
//!
//! # Architecture
//!
//! - [`Session`]: explicit session context; hands out fresh bearer tokens
//! - [`ApiClient`]: implements [`Backend`] over an [`HttpTransport`]
//! - [`DetailPoller`]: fetches a stock detail and keeps polling while the
//!   AI summary is still generating
//! - [`WatchlistBoard`] and [`TranscriptForm`]: headless screen state
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickerwatch_client::{
//!     ApiClient, ClientConfig, DetailPoller, FirebaseIdentity, ReqwestTransport, Session,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
//!
//!     let identity = Arc::new(FirebaseIdentity::from_config(transport.clone(), &config)?);
//!     let session = Arc::new(Session::new(identity, config.token_refresh_margin));
//!     session.sign_in("me@example.com", "hunter22").await?;
//!
//!     let api = Arc::new(ApiClient::new(transport, config.api_base_url.clone(), session));
//!     let poller = DetailPoller::new(api, config.poll_interval);
//!     poller.set_ticker("AAPL");
//!
//!     let state = poller.wait_until_settled().await;
//!     println!("{:?}", state.phase);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod format;
pub mod identity;
pub mod poller;
pub mod scheduler;
pub mod session;
pub mod transcript;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use api::{ApiClient, Backend};
pub use board::{WatchlistBoard, WatchlistRow};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use identity::{Credential, FirebaseIdentity, Identity, IdentityProvider, SignedIn};
pub use poller::{DetailPhase, DetailPoller, DetailState};
pub use scheduler::{CancelToken, schedule};
pub use session::{Session, SessionStore};
pub use transcript::{SUMMARY_FALLBACK, TranscriptForm};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
