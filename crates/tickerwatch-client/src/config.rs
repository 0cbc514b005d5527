//! Configuration for the tickerwatch client

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const ENV_API_URL: &str = "TICKERWATCH_API_URL";
pub const ENV_IDENTITY_API_KEY: &str = "TICKERWATCH_IDENTITY_API_KEY";
pub const ENV_IDENTITY_URL: &str = "TICKERWATCH_IDENTITY_URL";
pub const ENV_TOKEN_URL: &str = "TICKERWATCH_TOKEN_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "TICKERWATCH_POLL_INTERVAL_MS";
pub const ENV_SESSION_FILE: &str = "TICKERWATCH_SESSION_FILE";

const DEFAULT_API_URL: &str = "http://localhost:8000/";
const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1/";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/";

/// Configuration for the tickerwatch client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the tickerwatch backend
    pub api_base_url: Url,

    /// Web API key of the identity provider project
    pub identity_api_key: Option<String>,

    /// Base URL of the identity provider's account endpoints
    pub identity_base_url: Url,

    /// Base URL of the identity provider's token refresh endpoint
    pub token_base_url: Url,

    /// Delay between stock detail re-fetches while a summary is generating
    pub poll_interval: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Refresh the bearer token when it expires within this window
    pub token_refresh_margin: Duration,

    /// Where a signed-in session is persisted between runs
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            identity_api_key: None,
            identity_base_url: Url::parse(DEFAULT_IDENTITY_URL)
                .expect("default identity URL is valid"),
            token_base_url: Url::parse(DEFAULT_TOKEN_URL).expect("default token URL is valid"),
            poll_interval: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(30),
            token_refresh_margin: Duration::from_secs(300), // 5 minutes
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Build a configuration from `TICKERWATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("api_base_url", &self.api_base_url),
            ("identity_base_url", &self.identity_base_url),
            ("token_base_url", &self.token_base_url),
        ] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ClientError::Config(format!(
                    "{name} must be an http(s) URL, got {url}"
                )));
            }
        }

        if self.poll_interval.is_zero() {
            return Err(ClientError::Config(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ClientError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.identity_api_key.as_deref() == Some("") {
            return Err(ClientError::Config(
                "identity_api_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Identity API key, required for sign-in and token refresh
    pub fn require_identity_api_key(&self) -> Result<&str> {
        self.identity_api_key.as_deref().ok_or_else(|| {
            ClientError::Config(format!("{ENV_IDENTITY_API_KEY} environment variable not set"))
        })
    }
}

/// Parse a base URL, ensuring a trailing slash so relative joins keep the path
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(ClientError::Config(format!("{raw} cannot be used as a base URL")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    api_base_url: Option<String>,
    identity_api_key: Option<String>,
    identity_base_url: Option<String>,
    token_base_url: Option<String>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    token_refresh_margin: Option<Duration>,
    session_file: Option<PathBuf>,
    errors: Vec<String>,
}

impl ClientConfigBuilder {
    /// Set the backend base URL
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the identity provider API key
    pub fn identity_api_key(mut self, key: impl Into<String>) -> Self {
        self.identity_api_key = Some(key.into());
        self
    }

    /// Override the identity provider account endpoint base
    pub fn identity_base_url(mut self, url: impl Into<String>) -> Self {
        self.identity_base_url = Some(url.into());
        self
    }

    /// Override the token refresh endpoint base
    pub fn token_base_url(mut self, url: impl Into<String>) -> Self {
        self.token_base_url = Some(url.into());
        self
    }

    /// Set the summary polling interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set how early before expiry the bearer token is refreshed
    pub fn token_refresh_margin(mut self, duration: Duration) -> Self {
        self.token_refresh_margin = Some(duration);
        self
    }

    /// Persist the session to this file
    pub fn session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Fill unset fields from `TICKERWATCH_*` environment variables
    pub fn with_env(self) -> Self {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from a key lookup
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_base_url.is_none() {
            self.api_base_url = lookup(ENV_API_URL);
        }
        if self.identity_api_key.is_none() {
            self.identity_api_key = lookup(ENV_IDENTITY_API_KEY);
        }
        if self.identity_base_url.is_none() {
            self.identity_base_url = lookup(ENV_IDENTITY_URL);
        }
        if self.token_base_url.is_none() {
            self.token_base_url = lookup(ENV_TOKEN_URL);
        }
        if self.poll_interval.is_none() {
            if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
                match raw.trim().parse::<u64>() {
                    Ok(ms) => self.poll_interval = Some(Duration::from_millis(ms)),
                    Err(_) => self
                        .errors
                        .push(format!("{ENV_POLL_INTERVAL_MS} is not a number: {raw}")),
                }
            }
        }
        if self.session_file.is_none() {
            self.session_file = lookup(ENV_SESSION_FILE).map(PathBuf::from);
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(ClientError::Config(error));
        }

        let defaults = ClientConfig::default();

        let config = ClientConfig {
            api_base_url: match self.api_base_url {
                Some(raw) => parse_base_url(&raw)?,
                None => defaults.api_base_url,
            },
            identity_api_key: self.identity_api_key,
            identity_base_url: match self.identity_base_url {
                Some(raw) => parse_base_url(&raw)?,
                None => defaults.identity_base_url,
            },
            token_base_url: match self.token_base_url {
                Some(raw) => parse_base_url(&raw)?,
                None => defaults.token_base_url,
            },
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            token_refresh_margin: self
                .token_refresh_margin
                .unwrap_or(defaults.token_refresh_margin),
            session_file: self.session_file,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .api_base_url("http://192.168.1.9:8000")
            .poll_interval(Duration::from_millis(250))
            .request_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.api_base_url.as_str(), "http://192.168.1.9:8000/");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let url = parse_base_url("https://api.example.com/v2").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/");
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = ClientConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_http_scheme() {
        let result = ClientConfig::builder().api_base_url("ftp://example.com").build();
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_with_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://10.0.0.2:9000"),
            (ENV_IDENTITY_API_KEY, "web-key"),
            (ENV_POLL_INTERVAL_MS, "1500"),
            (ENV_SESSION_FILE, "/tmp/tw-session.json"),
        ]);

        let config = ClientConfig::builder()
            .with_lookup(|key| env.get(key).map(|v| (*v).to_string()))
            .build()
            .unwrap();

        assert_eq!(config.api_base_url.as_str(), "http://10.0.0.2:9000/");
        assert_eq!(config.require_identity_api_key().unwrap(), "web-key");
        assert_eq!(config.poll_interval, Duration::from_millis(1500));
        assert_eq!(
            config.session_file.as_deref(),
            Some(std::path::Path::new("/tmp/tw-session.json"))
        );
    }

    #[test]
    fn test_explicit_values_win_over_lookup() {
        let config = ClientConfig::builder()
            .api_base_url("http://explicit:1")
            .with_lookup(|key| (key == ENV_API_URL).then(|| "http://env:2".to_string()))
            .build()
            .unwrap();

        assert_eq!(config.api_base_url.as_str(), "http://explicit:1/");
    }

    #[test]
    fn test_bad_poll_interval_in_lookup() {
        let result = ClientConfig::builder()
            .with_lookup(|key| (key == ENV_POLL_INTERVAL_MS).then(|| "soon".to_string()))
            .build();

        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_missing_identity_key() {
        let config = ClientConfig::default();
        assert!(config.require_identity_api_key().is_err());
    }
}
