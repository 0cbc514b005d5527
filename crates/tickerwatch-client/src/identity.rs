//! Identity provider boundary
//!
//! The identity provider issues bearer tokens and manages accounts. The
//! client only talks to it through [`IdentityProvider`]; [`FirebaseIdentity`]
//! is the implementation over the Identity Toolkit REST API.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// Bearer credential with its refresh material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// True when the token is expired or expires within `margin`
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - margin <= now
    }
}

/// Result of a successful sign-in or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIn {
    pub identity: Identity,
    pub credential: Credential,
}

/// Account operations offered by the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange email and password for a credential
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn>;

    /// Create an account
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedIn>;

    /// Exchange a refresh token for a new credential
    async fn refresh(&self, refresh_token: &str) -> Result<Credential>;

    /// Provider name (for logging)
    fn name(&self) -> &str;
}

/// Identity Toolkit (Firebase Auth) REST client
pub struct FirebaseIdentity {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    accounts_base: Url,
    token_base: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

impl FirebaseIdentity {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: impl Into<String>,
        accounts_base: Url,
        token_base: Url,
    ) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            accounts_base,
            token_base,
        }
    }

    /// Create from client configuration; requires the identity API key
    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &ClientConfig) -> Result<Self> {
        let api_key = config.require_identity_api_key()?;
        Ok(Self::new(
            transport,
            api_key,
            config.identity_base_url.clone(),
            config.token_base_url.clone(),
        ))
    }

    fn endpoint(&self, base: &Url, segments: &[&str]) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("{base} cannot be used as a base URL")))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn password_call(&self, action: &str, email: &str, password: &str) -> Result<SignedIn> {
        let url = self.endpoint(&self.accounts_base, &[action])?;
        let request = HttpRequest::post(url.as_str()).with_json(&PasswordRequest {
            email,
            password,
            return_secure_token: true,
        })?;

        let response = self.transport.execute(request).await?;
        let account: AccountResponse = decode(&response)?;
        let expires_at = expiry_from_now(&account.expires_in)?;

        Ok(SignedIn {
            identity: Identity {
                uid: account.local_id,
                email: if account.email.is_empty() {
                    email.to_string()
                } else {
                    account.email
                },
            },
            credential: Credential {
                id_token: account.id_token,
                refresh_token: account.refresh_token,
                expires_at,
            },
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn> {
        debug!("Signing in {}", email);
        self.password_call("accounts:signInWithPassword", email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedIn> {
        debug!("Creating account for {}", email);
        self.password_call("accounts:signUp", email, password).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let url = self.endpoint(&self.token_base, &["token"])?;
        let request = HttpRequest::post(url.as_str()).with_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

        let response = self.transport.execute(request).await?;
        let token: TokenResponse = decode(&response)?;

        Ok(Credential {
            id_token: token.id_token,
            refresh_token: token.refresh_token,
            expires_at: expiry_from_now(&token.expires_in)?,
        })
    }

    fn name(&self) -> &str {
        "firebase"
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    if !response.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(&response.body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", response.status, response.body));
        return Err(ClientError::Identity(message));
    }
    serde_json::from_str(&response.body)
        .map_err(|e| ClientError::Data(format!("unexpected identity response: {e}")))
}

fn expiry_from_now(expires_in: &str) -> Result<DateTime<Utc>> {
    let seconds: i64 = expires_in
        .trim()
        .parse()
        .map_err(|_| ClientError::Data(format!("invalid token lifetime: {expires_in}")))?;
    Ok(Utc::now() + Duration::seconds(seconds))
}
