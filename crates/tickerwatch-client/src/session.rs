//! Session context
//!
//! [`Session`] is passed explicitly to whatever needs the current user. It
//! holds the signed-in identity and hands out a fresh bearer token on demand,
//! refreshing it through the [`IdentityProvider`] when it is about to expire.

use crate::error::{ClientError, Result};
use crate::identity::{Identity, IdentityProvider, SignedIn};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tokens in the session file are credentials
#[cfg(unix)]
const SESSION_FILE_MODE: u32 = 0o600;

/// File-backed persistence for a signed-in session
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a stored session; a missing file means signed out
    pub async fn load(&self) -> Result<Option<SignedIn>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the session, readable by the owner only on unix
    pub async fn save(&self, signed_in: &SignedIn) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string_pretty(signed_in)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(SESSION_FILE_MODE);
        let mut file = options.open(&self.path).await?;

        // An existing file keeps its old mode on open
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(SESSION_FILE_MODE))
                .await?;
        }

        file.write_all(raw.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The current user's session
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    current: Mutex<Option<SignedIn>>,
    store: Option<SessionStore>,
    refresh_margin: chrono::Duration,
}

impl Session {
    /// A signed-out session
    pub fn new(provider: Arc<dyn IdentityProvider>, refresh_margin: Duration) -> Self {
        Self {
            provider,
            current: Mutex::new(None),
            store: None,
            refresh_margin: chrono::Duration::from_std(refresh_margin)
                .unwrap_or_else(|_| chrono::Duration::minutes(5)),
        }
    }

    /// Persist sign-ins to `store` and restore a previous one if present
    pub async fn restore(
        provider: Arc<dyn IdentityProvider>,
        refresh_margin: Duration,
        store: SessionStore,
    ) -> Result<Self> {
        let restored = store.load().await?;
        if let Some(signed_in) = &restored {
            debug!(
                "Restored session for {} from {}",
                signed_in.identity.email,
                store.path().display()
            );
        }

        let mut session = Self::new(provider, refresh_margin);
        session.current = Mutex::new(restored);
        session.store = Some(store);
        Ok(session)
    }

    /// The signed-in identity, if any
    pub async fn current_identity(&self) -> Option<Identity> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|signed_in| signed_in.identity.clone())
    }

    /// A bearer token valid for at least the refresh margin
    ///
    /// Fails with [`ClientError::NotAuthenticated`] when nobody is signed in.
    pub async fn fresh_credential(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        let signed_in = current.as_mut().ok_or(ClientError::NotAuthenticated)?;

        if signed_in
            .credential
            .expires_within(self.refresh_margin, Utc::now())
        {
            debug!(
                "Refreshing token for {} via {}",
                signed_in.identity.email,
                self.provider.name()
            );
            signed_in.credential = self
                .provider
                .refresh(&signed_in.credential.refresh_token)
                .await?;
            self.persist(signed_in).await;
        }

        Ok(signed_in.credential.id_token.clone())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let signed_in = self.provider.sign_in(email, password).await?;
        let identity = signed_in.identity.clone();
        self.persist(&signed_in).await;
        *self.current.lock().await = Some(signed_in);

        info!("Signed in as {}", identity.email);
        Ok(identity)
    }

    /// Create an account without signing in
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let created = self.provider.sign_up(email, password).await?;
        info!("Created account for {}", created.identity.email);
        Ok(created.identity)
    }

    pub async fn sign_out(&self) -> Result<()> {
        let previous = self.current.lock().await.take();
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        if let Some(signed_in) = previous {
            info!("Signed out {}", signed_in.identity.email);
        }
        Ok(())
    }

    async fn persist(&self, signed_in: &SignedIn) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(signed_in).await {
                warn!(
                    "Failed to persist session to {}: {}",
                    store.path().display(),
                    e
                );
            }
        }
    }
}
