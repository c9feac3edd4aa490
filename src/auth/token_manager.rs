use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::oauth::{AccessToken, GigaChatOAuth};
use crate::clock::{Clock, SystemClock};
use crate::config::{DEFAULT_EXPIRY_MARGIN_SECS, ProxyConfig};
use crate::{ProxyError, Result};

/// Anything that can hand out a bearer token for the completions endpoint.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialState {
    Empty,
    Valid,
    Stale,
}

/// The cached token and the instant it stops being usable.
///
/// Both fields are only ever replaced together, by assigning a whole new `Credential`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    access_token: Option<String>,
    /// Epoch seconds, safety margin already subtracted.
    expires_at: u64,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_token(token: &AccessToken, margin_secs: u64) -> Self {
        Self {
            access_token: Some(token.access_token.clone()),
            expires_at: (token.expires_at_ms / 1000).saturating_sub(margin_secs),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn state(&self, now: u64) -> CredentialState {
        match self.access_token {
            None => CredentialState::Empty,
            Some(_) if now < self.expires_at => CredentialState::Valid,
            Some(_) => CredentialState::Stale,
        }
    }

    /// The token, if it is still usable at `now`.
    pub fn valid_token(&self, now: u64) -> Option<&str> {
        match self.state(now) {
            CredentialState::Valid => self.access_token(),
            CredentialState::Empty | CredentialState::Stale => None,
        }
    }
}

/// Owns the GigaChat credential and serializes every read and refresh of it.
///
/// The lock is held across an on-demand refresh, so when several requests notice a stale
/// token at once only the first one talks to the OAuth endpoint; the rest wake up to the
/// freshly committed credential.
pub struct TokenManager {
    oauth: GigaChatOAuth,
    http: reqwest::Client,
    credential: Mutex<Credential>,
    clock: Box<dyn Clock>,
    expiry_margin_secs: u64,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("oauth", &self.oauth)
            .field("expiry_margin_secs", &self.expiry_margin_secs)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(oauth: GigaChatOAuth, http: reqwest::Client) -> Self {
        Self::with_clock(oauth, http, Box::new(SystemClock))
    }

    pub fn with_clock(oauth: GigaChatOAuth, http: reqwest::Client, clock: Box<dyn Clock>) -> Self {
        Self {
            oauth,
            http,
            credential: Mutex::new(Credential::empty()),
            clock,
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
        }
    }

    pub fn from_config(config: &ProxyConfig, http: reqwest::Client) -> Result<Self> {
        let oauth = GigaChatOAuth::from_config(config)?;
        Ok(Self::new(oauth, http).with_expiry_margin_secs(config.expiry_margin_secs))
    }

    pub fn with_expiry_margin_secs(mut self, margin_secs: u64) -> Self {
        self.expiry_margin_secs = margin_secs;
        self
    }

    /// A consistent copy of the current credential.
    pub async fn snapshot(&self) -> Credential {
        self.credential.lock().await.clone()
    }

    /// Returns the cached token while `now < expires_at`, refreshing synchronously otherwise.
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut credential = self.credential.lock().await;
        let now = self.clock.now_epoch_seconds();
        let state = credential.state(now);
        if let Some(token) = credential.valid_token(now) {
            return Ok(token.to_string());
        }

        tracing::info!(?state, "GigaChat token missing or expired, refreshing");
        let token = self.refresh_locked(&mut credential).await?;

        let now = self.clock.now_epoch_seconds();
        if credential.valid_token(now).is_none() {
            return Err(ProxyError::InvalidResponse(format!(
                "oauth issued a token that is already expired (expires_at={}, now={now})",
                credential.expires_at()
            )));
        }
        Ok(token)
    }

    /// Unconditionally exchanges credentials for a new token and commits it.
    ///
    /// On failure the previous credential is left untouched.
    pub async fn refresh(&self) -> Result<String> {
        let mut credential = self.credential.lock().await;
        self.refresh_locked(&mut credential).await
    }

    async fn refresh_locked(&self, credential: &mut Credential) -> Result<String> {
        let started = Instant::now();
        match self.oauth.fetch_token(&self.http).await {
            Ok(token) => {
                *credential = Credential::from_token(&token, self.expiry_margin_secs);
                tracing::info!(
                    expires_at = credential.expires_at(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "obtained new GigaChat token"
                );
                Ok(token.access_token)
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "GigaChat token request failed"
                );
                Err(err)
            }
        }
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn bearer_token(&self) -> Result<String> {
        self.get_valid_token().await
    }
}
