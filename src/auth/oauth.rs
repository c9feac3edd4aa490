use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::{AuthMode, DEFAULT_TOKEN_TIMEOUT, ProxyConfig};
use crate::{ProxyError, Result};

pub const RQ_UID_HEADER: &str = "RqUID";

#[derive(Clone)]
pub struct AccessToken {
    pub access_token: String,
    /// Expiry reported by the OAuth endpoint, epoch milliseconds.
    pub expires_at_ms: u64,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// Client-credentials exchange against the GigaChat OAuth endpoint.
#[derive(Clone, Debug)]
pub struct GigaChatOAuth {
    pub token_url: String,
    pub scope: String,
    auth: AuthMode,
    timeout: Duration,
}

impl GigaChatOAuth {
    pub fn new(
        token_url: impl Into<String>,
        auth: AuthMode,
        scope: impl Into<String>,
    ) -> Result<Self> {
        let token_url = token_url.into();
        let scope = scope.into();

        if token_url.trim().is_empty() {
            return Err(ProxyError::Config("oauth token_url is required".to_string()));
        }
        if scope.trim().is_empty() {
            return Err(ProxyError::Config("oauth scope is required".to_string()));
        }

        Ok(Self {
            token_url,
            scope,
            auth,
            timeout: DEFAULT_TOKEN_TIMEOUT,
        })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        Ok(
            Self::new(config.oauth_url.as_str(), config.auth.clone(), config.scope.as_str())?
                .with_timeout(config.token_timeout),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Performs one exchange. Every call carries a fresh `RqUID`; nothing is retried here.
    pub async fn fetch_token(&self, http: &reqwest::Client) -> Result<AccessToken> {
        let credentials = self.auth.basic_credentials().ok_or_else(|| {
            ProxyError::Config("GigaChat credentials are not configured".to_string())
        })?;
        let rq_uid = Uuid::new_v4().to_string();
        tracing::info!(rq_uid = %rq_uid, scope = %self.scope, "requesting new GigaChat token");

        let parsed = crate::utils::http::send_checked_json::<TokenResponse>(
            http.post(self.token_url.as_str())
                .timeout(self.timeout)
                .header(ACCEPT, "application/json")
                .header(RQ_UID_HEADER, rq_uid.as_str())
                .header(AUTHORIZATION, format!("Basic {credentials}"))
                .form(&[("scope", self.scope.as_str())]),
        )
        .await?;

        let access_token = parsed
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                ProxyError::InvalidResponse("oauth response missing access_token".to_string())
            })?;
        let expires_at_ms = parsed.expires_at.ok_or_else(|| {
            ProxyError::InvalidResponse("oauth response missing expires_at".to_string())
        })?;

        Ok(AccessToken {
            access_token,
            expires_at_ms,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<u64>,
}
