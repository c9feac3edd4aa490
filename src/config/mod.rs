//! Runtime configuration for the proxy, resolved from environment variables.

mod env;

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

pub use env::{Env, parse_dotenv};

use crate::{ProxyError, Result};

pub const DEFAULT_OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
pub const DEFAULT_COMPLETIONS_URL: &str =
    "https://gigachat.devices.sberbank.ru/api/v1/chat/completions";
pub const DEFAULT_SCOPE: &str = "GIGACHAT_API_PERS";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMPLETIONS_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(50 * 60);
pub const DEFAULT_EXPIRY_MARGIN_SECS: u64 = 60;

pub const CLIENT_ID_KEY: &str = "GIGACHAT_CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "GIGACHAT_CLIENT_SECRET";
pub const AUTH_KEY_KEY: &str = "GIGACHAT_AUTH_KEY";
pub const SCOPE_KEY: &str = "GIGACHAT_SCOPE";
pub const OAUTH_URL_KEY: &str = "GIGACHAT_OAUTH_URL";
pub const COMPLETIONS_URL_KEY: &str = "GIGACHAT_COMPLETIONS_URL";
pub const INSECURE_TLS_KEY: &str = "GIGACHAT_INSECURE_TLS";
pub const FRONTEND_ORIGINS_KEY: &str = "FRONTEND_ORIGINS";
pub const HOST_KEY: &str = "HOST";
pub const PORT_KEY: &str = "PORT";

/// How the proxy authenticates itself against the OAuth endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Basic base64(client_id:client_secret)`.
    ClientSecret {
        client_id: String,
        client_secret: String,
    },
    /// Pre-shared authorization key, already base64-encoded by the issuer.
    AuthorizationKey(String),
    /// Nothing configured; every refresh fails without touching the network.
    Missing,
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientSecret { client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Self::AuthorizationKey(_) => f
                .debug_tuple("AuthorizationKey")
                .field(&"<redacted>")
                .finish(),
            Self::Missing => f.write_str("Missing"),
        }
    }
}

impl AuthMode {
    pub fn client_secret(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::ClientSecret {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn authorization_key(key: impl Into<String>) -> Self {
        Self::AuthorizationKey(key.into())
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    /// The credential part of the `Authorization: Basic ...` header.
    pub fn basic_credentials(&self) -> Option<String> {
        match self {
            Self::ClientSecret {
                client_id,
                client_secret,
            } => Some(BASE64_STANDARD.encode(format!("{client_id}:{client_secret}"))),
            Self::AuthorizationKey(key) => Some(key.trim().to_string()),
            Self::Missing => None,
        }
    }

    fn resolve(env: &Env) -> Self {
        if let Some(key) = env.get(AUTH_KEY_KEY) {
            return Self::AuthorizationKey(key.trim().to_string());
        }
        match (env.get(CLIENT_ID_KEY), env.get(CLIENT_SECRET_KEY)) {
            (Some(client_id), Some(client_secret)) => Self::ClientSecret {
                client_id: client_id.trim().to_string(),
                client_secret: client_secret.trim().to_string(),
            },
            _ => Self::Missing,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub auth: AuthMode,
    pub scope: String,
    pub oauth_url: String,
    pub completions_url: String,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
    pub insecure_tls: bool,
    pub token_timeout: Duration,
    pub completions_timeout: Duration,
    pub refresh_interval: Duration,
    pub expiry_margin_secs: u64,
}

impl ProxyConfig {
    pub fn new(auth: AuthMode) -> Self {
        Self {
            auth,
            scope: DEFAULT_SCOPE.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            completions_url: DEFAULT_COMPLETIONS_URL.to_string(),
            allowed_origins: Vec::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            insecure_tls: false,
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
            completions_timeout: DEFAULT_COMPLETIONS_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
        }
    }

    /// Resolves the configuration from `env`.
    ///
    /// Missing credentials are reported as a warning and produce [`AuthMode::Missing`]
    /// so the proxy can still start; malformed values (for example a non-numeric `PORT`)
    /// are errors.
    pub fn from_env(env: &Env) -> Result<Self> {
        let auth = AuthMode::resolve(env);
        if !auth.is_configured() {
            tracing::warn!(
                "{CLIENT_ID_KEY}/{CLIENT_SECRET_KEY} (or {AUTH_KEY_KEY}) are not set; \
                 token requests will fail until they are provided"
            );
        }

        let mut config = Self::new(auth);
        if let Some(scope) = env.get(SCOPE_KEY) {
            config.scope = scope.trim().to_string();
        }
        if let Some(url) = env.get(OAUTH_URL_KEY) {
            config.oauth_url = url.trim().to_string();
        }
        if let Some(url) = env.get(COMPLETIONS_URL_KEY) {
            config.completions_url = url.trim().to_string();
        }
        if let Some(origins) = env.get(FRONTEND_ORIGINS_KEY) {
            config.allowed_origins = split_origins(&origins);
        }
        if let Some(host) = env.get(HOST_KEY) {
            config.host = host.trim().to_string();
        }
        if let Some(raw) = env.get(PORT_KEY) {
            config.port = raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ProxyError::Config(format!("invalid {PORT_KEY}: {raw}")))?;
        }
        if let Some(raw) = env.get(INSECURE_TLS_KEY) {
            config.insecure_tls = parse_flag(INSECURE_TLS_KEY, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_oauth_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_url = url.into();
        self
    }

    pub fn with_completions_url(mut self, url: impl Into<String>) -> Self {
        self.completions_url = url.into();
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    pub fn with_completions_timeout(mut self, timeout: Duration) -> Self {
        self.completions_timeout = timeout;
        self
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.oauth_url.trim().is_empty() {
            return Err(ProxyError::Config("oauth url is required".to_string()));
        }
        if self.completions_url.trim().is_empty() {
            return Err(ProxyError::Config("completions url is required".to_string()));
        }
        if self.scope.trim().is_empty() {
            return Err(ProxyError::Config("oauth scope is required".to_string()));
        }
        if self.refresh_interval.is_zero() {
            return Err(ProxyError::Config("refresh interval must be positive".to_string()));
        }
        Ok(())
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ProxyError::Config(format!("invalid {key}: {raw}"))),
    }
}
