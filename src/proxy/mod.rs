//! The `/api/chat` forwarding endpoint.

mod completions;
mod cors;
mod failure;
mod handler;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

pub use completions::CompletionsClient;
pub use failure::ChatFailure;

use crate::Result;
use crate::auth::TokenSource;
use crate::config::ProxyConfig;

pub const CHAT_ROUTE: &str = "/api/chat";
pub const HEALTH_ROUTE: &str = "/health";

#[derive(Clone)]
pub struct ProxyState {
    tokens: Arc<dyn TokenSource>,
    completions: CompletionsClient,
    allowed_origins: Arc<Vec<String>>,
}

impl ProxyState {
    pub fn new(tokens: Arc<dyn TokenSource>, completions: CompletionsClient) -> Self {
        Self {
            tokens,
            completions,
            allowed_origins: Arc::new(Vec::new()),
        }
    }

    pub fn from_config(
        config: &ProxyConfig,
        tokens: Arc<dyn TokenSource>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let completions = CompletionsClient::from_config(config, http)?;
        Ok(Self::new(tokens, completions).with_allowed_origins(config.allowed_origins.clone()))
    }

    /// An empty list allows any origin.
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Arc::new(origins);
        self
    }
}

pub fn router(state: ProxyState) -> Router {
    let cors = cors::cors_layer(&state.allowed_origins);
    Router::new()
        .route(HEALTH_ROUTE, get(handler::health))
        .route(CHAT_ROUTE, post(handler::handle_chat))
        .layer(cors)
        .layer(middleware::from_fn(cors::preflight_no_content))
        .with_state(state)
}
