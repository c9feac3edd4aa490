use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::config::{DEFAULT_COMPLETIONS_TIMEOUT, ProxyConfig};
use crate::{ProxyError, Result};

/// Sends chat-completion bodies to the upstream endpoint, untouched.
#[derive(Clone, Debug)]
pub struct CompletionsClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl CompletionsClient {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ProxyError::Config("completions url is required".to_string()));
        }
        Ok(Self {
            url,
            client,
            timeout: DEFAULT_COMPLETIONS_TIMEOUT,
        })
    }

    pub fn from_config(config: &ProxyConfig, client: reqwest::Client) -> Result<Self> {
        Ok(Self::new(config.completions_url.as_str(), client)?
            .with_timeout(config.completions_timeout))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One attempt, bounded by the configured timeout (which also covers reading the body).
    pub async fn forward(
        &self,
        bearer_token: &str,
        body: Bytes,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(self.url.as_str())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(bearer_token)
            .body(body)
            .send()
            .await
    }
}
