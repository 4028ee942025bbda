//! HTTP transport used by both lookup stages.

use crate::error::LookupError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// The request never produced a response (DNS, connect, TLS, reset, body read).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<TransportError> for LookupError {
    fn from(e: TransportError) -> Self {
        LookupError::Transport(e.0)
    }
}

/// Raw status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check the status and deserialize the body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, LookupError> {
        if !self.is_success() {
            return Err(LookupError::Http(self.status));
        }
        if self.body.trim().is_empty() {
            return Err(LookupError::Parse("empty response body".into()));
        }
        serde_json::from_str(&self.body).map_err(|e| LookupError::Parse(e.to_string()))
    }
}

#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: Url) -> Result<HttpReply, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    /// Static bearer token sent on every request, if set.
    pub bearer_token: Option<String>,
}

#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(cfg: &TransportConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = cfg.bearer_token.as_deref() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("bearer token contains invalid header characters")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("build HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl JsonTransport for ReqwestTransport {
    async fn get_json(&self, url: Url) -> Result<HttpReply, TransportError> {
        tracing::debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}
