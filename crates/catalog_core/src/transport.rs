use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::error::ApiError;
use tracing::debug;
use url::Url;

use crate::{error::TransportError, query::RequestDescriptor};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read access to the catalog backend. Implementations return the raw JSON
/// body; shape validation happens in the engine.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    async fn get(&self, request: &RequestDescriptor) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .with_context(|| format!("invalid catalog base url '{base_url}'"))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            bail!("catalog base url '{base_url}' must be an http(s) address");
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build catalog http client")?;
        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url_for(&self, request: &RequestDescriptor) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(request.segments());
        }
        if !request.params().is_empty() {
            url.query_pairs_mut().extend_pairs(request.params());
        }
        url
    }
}

#[async_trait]
impl CatalogTransport for HttpTransport {
    async fn get(&self, request: &RequestDescriptor) -> Result<Value, TransportError> {
        let url = self.url_for(request);
        debug!(%url, "catalog request");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let body = serde_json::from_slice::<Value>(&bytes);

        if !status.is_success() {
            return Err(TransportError::Status(ApiError::from_response(
                status.as_u16(),
                body.as_ref().ok(),
            )));
        }
        body.map_err(|err| TransportError::InvalidBody(err.to_string()))
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
