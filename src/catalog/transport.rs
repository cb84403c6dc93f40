// Network seam for the catalog gateway
// HttpTransport POSTs envelopes with reqwest; tests plug in scripted transports.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::envelope::RequestEnvelope;
use super::errors::CatalogError;

/// Header carrying the static API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Default upstream request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Sends one envelope upstream and returns the parsed JSON body.
/// Implementations classify transport, HTTP status and JSON failures.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    async fn send(&self, envelope: &RequestEnvelope) -> Result<Value, CatalogError>;
}

/// reqwest-backed transport for the upstream JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CatalogTransport for HttpTransport {
    #[instrument(skip(self, envelope), fields(method = %envelope.method))]
    async fn send(&self, envelope: &RequestEnvelope) -> Result<Value, CatalogError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/json")
            .json(&envelope.to_body())
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        // hyper only records the reason phrase when it differs from the registered one
        let status_text = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), body = %body, "catalog returned error status");
            return Err(CatalogError::http(status.as_u16(), status_text));
        }

        serde_json::from_str(&body).map_err(|source| CatalogError::Parse { raw: body, source })
    }
}
