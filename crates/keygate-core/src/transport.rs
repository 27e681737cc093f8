//! License Transport - raw authenticated POST exchanges with the license proxy
//!
//! One connection per call, torn down on every exit path; retry policy is the
//! caller's concern and defaults to none.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::Result;

/// Connection timeout for proxy exchanges
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP status plus the raw response bytes.
///
/// The body is captured for every status code; on rejection it carries the
/// proxy's structured error detail. Which stream supplied the body is not
/// part of the contract: the status is reported separately.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    /// Decode the body as diagnostic text
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Capability seam for the proxy exchanges the DRM callback performs
#[async_trait]
pub trait LicenseTransport: Send + Sync {
    /// POST an opaque payload to the fixed license-proxy URL
    async fn post_payload(&self, payload: &[u8]) -> Result<TransportResponse>;

    /// POST with an empty body to an arbitrary endpoint (provisioning)
    async fn post_empty(&self, url: &Url) -> Result<TransportResponse>;

    /// The fixed proxy endpoint key requests go to
    fn proxy_url(&self) -> &Url;
}

/// License transport over HTTP, authorized with a single bearer token
#[derive(Debug, Clone)]
pub struct HttpLicenseTransport {
    client: Client,
    proxy_url: Url,
    auth_token: String,
}

impl HttpLicenseTransport {
    /// Create a transport bound to one proxy endpoint and one token.
    ///
    /// The token may be empty: provisioning calls run before any token
    /// exchange has happened.
    pub fn new(proxy_url: Url, auth_token: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(DEFAULT_NETWORK_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            proxy_url,
            auth_token: auth_token.into(),
        }
    }

    async fn execute(&self, url: Url, payload: Option<&[u8]>) -> Result<TransportResponse> {
        let mut req = self
            .client
            .post(url.clone())
            .header("Authorization", format!("Bearer {}", self.auth_token))
            .header("Content-Type", "application/octet-stream");

        // Full payload up front; these blobs are small, no streaming.
        if let Some(payload) = payload {
            req = req.body(payload.to_vec());
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();

        // The body is read whatever the status; rejection bodies carry the
        // proxy's error detail.
        let body = resp.bytes().await?;

        debug!(url = %url, status, bytes = body.len(), "proxy exchange complete");

        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl LicenseTransport for HttpLicenseTransport {
    async fn post_payload(&self, payload: &[u8]) -> Result<TransportResponse> {
        self.execute(self.proxy_url.clone(), Some(payload)).await
    }

    async fn post_empty(&self, url: &Url) -> Result<TransportResponse> {
        self.execute(url.clone(), None).await
    }

    fn proxy_url(&self) -> &Url {
        &self.proxy_url
    }
}
