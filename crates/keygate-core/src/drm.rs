//! DRM Callback Adapter
//!
//! The external DRM session manager drives key negotiation by invoking two
//! operations: a one-time device provisioning exchange and a per-content
//! key/license request. Both are relayed through [`LicenseTransport`] and
//! block the invoking task until the round-trip completes.
//!
//! Classification differs deliberately per endpoint: provisioning succeeds on
//! any status in [200, 300), key requests only on exactly 200. The asymmetry
//! comes from the endpoint contracts and must be preserved.
//!
//! Failures before a status line arrives (connect refusal, timeout, dropped
//! connection) surface as transport errors on both endpoints, never as
//! [`Error::Drm`]: that variant is reserved for a proxy that answered and
//! rejected, where the response body carries the operator's message.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::LicenseTransport;
use crate::types::DrmScheme;

/// Capability interface invoked by the external DRM session manager.
///
/// No assumption is made about the caller's scheduling beyond "invoked from
/// some worker context, result expected before returning". No credentials are
/// cached across calls.
#[async_trait]
pub trait DrmCallback: Send + Sync {
    /// Relay a device provisioning request.
    ///
    /// The engine supplies its default provisioning URL and a signed payload;
    /// the payload is appended as a `signedRequest` query parameter and the
    /// request goes out with an empty body. A 2xx response returns the raw
    /// provisioning certificate bytes unchanged.
    async fn provision_request(
        &self,
        scheme: DrmScheme,
        default_url: &str,
        signed_payload: &[u8],
    ) -> Result<Bytes>;

    /// Relay the engine's opaque key request to the license proxy.
    ///
    /// Success is exactly status 200; every other status, 2xx included, is a
    /// rejection carrying the proxy's error text.
    async fn key_request(&self, scheme: DrmScheme, payload: &[u8]) -> Result<Bytes>;
}

/// [`DrmCallback`] that relays both operations through a license proxy
pub struct ProxyDrmCallback {
    transport: Arc<dyn LicenseTransport>,
}

impl ProxyDrmCallback {
    pub fn new(transport: Arc<dyn LicenseTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DrmCallback for ProxyDrmCallback {
    async fn provision_request(
        &self,
        scheme: DrmScheme,
        default_url: &str,
        signed_payload: &[u8],
    ) -> Result<Bytes> {
        let mut url = Url::parse(default_url)?;
        url.query_pairs_mut()
            .append_pair("signedRequest", &String::from_utf8_lossy(signed_payload));

        info!(scheme = %scheme, url = %url, "executing provisioning request");

        let resp = self.transport.post_empty(&url).await?;

        if (200..300).contains(&resp.status) {
            debug!(status = resp.status, "provisioning request success");
            Ok(resp.body)
        } else {
            warn!(status = resp.status, "provisioning request rejected");
            Err(Error::Drm {
                code: resp.status,
                body: resp.body_text(),
            })
        }
    }

    async fn key_request(&self, scheme: DrmScheme, payload: &[u8]) -> Result<Bytes> {
        debug!(
            scheme = %scheme,
            proxy = %self.transport.proxy_url(),
            bytes = payload.len(),
            "executing key request"
        );

        let resp = self.transport.post_payload(payload).await?;

        if resp.status == 200 {
            debug!("key request success");
            Ok(resp.body)
        } else {
            warn!(status = resp.status, "key request rejected");
            Err(Error::Drm {
                code: resp.status,
                body: resp.body_text(),
            })
        }
    }
}
