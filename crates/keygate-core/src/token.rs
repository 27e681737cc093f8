//! Token Exchange Client
//!
//! Out-of-band authentication handshake against the portal: asset,
//! entitlement, and policy identifiers go in, an opaque bearer token comes
//! back. Runs before any DRM interaction; the license proxy rejects key
//! requests without a fresh token.

use async_trait::async_trait;
use reqwest::Client;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::types::{BearerToken, TokenRequest, TOKEN_DURATION_SECS};

/// Read timeout for the token endpoint
pub const TOKEN_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Capability seam for the token exchange
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Perform one token exchange. The entire response body is the token;
    /// no parsing or format validation.
    async fn fetch_token(&self, req: &TokenRequest) -> Result<BearerToken>;
}

/// Token client over plain HTTP GET
#[derive(Debug, Clone)]
pub struct HttpTokenClient {
    client: Client,
}

impl HttpTokenClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(TOKEN_READ_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpTokenClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `gettoken` request URL.
///
/// `username`, `password`, `asset`, and `duration` are always present;
/// `entitlement` and `policy` only when non-empty. An empty asset becomes the
/// literal `test`.
pub fn build_request_url(req: &TokenRequest) -> Result<Url> {
    let base = format!("{}/gettoken", req.portal_url.trim_end_matches('/'));
    let mut url = Url::parse(&base)?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("username", &req.username)
            .append_pair("password", &req.password)
            .append_pair("asset", req.effective_asset())
            .append_pair("duration", &TOKEN_DURATION_SECS.to_string());
        if !req.entitlement.is_empty() {
            pairs.append_pair("entitlement", &req.entitlement);
        }
        if !req.policy.is_empty() {
            pairs.append_pair("policy", &req.policy);
        }
    }

    Ok(url)
}

/// Map a transport failure to the token error message.
///
/// Fallback order: the failure's own message; if that is empty (routine for
/// this transport), the message of its underlying cause; failing both, a
/// fixed placeholder.
fn describe_failure(err: &reqwest::Error) -> String {
    let msg = err.to_string();
    if !msg.is_empty() {
        return msg;
    }
    match err.source() {
        Some(cause) => cause.to_string(),
        None => "unknown transport failure".to_string(),
    }
}

#[async_trait]
impl TokenClient for HttpTokenClient {
    async fn fetch_token(&self, req: &TokenRequest) -> Result<BearerToken> {
        let url = build_request_url(req)?;
        info!(asset = req.effective_asset(), "requesting token");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Token(describe_failure(&e)))?;

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Token(describe_failure(&e)))?;

        // The body is the token; line breaks are transport artifacts.
        let token: String = body.lines().collect();

        debug!(bytes = token.len(), "token received");
        Ok(BearerToken(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TokenRequest {
        TokenRequest {
            portal_url: "https://portal.example.com".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            asset: "bbb".to_string(),
            entitlement: "ent1".to_string(),
            policy: "pol1".to_string(),
        }
    }

    #[test]
    fn test_full_request_url() {
        let url = build_request_url(&request()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://portal.example.com/gettoken?username=user&password=pass&asset=bbb&duration=3600&entitlement=ent1&policy=pol1"
        );
    }

    #[test]
    fn test_empty_asset_defaults_to_test() {
        let mut req = request();
        req.asset = String::new();
        let url = build_request_url(&req).unwrap();
        assert!(url.as_str().contains("asset=test"));
    }

    #[test]
    fn test_empty_entitlement_and_policy_are_omitted() {
        let mut req = request();
        req.entitlement = String::new();
        req.policy = String::new();
        let url = build_request_url(&req).unwrap();
        assert!(!url.as_str().contains("entitlement"));
        assert!(!url.as_str().contains("policy"));
        assert!(url.as_str().contains("duration=3600"));
    }

    #[test]
    fn test_trailing_slash_on_portal_url() {
        let mut req = request();
        req.portal_url = "https://portal.example.com/".to_string();
        let url = build_request_url(&req).unwrap();
        assert!(url.as_str().starts_with("https://portal.example.com/gettoken?"));
    }

    #[test]
    fn test_invalid_portal_url() {
        let mut req = request();
        req.portal_url = "not a url".to_string();
        assert!(build_request_url(&req).is_err());
    }
}
