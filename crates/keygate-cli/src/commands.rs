//! CLI command implementations

use anyhow::Context;
use base64::Engine;
use keygate_core::{
    parse_catalog, CatalogClient, DrmCallback, DrmScheme, Error, HttpLicenseTransport,
    HttpTokenClient, MediaRecord, ProxyDrmCallback, TokenClient, TokenRequest,
};
use std::sync::Arc;
use url::Url;

/// Fetch or read a catalog feed and list its records
pub async fn catalog(source: &str, validate: bool, format: &str) -> anyhow::Result<()> {
    let records = load_records(source).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("Catalog: {} ({} records)", source, records.len());
    for record in &records {
        println!(
            "  [{}] {} - {} ({}, scheme: {})",
            record.id,
            record.title,
            record.category,
            record.content_type,
            if record.drm_scheme.is_empty() {
                "none"
            } else {
                &record.drm_scheme
            },
        );
    }

    if validate {
        println!("\nValidation:");
        let mut failed = 0;
        for record in &records {
            let result = record
                .validate_for_playback()
                .and_then(|_| keygate_core::select(&record.video_url, &record.drm_scheme));
            match result {
                Ok(source) => {
                    println!("  [{}] ok: {:?}", record.id, source);
                }
                Err(e) => {
                    failed += 1;
                    println!("  [{}] FAIL ({}): {}", record.id, e.error_code(), e);
                }
            }
        }
        println!("\n{} of {} records playable", records.len() - failed, records.len());
    }

    Ok(())
}

async fn load_records(source: &str) -> anyhow::Result<Vec<MediaRecord>> {
    let is_remote = Url::parse(source)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);

    if is_remote {
        Ok(CatalogClient::new().fetch(source).await?)
    } else {
        let body = std::fs::read_to_string(source)
            .with_context(|| format!("reading catalog file {source}"))?;
        Ok(parse_catalog(&body)?)
    }
}

/// Perform a single token exchange and print the token
pub async fn token(
    portal: &str,
    username: &str,
    password: &str,
    asset: &str,
    entitlement: &str,
    policy: &str,
) -> anyhow::Result<()> {
    let req = TokenRequest {
        portal_url: portal.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        asset: asset.to_string(),
        entitlement: entitlement.to_string(),
        policy: policy.to_string(),
    };

    println!("Requesting token for asset '{}'", req.effective_asset());
    let token = HttpTokenClient::new().fetch_token(&req).await?;
    println!("{token}");

    Ok(())
}

/// Show the selector output for a URL/scheme pair
pub fn probe(url: &str, scheme: &str, format: &str) -> anyhow::Result<()> {
    let source = keygate_core::select(url, scheme)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&source)?);
        return Ok(());
    }

    println!("URL:      {url}");
    println!("Protocol: {}", source.protocol);
    match source.system_id() {
        Some(id) => println!("DRM:      {} ({})", source.scheme.unwrap(), id),
        None => println!("DRM:      none (progressive content, no session attached)"),
    }

    Ok(())
}

/// Send one key request to a license proxy and report the outcome
pub async fn license(proxy: &str, token: &str, payload_b64: &str, scheme: &str) -> anyhow::Result<()> {
    let scheme = DrmScheme::parse(scheme)?;
    let proxy = Url::parse(proxy).context("invalid proxy URL")?;
    let payload = base64::engine::general_purpose::STANDARD
        .decode(payload_b64)
        .context("payload is not valid base64")?;

    let transport = Arc::new(HttpLicenseTransport::new(proxy, token));
    let callback = ProxyDrmCallback::new(transport);

    match callback.key_request(scheme, &payload).await {
        Ok(body) => {
            println!("Key request accepted: {} license bytes", body.len());
        }
        Err(Error::Drm { code, body }) => {
            println!("Key request rejected: status {code}");
            if !body.is_empty() {
                println!("  proxy error: {body}");
            }
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
