//! Catalog ingestion
//!
//! Fetches the JSON feed describing available titles and turns each entry
//! into a [`MediaRecord`]. Missing optional fields default to empty strings;
//! validation happens at playback time, not here, so a half-filled entry
//! still renders in the catalog.

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::types::{MediaRecord, Presentation, ProtocolKind};

/// One entry of the feed's `streams` array
#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    studio: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    dash_address: String,
    #[serde(default)]
    card: String,
    #[serde(default)]
    background: String,
    #[serde(default)]
    wv_license_proxy: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    asset: String,
    #[serde(default)]
    entitlement: String,
    #[serde(default)]
    policy: String,
    #[serde(default)]
    drm_type: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFeed {
    #[serde(default)]
    streams: Vec<CatalogEntry>,
}

impl CatalogEntry {
    fn into_record(self, index: usize) -> MediaRecord {
        let content_type = ProtocolKind::from_url(&self.dash_address);
        MediaRecord {
            id: index.to_string(),
            category: self.category,
            title: self.name,
            description: self.description,
            video_url: self.dash_address,
            card_image_url: self.card,
            background_image_url: self.background,
            studio: self.studio,
            license_proxy_url: self.wv_license_proxy,
            auth_token: self.token,
            asset: self.asset,
            entitlement: self.entitlement,
            policy: self.policy,
            drm_scheme: self.drm_type,
            content_type,
            presentation: Presentation::default(),
        }
    }
}

/// Parse a catalog feed document into records
pub fn parse_catalog(json: &str) -> Result<Vec<MediaRecord>> {
    let feed: CatalogFeed = serde_json::from_str(json)?;
    Ok(feed
        .streams
        .into_iter()
        .enumerate()
        .map(|(i, e)| e.into_record(i))
        .collect())
}

/// Fetches catalog feeds over HTTP
#[derive(Debug, Clone, Default)]
pub struct CatalogClient {
    client: Client,
}

impl CatalogClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and parse the feed at `url`
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<MediaRecord>> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::CatalogFetch(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::CatalogFetch(e.to_string()))?;

        let records = parse_catalog(&body)?;
        info!(count = records.len(), "catalog loaded");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolKind;

    const FEED: &str = r#"{
        "streams": [
            {
                "name": "Big Buck Bunny",
                "category": "Demo",
                "studio": "Blender",
                "description": "An enormous rabbit",
                "dash_address": "https://cdn.example.com/bbb/out.mpd",
                "card": "https://cdn.example.com/bbb/card.jpg",
                "background": "https://cdn.example.com/bbb/bg.jpg",
                "wv_license_proxy": "https://proxy.example.com/license",
                "asset": "bbb",
                "drm_type": "widevine"
            },
            {
                "name": "Clear Clip",
                "category": "Demo",
                "dash_address": "https://cdn.example.com/clip.mp4"
            }
        ]
    }"#;

    #[test]
    fn test_parse_catalog() {
        let records = parse_catalog(FEED).unwrap();
        assert_eq!(records.len(), 2);

        let bbb = &records[0];
        assert_eq!(bbb.id, "0");
        assert_eq!(bbb.title, "Big Buck Bunny");
        assert_eq!(bbb.drm_scheme, "widevine");
        assert_eq!(bbb.content_type, ProtocolKind::Dash);
        assert_eq!(bbb.license_proxy_url, "https://proxy.example.com/license");
        assert!(bbb.validate_for_playback().is_ok());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let records = parse_catalog(FEED).unwrap();
        let clip = &records[1];
        assert_eq!(clip.studio, "");
        assert_eq!(clip.drm_scheme, "");
        assert_eq!(clip.entitlement, "");
        assert_eq!(clip.content_type, ProtocolKind::Other);

        // Ingestion accepts it; playback validation is what rejects it.
        assert!(clip.validate_for_playback().is_err());
    }

    #[test]
    fn test_empty_feed() {
        assert!(parse_catalog("{}").unwrap().is_empty());
        assert!(parse_catalog(r#"{"streams": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_feed() {
        assert!(matches!(
            parse_catalog("not json"),
            Err(Error::CatalogParse(_))
        ));
    }
}
