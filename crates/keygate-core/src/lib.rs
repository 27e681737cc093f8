//! Keygate Core - DRM license-acquisition pipeline
//!
//! This crate provides the protocol plumbing between a media catalog and a
//! DRM-capable playback engine:
//! - Catalog feed ingestion into playable records
//! - Out-of-band bearer-token exchange against the portal
//! - Widevine/PlayReady/ClearKey license-proxy relay
//! - Streaming-protocol and key-system selection
//! - Playback attempt orchestration and error surfacing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Keygate Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │   Catalog    │  │    Token     │  │    Source    │          │
//! │  │  Ingestion   │  │   Exchange   │  │   Selector   │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │   Session   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │                  ┌────────┴────────┐                            │
//! │                  │  DRM Callback   │                            │
//! │                  │     Adapter     │                            │
//! │                  └────────┬────────┘                            │
//! │                           │                                     │
//! │                  ┌────────┴────────┐                            │
//! │                  │     License     │                            │
//! │                  │    Transport    │                            │
//! │                  └─────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod drm;
pub mod error;
pub mod session;
pub mod source;
pub mod token;
pub mod transport;
pub mod types;

pub use catalog::{parse_catalog, CatalogClient};
pub use drm::{DrmCallback, ProxyDrmCallback};
pub use error::{Error, Result};
pub use session::{PlaybackSession, PortalConfig, PreparedMedia};
pub use source::{select, SelectedSource};
pub use token::{HttpTokenClient, TokenClient};
pub use transport::{HttpLicenseTransport, LicenseTransport, TransportResponse};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the pipeline library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Keygate Core initialized");
}
