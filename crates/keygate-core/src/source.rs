//! Media Source Selector
//!
//! Maps a record's URL and scheme tag onto the streaming-protocol handler and
//! DRM key system the playback engine should be built with.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{DrmScheme, ProtocolKind};

/// Selector output: the protocol handler plus the key system to attach.
///
/// `scheme` is `None` for Progressive/Other content, which is assumed
/// unencrypted and never gets a DRM session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSource {
    pub protocol: ProtocolKind,
    pub scheme: Option<DrmScheme>,
}

impl SelectedSource {
    /// Key-system identifier for the attached scheme, if any
    pub fn system_id(&self) -> Option<Uuid> {
        self.scheme.map(|s| s.system_id())
    }
}

/// Select the protocol handler and key system for a URL/scheme pair.
///
/// Protocol inference is pure and total; scheme parsing is exact and raises a
/// fatal error for anything outside the closed set, since that indicates a
/// corrupt catalog entry.
///
/// Progressive/Other content skips the scheme entirely, even when one is
/// specified. That reproduces the upstream player wiring, where the
/// progressive source is built without a DRM session manager and the scheme
/// tag is never consulted on that branch.
pub fn select(url: &str, drm_scheme: &str) -> Result<SelectedSource> {
    let protocol = ProtocolKind::from_url(url);

    let scheme = match protocol {
        ProtocolKind::Other => None,
        _ => Some(DrmScheme::parse(drm_scheme)?),
    };

    debug!(url, protocol = %protocol, scheme = ?scheme, "media source selected");

    Ok(SelectedSource { protocol, scheme })
}
