//! Core types for the Keygate license-acquisition pipeline

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DRM scheme types
///
/// Closed set: a catalog entry naming anything else is a data defect, not a
/// condition to recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrmScheme {
    Widevine,
    PlayReady,
    ClearKey,
}

impl DrmScheme {
    /// Returns the fixed key-system identifier for this scheme
    pub fn system_id(&self) -> Uuid {
        match self {
            DrmScheme::Widevine => Uuid::from_u128(0xedef8ba9_79d6_4ace_a3c8_27dcd51d21ed),
            DrmScheme::PlayReady => Uuid::from_u128(0x9a04f079_9840_4286_ab92_e65be0885f95),
            DrmScheme::ClearKey => Uuid::from_u128(0xe2719d58_a985_b3c9_781a_b030af78d30e),
        }
    }

    /// Parse a catalog scheme tag.
    ///
    /// Exact, case-sensitive match. Any other value (including empty) is a
    /// fatal [`Error::UnsupportedScheme`].
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "widevine" => Ok(DrmScheme::Widevine),
            "playready" => Ok(DrmScheme::PlayReady),
            "clearkey" => Ok(DrmScheme::ClearKey),
            other => Err(Error::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DrmScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrmScheme::Widevine => write!(f, "widevine"),
            DrmScheme::PlayReady => write!(f, "playready"),
            DrmScheme::ClearKey => write!(f, "clearkey"),
        }
    }
}

/// Streaming protocol kind, inferred from the media URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolKind {
    Dash,
    SmoothStreaming,
    Hls,
    /// Progressive download or anything unrecognized
    Other,
}

impl ProtocolKind {
    /// Infer the protocol from a media URL's file extension.
    ///
    /// Pure and total: unrecognized extensions land in [`ProtocolKind::Other`]
    /// rather than erroring.
    pub fn from_url(url: &str) -> Self {
        // Query string and fragment never participate in the match.
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase();

        if path.ends_with(".mpd") {
            ProtocolKind::Dash
        } else if path.ends_with(".m3u8") {
            ProtocolKind::Hls
        } else if Self::is_smooth_streaming(&path) {
            ProtocolKind::SmoothStreaming
        } else {
            ProtocolKind::Other
        }
    }

    /// `.ism`/`.isml` must terminate the path, optionally followed by the
    /// server manifest segment. `.ism` appearing mid-path (`a.ismatic/v.mp4`)
    /// does not count.
    fn is_smooth_streaming(path: &str) -> bool {
        let base = path.strip_suffix("/manifest").unwrap_or(path);
        base.ends_with(".ism") || base.ends_with(".isml")
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::Dash => write!(f, "dash"),
            ProtocolKind::SmoothStreaming => write!(f, "smooth-streaming"),
            ProtocolKind::Hls => write!(f, "hls"),
            ProtocolKind::Other => write!(f, "other"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const HD_720P: Resolution = Resolution { width: 1280, height: 720 };
    pub const FHD_1080P: Resolution = Resolution { width: 1920, height: 1080 };
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Fixed presentation metadata carried on every catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub resolution: Resolution,
    /// Audio channel layout, e.g. "2.0"
    pub audio_channels: String,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            resolution: Resolution::FHD_1080P,
            audio_channels: "2.0".to_string(),
        }
    }
}

/// One playable catalog title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Unique identifier
    pub id: String,
    /// Catalog row category
    pub category: String,
    pub title: String,
    pub description: String,
    /// Media URL handed to the streaming transport
    pub video_url: String,
    pub card_image_url: String,
    pub background_image_url: String,
    pub studio: String,
    /// License-proxy endpoint for key requests; may be empty, in which case
    /// the session falls back to the configured default proxy
    pub license_proxy_url: String,
    /// Bearer-token placeholder, filled after the token exchange
    pub auth_token: String,
    /// Portal asset identifier
    pub asset: String,
    pub entitlement: String,
    pub policy: String,
    /// Raw scheme tag from the catalog, one of `widevine|playready|clearkey`
    pub drm_scheme: String,
    /// Protocol hint derived from `video_url`
    pub content_type: ProtocolKind,
    pub presentation: Presentation,
}

impl MediaRecord {
    /// Check the invariants that must hold before a playback attempt starts
    pub fn validate_for_playback(&self) -> Result<()> {
        if self.video_url.is_empty() {
            return Err(Error::config(format!("record '{}' has no video URL", self.id)));
        }
        if self.drm_scheme.is_empty() {
            return Err(Error::config(format!("record '{}' has no DRM scheme", self.id)));
        }
        Ok(())
    }
}

/// Opaque bearer credential returned by the token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token duration requested from the portal, in seconds
pub const TOKEN_DURATION_SECS: u32 = 3600;

/// Ephemeral parameters for one token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub portal_url: String,
    pub username: String,
    pub password: String,
    pub asset: String,
    pub entitlement: String,
    pub policy: String,
}

impl TokenRequest {
    /// Effective asset name: the portal expects the literal `test` when the
    /// catalog record carries no asset.
    pub fn effective_asset(&self) -> &str {
        if self.asset.is_empty() {
            "test"
        } else {
            &self.asset
        }
    }
}

/// Playback attempt state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No title selected
    Idle,
    /// Token exchange in flight
    TokenRequested,
    /// Bearer token acquired for the current title
    TokenReady,
    /// Token exchange failed
    TokenFailed,
    /// Source selected and DRM callback wired up
    MediaPrepared,
    /// DRM/source setup failed
    DrmFailed,
    /// Handed off to the playback engine
    Playing,
    Paused,
    Stopped,
    Ended,
    /// Terminal error surface; a new selection starts a fresh attempt
    Error,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;

        // Selecting a title is valid from every state except an in-flight
        // failure that has not yet surfaced; skip-next/previous replaces the
        // attempt wholesale.
        if target == TokenRequested {
            return !matches!(self, TokenFailed | DrmFailed);
        }

        matches!(
            (self, target),
            // Token exchange outcomes
            (TokenRequested, TokenReady) | (TokenRequested, TokenFailed) | (TokenRequested, Stopped) |
            // Source selection / DRM wiring
            (TokenReady, MediaPrepared) | (TokenReady, DrmFailed) | (TokenReady, Stopped) |
            // Failure states surface exactly one way
            (TokenFailed, Error) | (DrmFailed, Error) |
            // Handoff
            (MediaPrepared, Playing) | (MediaPrepared, DrmFailed) | (MediaPrepared, Stopped) |
            // During playback
            (Playing, Paused) | (Playing, Stopped) | (Playing, Ended) | (Playing, Error) | (Playing, DrmFailed) |
            (Paused, Playing) | (Paused, Stopped) |
            // Post-playback
            (Stopped, Idle) | (Ended, Idle) | (Error, Idle)
        )
    }

    /// True once the attempt has reached a resting state
    pub fn is_attempt_over(&self) -> bool {
        matches!(
            self,
            PlaybackState::Stopped | PlaybackState::Ended | PlaybackState::Error
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::TokenRequested => write!(f, "token-requested"),
            PlaybackState::TokenReady => write!(f, "token-ready"),
            PlaybackState::TokenFailed => write!(f, "token-failed"),
            PlaybackState::MediaPrepared => write!(f, "media-prepared"),
            PlaybackState::DrmFailed => write!(f, "drm-failed"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

/// Ordered queue of records sharing a category, with a current position
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    records: Vec<MediaRecord>,
    position: usize,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<MediaRecord>) -> Self {
        Self {
            records,
            position: 0,
        }
    }

    pub fn add(&mut self, record: MediaRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Point the playlist at the entry matching `id`, if present
    pub fn select_by_id(&mut self, id: &str) -> bool {
        if let Some(idx) = self.records.iter().position(|r| r.id == id) {
            self.position = idx;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&MediaRecord> {
        self.records.get(self.position)
    }

    /// Advance and return the next record. `None` at the last index: the
    /// boundary signals "return to catalog", not an error.
    pub fn next(&mut self) -> Option<&MediaRecord> {
        if self.position + 1 < self.records.len() {
            self.position += 1;
            self.records.get(self.position)
        } else {
            None
        }
    }

    /// Step back and return the previous record. `None` at index 0.
    pub fn previous(&mut self) -> Option<&MediaRecord> {
        if self.position > 0 {
            self.position -= 1;
            self.records.get(self.position)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> MediaRecord {
        MediaRecord {
            id: id.to_string(),
            category: "Demo".to_string(),
            title: id.to_string(),
            description: String::new(),
            video_url: "https://cdn.example.com/out.mpd".to_string(),
            card_image_url: String::new(),
            background_image_url: String::new(),
            studio: String::new(),
            license_proxy_url: "https://proxy.example.com/license".to_string(),
            auth_token: String::new(),
            asset: "asset1".to_string(),
            entitlement: String::new(),
            policy: String::new(),
            drm_scheme: "widevine".to_string(),
            content_type: ProtocolKind::Dash,
            presentation: Presentation::default(),
        }
    }

    #[test]
    fn test_protocol_inference() {
        assert_eq!(ProtocolKind::from_url("https://e.com/a/out.mpd"), ProtocolKind::Dash);
        assert_eq!(ProtocolKind::from_url("https://e.com/a/master.m3u8"), ProtocolKind::Hls);
        assert_eq!(
            ProtocolKind::from_url("https://e.com/a.ism/Manifest"),
            ProtocolKind::SmoothStreaming
        );
        assert_eq!(
            ProtocolKind::from_url("https://e.com/a.isml/manifest"),
            ProtocolKind::SmoothStreaming
        );
        assert_eq!(
            ProtocolKind::from_url("https://e.com/stream.ism"),
            ProtocolKind::SmoothStreaming
        );
        assert_eq!(ProtocolKind::from_url("https://e.com/video.mp4"), ProtocolKind::Other);
        assert_eq!(ProtocolKind::from_url(""), ProtocolKind::Other);
    }

    #[test]
    fn test_protocol_inference_ism_must_end_path_segment() {
        assert_eq!(
            ProtocolKind::from_url("https://e.com/a.ismatic/video.mp4"),
            ProtocolKind::Other
        );
        assert_eq!(
            ProtocolKind::from_url("https://e.com/a.ism.bak/video.mp4"),
            ProtocolKind::Other
        );
    }

    #[test]
    fn test_protocol_inference_ignores_query() {
        assert_eq!(
            ProtocolKind::from_url("https://e.com/out.mpd?session=1.m3u8"),
            ProtocolKind::Dash
        );
        assert_eq!(
            ProtocolKind::from_url("https://e.com/clip.mp4#t=10"),
            ProtocolKind::Other
        );
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!(DrmScheme::parse("widevine").unwrap(), DrmScheme::Widevine);
        assert_eq!(DrmScheme::parse("playready").unwrap(), DrmScheme::PlayReady);
        assert_eq!(DrmScheme::parse("clearkey").unwrap(), DrmScheme::ClearKey);

        // Case-sensitive exact match; anything else is fatal.
        assert!(DrmScheme::parse("Widevine").unwrap_err().is_fatal());
        assert!(DrmScheme::parse("").unwrap_err().is_fatal());
        assert!(DrmScheme::parse("fairplay").unwrap_err().is_fatal());
    }

    #[test]
    fn test_scheme_system_ids() {
        assert_eq!(
            DrmScheme::Widevine.system_id().to_string(),
            "edef8ba9-79d6-4ace-a3c8-27dcd51d21ed"
        );
        assert_eq!(
            DrmScheme::PlayReady.system_id().to_string(),
            "9a04f079-9840-4286-ab92-e65be0885f95"
        );
        assert_eq!(
            DrmScheme::ClearKey.system_id().to_string(),
            "e2719d58-a985-b3c9-781a-b030af78d30e"
        );
    }

    #[test]
    fn test_effective_asset_defaults() {
        let mut req = TokenRequest {
            portal_url: "https://portal.example.com".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            asset: String::new(),
            entitlement: String::new(),
            policy: String::new(),
        };
        assert_eq!(req.effective_asset(), "test");

        req.asset = "bbb".to_string();
        assert_eq!(req.effective_asset(), "bbb");
    }

    #[test]
    fn test_record_invariants() {
        let good = record("a");
        assert!(good.validate_for_playback().is_ok());

        let mut no_url = record("b");
        no_url.video_url.clear();
        assert!(no_url.validate_for_playback().unwrap_err().is_fatal());

        let mut no_scheme = record("c");
        no_scheme.drm_scheme.clear();
        assert!(no_scheme.validate_for_playback().unwrap_err().is_fatal());
    }

    #[test]
    fn test_state_transitions() {
        use PlaybackState::*;

        assert!(Idle.can_transition_to(TokenRequested));
        assert!(TokenRequested.can_transition_to(TokenReady));
        assert!(TokenRequested.can_transition_to(TokenFailed));
        assert!(TokenReady.can_transition_to(MediaPrepared));
        assert!(TokenReady.can_transition_to(DrmFailed));
        assert!(TokenFailed.can_transition_to(Error));
        assert!(DrmFailed.can_transition_to(Error));
        assert!(MediaPrepared.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Paused));
        assert!(Playing.can_transition_to(Ended));

        // A new selection replaces an in-flight attempt.
        assert!(TokenRequested.can_transition_to(TokenRequested));
        assert!(Playing.can_transition_to(TokenRequested));
        assert!(Error.can_transition_to(TokenRequested));

        // Failure states surface exactly one way.
        assert!(!TokenFailed.can_transition_to(TokenRequested));
        assert!(!TokenFailed.can_transition_to(TokenReady));
        assert!(!Idle.can_transition_to(Playing));
        assert!(!Error.can_transition_to(Playing));
    }

    #[test]
    fn test_playlist_boundaries() {
        let mut playlist = Playlist::from_records(vec![record("a"), record("b"), record("c")]);
        assert_eq!(playlist.len(), 3);

        // previous() at index 0 is the catalog boundary, not an error
        assert!(playlist.previous().is_none());
        assert_eq!(playlist.position(), 0);

        assert_eq!(playlist.next().unwrap().id, "b");
        assert_eq!(playlist.next().unwrap().id, "c");
        assert!(playlist.next().is_none());
        assert_eq!(playlist.position(), 2);

        assert_eq!(playlist.previous().unwrap().id, "b");

        assert!(playlist.select_by_id("c"));
        assert_eq!(playlist.current().unwrap().id, "c");
        assert!(!playlist.select_by_id("zzz"));
    }
}
