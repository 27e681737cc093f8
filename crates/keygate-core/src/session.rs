//! Playback Session - orchestrator for the license-acquisition pipeline
//!
//! Sequences one playback attempt: fetch a bearer token for the selected
//! title, wire up the DRM callback with that token, select the media source,
//! and hand the prepared bundle to the playback engine. One attempt is active
//! at a time; selecting another title replaces the attempt wholesale and any
//! stale in-flight result is discarded, never applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::drm::{DrmCallback, ProxyDrmCallback};
use crate::error::{Error, Result};
use crate::source::{self, SelectedSource};
use crate::token::{HttpTokenClient, TokenClient};
use crate::transport::HttpLicenseTransport;
use crate::types::{
    BearerToken, MediaRecord, PlaybackState, Playlist, SessionId, TokenRequest,
};

/// Portal credentials and endpoint defaults.
///
/// A credential reverted to an empty string falls back to the built-in
/// default, matching the portal's demo accounts.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub portal_url: String,
    pub username: String,
    pub password: String,
    /// License proxy used when a record carries none
    pub proxy_url: String,
}

impl PortalConfig {
    pub const DEFAULT_USERNAME: &'static str = "test";
    pub const DEFAULT_PASSWORD: &'static str = "test";

    pub fn new(portal_url: impl Into<String>) -> Self {
        Self {
            portal_url: portal_url.into(),
            username: Self::DEFAULT_USERNAME.to_string(),
            password: Self::DEFAULT_PASSWORD.to_string(),
            proxy_url: String::new(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = proxy_url.into();
        self
    }

    pub fn effective_username(&self) -> &str {
        if self.username.is_empty() {
            Self::DEFAULT_USERNAME
        } else {
            &self.username
        }
    }

    pub fn effective_password(&self) -> &str {
        if self.password.is_empty() {
            Self::DEFAULT_PASSWORD
        } else {
            &self.password
        }
    }

    /// Resolve the license proxy for a record: the record's own proxy, then
    /// the configured default. A scheme that requires license acquisition
    /// with neither set is a configuration defect.
    pub fn effective_proxy(&self, record: &MediaRecord) -> Result<Url> {
        let raw = if !record.license_proxy_url.is_empty() {
            &record.license_proxy_url
        } else if !self.proxy_url.is_empty() {
            &self.proxy_url
        } else {
            return Err(Error::config(format!(
                "record '{}' has no license proxy and no default is configured",
                record.id
            )));
        };
        Ok(Url::parse(raw)?)
    }
}

/// Everything the playback engine needs for one title: the record, the
/// selected protocol/key-system pair, the fresh bearer token, and the DRM
/// callback to hand to the DRM session manager (absent for progressive
/// content).
#[derive(Clone)]
pub struct PreparedMedia {
    pub record: MediaRecord,
    pub source: SelectedSource,
    pub token: BearerToken,
    pub drm_callback: Option<Arc<dyn DrmCallback>>,
    // Ties the bundle to the attempt that produced it, so late failure
    // reports from a replaced title cannot touch the current one.
    generation: u64,
}

impl std::fmt::Debug for PreparedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedMedia")
            .field("record", &self.record.id)
            .field("source", &self.source)
            .field("drm", &self.drm_callback.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}

/// One playback attempt, replaced as a unit on every track change
struct Attempt {
    generation: u64,
    prepared: Option<PreparedMedia>,
}

/// Playback session managing a playlist and a single active attempt
pub struct PlaybackSession {
    id: SessionId,
    config: PortalConfig,
    token_client: Arc<dyn TokenClient>,
    state: Arc<RwLock<PlaybackState>>,
    state_tx: watch::Sender<PlaybackState>,
    playlist: Arc<RwLock<Playlist>>,
    attempt: Arc<RwLock<Option<Attempt>>>,
    generation: AtomicU64,
    error_message: Arc<RwLock<Option<String>>>,
}

impl PlaybackSession {
    /// Create a session using the HTTP token client
    pub fn new(config: PortalConfig) -> Self {
        Self::with_token_client(config, Arc::new(HttpTokenClient::new()))
    }

    /// Create a session with an explicit token client (tests use fakes here)
    pub fn with_token_client(config: PortalConfig, token_client: Arc<dyn TokenClient>) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            id: SessionId::new(),
            config,
            token_client,
            state: Arc::new(RwLock::new(PlaybackState::Idle)),
            state_tx,
            playlist: Arc::new(RwLock::new(Playlist::new())),
            attempt: Arc::new(RwLock::new(None)),
            generation: AtomicU64::new(0),
            error_message: Arc::new(RwLock::new(None)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn state(&self) -> PlaybackState {
        *self.state.read().await
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Message for the playback error surface, set once a failure reaches the
    /// terminal `Error` state
    pub async fn error_message(&self) -> Option<String> {
        self.error_message.read().await.clone()
    }

    /// The prepared bundle for the current attempt, once media is prepared
    pub async fn prepared(&self) -> Option<PreparedMedia> {
        self.attempt.read().await.as_ref().and_then(|a| a.prepared.clone())
    }

    /// Replace the playlist; the current position resets
    pub async fn load_playlist(&self, records: Vec<MediaRecord>) {
        *self.playlist.write().await = Playlist::from_records(records);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Transition to new state
    async fn set_state(&self, new_state: PlaybackState) -> Result<()> {
        let current = *self.state.read().await;

        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        *self.state.write().await = new_state;
        let _ = self.state_tx.send(new_state);

        info!(session_id = %self.id, from = %current, to = %new_state, "state transition");
        Ok(())
    }

    /// Route a failure through its failure state into terminal `Error`,
    /// unless the attempt has already been superseded.
    async fn fail(&self, generation: u64, via: PlaybackState, err: &Error) {
        if !self.is_current(generation) {
            debug!(generation, "stale failure discarded");
            return;
        }
        warn!(code = err.error_code(), "playback attempt failed: {err}");
        *self.error_message.write().await = Some(err.user_message());
        let _ = self.set_state(via).await;
        let _ = self.set_state(PlaybackState::Error).await;
    }

    /// Start an attempt for `record`: token exchange, then DRM/source setup.
    ///
    /// The token round-trip suspends here; callers off the orchestration
    /// context typically spawn this. Exactly one continuation runs when it
    /// completes: success prepares media and moves to `Playing`, failure
    /// surfaces the terminal `Error` state. Returns `Ok(None)` when another
    /// selection superseded this attempt while it was in flight.
    #[instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn play(&self, record: MediaRecord) -> Result<Option<PreparedMedia>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.attempt.write().await = Some(Attempt {
            generation,
            prepared: None,
        });
        *self.error_message.write().await = None;
        self.set_state(PlaybackState::TokenRequested).await?;

        info!(title = %record.title, asset = %record.asset, "requesting token");
        let req = TokenRequest {
            portal_url: self.config.portal_url.clone(),
            username: self.config.effective_username().to_string(),
            password: self.config.effective_password().to_string(),
            asset: record.asset.clone(),
            entitlement: record.entitlement.clone(),
            policy: record.policy.clone(),
        };

        // Suspension point: one token exchange in flight per attempt.
        let token = match self.token_client.fetch_token(&req).await {
            Ok(token) => token,
            Err(e) => {
                self.fail(generation, PlaybackState::TokenFailed, &e).await;
                if self.is_current(generation) {
                    return Err(e);
                }
                return Ok(None);
            }
        };

        if !self.is_current(generation) {
            debug!(generation, "stale token result discarded");
            return Ok(None);
        }
        self.set_state(PlaybackState::TokenReady).await?;

        let prepared = match self.prepare(&record, token, generation) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.fail(generation, PlaybackState::DrmFailed, &e).await;
                return Err(e);
            }
        };

        {
            let mut attempt = self.attempt.write().await;
            match attempt.as_mut() {
                Some(a) if a.generation == generation => a.prepared = Some(prepared.clone()),
                _ => {
                    debug!(generation, "attempt superseded before media prepared");
                    return Ok(None);
                }
            }
        }

        self.set_state(PlaybackState::MediaPrepared).await?;
        self.set_state(PlaybackState::Playing).await?;

        Ok(Some(prepared))
    }

    /// Source selection and DRM wiring with a fresh token.
    ///
    /// Tokens are bound to the title they were fetched for and never reused
    /// across titles, even when the proxy URL is identical.
    fn prepare(
        &self,
        record: &MediaRecord,
        token: BearerToken,
        generation: u64,
    ) -> Result<PreparedMedia> {
        record.validate_for_playback()?;

        let source = source::select(&record.video_url, &record.drm_scheme)?;

        let drm_callback: Option<Arc<dyn DrmCallback>> = match source.scheme {
            Some(_) => {
                let proxy = self.config.effective_proxy(record)?;
                let transport = Arc::new(HttpLicenseTransport::new(proxy, token.as_str()));
                Some(Arc::new(ProxyDrmCallback::new(transport)))
            }
            // Progressive content is assumed unencrypted; no DRM session.
            None => None,
        };

        Ok(PreparedMedia {
            record: record.clone(),
            source,
            token,
            drm_callback,
            generation,
        })
    }

    /// Advance to the next playlist entry. `Ok(None)` at the end of the
    /// playlist: the session returns to catalog rather than erroring.
    pub async fn next(&self) -> Result<Option<PreparedMedia>> {
        let record = self.playlist.write().await.next().cloned();
        match record {
            Some(record) => self.play(record).await,
            None => {
                info!("end of playlist, returning to catalog");
                self.return_to_catalog().await;
                Ok(None)
            }
        }
    }

    /// Step back to the previous playlist entry. `Ok(None)` at index 0.
    pub async fn previous(&self) -> Result<Option<PreparedMedia>> {
        let record = self.playlist.write().await.previous().cloned();
        match record {
            Some(record) => self.play(record).await,
            None => {
                info!("start of playlist, returning to catalog");
                self.return_to_catalog().await;
                Ok(None)
            }
        }
    }

    /// Abandon the current attempt without an error surface. Invalidates any
    /// in-flight exchange; its late result is discarded on arrival.
    async fn return_to_catalog(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.attempt.write().await = None;

        // Forced transition, valid from any state.
        *self.state.write().await = PlaybackState::Stopped;
        let _ = self.state_tx.send(PlaybackState::Stopped);
    }

    pub async fn pause(&self) -> Result<()> {
        if self.state().await == PlaybackState::Playing {
            self.set_state(PlaybackState::Paused).await?;
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        if self.state().await == PlaybackState::Paused {
            self.set_state(PlaybackState::Playing).await?;
        }
        Ok(())
    }

    /// Stop playback and discard the attempt
    pub async fn stop(&self) {
        self.return_to_catalog().await;
    }

    /// Mark natural end of playback
    pub async fn playback_ended(&self) -> Result<()> {
        self.set_state(PlaybackState::Ended).await
    }

    /// Surface a failure raised by the DRM engine during key negotiation.
    ///
    /// The message reaches the error surface verbatim when the proxy supplied
    /// one; the attempt ends in the terminal `Error` state with no retry.
    /// Failures reported against a bundle from a superseded attempt are
    /// discarded; the title playing now is unaffected by the old one.
    pub async fn report_drm_failure(&self, prepared: &PreparedMedia, err: &Error) {
        self.fail(prepared.generation, PlaybackState::DrmFailed, err)
            .await;
    }
}
