//! Error types for Keygate Core

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("License transport failed: {0}")]
    Transport(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    // DRM errors
    #[error("License request rejected: status {code}")]
    Drm { code: u16, body: String },

    #[error("DRM scheme not supported: {scheme}")]
    UnsupportedScheme { scheme: String },

    // Token errors
    #[error("Token request failed: {0}")]
    Token(String),

    // Catalog errors
    #[error("Failed to fetch catalog: {0}")]
    CatalogFetch(String),

    #[error("Failed to parse catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    // Playback errors
    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::ConnectionTimeout
        } else {
            Error::Transport(e.to_string())
        }
    }
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Returns true if this error is a fatal catalog/configuration defect
    /// rather than a transient network condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedScheme { .. } | Error::InvalidConfig(_) | Error::InvalidUrl(_)
        )
    }

    /// Returns true if a fresh attempt (user selecting the title again) could
    /// plausibly succeed. Nothing is retried automatically either way.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::ConnectionTimeout | Error::Token(_) | Error::CatalogFetch(_)
        )
    }

    /// Returns the error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Transport(_) => "TRANSPORT",
            Error::ConnectionTimeout => "TIMEOUT",
            Error::Drm { .. } => "DRM_REJECTED",
            Error::UnsupportedScheme { .. } => "SCHEME_UNSUPPORTED",
            Error::Token(_) => "TOKEN",
            Error::CatalogFetch(_) => "CATALOG_FETCH",
            Error::CatalogParse(_) => "CATALOG_PARSE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidUrl(_) => "INVALID_URL",
        }
    }

    /// Message suitable for the playback error surface.
    ///
    /// For a rejected license request the server-supplied body is shown
    /// verbatim; the proxy embeds structured diagnostics there.
    pub fn user_message(&self) -> String {
        match self {
            Error::Drm { code, body } => {
                if body.is_empty() {
                    format!("License request rejected: status {code}")
                } else {
                    body.clone()
                }
            }
            other => other.to_string(),
        }
    }
}
