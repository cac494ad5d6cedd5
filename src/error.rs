use thiserror::Error;

/// Errors surfaced by the playback integration.
///
/// Most components recover locally (see [`crate::spotify::auth::AuthFlow`] and
/// [`crate::playback::PlaybackEngine`]); the variants below are what is left
/// once recovery has been attempted.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not authenticated. Run `dashtune auth` to log in")]
    NotAuthenticated,

    #[error("No active Spotify device. Start playback in a Spotify app first")]
    NoActiveDevice,

    #[error("Spotify API returned {status}: {message}")]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Playback SDK failed to load: {0}")]
    SdkLoad(String),

    #[error("Playback engine is not ready")]
    EngineNotReady,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Login server error: {0}")]
    Server(String),
}

impl Error {
    /// HTTP status carried by the error, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
