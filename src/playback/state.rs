use serde::{Deserialize, Serialize};

use crate::types::{CurrentlyPlaying, Image};

/// Snapshot of what is playing. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub track_id: Option<String>,
    pub track_name: String,
    pub artist_names: Vec<String>,
    pub album_art_url: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl PlaybackState {
    /// Maps the `GET /me/player` shape; no item means nothing is playing.
    pub fn from_currently_playing(current: CurrentlyPlaying) -> Option<Self> {
        let item = current.item?;

        let artist_names = if item.artists.is_empty() {
            item.show.as_ref().map(|s| vec![s.name.clone()]).unwrap_or_default()
        } else {
            item.artists.into_iter().map(|a| a.name).collect()
        };

        let album_art_url = item
            .album
            .and_then(|a| a.images)
            .or(item.images)
            .or_else(|| item.show.and_then(|s| s.images))
            .and_then(|images| largest_image_url(&images));

        Some(PlaybackState {
            is_playing: current.is_playing,
            track_id: item.id,
            track_name: item.name,
            artist_names,
            album_art_url,
            position_ms: current.progress_ms.unwrap_or(0),
            duration_ms: item.duration_ms,
        })
    }
}

fn largest_image_url(images: &[Image]) -> Option<String> {
    images
        .iter()
        .max_by_key(|i| i.width.unwrap_or(0))
        .map(|i| i.url.clone())
}

/// What `play` should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayTarget {
    /// A playlist, album, artist or show, played as a context.
    Context(String),
    /// Explicit items, played as a queue.
    Items(Vec<String>),
}

const CONTEXT_KINDS: &[&str] = &["playlist", "album", "artist", "show"];

impl PlayTarget {
    /// Classifies a `spotify:<type>:<id>` URI by its resource-type segment.
    pub fn from_uri(uri: &str) -> Self {
        let kind = uri.split(':').nth(1).unwrap_or_default();
        if CONTEXT_KINDS.contains(&kind) {
            PlayTarget::Context(uri.to_string())
        } else {
            PlayTarget::Items(vec![uri.to_string()])
        }
    }

    /// Request body for `PUT /me/player/play`.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            PlayTarget::Context(uri) => serde_json::json!({ "context_uri": uri }),
            PlayTarget::Items(uris) => serde_json::json!({ "uris": uris }),
        }
    }
}

/// Why the engine runs without a local device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    Timeout,
    ConnectRejected,
    InitializationError(String),
    AuthenticationError(String),
    AccountError(String),
    Detached,
}

impl FallbackReason {
    /// Whether the fallback points at a setup problem rather than a host
    /// without a usable playback context.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            FallbackReason::AuthenticationError(_) | FallbackReason::AccountError(_)
        )
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Timeout => write!(f, "local player did not become ready in time"),
            FallbackReason::ConnectRejected => write!(f, "local player refused to connect"),
            FallbackReason::InitializationError(m) => write!(f, "initialization error: {m}"),
            FallbackReason::AuthenticationError(m) => write!(f, "authentication error: {m}"),
            FallbackReason::AccountError(m) => write!(f, "account error: {m}"),
            FallbackReason::Detached => write!(f, "local device went offline"),
        }
    }
}

/// How transport commands are routed, fixed once the connection attempt settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMode {
    Local { device_id: String },
    Remote(FallbackReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Connecting,
    LocalReady,
    RemoteFallback,
    Disconnected,
}
