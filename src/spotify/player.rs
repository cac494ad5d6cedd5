use async_trait::async_trait;
use reqwest::Method;

use crate::{
    error::{Error, Result},
    playback::{PlayTarget, PlaybackState},
    spotify::client::ApiClient,
    types::CurrentlyPlaying,
};

/// Remote control of whatever device is active on the user's account.
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Starts `target` or, without one, resumes the current context.
    ///
    /// With `device_id` the command is addressed to that device instead of
    /// the active one.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NoActiveDevice`] when the account has no device to
    /// play on, [`crate::Error::Api`] for any other rejected command.
    async fn play(&self, device_id: Option<&str>, target: Option<&PlayTarget>) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Skips to the next item in the queue.
    async fn next(&self) -> Result<()>;

    async fn previous(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// # Arguments
    ///
    /// * `percent` - Target volume; values above 100 are sent as 100
    async fn set_volume(&self, percent: u8) -> Result<()>;

    /// Current playback; `None` when nothing is playing.
    async fn current_state(&self) -> Result<Option<PlaybackState>>;
}

/// [`PlayerControl`] over the Web API `/me/player` endpoints.
#[derive(Clone)]
pub struct RemotePlayer {
    api: ApiClient,
}

impl RemotePlayer {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn command(&self, method: Method, path: &str, query: &[(&str, String)]) -> Result<()> {
        self.api
            .send(method, path, query, None)
            .await
            .map(|_| ())
            .map_err(no_active_device)
    }
}

#[async_trait]
impl PlayerControl for RemotePlayer {
    async fn play(&self, device_id: Option<&str>, target: Option<&PlayTarget>) -> Result<()> {
        let query: Vec<(&str, String)> = device_id
            .map(|id| vec![("device_id", id.to_string())])
            .unwrap_or_default();
        let body = target.map(PlayTarget::to_body);

        self.api
            .send(Method::PUT, "/me/player/play", &query, body.as_ref())
            .await
            .map(|_| ())
            .map_err(no_active_device)
    }

    async fn pause(&self) -> Result<()> {
        self.command(Method::PUT, "/me/player/pause", &[]).await
    }

    async fn next(&self) -> Result<()> {
        self.command(Method::POST, "/me/player/next", &[]).await
    }

    async fn previous(&self) -> Result<()> {
        self.command(Method::POST, "/me/player/previous", &[]).await
    }

    async fn seek(&self, position_ms: u64) -> Result<()> {
        self.command(
            Method::PUT,
            "/me/player/seek",
            &[("position_ms", position_ms.to_string())],
        )
        .await
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.command(
            Method::PUT,
            "/me/player/volume",
            &[("volume_percent", percent.min(100).to_string())],
        )
        .await
    }

    async fn current_state(&self) -> Result<Option<PlaybackState>> {
        let current: Option<CurrentlyPlaying> =
            self.api.get_optional_json("/me/player", &[]).await?;
        Ok(current.and_then(PlaybackState::from_currently_playing))
    }
}

/// Spotify answers player commands without an active device with
/// `404 {"error": {"reason": "NO_ACTIVE_DEVICE"}}`.
fn no_active_device(err: Error) -> Error {
    match err {
        Error::Api {
            status: 404,
            ref reason,
            ref message,
        } if reason.as_deref() == Some("NO_ACTIVE_DEVICE")
            || message.to_lowercase().contains("no active device") =>
        {
            Error::NoActiveDevice
        }
        other => other,
    }
}
