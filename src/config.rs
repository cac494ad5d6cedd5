//! Configuration management for the dashboard playback integration.
//!
//! Values come from environment variables, optionally seeded from a `.env`
//! file in the local data directory. Priority:
//! 1. Environment variables
//! 2. `.env` file in the local data directory
//! 3. Defaults below (provider endpoints, timeouts)

use std::{env, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_PLAYER_NAME: &str = "Dashboard Player";

pub const DEFAULT_SCOPES: &[&str] = &[
    "streaming",
    "user-read-email",
    "user-read-private",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-library-read",
];

/// Loads environment variables from `.env` in the local data directory.
///
/// The file lives at:
/// - Linux: `~/.local/share/dashtune/.env`
/// - macOS: `~/Library/Application Support/dashtune/.env`
/// - Windows: `%LOCALAPPDATA%/dashtune/.env`
///
/// A missing file is fine; the process environment is used as is.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file exists
/// but cannot be parsed.
pub async fn load_env() -> Result<()> {
    let path = env_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Config(e.to_string()))?;
    }

    if !path.is_file() {
        return Ok(());
    }

    dotenv::from_path(&path).map_err(|e| Error::Config(e.to_string()))
}

pub fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("dashtune/.env");
    path
}

/// Timeouts and intervals of the playback engine.
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// How long the vendor SDK may take to become available.
    pub sdk_load_timeout: Duration,
    /// How long the local player may take to report `ready`.
    pub connect_timeout: Duration,
    /// Remote-fallback polling interval.
    pub poll_interval: Duration,
    /// Delay before re-polling after a remote control command.
    pub repoll_delay: Duration,
    pub player_name: String,
    pub initial_volume: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            sdk_load_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(3),
            repoll_delay: Duration::from_millis(200),
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            initial_volume: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
    pub server_address: String,
    pub playback: PlaybackSettings,
}

impl Config {
    /// Config with provider defaults for everything but the client registration.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            playback: PlaybackSettings::default(),
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SPOTIFY_API_AUTH_CLIENT_ID` | required |
    /// | `SPOTIFY_API_REDIRECT_URI` | `http://127.0.0.1:8888/callback` |
    /// | `SPOTIFY_API_AUTH_SCOPE` | [`DEFAULT_SCOPES`], space separated |
    /// | `SPOTIFY_API_AUTH_URL` | accounts.spotify.com authorize endpoint |
    /// | `SPOTIFY_API_TOKEN_URL` | accounts.spotify.com token endpoint |
    /// | `SPOTIFY_API_URL` | `https://api.spotify.com/v1` |
    /// | `SERVER_ADDRESS` | `127.0.0.1:8888` |
    /// | `DASHTUNE_PLAYER_NAME` | `Dashboard Player` |
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the client id is missing or empty.
    pub fn from_env() -> Result<Self> {
        let client_id = env::var("SPOTIFY_API_AUTH_CLIENT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config("SPOTIFY_API_AUTH_CLIENT_ID must be set".to_string()))?;

        let mut config = Self::new(
            client_id,
            var_or("SPOTIFY_API_REDIRECT_URI", DEFAULT_REDIRECT_URI),
        );

        if let Ok(scope) = env::var("SPOTIFY_API_AUTH_SCOPE") {
            let scopes: Vec<String> = scope.split_whitespace().map(str::to_string).collect();
            if !scopes.is_empty() {
                config.scopes = scopes;
            }
        }

        config.auth_url = var_or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL);
        config.token_url = var_or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL);
        config.api_url = var_or("SPOTIFY_API_URL", DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        config.server_address = var_or("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS);
        config.playback.player_name = var_or("DASHTUNE_PLAYER_NAME", DEFAULT_PLAYER_NAME);

        Ok(config)
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
