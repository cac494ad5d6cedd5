#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use dashtune::{
    Error, Result,
    config::{Config, PlaybackSettings},
    management::{KeyValueStore, MemoryStore},
    spotify::auth::{AuthFlow, Navigator},
    utils::ManualClock,
};
use url::Url;

pub const CLIENT_ID: &str = "client-123";
pub const REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Config pointing every provider endpoint at `base` (a mock server URL).
pub fn config(base: &str) -> Config {
    let mut config = Config::new(CLIENT_ID, REDIRECT_URI);
    config.auth_url = format!("{base}/authorize");
    config.token_url = format!("{base}/api/token");
    config.api_url = format!("{base}/v1");
    config.playback = fast_settings();
    config
}

pub fn fast_settings() -> PlaybackSettings {
    PlaybackSettings {
        sdk_load_timeout: Duration::from_millis(200),
        connect_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(50),
        repoll_delay: Duration::from_millis(10),
        ..PlaybackSettings::default()
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub urls: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn last(&self) -> Option<Url> {
        self.urls.lock().unwrap().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        self.urls.lock().unwrap().push(url.clone());
    }
}

/// A store whose every operation fails, like storage disabled by the host.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Storage("unavailable".to_string()))
    }

    async fn set_many(&self, _entries: &[(&str, String)]) -> Result<()> {
        Err(Error::Storage("unavailable".to_string()))
    }

    async fn remove_many(&self, _keys: &[&str]) -> Result<()> {
        Err(Error::Storage("unavailable".to_string()))
    }
}

pub struct Harness {
    pub auth: Arc<AuthFlow>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn harness(config: Config) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let navigator = Arc::new(RecordingNavigator::default());
    let auth = Arc::new(AuthFlow::new(
        config,
        store.clone(),
        clock.clone(),
        navigator.clone(),
    ));
    Harness {
        auth,
        store,
        clock,
        navigator,
    }
}

/// Harness with a session whose access token is valid for an hour.
pub async fn logged_in(config: Config, access: &str) -> Harness {
    let h = harness(config);
    assert!(h.auth.tokens().save(access, "refresh-1", 3600).await);
    h
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: u64) -> String {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    body.to_string()
}
