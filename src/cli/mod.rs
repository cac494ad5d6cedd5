//! # CLI Module
//!
//! User-facing commands of the `dashtune` binary. Each command builds the
//! services it needs from the loaded [`Config`], runs, and reports through
//! the colored output macros.
//!
//! ## Commands
//!
//! ### Session
//! - [`auth`] - log in through the browser and the local callback server
//! - [`logout`] - forget the stored session
//! - [`status`] - login state, token expiry, account name
//!
//! ### Library
//! - [`playlists`], [`tracks`], [`search`], [`saved`] - catalog tables
//!
//! ### Playback
//! - [`now`] - what is playing right now
//! - [`play`], [`transport`] - control the active device
//! - [`watch`] - follow playback until Ctrl-C
//!
//! On a terminal there is no embeddable player, so playback commands run the
//! engine with [`HeadlessSdk`] and therefore always control a device that is
//! already active on the account.

use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config::Config,
    error,
    error::Error,
    management::FileStore,
    playback::{PlaybackEngine, sdk::HeadlessSdk},
    spotify::{
        auth::{AuthFlow, BrowserNavigator},
        catalog::CatalogClient,
        client::ApiClient,
    },
    utils::SystemClock,
};

mod auth;
mod library;
mod player;

pub use auth::auth;
pub use auth::logout;
pub use auth::status;
pub use library::SavedKind;
pub use library::playlists;
pub use library::saved;
pub use library::search;
pub use library::tracks;
pub use player::Transport;
pub use player::now;
pub use player::play;
pub use player::transport;
pub use player::watch;

/// Auth flow persisting to the default local store.
pub fn auth_flow(config: Config) -> Arc<AuthFlow> {
    Arc::new(AuthFlow::new(
        config,
        Arc::new(FileStore::default()),
        Arc::new(SystemClock),
        Arc::new(BrowserNavigator),
    ))
}

pub(crate) fn catalog(auth: &Arc<AuthFlow>) -> CatalogClient {
    CatalogClient::new(ApiClient::new(Arc::clone(auth)))
}

pub(crate) fn engine(auth: &Arc<AuthFlow>) -> PlaybackEngine {
    PlaybackEngine::with_sdk(Arc::clone(auth), Arc::new(HeadlessSdk))
}

pub(crate) async fn connect(engine: &PlaybackEngine) {
    if !engine.initialize().await {
        error!("Not logged in. Run `dashtune auth` first.");
    }
}

pub(crate) fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}

pub(crate) fn fail(context: &str, err: Error) -> ! {
    match err {
        Error::NotAuthenticated => error!("Not logged in. Run `dashtune auth` first."),
        Error::NoActiveDevice => error!(
            "No active Spotify device. Open Spotify on your phone, desktop or the web player, start something, then try again."
        ),
        other => error!("{}: {}", context, other),
    }
}

pub(crate) fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
