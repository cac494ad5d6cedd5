use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::{Error, Result},
    playback::PlaybackState,
};

pub type TokenFuture = Pin<Box<dyn Future<Output = Option<String>> + Send>>;

/// Called by the SDK whenever it needs a bearer token.
pub type TokenCallback = Arc<dyn Fn() -> TokenFuture + Send + Sync>;

/// Notifications pushed by a local player.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    InitializationError(String),
    AuthenticationError(String),
    AccountError(String),
    PlaybackError(String),
    StateChanged(Option<PlaybackState>),
}

pub struct PlayerOptions {
    pub name: String,
    pub volume: f32,
    pub token: TokenCallback,
    pub events: mpsc::UnboundedSender<SdkEvent>,
}

/// Vendor playback SDK able to host a player on this machine.
#[async_trait]
pub trait PlayerSdk: Send + Sync {
    /// Resolves once the SDK is usable.
    ///
    /// Each call is an independent attempt; the engine bounds it with its
    /// load timeout and drops the future when that elapses.
    async fn load(&self) -> Result<()>;

    fn create_player(&self, options: PlayerOptions) -> Arc<dyn LocalPlayer>;
}

/// A player instance created by a [`PlayerSdk`].
///
/// `connect` returning `true` only means the attempt started; the device is
/// usable once [`SdkEvent::Ready`] arrives.
#[async_trait]
pub trait LocalPlayer: Send + Sync {
    async fn connect(&self) -> bool;

    async fn disconnect(&self);

    async fn resume(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn toggle_play(&self) -> Result<()>;

    async fn next_track(&self) -> Result<()>;

    async fn previous_track(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    async fn set_volume(&self, volume: f32) -> Result<()>;
}

/// SDK for hosts without an embeddable playback context (terminals, services).
///
/// It loads fine but its players never attach, so engines built on it run in
/// remote-control mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessSdk;

#[async_trait]
impl PlayerSdk for HeadlessSdk {
    async fn load(&self) -> Result<()> {
        Ok(())
    }

    fn create_player(&self, _options: PlayerOptions) -> Arc<dyn LocalPlayer> {
        Arc::new(HeadlessPlayer)
    }
}

struct HeadlessPlayer;

#[async_trait]
impl LocalPlayer for HeadlessPlayer {
    async fn connect(&self) -> bool {
        false
    }

    async fn disconnect(&self) {}

    async fn resume(&self) -> Result<()> {
        Err(Error::EngineNotReady)
    }

    async fn pause(&self) -> Result<()> {
        Err(Error::EngineNotReady)
    }

    async fn toggle_play(&self) -> Result<()> {
        Err(Error::EngineNotReady)
    }

    async fn next_track(&self) -> Result<()> {
        Err(Error::EngineNotReady)
    }

    async fn previous_track(&self) -> Result<()> {
        Err(Error::EngineNotReady)
    }

    async fn seek(&self, _position_ms: u64) -> Result<()> {
        Err(Error::EngineNotReady)
    }

    async fn set_volume(&self, _volume: f32) -> Result<()> {
        Err(Error::EngineNotReady)
    }
}
