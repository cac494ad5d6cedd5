//! # Playback Module
//!
//! Drives playback for the music widget. [`PlaybackEngine`] tries to attach a
//! local player through a [`sdk::PlayerSdk`] and falls back to remote control
//! of the account's active device when that is not possible:
//!
//! ```text
//! Uninitialized → Connecting → LocalReady ─┐
//!                     │                     ├→ Disconnected
//!                     └──→ RemoteFallback ──┘
//! ```
//!
//! State updates reach subscribers as [`PlaybackState`] snapshots, pushed by
//! the local player or polled from `GET /me/player`.

mod engine;
pub mod sdk;
mod state;

pub use engine::PlaybackEngine;
pub use engine::Subscription;
pub use state::ControlMode;
pub use state::EngineState;
pub use state::FallbackReason;
pub use state::PlayTarget;
pub use state::PlaybackState;
