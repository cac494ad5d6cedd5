//! Dashboard Music Widget Playback Library
//!
//! Spotify integration behind the dashboard's music widget: PKCE login and
//! token lifecycle, a playback engine that hosts a local player when it can
//! and remote-controls the account's active device when it cannot, and
//! read-only catalog queries.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints of the local login callback server
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error type shared by all components
//! - `management` - Client-local persistence (key/value store, session tokens)
//! - `playback` - Playback engine, local player SDK seam, playback state
//! - `server` - Local HTTP server for OAuth callbacks
//! - `spotify` - Spotify accounts and Web API clients
//! - `types` - Data structures and type definitions
//! - `utils` - PKCE helpers and clocks
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dashtune::{config::Config, management::FileStore, playback::{PlaybackEngine, sdk::HeadlessSdk},
//!     spotify::auth::{AuthFlow, BrowserNavigator}, utils::SystemClock};
//!
//! let auth = Arc::new(AuthFlow::new(
//!     Config::from_env()?,
//!     Arc::new(FileStore::default()),
//!     Arc::new(SystemClock),
//!     Arc::new(BrowserNavigator),
//! ));
//! let engine = PlaybackEngine::with_sdk(auth, Arc::new(HeadlessSdk));
//! if engine.initialize().await {
//!     engine.play(Some("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M")).await?;
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod playback;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

pub use error::{Error, Result};

/// Prints a status line prefixed with a blue `o`.
///
/// User-facing CLI output; library code logs through `tracing` instead.
///
/// ```ignore
/// info!("Waiting for the Spotify login to complete...");
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a status line prefixed with a green `✓`.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a red `!` line to stderr and exits with status 1.
///
/// Only for failures the command cannot continue from.
///
/// ```ignore
/// error!("Not logged in. Run `dashtune auth` first.");
/// // unreachable
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1)
  })
}

/// Prints a yellow `!` line to stderr; execution continues.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
