//! # Spotify Integration Module
//!
//! HTTP side of the music widget: authentication against the Spotify accounts
//! service and the Web API endpoints the dashboard reads from and controls.
//!
//! ```text
//! PlaybackEngine / CLI
//!          ↓
//! Spotify Integration Layer
//!     ├── auth     (OAuth 2.0 PKCE, token lifecycle)
//!     ├── client   (bearer auth, single refresh-and-retry on 401)
//!     ├── catalog  (playlists, tracks, search, library)
//!     └── player   (remote playback control)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! ## Authentication
//!
//! [`auth::AuthFlow`] generates a verifier/challenge pair, sends the user to
//! the authorize endpoint, exchanges the returned code and keeps the tokens
//! fresh. Refresh failure clears the session; the user has to log in again.
//!
//! ## Error Types
//!
//! Everything returns [`crate::error::Result`]. Provider errors keep their
//! HTTP status ([`crate::error::Error::Api`]); a player command without an
//! active device is reported as [`crate::error::Error::NoActiveDevice`].

pub mod auth;
pub mod catalog;
pub mod client;
pub mod player;
