//! # API Module
//!
//! HTTP endpoints of the local login server.
//!
//! ## Endpoints
//!
//! - [`callback`] - `GET /callback`, the OAuth redirect target. Completes the
//!   PKCE exchange and redirects to `/done` so the authorization code leaves
//!   the address bar.
//! - [`done`] - `GET /done`, a static result page.
//! - [`health`] - `GET /health`, status, login state and version.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dashtune::{api::CallbackState, server};
//!
//! let state = Arc::new(CallbackState::new(auth));
//! let mut outcome = state.subscribe();
//! tokio::spawn(server::start_api_server(Arc::clone(&state)));
//! ```

mod callback;
mod health;

pub use callback::CallbackState;
pub use callback::callback;
pub use callback::done;
pub use health::health;
