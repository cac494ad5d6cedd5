use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{Extension, Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    api::{self, CallbackState},
    error::{Error, Result},
};

pub fn router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback))
        .route("/done", get(api::done))
        .layer(Extension(state))
}

/// Binds the configured `SERVER_ADDRESS` and serves the login endpoints.
pub async fn start_api_server(state: Arc<CallbackState>) -> Result<()> {
    let addr = SocketAddr::from_str(&state.auth.config().server_address)
        .map_err(|e| Error::Config(format!("invalid server address: {e}")))?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Server(format!("cannot bind {addr}: {e}")))?;
    serve_on(listener, state).await
}

pub async fn serve_on(listener: TcpListener, state: Arc<CallbackState>) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Login callback server listening");
    }
    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::Server(format!("callback server stopped: {e}")))
}
