use std::sync::Arc;

use axum::{Extension, response::Json};
use serde_json::{Value, json};

use crate::{api::CallbackState, spotify::auth::AuthState};

pub async fn health(Extension(state): Extension<Arc<CallbackState>>) -> Json<Value> {
    let auth = match state.auth.state().await {
        AuthState::Unauthenticated => "unauthenticated",
        AuthState::AwaitingCallback => "awaiting_callback",
        AuthState::Authenticated => "authenticated",
    };

    Json(json!({
        "status": "ok",
        "auth": auth,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
