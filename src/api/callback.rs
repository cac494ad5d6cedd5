use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension,
    extract::Query,
    response::{Html, Redirect},
};
use tokio::sync::watch;

use crate::spotify::auth::{AuthFlow, CallbackParams};

/// Shared state of the callback server.
pub struct CallbackState {
    pub auth: Arc<AuthFlow>,
    outcome: watch::Sender<Option<bool>>,
}

impl CallbackState {
    pub fn new(auth: Arc<AuthFlow>) -> Self {
        let (outcome, _) = watch::channel(None);
        Self { auth, outcome }
    }

    /// Receives `Some(success)` once a callback has been handled.
    pub fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.outcome.subscribe()
    }
}

/// Completes the login, then redirects to `/done` so the code does not stay
/// in the address bar where a reload would replay it.
pub async fn callback(
    Query(params): Query<CallbackParams>,
    Extension(state): Extension<Arc<CallbackState>>,
) -> Redirect {
    let success = state.auth.handle_callback(&params).await;
    state.outcome.send_replace(Some(success));

    if success {
        Redirect::to("/done?status=ok")
    } else {
        Redirect::to("/done?status=failed")
    }
}

pub async fn done(Query(params): Query<HashMap<String, String>>) -> Html<&'static str> {
    match params.get("status").map(String::as_str) {
        Some("ok") => Html("<h2>Authentication successful.</h2><p>You can close this window.</p>"),
        _ => Html("<h4>Login failed.</h4><p>Run <code>dashtune auth</code> again.</p>"),
    }
}
