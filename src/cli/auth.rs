use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Local};
use tokio::{sync::watch, time::sleep};

use crate::{
    api::CallbackState,
    cli::{catalog, spinner},
    error, info, server,
    spotify::auth::{AuthFlow, AuthState},
    success, warning,
};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs the browser login and waits up to a minute for the callback.
pub async fn auth(auth: Arc<AuthFlow>) {
    let state = Arc::new(CallbackState::new(Arc::clone(&auth)));
    let mut outcome = state.subscribe();

    let server_state = Arc::clone(&state);
    let mut server = tokio::spawn(async move { server::start_api_server(server_state).await });

    if let Err(e) = auth.begin_login().await {
        error!("Failed to start login: {}", e);
    }

    let pb = spinner("Waiting for Spotify authorization...");
    let result = tokio::select! {
        result = wait_for_outcome(&mut outcome) => result,
        joined = &mut server => match joined {
            Ok(Err(e)) => {
                pb.finish_and_clear();
                error!("Login server failed: {}", e)
            }
            _ => None,
        },
        _ = sleep(LOGIN_TIMEOUT) => None,
    };
    pb.finish_and_clear();
    server.abort();

    match result {
        Some(true) => success!("Authentication successful!"),
        Some(false) => error!("Authentication failed. Run `dashtune auth` to try again."),
        None => error!("Authentication timed out."),
    }
}

async fn wait_for_outcome(outcome: &mut watch::Receiver<Option<bool>>) -> Option<bool> {
    loop {
        if let Some(success) = *outcome.borrow_and_update() {
            return Some(success);
        }
        if outcome.changed().await.is_err() {
            return None;
        }
    }
}

pub async fn logout(auth: Arc<AuthFlow>) {
    auth.logout().await;
    success!("Logged out");
}

pub async fn status(auth: Arc<AuthFlow>) {
    match auth.state().await {
        AuthState::Unauthenticated => {
            warning!("Not logged in. Run `dashtune auth` to log in.");
            return;
        }
        AuthState::AwaitingCallback => {
            info!("A login is pending. Finish it in the browser or run `dashtune auth` again.");
            return;
        }
        AuthState::Authenticated => {}
    }

    if let Some(expires_at) = auth.tokens().expires_at().await {
        if let Some(at) = DateTime::from_timestamp_millis(expires_at) {
            info!(
                "Access token valid until {}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    match catalog(&auth).current_user().await {
        Ok(user) => success!(
            "Logged in as {}",
            user.display_name.unwrap_or(user.id)
        ),
        Err(e) => warning!("Logged in, but the profile could not be loaded: {}", e),
    }
}
