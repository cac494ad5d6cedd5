use std::{sync::Arc, time::Duration};

use colored::Colorize;
use tokio::{sync::mpsc, time::timeout};

use crate::{
    cli::{connect, engine, fail, format_ms},
    info,
    playback::{PlaybackEngine, PlaybackState, Subscription},
    spotify::auth::AuthFlow,
    success, warning,
};

// how long to wait for a poll beyond the configured interval
const UPDATE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub enum Transport {
    Pause,
    Resume,
    Toggle,
    Next,
    Previous,
    Seek(u64),
    /// Percent, `0..=100`.
    Volume(u8),
}

type Updates = mpsc::UnboundedReceiver<Option<PlaybackState>>;

fn subscribe(engine: &PlaybackEngine) -> (Subscription, Updates) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = engine.on_state_change(move |state| {
        let _ = tx.send(state.cloned());
    });
    (subscription, rx)
}

async fn next_update(updates: &mut Updates, wait: Duration) -> Option<Option<PlaybackState>> {
    timeout(wait, updates.recv()).await.ok().flatten()
}

fn describe(state: Option<&PlaybackState>) -> String {
    let Some(state) = state else {
        return "Nothing playing".dimmed().to_string();
    };

    let icon = if state.is_playing { "▶" } else { "⏸" };
    let artists = if state.artist_names.is_empty() {
        String::new()
    } else {
        format!(" by {}", state.artist_names.join(", "))
    };

    format!(
        "{} {}{} [{} / {}]",
        icon,
        state.track_name.bold(),
        artists,
        format_ms(state.position_ms),
        format_ms(state.duration_ms)
    )
}

fn update_wait(auth: &AuthFlow) -> Duration {
    auth.config().playback.poll_interval + UPDATE_GRACE
}

/// Prints the current playback state once.
pub async fn now(auth: Arc<AuthFlow>) {
    let wait = update_wait(&auth);
    let engine = engine(&auth);
    let (_subscription, mut updates) = subscribe(&engine);
    connect(&engine).await;

    match next_update(&mut updates, wait).await {
        Some(state) => println!("{}", describe(state.as_ref())),
        None => warning!("No playback state received"),
    }
    engine.disconnect().await;
}

pub async fn play(auth: Arc<AuthFlow>, uri: Option<String>) {
    let engine = engine(&auth);
    let (_subscription, mut updates) = subscribe(&engine);
    connect(&engine).await;

    if let Err(e) = engine.play(uri.as_deref()).await {
        engine.disconnect().await;
        fail("Failed to start playback", e);
    }

    match &uri {
        Some(uri) => success!("Playing {}", uri),
        None => success!("Resumed playback"),
    }

    // the first poll may still predate the command; the re-poll follows it
    let settle = auth.config().playback.repoll_delay + UPDATE_GRACE;
    let mut latest = None;
    while let Some(state) = next_update(&mut updates, settle).await {
        latest = Some(state);
        if latest.as_ref().is_some_and(|s| s.as_ref().is_some_and(|s| s.is_playing)) {
            break;
        }
    }
    if let Some(state) = latest {
        println!("{}", describe(state.as_ref()));
    }
    engine.disconnect().await;
}

/// Sends a transport command to the active device and prints the resulting
/// state.
pub async fn transport(auth: Arc<AuthFlow>, action: Transport) {
    let wait = update_wait(&auth);
    let settle = auth.config().playback.repoll_delay + UPDATE_GRACE;
    let engine = engine(&auth);
    let (_subscription, mut updates) = subscribe(&engine);
    connect(&engine).await;

    // the first poll tells whether there is anything to control
    match next_update(&mut updates, wait).await {
        Some(None) => {
            engine.disconnect().await;
            fail("Nothing to control", crate::Error::NoActiveDevice);
        }
        Some(Some(_)) | None => {}
    }

    match action {
        Transport::Pause => engine.pause().await,
        Transport::Resume => engine.resume().await,
        Transport::Toggle => engine.toggle_play().await,
        Transport::Next => engine.next_track().await,
        Transport::Previous => engine.previous_track().await,
        Transport::Seek(position_ms) => engine.seek(position_ms).await,
        Transport::Volume(percent) => engine.set_volume(f32::from(percent.min(100)) / 100.0).await,
    }

    match next_update(&mut updates, settle).await {
        Some(state) => println!("{}", describe(state.as_ref())),
        None => info!("Command sent"),
    }
    engine.disconnect().await;
}

/// Follows playback until Ctrl-C.
pub async fn watch(auth: Arc<AuthFlow>) {
    let engine = engine(&auth);
    let _subscription = engine.on_state_change(|state| println!("{}", describe(state)));
    connect(&engine).await;

    if let Some(reason) = engine.fallback_reason() {
        info!("Following the active device ({})", reason);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warning!("Cannot listen for Ctrl-C: {}", e);
    }
    engine.disconnect().await;
    info!("Stopped watching");
}
