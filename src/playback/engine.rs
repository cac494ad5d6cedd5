use std::{
    cell::Cell,
    sync::{
        Arc, Mutex, MutexGuard, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, sleep, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    config::PlaybackSettings,
    error::{Error, Result},
    playback::{
        ControlMode, EngineState, FallbackReason, PlayTarget, PlaybackState,
        sdk::{LocalPlayer, PlayerOptions, PlayerSdk, SdkEvent, TokenCallback, TokenFuture},
    },
    spotify::{
        auth::AuthFlow,
        client::ApiClient,
        player::{PlayerControl, RemotePlayer},
    },
};

type Callback = Arc<dyn Fn(Option<&PlaybackState>) + Send + Sync>;

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Marks this thread as inside a subscriber callback until dropped, so the
/// flag is cleared even when a callback panics.
struct DeliveringGuard;

impl DeliveringGuard {
    fn enter() -> Self {
        DELIVERING.with(|d| d.set(true));
        DeliveringGuard
    }
}

impl Drop for DeliveringGuard {
    fn drop(&mut self) {
        DELIVERING.with(|d| d.set(false));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Status {
    Uninitialized,
    Connecting,
    Ready(ControlMode),
    Disconnected,
}

enum Route {
    Local {
        player: Arc<dyn LocalPlayer>,
        device_id: String,
    },
    Remote {
        session: u64,
    },
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Pause,
    Resume,
    Toggle,
    Next,
    Previous,
    Seek(u64),
    Volume(f32),
}

struct Inner {
    auth: Arc<AuthFlow>,
    remote: Arc<dyn PlayerControl>,
    sdk: Arc<dyn PlayerSdk>,
    settings: PlaybackSettings,
    status: Mutex<Status>,
    local: Mutex<Option<Arc<dyn LocalPlayer>>>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_subscriber: AtomicU64,
    // bumped on every (re)initialize and disconnect; work started under an
    // older value must not deliver
    session: AtomicU64,
    delivery: Mutex<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    init_lock: tokio::sync::Mutex<()>,
}

/// Playback controller for the music widget.
///
/// After [`initialize`](PlaybackEngine::initialize) the engine either drives a
/// local player hosted by the vendor SDK, or, when no local device can attach,
/// remote-controls whichever device is active on the account and polls
/// `GET /me/player` for state. Once fallen back, an engine stays in remote
/// mode until [`disconnect`](PlaybackEngine::disconnect).
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<Inner>,
}

/// Handle returned by [`PlaybackEngine::on_state_change`].
pub struct Subscription {
    id: u64,
    engine: Weak<Inner>,
}

impl Subscription {
    /// Removes the callback. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.engine.upgrade() {
            lock(&inner.subscribers).retain(|(id, _)| *id != self.id);
        }
    }
}

impl PlaybackEngine {
    /// Creates an uninitialized engine.
    ///
    /// # Arguments
    ///
    /// * `auth` - Session used for the SDK token callback and remote calls
    /// * `remote` - Web API player control used in remote mode
    /// * `sdk` - Host of the local player
    /// * `settings` - Timeouts, polling cadence and local player defaults
    pub fn new(
        auth: Arc<AuthFlow>,
        remote: Arc<dyn PlayerControl>,
        sdk: Arc<dyn PlayerSdk>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                auth,
                remote,
                sdk,
                settings,
                status: Mutex::new(Status::Uninitialized),
                local: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(0),
                session: AtomicU64::new(0),
                delivery: Mutex::new(()),
                tasks: Mutex::new(Vec::new()),
                init_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Engine controlling remote devices through the Web API, with settings
    /// taken from the auth configuration.
    pub fn with_sdk(auth: Arc<AuthFlow>, sdk: Arc<dyn PlayerSdk>) -> Self {
        let settings = auth.config().playback.clone();
        let remote = Arc::new(RemotePlayer::new(ApiClient::new(Arc::clone(&auth))));
        Self::new(auth, remote, sdk, settings)
    }

    /// Connects the engine; a no-op returning `true` when already connected.
    ///
    /// The SDK is loaded, a local player is created and the engine waits up
    /// to the connect timeout for it to report ready. A local player that
    /// fails or is too slow to attach is abandoned in favour of remote
    /// control, which still counts as success.
    ///
    /// # Returns
    ///
    /// `false` when the SDK cannot be loaded in time, there is no valid
    /// session, or [`disconnect`](PlaybackEngine::disconnect) ran before the
    /// connection completed. The engine is not ready in any of these cases.
    ///
    /// # Example
    ///
    /// ```
    /// let engine = PlaybackEngine::with_sdk(auth, Arc::new(HeadlessSdk));
    /// let _sub = engine.on_state_change(|state| render(state));
    /// if !engine.initialize().await {
    ///     error!("Playback is unavailable");
    /// }
    /// ```
    pub async fn initialize(&self) -> bool {
        let inner = &self.inner;
        let _init = inner.init_lock.lock().await;

        if matches!(*lock(&inner.status), Status::Ready(_)) {
            return true;
        }
        *lock(&inner.status) = Status::Connecting;
        let session = inner.session.fetch_add(1, Ordering::SeqCst) + 1;

        match timeout(inner.settings.sdk_load_timeout, inner.sdk.load()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Playback SDK failed to load");
                inner.reset_if_current(session);
                return false;
            }
            Err(_) => {
                warn!(
                    timeout_ms = inner.settings.sdk_load_timeout.as_millis() as u64,
                    "Playback SDK did not load in time"
                );
                inner.reset_if_current(session);
                return false;
            }
        }

        if inner.auth.get_valid_access_token().await.is_none() {
            warn!("Cannot initialize playback without a valid session");
            inner.reset_if_current(session);
            return false;
        }

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let auth = Arc::clone(&inner.auth);
        let token: TokenCallback = Arc::new(move || {
            let auth = Arc::clone(&auth);
            Box::pin(async move { auth.get_valid_access_token().await }) as TokenFuture
        });
        let player = inner.sdk.create_player(PlayerOptions {
            name: inner.settings.player_name.clone(),
            volume: inner.settings.initial_volume,
            token,
            events: events_tx,
        });

        let attached = timeout(
            inner.settings.connect_timeout,
            wait_for_ready(player.as_ref(), &mut events),
        )
        .await
        .unwrap_or(Err(FallbackReason::Timeout));

        match attached {
            Ok(device_id) => {
                if inner.attach_local(session, &player, device_id, events) {
                    return true;
                }
                // disconnected while connecting
                player.disconnect().await;
                false
            }
            Err(reason) => {
                drop(events);
                let entered = inner.enter_fallback(session, reason);
                player.disconnect().await;
                entered && inner.session.load(Ordering::SeqCst) == session
            }
        }
    }

    /// Registers a state subscriber. `None` means nothing is playing.
    ///
    /// Callbacks run on the delivering task and must not block. Register
    /// before [`initialize`](PlaybackEngine::initialize) to see the first
    /// poll.
    ///
    /// # Example
    ///
    /// ```
    /// let subscription = engine.on_state_change(|state| match state {
    ///     Some(s) => info!("{} - {}", s.artist_names.join(", "), s.track_name),
    ///     None => info!("Nothing playing"),
    /// });
    /// // later
    /// subscription.unsubscribe();
    /// ```
    pub fn on_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&PlaybackState>) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let callback: Callback = Arc::new(callback);
        lock(&self.inner.subscribers).push((id, callback));
        Subscription {
            id,
            engine: Arc::downgrade(&self.inner),
        }
    }

    /// Plays `uri` or, without one, resumes the current context.
    ///
    /// # Errors
    ///
    /// [`Error::NoActiveDevice`] when Spotify has no device to play on,
    /// [`Error::Api`] for other provider failures and
    /// [`Error::EngineNotReady`] before initialization.
    pub async fn play(&self, uri: Option<&str>) -> Result<()> {
        let inner = &self.inner;
        let Some(route) = inner.route() else {
            return Err(Error::EngineNotReady);
        };
        let target = uri.map(PlayTarget::from_uri);

        let result = match route {
            Route::Local { player, device_id } => match &target {
                None => player.resume().await,
                Some(target) => inner.remote.play(Some(&device_id), Some(target)).await,
            },
            Route::Remote { session } => {
                let result = inner.remote.play(None, target.as_ref()).await;
                inner.schedule_repoll(session);
                result
            }
        };

        if let Err(e) = &result {
            warn!(error = %e, uri, "Play request failed");
        }
        result
    }

    /// Pauses playback. Failures are logged, like every transport command
    /// below; in remote mode a re-poll follows shortly after.
    pub async fn pause(&self) {
        self.send_command(Command::Pause).await
    }

    pub async fn resume(&self) {
        self.send_command(Command::Resume).await
    }

    pub async fn toggle_play(&self) {
        self.send_command(Command::Toggle).await
    }

    pub async fn next_track(&self) {
        self.send_command(Command::Next).await
    }

    pub async fn previous_track(&self) {
        self.send_command(Command::Previous).await
    }

    /// Seeks within the current item.
    pub async fn seek(&self, position_ms: u64) {
        self.send_command(Command::Seek(position_ms)).await
    }

    /// Sets the volume, `0.0..=1.0`; out-of-range values are clamped.
    pub async fn set_volume(&self, volume: f32) {
        if volume.is_nan() {
            warn!("Ignoring NaN volume");
            return;
        }
        self.send_command(Command::Volume(volume.clamp(0.0, 1.0)))
            .await
    }

    /// Tears the engine down. Safe to call in any state.
    ///
    /// No subscriber is called once this returns, including for polls that
    /// were already in flight.
    pub async fn disconnect(&self) {
        let player = self.inner.shutdown();
        if let Some(player) = player {
            player.disconnect().await;
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        match &*lock(&self.inner.status) {
            Status::Uninitialized => EngineState::Uninitialized,
            Status::Connecting => EngineState::Connecting,
            Status::Ready(ControlMode::Local { .. }) => EngineState::LocalReady,
            Status::Ready(ControlMode::Remote(_)) => EngineState::RemoteFallback,
            Status::Disconnected => EngineState::Disconnected,
        }
    }

    pub fn mode(&self) -> Option<ControlMode> {
        match &*lock(&self.inner.status) {
            Status::Ready(mode) => Some(mode.clone()),
            _ => None,
        }
    }

    /// Id of the local device while it holds control.
    pub fn device_id(&self) -> Option<String> {
        match self.mode()? {
            ControlMode::Local { device_id } => Some(device_id),
            ControlMode::Remote(_) => None,
        }
    }

    /// Why the engine is in remote mode, for diagnostics.
    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self.mode()? {
            ControlMode::Remote(reason) => Some(reason),
            ControlMode::Local { .. } => None,
        }
    }

    async fn send_command(&self, command: Command) {
        let inner = &self.inner;
        let Some(route) = inner.route() else {
            warn!(?command, "Playback engine not ready, command dropped");
            return;
        };

        let result = match route {
            Route::Local { player, .. } => match command {
                Command::Pause => player.pause().await,
                Command::Resume => player.resume().await,
                Command::Toggle => player.toggle_play().await,
                Command::Next => player.next_track().await,
                Command::Previous => player.previous_track().await,
                Command::Seek(ms) => player.seek(ms).await,
                Command::Volume(v) => player.set_volume(v).await,
            },
            Route::Remote { session } => {
                let result = inner.remote_command(command).await;
                inner.schedule_repoll(session);
                result
            }
        };

        if let Err(e) = result {
            warn!(?command, error = %e, "Playback command failed");
        }
    }
}

async fn wait_for_ready(
    player: &dyn LocalPlayer,
    events: &mut mpsc::UnboundedReceiver<SdkEvent>,
) -> std::result::Result<String, FallbackReason> {
    if !player.connect().await {
        return Err(FallbackReason::ConnectRejected);
    }

    while let Some(event) = events.recv().await {
        match event {
            SdkEvent::Ready { device_id } => return Ok(device_id),
            SdkEvent::InitializationError(m) => return Err(FallbackReason::InitializationError(m)),
            SdkEvent::AuthenticationError(m) => return Err(FallbackReason::AuthenticationError(m)),
            SdkEvent::AccountError(m) => return Err(FallbackReason::AccountError(m)),
            other => debug!(?other, "Player event before ready ignored"),
        }
    }
    Err(FallbackReason::ConnectRejected)
}

fn volume_percent(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

impl Inner {
    fn is_current(&self, session: u64) -> bool {
        self.session.load(Ordering::SeqCst) == session
            && matches!(*lock(&self.status), Status::Ready(_))
    }

    fn reset_if_current(&self, session: u64) {
        if self.session.load(Ordering::SeqCst) == session {
            *lock(&self.status) = Status::Uninitialized;
        }
    }

    fn route(&self) -> Option<Route> {
        let session = self.session.load(Ordering::SeqCst);
        let status = lock(&self.status);
        match &*status {
            Status::Ready(ControlMode::Local { device_id }) => {
                let player = lock(&self.local).clone()?;
                Some(Route::Local {
                    player,
                    device_id: device_id.clone(),
                })
            }
            Status::Ready(ControlMode::Remote(_)) => Some(Route::Remote { session }),
            _ => None,
        }
    }

    /// Calls every subscriber unless `session` has ended.
    ///
    /// The check and the calls happen under the delivery lock, which
    /// `shutdown` also takes, so nothing is delivered after it returns.
    fn deliver(&self, session: u64, state: Option<&PlaybackState>) {
        let _gate = lock(&self.delivery);
        if !self.is_current(session) {
            debug!("Dropping playback state from an ended session");
            return;
        }

        let callbacks: Vec<Callback> = lock(&self.subscribers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        let _delivering = DeliveringGuard::enter();
        for callback in callbacks {
            callback(state);
        }
    }

    /// Publishes the attached local player, unless `session` ended while it
    /// was connecting.
    fn attach_local(
        self: &Arc<Self>,
        session: u64,
        player: &Arc<dyn LocalPlayer>,
        device_id: String,
        events: mpsc::UnboundedReceiver<SdkEvent>,
    ) -> bool {
        let _gate = lock(&self.delivery);
        if self.session.load(Ordering::SeqCst) != session {
            return false;
        }
        info!(device_id = %device_id, "Local player ready");
        *lock(&self.local) = Some(Arc::clone(player));
        *lock(&self.status) = Status::Ready(ControlMode::Local { device_id });
        self.spawn_event_pump(session, events);
        true
    }

    /// Switches to remote control and starts polling. Returns `false` without
    /// touching anything when `session` has already ended.
    ///
    /// Runs under the delivery lock so it cannot interleave with `shutdown`.
    fn enter_fallback(self: &Arc<Self>, session: u64, reason: FallbackReason) -> bool {
        let _gate = lock(&self.delivery);
        if self.session.load(Ordering::SeqCst) != session {
            debug!(%reason, "Session ended before fallback, staying disconnected");
            return false;
        }
        if reason.is_misconfiguration() {
            warn!(%reason, "Local player unavailable, falling back to remote control");
        } else {
            info!(%reason, "Local player unavailable, falling back to remote control");
        }
        *lock(&self.status) = Status::Ready(ControlMode::Remote(reason));
        self.start_polling(session);
        true
    }

    fn start_polling(self: &Arc<Self>, session: u64) {
        let weak = Arc::downgrade(self);
        let period = self.settings.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if !inner.is_current(session) {
                    break;
                }
                inner.poll_once(session).await;
            }
        });
        lock(&self.tasks).push(handle);
    }

    async fn poll_once(&self, session: u64) {
        match self.remote.current_state().await {
            Ok(state) => self.deliver(session, state.as_ref()),
            Err(e) => warn!(error = %e, "Playback state poll failed"),
        }
    }

    fn schedule_repoll(self: &Arc<Self>, session: u64) {
        let weak = Arc::downgrade(self);
        let delay = self.settings.repoll_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                if inner.is_current(session) {
                    inner.poll_once(session).await;
                }
            }
        });
    }

    fn spawn_event_pump(
        self: &Arc<Self>,
        session: u64,
        mut events: mpsc::UnboundedReceiver<SdkEvent>,
    ) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                if !inner.is_current(session) {
                    break;
                }
                match event {
                    SdkEvent::StateChanged(state) => inner.deliver(session, state.as_ref()),
                    SdkEvent::Ready { device_id } => {
                        let mut status = lock(&inner.status);
                        if let Status::Ready(ControlMode::Local { device_id: current }) =
                            &mut *status
                        {
                            *current = device_id;
                        }
                    }
                    SdkEvent::NotReady { device_id } => {
                        warn!(device_id = %device_id, "Local device went offline");
                        inner.abandon_local(session).await;
                        break;
                    }
                    SdkEvent::PlaybackError(m) => warn!(message = %m, "Local playback error"),
                    SdkEvent::InitializationError(m)
                    | SdkEvent::AuthenticationError(m)
                    | SdkEvent::AccountError(m) => {
                        warn!(message = %m, "Local player reported an error")
                    }
                }
            }
        });
        lock(&self.tasks).push(handle);
    }

    async fn abandon_local(self: &Arc<Self>, session: u64) {
        let player = lock(&self.local).take();
        self.enter_fallback(session, FallbackReason::Detached);
        if let Some(player) = player {
            player.disconnect().await;
        }
    }

    async fn remote_command(&self, command: Command) -> Result<()> {
        let remote = &self.remote;
        match command {
            Command::Pause => remote.pause().await,
            Command::Resume => remote.play(None, None).await,
            Command::Toggle => match remote.current_state().await? {
                Some(state) if state.is_playing => remote.pause().await,
                _ => remote.play(None, None).await,
            },
            Command::Next => remote.next().await,
            Command::Previous => remote.previous().await,
            Command::Seek(ms) => remote.seek(ms).await,
            Command::Volume(v) => remote.set_volume(volume_percent(v)).await,
        }
    }

    fn shutdown(&self) -> Option<Arc<dyn LocalPlayer>> {
        {
            // a subscriber disconnecting from inside its callback already
            // holds the delivery lock on this thread
            let _gate = if DELIVERING.with(Cell::get) {
                None
            } else {
                Some(lock(&self.delivery))
            };
            self.session.fetch_add(1, Ordering::SeqCst);
            *lock(&self.status) = Status::Disconnected;
        }

        for handle in lock(&self.tasks).drain(..) {
            handle.abort();
        }
        debug!("Playback engine disconnected");
        lock(&self.local).take()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for handle in lock(&self.tasks).drain(..) {
            handle.abort();
        }
    }
}
