//! Session bridge: a worker thread mirroring the OS media session
//!
//! The worker owns the provider, the attached session and every event
//! subscription. Callbacks only push a [`RefreshReason`]; the worker drains
//! the pending set, runs one refresh pass and publishes a complete
//! [`MediaState`]. The consumer picks up the latest snapshot with
//! [`SessionBridge::update`], which is a single pointer clone under a lock.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use rhythm_core::{MediaController, MediaState, TrackKey};
use tracing::{debug, info, warn};

use crate::art_cache::AlbumArtCache;
use crate::reason::{RefreshNotifier, RefreshReason, Signal};
use crate::subscription::Subscription;
use crate::{MediaSessionSource, PlaybackStatus, SessionProvider};

const PLUGIN_DIR: &str = "RocketRhythm";
const ALBUM_CACHE_DIR: &str = "album_cache";

type Published = Arc<Mutex<Arc<MediaState>>>;

fn lock(published: &Mutex<Arc<MediaState>>) -> MutexGuard<'_, Arc<MediaState>> {
    published.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live mirror of the current OS media session.
///
/// Construct once, call [`update`](Self::update) every frame and read
/// [`state`](Self::state). Dropping the bridge stops and joins the worker.
pub struct SessionBridge {
    signal: Arc<Signal>,
    published: Published,
    refreshes: Arc<AtomicU64>,
    state: Arc<MediaState>,
    worker: Option<JoinHandle<()>>,
}

impl SessionBridge {
    /// Bridge to the platform media session, caching art under
    /// `<data_dir>/RocketRhythm/album_cache`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let cache_dir = data_dir.as_ref().join(PLUGIN_DIR).join(ALBUM_CACHE_DIR);
        Self::with_provider(Some(cache_dir), crate::connect_system)
    }

    /// Bridge driven by the provider `connect` creates.
    ///
    /// `connect` runs on the worker thread, which then owns the provider for
    /// its whole life. `None` for `cache_dir` disables album art.
    pub fn with_provider<P, F>(cache_dir: Option<PathBuf>, connect: F) -> Self
    where
        P: SessionProvider + 'static,
        F: FnOnce() -> Result<P> + Send + 'static,
    {
        let signal = Arc::new(Signal::default());
        let published: Published = Arc::new(Mutex::new(Arc::new(MediaState::default())));
        let refreshes = Arc::new(AtomicU64::new(0));

        let ctx = WorkerContext {
            signal: signal.clone(),
            published: published.clone(),
            refreshes: refreshes.clone(),
            cache_dir,
        };

        let worker = thread::Builder::new()
            .name("media-session".into())
            .spawn(move || Worker::<P>::run(connect, ctx));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn media session worker: {}", e);
                None
            }
        };

        Self {
            signal,
            published,
            refreshes,
            state: Arc::new(MediaState::default()),
            worker,
        }
    }

    /// Take the most recently published snapshot
    pub fn update(&mut self) {
        let latest = Arc::clone(&lock(&self.published));
        self.state = latest;
    }

    /// Snapshot taken by the last [`update`](Self::update)
    pub fn state(&self) -> &MediaState {
        &self.state
    }

    /// Number of refresh passes the worker has completed
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl MediaController for SessionBridge {
    fn update(&mut self) {
        SessionBridge::update(self);
    }

    fn state(&self) -> &MediaState {
        SessionBridge::state(self)
    }
}

impl Drop for SessionBridge {
    fn drop(&mut self) {
        self.signal.request_stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Media session worker panicked");
            }
        }
        debug!("Session bridge shut down");
    }
}

struct WorkerContext {
    signal: Arc<Signal>,
    published: Published,
    refreshes: Arc<AtomicU64>,
    cache_dir: Option<PathBuf>,
}

/// Art resolved for the last track seen by the worker
#[derive(Default)]
struct ArtMemo {
    track: Option<TrackKey>,
    path: Option<PathBuf>,
}

struct Worker<P: SessionProvider> {
    ctx: WorkerContext,
    cache: AlbumArtCache,
    art: ArtMemo,
    provider: P,
    manager_subscription: Option<Subscription>,
    session: Option<P::Session>,
    session_subscriptions: Vec<Subscription>,
}

impl<P: SessionProvider> Worker<P> {
    fn run<F>(connect: F, ctx: WorkerContext)
    where
        F: FnOnce() -> Result<P>,
    {
        let provider = match connect() {
            Ok(provider) => provider,
            Err(e) => {
                warn!("Media session manager unavailable: {:#}", e);
                publish(&ctx.published, MediaState::default());
                ctx.signal.wait_for_stop();
                debug!("Media session worker stopped without a manager");
                return;
            }
        };
        info!("Media session manager acquired");

        let cache = match &ctx.cache_dir {
            Some(dir) => AlbumArtCache::open(dir),
            None => AlbumArtCache::disabled(),
        };

        let mut worker = Worker {
            ctx,
            cache,
            art: ArtMemo::default(),
            provider,
            manager_subscription: None,
            session: None,
            session_subscriptions: Vec::new(),
        };
        worker.start();
        worker.event_loop();
        worker.shutdown();
    }

    fn notifier(&self) -> RefreshNotifier {
        RefreshNotifier::new(self.ctx.signal.clone())
    }

    fn start(&mut self) {
        match self.provider.subscribe_session_changed(self.notifier()) {
            Ok(subscription) => self.manager_subscription = Some(subscription),
            Err(e) => warn!("Failed to subscribe to session changes: {:#}", e),
        }
        self.attach();
        self.notifier().notify(RefreshReason::INITIAL);
    }

    fn event_loop(&mut self) {
        while let Some(reasons) = self.ctx.signal.wait_for_work() {
            debug!("Refreshing media state: {:?}", reasons);
            if reasons.contains(RefreshReason::SESSION_CHANGED) {
                self.attach();
            }
            self.refresh();
        }
    }

    /// Drop the current session and attach to whatever the OS reports now
    fn attach(&mut self) {
        self.detach();

        let session = match self.provider.current_session() {
            Ok(Some(session)) => session,
            Ok(None) => {
                info!("No active media session");
                return;
            }
            Err(e) => {
                warn!("Failed to get current media session: {:#}", e);
                return;
            }
        };

        match session.subscribe(self.notifier()) {
            Ok(subscriptions) => self.session_subscriptions = subscriptions,
            Err(e) => warn!("Failed to subscribe to media session events: {:#}", e),
        }
        match session.source_app_id() {
            Some(app) => info!("Attached to media session of {}", app),
            None => info!("Attached to media session"),
        }
        self.session = Some(session);
    }

    fn detach(&mut self) {
        self.session_subscriptions.clear();
        if self.session.take().is_some() {
            info!("Detached from media session");
        }
    }

    fn refresh(&mut self) {
        let state = match self.read_state() {
            Ok(state) => state,
            Err(e) => {
                warn!("Media refresh failed: {:#}", e);
                MediaState::default()
            }
        };
        debug!(
            "Publishing media state: playing={} title={:?} position={}/{} art={}",
            state.is_playing, state.title, state.position_sec, state.duration_sec, state.has_album_art
        );
        publish(&self.ctx.published, state);
        self.ctx.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn read_state(&mut self) -> Result<MediaState> {
        let Some(session) = self.session.as_ref() else {
            return Ok(MediaState::default());
        };

        let status = session
            .playback_status()
            .context("failed to read playback status")?;
        let timeline = session.timeline().context("failed to read timeline")?;
        let properties = session
            .media_properties()
            .context("failed to read media properties")?;

        let mut state = MediaState {
            is_playing: status == PlaybackStatus::Playing,
            title: properties.title,
            artist: properties.artist,
            album: properties.album,
            ..MediaState::default()
        };
        state.set_timeline(timeline.end_seconds(), timeline.position_seconds());

        let track = state.track_key();
        if self.art.track.as_ref() != Some(&track) {
            debug!("Track changed: {}", track);
            let path = self.cache.resolve(&track, properties.thumbnail.as_deref());
            self.art = ArtMemo {
                track: Some(track),
                path,
            };
        }

        state.clear_album_art();
        if let Some(path) = &self.art.path {
            state.album_art_path = Some(path.clone());
            state.has_album_art = true;
        }
        Ok(state)
    }

    fn shutdown(mut self) {
        self.detach();
        self.manager_subscription = None;
        drop(self.provider);
        info!("Media session worker stopped");
    }
}

/// Replace the published snapshot; the old one is released outside the lock
fn publish(published: &Mutex<Arc<MediaState>>, state: MediaState) {
    let next = Arc::new(state);
    let previous = mem::replace(&mut *lock(published), next);
    drop(previous);
}
