//! Session bridge behaviour against a scripted provider

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use rhythm_core::{MediaState, TrackKey};
use rhythm_media_session::{
    MAX_ALBUM_ART_BYTES, MediaProperties, MediaSessionSource, PlaybackStatus, RefreshNotifier,
    RefreshReason, SessionBridge, SessionProvider, Subscription, ThumbnailRef, ThumbnailStream,
    TimelineTicks,
};

#[derive(Clone, Default)]
struct Track {
    title: String,
    artist: String,
    album: String,
    playing: bool,
    end_sec: i64,
    position_sec: i64,
    art: Option<Vec<u8>>,
    declared_size: Option<u64>,
}

fn track(title: &str, position_sec: i64) -> Track {
    Track {
        title: title.to_string(),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        playing: true,
        end_sec: 200,
        position_sec,
        ..Track::default()
    }
}

/// State shared between a test and the fake provider on the worker thread
#[derive(Default)]
struct Script {
    /// `None` means no current session
    track: Mutex<Option<Track>>,
    fail_reads: AtomicBool,
    /// Held by a test to park the worker inside a refresh pass
    gate: Mutex<()>,
    refresh_entries: AtomicUsize,
    thumbnail_opens: AtomicUsize,
    active_subscriptions: AtomicUsize,
    manager_notifier: Mutex<Option<RefreshNotifier>>,
    session_notifier: Mutex<Option<RefreshNotifier>>,
    provider_threads: Mutex<Vec<ThreadId>>,
}

impl Script {
    fn new(track: Option<Track>) -> Arc<Self> {
        let script = Self::default();
        *script.track.lock().unwrap() = track;
        Arc::new(script)
    }

    fn set_track(&self, track: Option<Track>) {
        *self.track.lock().unwrap() = track;
    }

    fn session_event(&self, reason: RefreshReason) {
        let notifier = self.session_notifier.lock().unwrap().clone();
        notifier.expect("no session subscription").notify(reason);
    }

    fn session_changed(&self) {
        let notifier = self.manager_notifier.lock().unwrap().clone();
        notifier
            .expect("no manager subscription")
            .notify(RefreshReason::SESSION_CHANGED);
    }

    fn record_thread(&self) {
        self.provider_threads
            .lock()
            .unwrap()
            .push(thread::current().id());
    }

    fn subscription(self: &Arc<Self>, name: &'static str) -> Subscription {
        self.active_subscriptions.fetch_add(1, Ordering::SeqCst);
        let script = self.clone();
        Subscription::new(name, move || {
            script.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

struct FakeProvider {
    script: Arc<Script>,
}

struct FakeSession {
    script: Arc<Script>,
}

impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    fn current_session(&self) -> Result<Option<FakeSession>> {
        self.script.record_thread();
        let present = self.script.track.lock().unwrap().is_some();
        Ok(present.then(|| FakeSession {
            script: self.script.clone(),
        }))
    }

    fn subscribe_session_changed(&self, notifier: RefreshNotifier) -> Result<Subscription> {
        *self.script.manager_notifier.lock().unwrap() = Some(notifier);
        Ok(self.script.subscription("manager"))
    }
}

impl FakeSession {
    fn current(&self) -> Result<Track> {
        if self.script.fail_reads.load(Ordering::SeqCst) {
            bail!("session went away");
        }
        match self.script.track.lock().unwrap().clone() {
            Some(track) => Ok(track),
            None => bail!("session closed"),
        }
    }
}

impl MediaSessionSource for FakeSession {
    fn playback_status(&self) -> Result<PlaybackStatus> {
        self.script.record_thread();
        self.script.refresh_entries.fetch_add(1, Ordering::SeqCst);
        drop(self.script.gate.lock().unwrap());

        let track = self.current()?;
        Ok(if track.playing {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        })
    }

    fn timeline(&self) -> Result<TimelineTicks> {
        let track = self.current()?;
        Ok(TimelineTicks::from_seconds(0, track.end_sec, track.position_sec))
    }

    fn media_properties(&self) -> Result<MediaProperties> {
        let track = self.current()?;
        let thumbnail = track.art.map(|bytes| {
            Box::new(FakeThumbnail {
                script: self.script.clone(),
                bytes,
                declared_size: track.declared_size,
            }) as Box<dyn ThumbnailRef>
        });
        Ok(MediaProperties {
            title: track.title,
            artist: track.artist,
            album: track.album,
            thumbnail,
        })
    }

    fn subscribe(&self, notifier: RefreshNotifier) -> Result<Vec<Subscription>> {
        *self.script.session_notifier.lock().unwrap() = Some(notifier);
        Ok(vec![
            self.script.subscription("media"),
            self.script.subscription("playback"),
            self.script.subscription("timeline"),
        ])
    }

    fn source_app_id(&self) -> Option<String> {
        Some("fake.player".to_string())
    }
}

struct FakeThumbnail {
    script: Arc<Script>,
    bytes: Vec<u8>,
    declared_size: Option<u64>,
}

impl ThumbnailRef for FakeThumbnail {
    fn open_read(&self) -> Result<Box<dyn ThumbnailStream>> {
        self.script.thumbnail_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            bytes: self.bytes.clone(),
            declared_size: self.declared_size,
        }))
    }
}

struct FakeStream {
    bytes: Vec<u8>,
    declared_size: Option<u64>,
}

impl ThumbnailStream for FakeStream {
    fn size(&self) -> Result<u64> {
        Ok(self.declared_size.unwrap_or(self.bytes.len() as u64))
    }

    fn read_exact_len(&mut self, len: u32) -> Result<Vec<u8>> {
        let len = (len as usize).min(self.bytes.len());
        Ok(self.bytes[..len].to_vec())
    }
}

fn spawn_bridge(script: &Arc<Script>, cache_dir: Option<PathBuf>) -> SessionBridge {
    let script = script.clone();
    SessionBridge::with_provider(cache_dir, move || Ok(FakeProvider { script }))
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Wait for `count` completed refreshes and take the latest snapshot
fn settle(bridge: &mut SessionBridge, count: u64) -> MediaState {
    assert!(
        wait_until(|| bridge.refresh_count() >= count),
        "expected {} refreshes, saw {}",
        count,
        bridge.refresh_count()
    );
    bridge.update();
    bridge.state().clone()
}

#[test]
fn test_no_manager_publishes_empty_state() {
    let mut bridge = SessionBridge::with_provider(None, || -> Result<FakeProvider> {
        bail!("session manager unavailable")
    });

    thread::sleep(Duration::from_millis(50));
    bridge.update();
    assert_eq!(bridge.state(), &MediaState::default());
    assert_eq!(bridge.refresh_count(), 0);
}

#[cfg(not(target_os = "windows"))]
#[test]
fn test_system_bridge_without_provider_stays_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut bridge = SessionBridge::new(dir.path());

    thread::sleep(Duration::from_millis(50));
    bridge.update();
    assert_eq!(bridge.state(), &MediaState::default());
}

#[test]
fn test_initial_refresh_publishes_session() {
    let script = Script::new(Some(track("Song", 50)));
    let mut bridge = spawn_bridge(&script, None);

    let state = settle(&mut bridge, 1);
    assert!(state.is_playing);
    assert_eq!(state.title, "Song");
    assert_eq!(state.artist, "Artist");
    assert_eq!(state.album, "Album");
    assert_eq!(state.duration_sec, 200);
    assert_eq!(state.position_sec, 50);
    assert!((state.progress01 - 0.25).abs() < f32::EPSILON);
    assert!(!state.has_album_art);
    assert_eq!(state.album_art_path, None);
}

#[test]
fn test_paused_session_is_not_playing() {
    let mut paused = track("Song", 10);
    paused.playing = false;
    let script = Script::new(Some(paused));
    let mut bridge = spawn_bridge(&script, None);

    let state = settle(&mut bridge, 1);
    assert!(!state.is_playing);
    assert_eq!(state.title, "Song");
}

#[test]
fn test_timeline_is_clamped() {
    let mut past_end = track("Song", 250);
    past_end.end_sec = 200;
    let script = Script::new(Some(past_end));
    let mut bridge = spawn_bridge(&script, None);

    let state = settle(&mut bridge, 1);
    assert_eq!(state.position_sec, 200);
    assert_eq!(state.progress01, 1.0);

    let mut no_duration = track("Stream", 30);
    no_duration.end_sec = -5;
    script.set_track(Some(no_duration));
    script.session_event(RefreshReason::TIMELINE_CHANGED);

    let state = settle(&mut bridge, 2);
    assert_eq!(state.duration_sec, 0);
    assert_eq!(state.position_sec, 0);
    assert_eq!(state.progress01, 0.0);
}

#[test]
fn test_no_session_publishes_empty_state() {
    let script = Script::new(None);
    let mut bridge = spawn_bridge(&script, None);

    let state = settle(&mut bridge, 1);
    assert_eq!(state, MediaState::default());
}

#[test]
fn test_unchanged_session_refreshes_to_equal_state() {
    let mut with_art = track("Song", 42);
    with_art.art = Some(vec![1, 2, 3, 4]);
    let script = Script::new(Some(with_art));
    let dir = tempfile::tempdir().unwrap();
    let mut bridge = spawn_bridge(&script, Some(dir.path().to_path_buf()));

    let first = settle(&mut bridge, 1);
    script.session_event(RefreshReason::PLAYBACK_CHANGED);
    let second = settle(&mut bridge, 2);

    assert_eq!(first, second);
}

#[test]
fn test_event_burst_coalesces_into_one_refresh() {
    let script = Script::new(Some(track("Song", 0)));
    let gate = script.gate.lock().unwrap();
    let mut bridge = spawn_bridge(&script, None);

    // Worker is parked inside the initial refresh pass.
    assert!(wait_until(|| script.refresh_entries.load(Ordering::SeqCst) == 1));

    for reason in [
        RefreshReason::MEDIA_CHANGED,
        RefreshReason::PLAYBACK_CHANGED,
        RefreshReason::TIMELINE_CHANGED,
    ]
    .into_iter()
    .cycle()
    .take(30)
    {
        script.session_event(reason);
    }
    script.set_track(Some(track("Song", 7)));
    drop(gate);

    let state = settle(&mut bridge, 2);
    thread::sleep(Duration::from_millis(100));

    assert_eq!(bridge.refresh_count(), 2);
    assert_eq!(script.refresh_entries.load(Ordering::SeqCst), 2);
    assert_eq!(state.position_sec, 7);
}

#[test]
fn test_art_fetched_once_per_track() {
    let mut first = track("Song", 10);
    first.art = Some(vec![0x89, b'P', b'N', b'G']);
    let script = Script::new(Some(first.clone()));
    let dir = tempfile::tempdir().unwrap();
    let mut bridge = spawn_bridge(&script, Some(dir.path().to_path_buf()));

    let state = settle(&mut bridge, 1);
    assert!(state.has_album_art);
    let path = state.album_art_path.clone().unwrap();
    let expected_name = format!(
        "{}.png",
        TrackKey::new("Song", "Artist", "Album").cache_stem()
    );
    assert_eq!(path, dir.path().join(expected_name));
    assert_eq!(std::fs::read(&path).unwrap(), vec![0x89, b'P', b'N', b'G']);
    assert_eq!(script.thumbnail_opens.load(Ordering::SeqCst), 1);

    first.position_sec = 11;
    script.set_track(Some(first));
    script.session_event(RefreshReason::TIMELINE_CHANGED);
    let state = settle(&mut bridge, 2);
    assert_eq!(state.album_art_path.as_ref(), Some(&path));
    assert_eq!(script.thumbnail_opens.load(Ordering::SeqCst), 1);

    let mut next = track("Next Song", 0);
    next.art = Some(vec![9, 9, 9]);
    script.set_track(Some(next));
    script.session_event(RefreshReason::MEDIA_CHANGED);
    let state = settle(&mut bridge, 3);
    assert!(state.has_album_art);
    assert_ne!(state.album_art_path.as_ref(), Some(&path));
    assert_eq!(script.thumbnail_opens.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cached_art_survives_restart() {
    let mut song = track("Song", 10);
    song.art = Some(vec![1, 2, 3]);
    let script = Script::new(Some(song));
    let dir = tempfile::tempdir().unwrap();

    let first_path = {
        let mut bridge = spawn_bridge(&script, Some(dir.path().to_path_buf()));
        settle(&mut bridge, 1).album_art_path
    };
    assert!(first_path.is_some());

    let mut bridge = spawn_bridge(&script, Some(dir.path().to_path_buf()));
    let state = settle(&mut bridge, 1);
    assert_eq!(state.album_art_path, first_path);
    assert_eq!(script.thumbnail_opens.load(Ordering::SeqCst), 1);
}

#[test]
fn test_oversized_thumbnail_is_rejected() {
    let mut song = track("Huge", 0);
    song.art = Some(vec![0; 16]);
    song.declared_size = Some(MAX_ALBUM_ART_BYTES + 1);
    let script = Script::new(Some(song));
    let dir = tempfile::tempdir().unwrap();
    let mut bridge = spawn_bridge(&script, Some(dir.path().to_path_buf()));

    let state = settle(&mut bridge, 1);
    assert_eq!(state.title, "Huge");
    assert!(!state.has_album_art);
    assert_eq!(state.album_art_path, None);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_disabled_cache_skips_thumbnail() {
    let mut song = track("Song", 0);
    song.art = Some(vec![1]);
    let script = Script::new(Some(song));
    let mut bridge = spawn_bridge(&script, None);

    let state = settle(&mut bridge, 1);
    assert!(!state.has_album_art);
    assert_eq!(script.thumbnail_opens.load(Ordering::SeqCst), 0);
}

#[test]
fn test_refresh_failure_publishes_empty_state_then_recovers() {
    let script = Script::new(Some(track("Song", 20)));
    let mut bridge = spawn_bridge(&script, None);
    assert_eq!(settle(&mut bridge, 1).title, "Song");

    script.fail_reads.store(true, Ordering::SeqCst);
    script.session_event(RefreshReason::MEDIA_CHANGED);
    assert_eq!(settle(&mut bridge, 2), MediaState::default());

    script.fail_reads.store(false, Ordering::SeqCst);
    script.session_event(RefreshReason::MEDIA_CHANGED);
    let state = settle(&mut bridge, 3);
    assert_eq!(state.title, "Song");
    assert_eq!(state.position_sec, 20);
}

#[test]
fn test_session_change_reattaches() {
    let script = Script::new(Some(track("First", 5)));
    let mut bridge = spawn_bridge(&script, None);
    assert_eq!(settle(&mut bridge, 1).title, "First");
    assert_eq!(script.active_subscriptions.load(Ordering::SeqCst), 4);

    script.set_track(None);
    script.session_changed();
    assert_eq!(settle(&mut bridge, 2), MediaState::default());
    assert_eq!(script.active_subscriptions.load(Ordering::SeqCst), 1);

    script.set_track(Some(track("Second", 0)));
    script.session_changed();
    let state = settle(&mut bridge, 3);
    assert_eq!(state.title, "Second");
    assert_eq!(script.active_subscriptions.load(Ordering::SeqCst), 4);
}

#[test]
fn test_drop_revokes_every_subscription() {
    let script = Script::new(Some(track("Song", 0)));
    let mut bridge = spawn_bridge(&script, None);
    settle(&mut bridge, 1);
    assert_eq!(script.active_subscriptions.load(Ordering::SeqCst), 4);

    drop(bridge);
    assert_eq!(script.active_subscriptions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_provider_is_only_used_on_worker_thread() {
    let script = Script::new(Some(track("Song", 0)));
    let mut bridge = spawn_bridge(&script, None);
    settle(&mut bridge, 1);
    drop(bridge);

    let consumer = thread::current().id();
    let threads = script.provider_threads.lock().unwrap();
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|id| *id != consumer));
}

#[test]
fn test_update_is_a_snapshot() {
    let script = Script::new(Some(track("Song", 1)));
    let mut bridge = spawn_bridge(&script, None);
    let before = settle(&mut bridge, 1);

    script.set_track(Some(track("Song", 2)));
    script.session_event(RefreshReason::TIMELINE_CHANGED);
    assert!(wait_until(|| bridge.refresh_count() >= 2));

    // Published, but not taken yet.
    assert_eq!(bridge.state(), &before);
    bridge.update();
    assert_eq!(bridge.state().position_sec, 2);
}
