//! Event-driven bridge to the OS media session
//!
//! This crate mirrors the system-wide "now playing" session into a
//! [`MediaState`](rhythm_core::MediaState) snapshot that a render thread can
//! read every frame:
//! - Windows: System Media Transport Controls (SMTC)
//! - elsewhere: no provider; the bridge publishes the empty state
//!
//! All OS objects live on one worker thread owned by [`SessionBridge`]. The
//! OS side is reached through the [`SessionProvider`] / [`MediaSessionSource`]
//! traits, so the worker can be driven by any provider.

use anyhow::Result;

pub mod art_cache;
pub mod bridge;
pub mod reason;
pub mod subscription;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(target_os = "windows"))]
mod unsupported;

pub use art_cache::{AlbumArtCache, ArtError, MAX_ALBUM_ART_BYTES};
pub use bridge::SessionBridge;
pub use reason::{RefreshNotifier, RefreshReason};
pub use subscription::Subscription;

/// 100 ns ticks per second, the unit of OS timeline values
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Transport state reported by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    Closed,
    Opened,
    Changing,
    Stopped,
    Playing,
    Paused,
    #[default]
    Unknown,
}

/// Timeline of a session, in 100 ns ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimelineTicks {
    pub start: i64,
    pub end: i64,
    pub position: i64,
}

impl TimelineTicks {
    pub fn from_seconds(start: i64, end: i64, position: i64) -> Self {
        Self {
            start: start * TICKS_PER_SECOND,
            end: end * TICKS_PER_SECOND,
            position: position * TICKS_PER_SECOND,
        }
    }

    /// End of the timeline in whole seconds (truncated)
    pub fn end_seconds(&self) -> i64 {
        self.end / TICKS_PER_SECOND
    }

    /// Playback position in whole seconds (truncated)
    pub fn position_seconds(&self) -> i64 {
        self.position / TICKS_PER_SECOND
    }
}

/// Metadata of the track a session is playing
pub struct MediaProperties {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Lazy handle to album art bytes
    pub thumbnail: Option<Box<dyn ThumbnailRef>>,
}

/// Reference to thumbnail bytes, opened on demand
pub trait ThumbnailRef {
    fn open_read(&self) -> Result<Box<dyn ThumbnailStream>>;
}

/// An opened thumbnail
pub trait ThumbnailStream {
    /// Size the source declares for the payload
    fn size(&self) -> Result<u64>;

    /// Read up to `len` bytes; fewer bytes means the source came up short
    fn read_exact_len(&mut self, len: u32) -> Result<Vec<u8>>;
}

/// Manager-level access to the OS media sessions.
///
/// Implementations are created and used on the bridge worker thread only,
/// so they need not be `Send`.
pub trait SessionProvider {
    type Session: MediaSessionSource;

    /// The session the OS currently considers active, if any
    fn current_session(&self) -> Result<Option<Self::Session>>;

    /// Call `notifier` with `SESSION_CHANGED` whenever the current session changes
    fn subscribe_session_changed(&self, notifier: RefreshNotifier) -> Result<Subscription>;
}

/// One media application's session
pub trait MediaSessionSource {
    fn playback_status(&self) -> Result<PlaybackStatus>;

    fn timeline(&self) -> Result<TimelineTicks>;

    fn media_properties(&self) -> Result<MediaProperties>;

    /// Subscribe to media property, playback info and timeline changes
    fn subscribe(&self, notifier: RefreshNotifier) -> Result<Vec<Subscription>>;

    /// Identifier of the application owning the session, for logs
    fn source_app_id(&self) -> Option<String> {
        None
    }
}

/// Provider backing [`SessionBridge::new`] on this platform
#[cfg(target_os = "windows")]
pub type SystemProvider = windows::SmtcProvider;

/// Provider backing [`SessionBridge::new`] on this platform
#[cfg(not(target_os = "windows"))]
pub type SystemProvider = unsupported::Unsupported;

/// Connect to the platform media session manager.
///
/// Must be called on the thread that will use the returned provider.
pub fn connect_system() -> Result<SystemProvider> {
    #[cfg(target_os = "windows")]
    return windows::SmtcProvider::connect();

    #[cfg(not(target_os = "windows"))]
    return unsupported::connect();
}
