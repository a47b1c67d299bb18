//! Placeholder provider for platforms without a system media session API

use anyhow::{Result, bail};

use crate::{
    MediaProperties, MediaSessionSource, PlaybackStatus, RefreshNotifier, SessionProvider,
    Subscription, TimelineTicks,
};

/// Uninhabited: connecting always fails, so the bridge stays empty
pub enum Unsupported {}

pub fn connect() -> Result<Unsupported> {
    bail!("System media sessions are not supported on this platform")
}

impl SessionProvider for Unsupported {
    type Session = Unsupported;

    fn current_session(&self) -> Result<Option<Self::Session>> {
        match *self {}
    }

    fn subscribe_session_changed(&self, _notifier: RefreshNotifier) -> Result<Subscription> {
        match *self {}
    }
}

impl MediaSessionSource for Unsupported {
    fn playback_status(&self) -> Result<PlaybackStatus> {
        match *self {}
    }

    fn timeline(&self) -> Result<TimelineTicks> {
        match *self {}
    }

    fn media_properties(&self) -> Result<MediaProperties> {
        match *self {}
    }

    fn subscribe(&self, _notifier: RefreshNotifier) -> Result<Vec<Subscription>> {
        match *self {}
    }
}
