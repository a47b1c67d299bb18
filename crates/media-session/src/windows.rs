//! Windows media session provider via System Media Transport Controls (SMTC)
//!
//! Works with any application that publishes an SMTC session (Spotify,
//! browsers, media players, ...). Requires Windows 10 version 1803 or later.
//!
//! Everything here is created and used on the bridge worker thread. COM is
//! initialised on that thread by [`SmtcProvider::connect`] and released when
//! the provider is dropped.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, trace, warn};
use windows::{
    core::{Interface, RuntimeType},
    Foundation::{AsyncStatus, IAsyncOperation, TypedEventHandler},
    Media::Control::{
        GlobalSystemMediaTransportControlsSession,
        GlobalSystemMediaTransportControlsSessionManager,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus,
    },
    Storage::Streams::{DataReader, IRandomAccessStreamReference, IRandomAccessStreamWithContentType},
    Win32::{
        Foundation::RPC_E_CHANGED_MODE,
        System::Com::{COINIT_MULTITHREADED, CoInitializeEx, CoUninitialize},
    },
};

use crate::{
    MediaProperties, MediaSessionSource, PlaybackStatus, RefreshNotifier, RefreshReason,
    SessionProvider, Subscription, ThumbnailRef, ThumbnailStream, TimelineTicks,
};

/// How long a single WinRT async call may take before it is cancelled
const ASYNC_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Block on an async WinRT operation by polling its status.
///
/// The operation is cancelled if it does not complete within `timeout`.
fn block_on_async_operation<T>(operation: IAsyncOperation<T>, timeout: Duration) -> Result<T>
where
    T: RuntimeType + Clone + 'static,
{
    let start = Instant::now();

    loop {
        let status = operation
            .Status()
            .map_err(|e| anyhow!("Failed to get operation status: {}", e))?;

        match status {
            AsyncStatus::Completed => {
                return operation
                    .GetResults()
                    .map_err(|e| anyhow!("Failed to get operation results: {}", e));
            }
            AsyncStatus::Error => {
                let code = operation.ErrorCode().ok();
                bail!("Async operation failed: {:?}", code);
            }
            AsyncStatus::Canceled => bail!("Async operation was canceled"),
            AsyncStatus::Started => {
                if start.elapsed() > timeout {
                    if let Err(e) = operation.Cancel() {
                        debug!("Failed to cancel timed out operation: {}", e);
                    }
                    bail!("Async operation timed out after {:?}", timeout);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            _ => bail!("Unknown async status"),
        }
    }
}

/// COM initialisation of the current thread, undone on drop
struct ComApartment {
    owned: bool,
}

impl ComApartment {
    fn init() -> Result<Self> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_ok() {
            Ok(Self { owned: true })
        } else if hr == RPC_E_CHANGED_MODE {
            debug!("COM already initialised with another threading model");
            Ok(Self { owned: false })
        } else {
            Err(anyhow!("COM initialization failed: {:?}", hr))
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.owned {
            unsafe { CoUninitialize() };
        }
    }
}

/// SMTC session manager bound to the worker thread
pub struct SmtcProvider {
    manager: GlobalSystemMediaTransportControlsSessionManager,
    // Must be dropped after `manager`.
    _com: ComApartment,
}

impl SmtcProvider {
    /// Initialise COM on this thread and request the session manager
    pub fn connect() -> Result<Self> {
        let com = ComApartment::init()?;

        let operation = GlobalSystemMediaTransportControlsSessionManager::RequestAsync()
            .map_err(|e| anyhow!("Failed to create RequestAsync operation: {}", e))?;
        let manager = block_on_async_operation(operation, ASYNC_TIMEOUT)
            .context("Failed to request SMTC session manager")?;

        Ok(Self { manager, _com: com })
    }
}

impl SessionProvider for SmtcProvider {
    type Session = SmtcSession;

    fn current_session(&self) -> Result<Option<SmtcSession>> {
        match self.manager.GetCurrentSession() {
            Ok(session) => Ok(Some(SmtcSession { session })),
            Err(e) => {
                debug!("No current session: {}", e);
                Ok(None)
            }
        }
    }

    fn subscribe_session_changed(&self, notifier: RefreshNotifier) -> Result<Subscription> {
        let handler = TypedEventHandler::new(move |_, _| {
            trace!("SMTC: CurrentSessionChanged");
            notifier.notify(RefreshReason::SESSION_CHANGED);
            Ok(())
        });
        let token = self
            .manager
            .CurrentSessionChanged(&handler)
            .map_err(|e| anyhow!("Failed to subscribe to CurrentSessionChanged: {}", e))?;

        let manager = self.manager.clone();
        Ok(Subscription::new("current-session", move || {
            if let Err(e) = manager.RemoveCurrentSessionChanged(token) {
                warn!("Failed to remove CurrentSessionChanged handler: {}", e);
            }
        }))
    }
}

/// One application's SMTC session
pub struct SmtcSession {
    session: GlobalSystemMediaTransportControlsSession,
}

fn map_status(status: GlobalSystemMediaTransportControlsSessionPlaybackStatus) -> PlaybackStatus {
    match status {
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Closed => PlaybackStatus::Closed,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Opened => PlaybackStatus::Opened,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Changing => PlaybackStatus::Changing,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Stopped => PlaybackStatus::Stopped,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Playing => PlaybackStatus::Playing,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Paused => PlaybackStatus::Paused,
        _ => PlaybackStatus::Unknown,
    }
}

impl MediaSessionSource for SmtcSession {
    fn playback_status(&self) -> Result<PlaybackStatus> {
        let status = self
            .session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .map_err(|e| anyhow!("Failed to get playback info: {}", e))?;
        Ok(map_status(status))
    }

    fn timeline(&self) -> Result<TimelineTicks> {
        let props = self
            .session
            .GetTimelineProperties()
            .map_err(|e| anyhow!("Failed to get timeline properties: {}", e))?;

        Ok(TimelineTicks {
            start: props.StartTime()?.Duration,
            end: props.EndTime()?.Duration,
            position: props.Position()?.Duration,
        })
    }

    fn media_properties(&self) -> Result<MediaProperties> {
        let operation = self
            .session
            .TryGetMediaPropertiesAsync()
            .map_err(|e| anyhow!("Failed to get media properties: {}", e))?;
        let props = block_on_async_operation(operation, ASYNC_TIMEOUT)?;

        let title = props.Title().map(|s| s.to_string()).unwrap_or_default();
        let artist = props.Artist().map(|s| s.to_string()).unwrap_or_default();
        let album = props.AlbumTitle().map(|s| s.to_string()).unwrap_or_default();

        // A session without art reports a null reference, which surfaces as an error.
        let thumbnail = props
            .Thumbnail()
            .ok()
            .map(|reference| Box::new(SmtcThumbnail { reference }) as Box<dyn ThumbnailRef>);

        debug!(
            "SMTC metadata: title={}, artist={}, album={}, thumbnail={}",
            title,
            artist,
            album,
            thumbnail.is_some()
        );

        Ok(MediaProperties {
            title,
            artist,
            album,
            thumbnail,
        })
    }

    fn subscribe(&self, notifier: RefreshNotifier) -> Result<Vec<Subscription>> {
        let session = &self.session;
        let mut subscriptions = Vec::with_capacity(3);

        let media = notifier.clone();
        let token = session
            .MediaPropertiesChanged(&TypedEventHandler::new(move |_, _| {
                trace!("SMTC: MediaPropertiesChanged");
                media.notify(RefreshReason::MEDIA_CHANGED);
                Ok(())
            }))
            .map_err(|e| anyhow!("Failed to subscribe to MediaPropertiesChanged: {}", e))?;
        let owner = session.clone();
        subscriptions.push(Subscription::new("media-properties", move || {
            if let Err(e) = owner.RemoveMediaPropertiesChanged(token) {
                warn!("Failed to remove MediaPropertiesChanged handler: {}", e);
            }
        }));

        let playback = notifier.clone();
        let token = session
            .PlaybackInfoChanged(&TypedEventHandler::new(move |_, _| {
                trace!("SMTC: PlaybackInfoChanged");
                playback.notify(RefreshReason::PLAYBACK_CHANGED);
                Ok(())
            }))
            .map_err(|e| anyhow!("Failed to subscribe to PlaybackInfoChanged: {}", e))?;
        let owner = session.clone();
        subscriptions.push(Subscription::new("playback-info", move || {
            if let Err(e) = owner.RemovePlaybackInfoChanged(token) {
                warn!("Failed to remove PlaybackInfoChanged handler: {}", e);
            }
        }));

        let timeline = notifier;
        let token = session
            .TimelinePropertiesChanged(&TypedEventHandler::new(move |_, _| {
                trace!("SMTC: TimelinePropertiesChanged");
                timeline.notify(RefreshReason::TIMELINE_CHANGED);
                Ok(())
            }))
            .map_err(|e| anyhow!("Failed to subscribe to TimelinePropertiesChanged: {}", e))?;
        let owner = session.clone();
        subscriptions.push(Subscription::new("timeline-properties", move || {
            if let Err(e) = owner.RemoveTimelinePropertiesChanged(token) {
                warn!("Failed to remove TimelinePropertiesChanged handler: {}", e);
            }
        }));

        Ok(subscriptions)
    }

    fn source_app_id(&self) -> Option<String> {
        self.session
            .SourceAppUserModelId()
            .ok()
            .map(|s| s.to_string())
    }
}

struct SmtcThumbnail {
    reference: IRandomAccessStreamReference,
}

impl ThumbnailRef for SmtcThumbnail {
    fn open_read(&self) -> Result<Box<dyn ThumbnailStream>> {
        let operation = self
            .reference
            .OpenReadAsync()
            .map_err(|e| anyhow!("Failed to open thumbnail: {}", e))?;
        let stream = block_on_async_operation(operation, ASYNC_TIMEOUT)?;
        Ok(Box::new(SmtcStream { stream }))
    }
}

struct SmtcStream {
    stream: IRandomAccessStreamWithContentType,
}

impl ThumbnailStream for SmtcStream {
    fn size(&self) -> Result<u64> {
        self.stream
            .Size()
            .map_err(|e| anyhow!("Failed to get thumbnail size: {}", e))
    }

    fn read_exact_len(&mut self, len: u32) -> Result<Vec<u8>> {
        let input = self.stream.GetInputStreamAt(0)?;
        let reader = DataReader::CreateDataReader(&input)?;

        let load = reader
            .LoadAsync(len)
            .map_err(|e| anyhow!("Failed to start thumbnail read: {}", e))?
            .cast::<IAsyncOperation<u32>>()?;
        let loaded = block_on_async_operation(load, ASYNC_TIMEOUT)?.min(len);

        let mut bytes = vec![0u8; loaded as usize];
        reader.ReadBytes(&mut bytes)?;
        Ok(bytes)
    }
}
