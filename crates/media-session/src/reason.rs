//! Refresh requests and worker wake-ups
//!
//! OS callbacks only record *why* a refresh is needed and wake the worker.
//! Reasons accumulate until the worker drains them, so any burst of events
//! between two wake-ups turns into a single refresh pass.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use bitflags::bitflags;
use tracing::trace;

bitflags! {
    /// Pending causes for a refresh
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RefreshReason: u32 {
        const INITIAL          = 1 << 0;
        const SESSION_CHANGED  = 1 << 1;
        const MEDIA_CHANGED    = 1 << 2;
        const PLAYBACK_CHANGED = 1 << 3;
        const TIMELINE_CHANGED = 1 << 4;
    }
}

#[derive(Debug)]
struct WakeState {
    pending: RefreshReason,
    stop: bool,
}

impl Default for WakeState {
    fn default() -> Self {
        Self {
            pending: RefreshReason::empty(),
            stop: false,
        }
    }
}

/// Wake-up channel between event callbacks, the bridge and its worker
#[derive(Debug, Default)]
pub(crate) struct Signal {
    state: Mutex<WakeState>,
    wake: Condvar,
}

impl Signal {
    fn lock(&self) -> MutexGuard<'_, WakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, reason: RefreshReason) {
        let mut state = self.lock();
        state.pending |= reason;
        drop(state);
        self.wake.notify_one();
    }

    /// Block until there is work or a stop request.
    ///
    /// Returns every reason collected since the previous call and clears
    /// them; `None` once stop was requested.
    pub(crate) fn wait_for_work(&self) -> Option<RefreshReason> {
        let mut state = self.lock();
        if state.stop {
            return None;
        }
        state = self
            .wake
            .wait_while(state, |s| !s.stop && s.pending.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        if state.stop {
            return None;
        }
        Some(std::mem::replace(&mut state.pending, RefreshReason::empty()))
    }

    /// Block until stop is requested, ignoring refresh requests
    pub(crate) fn wait_for_stop(&self) {
        let state = self.lock();
        let _state = self
            .wake
            .wait_while(state, |s| !s.stop)
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub(crate) fn request_stop(&self) {
        let mut state = self.lock();
        state.stop = true;
        drop(state);
        self.wake.notify_all();
    }
}

/// Handle given to OS event subscriptions to request a refresh.
///
/// Cheap to clone and safe to use from any thread; `notify` never blocks
/// beyond a short lock and never performs the refresh itself.
#[derive(Debug, Clone)]
pub struct RefreshNotifier {
    signal: Arc<Signal>,
}

impl RefreshNotifier {
    pub(crate) fn new(signal: Arc<Signal>) -> Self {
        Self { signal }
    }

    pub fn notify(&self, reason: RefreshReason) {
        trace!("Refresh requested: {:?}", reason);
        self.signal.push(reason);
    }
}
