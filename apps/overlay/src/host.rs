//! Stand-in for the game host: console commands, toasts and window events

use std::sync::{Mutex, PoisonError};

use rhythm_core::{HostServices, ToastLevel};
use tracing::{debug, error, info, warn};

/// Window state change the host reports back to a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Opened(String),
    Closed(String),
}

/// Host that "opens" menus instantly and confirms on the next frame
#[derive(Debug, Default)]
pub struct ConsoleHost {
    events: Mutex<Vec<WindowEvent>>,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window confirmations queued since the last call
    pub fn take_window_events(&self) -> Vec<WindowEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    fn push(&self, event: WindowEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl HostServices for ConsoleHost {
    fn execute_command(&self, command: &str) {
        debug!("Host command: {}", command);

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("openmenu"), Some(name)) => self.push(WindowEvent::Opened(name.to_string())),
            (Some("closemenu"), Some(name)) => self.push(WindowEvent::Closed(name.to_string())),
            _ => warn!("Unknown host command: {}", command),
        }
    }

    fn notify(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Success | ToastLevel::Info => info!("[toast] {}", message),
            ToastLevel::Warning => warn!("[toast] {}", message),
            ToastLevel::Error => error!("[toast] {}", message),
        }
    }
}
