//! Overlay window open/close bookkeeping
//!
//! The host owns the actual window; we only ask it to open or close. A request
//! stays pending until the host confirms it, and is handed out once per
//! pending period so the same command is not sent every frame.

/// Request for the host window system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCommand {
    Open,
    Close,
}

/// Whether the overlay should be visible
pub fn should_show(enabled: bool, hide_when_idle: bool, media_active: bool) -> bool {
    enabled && (!hide_when_idle || media_active)
}

#[derive(Debug, Clone, Default)]
pub struct WindowVisibility {
    is_open: bool,
    pending: Option<WindowCommand>,
    issued: bool,
}

impl WindowVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Request waiting for host confirmation
    pub fn pending(&self) -> Option<WindowCommand> {
        self.pending
    }

    /// Feed this frame's "should show" decision
    pub fn update(&mut self, show: bool) {
        if show && !self.is_open && self.pending != Some(WindowCommand::Open) {
            self.pending = Some(WindowCommand::Open);
            self.issued = false;
        } else if !show && self.is_open && self.pending != Some(WindowCommand::Close) {
            self.pending = Some(WindowCommand::Close);
            self.issued = false;
        }
    }

    /// Command to send to the host this frame, if any.
    ///
    /// A request that no longer applies (window already in the wanted state)
    /// is dropped instead.
    pub fn take_command(&mut self) -> Option<WindowCommand> {
        let command = self.pending?;
        let applies = match command {
            WindowCommand::Open => !self.is_open,
            WindowCommand::Close => self.is_open,
        };

        if !applies {
            self.pending = None;
            self.issued = false;
            return None;
        }
        if self.issued {
            return None;
        }

        self.issued = true;
        Some(command)
    }

    /// Host confirmed the window opened
    pub fn on_open(&mut self) {
        self.is_open = true;
        if self.pending == Some(WindowCommand::Open) {
            self.pending = None;
            self.issued = false;
        }
    }

    /// Host confirmed the window closed
    pub fn on_close(&mut self) {
        self.is_open = false;
        if self.pending == Some(WindowCommand::Close) {
            self.pending = None;
            self.issued = false;
        }
    }

    /// Forget outstanding requests (e.g. after the plugin was toggled)
    pub fn clear_pending(&mut self) {
        self.pending = None;
        self.issued = false;
    }
}
