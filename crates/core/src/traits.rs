use crate::models::MediaState;

/// Source of `MediaState` snapshots for the render thread
pub trait MediaController {
    /// Pull the latest published snapshot. Must be cheap and never block on I/O.
    fn update(&mut self);

    /// Snapshot taken by the last `update`
    fn state(&self) -> &MediaState;
}

/// Severity of a host toast notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Services the host application provides to the plugin.
///
/// Handed to the plugin once at load time and dropped at unload.
pub trait HostServices: Send + Sync {
    /// Run a host console command (e.g. `openmenu RocketRhythm`)
    fn execute_command(&self, command: &str);

    /// Show a transient notification
    fn notify(&self, level: ToastLevel, message: &str);
}

/// What a plugin exposes to the host's window manager
pub trait PluginWindow {
    /// Draw the in-game overlay
    fn render_overlay(&mut self);

    /// Draw the settings panel
    fn render_settings(&mut self);

    fn plugin_name(&self) -> &str;

    /// Whether the overlay window is currently open
    fn is_open(&self) -> bool;
}
