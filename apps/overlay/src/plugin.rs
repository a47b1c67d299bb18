//! The RocketRhythm plugin: media state in, overlay and window commands out

use std::sync::Arc;
use std::time::Instant;

use rhythm_core::{
    ConfigStore, HostServices, MediaController, MediaState, OverlayConfig, PluginWindow,
    PositionPredictor, ToastLevel, WindowCommand, WindowVisibility, format_time, should_show,
};
use tracing::{debug, info, warn};

use crate::overlay;

pub const PLUGIN_NAME: &str = "RocketRhythm";

/// Host console command carrying out `command` for the plugin window `name`
pub fn window_command(command: WindowCommand, name: &str) -> String {
    match command {
        WindowCommand::Open => format!("openmenu {}", name),
        WindowCommand::Close => format!("closemenu {}", name),
    }
}

pub struct RocketRhythm<M: MediaController> {
    media: M,
    host: Arc<dyn HostServices>,
    store: ConfigStore,
    config: OverlayConfig,
    state: MediaState,
    predictor: PositionPredictor,
    visibility: WindowVisibility,
    overlay_line: String,
}

impl<M: MediaController> RocketRhythm<M> {
    /// Load settings from `store` and start with a closed window
    pub fn new(media: M, store: ConfigStore, host: Arc<dyn HostServices>) -> Self {
        let config = store.load_or_reset();
        info!(
            "RocketRhythm loaded (enabled={}, hide_when_not_playing={})",
            config.enabled, config.hide_when_not_playing
        );

        Self {
            media,
            host,
            store,
            config,
            state: MediaState::default(),
            predictor: PositionPredictor::new(),
            visibility: WindowVisibility::new(),
            overlay_line: String::new(),
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Snapshot taken by the last frame
    pub fn state(&self) -> &MediaState {
        &self.state
    }

    /// Text produced by the last overlay render
    pub fn overlay_line(&self) -> &str {
        &self.overlay_line
    }

    /// Per-frame tick from the host
    pub fn on_frame(&mut self, now: Instant) {
        self.media.update();
        self.state = self.media.state().clone();

        let show = should_show(
            self.config.enabled,
            self.config.hide_when_not_playing,
            !self.state.is_idle(),
        );
        self.visibility.update(show);

        if let Some(command) = self.visibility.take_command() {
            let command = window_command(command, PLUGIN_NAME);
            debug!("Requesting window change: {}", command);
            self.host.execute_command(&command);
        }

        if self.visibility.is_open() {
            self.render_at(now);
        }
    }

    /// Host confirmed the overlay window opened
    pub fn on_open(&mut self) {
        self.visibility.on_open();
        debug!("Overlay window opened");
    }

    /// Host confirmed the overlay window closed
    pub fn on_close(&mut self) {
        self.visibility.on_close();
        self.overlay_line.clear();
        debug!("Overlay window closed");
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled == enabled {
            return;
        }
        self.config.enabled = enabled;
        self.visibility.clear_pending();

        let message = if enabled {
            "RocketRhythm enabled"
        } else {
            "RocketRhythm disabled"
        };
        self.host.notify(ToastLevel::Info, message);
    }

    pub fn set_hide_when_not_playing(&mut self, hide: bool) {
        self.config.hide_when_not_playing = hide;
    }

    /// Persist settings; called once when the host unloads the plugin
    pub fn on_unload(&mut self) {
        match self.store.save(&self.config) {
            Ok(()) => info!("RocketRhythm settings saved"),
            Err(e) => {
                warn!("Failed to save settings: {}", e);
                self.host
                    .notify(ToastLevel::Error, "RocketRhythm: failed to save settings");
            }
        }
    }

    fn render_at(&mut self, now: Instant) {
        let position = self.predictor.position_at(&self.state, now);
        self.overlay_line = overlay::overlay_line(&self.state, position, &self.config.window_style);
    }
}

impl<M: MediaController> PluginWindow for RocketRhythm<M> {
    fn render_overlay(&mut self) {
        self.render_at(Instant::now());
    }

    fn render_settings(&mut self) {
        let style = &self.config.window_style;
        info!("Settings: enabled={}", self.config.enabled);
        info!(
            "Settings: hide_when_not_playing={}",
            self.config.hide_when_not_playing
        );
        info!(
            "Settings: album_art={} progress_bar={} album_info={} time_display={:?}",
            style.show_album_art, style.show_progress_bar, style.show_album_info, style.time_display_mode
        );
        info!(
            "Settings: ui_scale={} auto_scaling={} ({}..{}) opacity={}",
            style.ui_scale, style.enable_auto_scaling, style.min_scale, style.max_scale, style.window_opacity
        );
        info!(
            "Settings: now playing {:?} at {} / {}",
            self.state.title,
            format_time(self.state.position_sec),
            format_time(self.state.duration_sec)
        );
    }

    fn plugin_name(&self) -> &str {
        PLUGIN_NAME
    }

    fn is_open(&self) -> bool {
        self.visibility.is_open()
    }
}
