//! Overlay settings and their JSON persistence
//!
//! The document is versioned; anything that does not match the current
//! version, or does not parse, is replaced by defaults and written back.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CONFIG_VERSION: u32 = 10;
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config version mismatch (have {found}, want {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// RGBA colour, components in `0..=1`
pub type Rgba = [f32; 4];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeDisplayMode {
    /// `0:10 / 3:45` centred under the bar
    CenterSlash,
    /// `0:10` on the left, `3:45` on the right
    #[default]
    Corners,
}

/// Visual settings of the overlay window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowStyle {
    pub background_color: Rgba,
    pub accent_color: Rgba,
    pub accent_color2: Rgba,
    pub text_color: Rgba,
    pub text_color_dim: Rgba,
    pub text_color_faint: Rgba,

    pub window_rounding: f32,
    pub album_art_rounding: f32,
    pub progress_bar_height: f32,
    pub progress_bar_rounding: f32,
    pub album_art_size: f32,

    pub enable_pulse: bool,
    pub show_album_art: bool,
    pub show_progress_bar: bool,
    pub show_album_info: bool,
    pub window_opacity: f32,

    pub ui_scale: f32,
    pub enable_auto_scaling: bool,
    pub min_scale: f32,
    pub max_scale: f32,

    pub enable_marquee: bool,
    pub marquee_speed_px: f32,
    pub marquee_wait_sec: f32,
    pub time_display_mode: TimeDisplayMode,
}

impl Default for WindowStyle {
    fn default() -> Self {
        Self {
            background_color: [0.0, 0.0, 0.0, 1.0],
            accent_color: [0.0, 0.9884, 1.0, 1.0],
            accent_color2: [0.2, 0.68, 1.0, 1.0],
            text_color: [1.0, 1.0, 1.0, 1.0],
            text_color_dim: [0.75, 0.75, 0.75, 1.0],
            text_color_faint: [0.55, 0.55, 0.55, 1.0],

            window_rounding: 5.0,
            album_art_rounding: 14.0,
            progress_bar_height: 8.0,
            progress_bar_rounding: 4.0,
            album_art_size: 118.0,

            enable_pulse: true,
            show_album_art: true,
            show_progress_bar: true,
            show_album_info: true,
            window_opacity: 1.0,

            ui_scale: 1.0,
            enable_auto_scaling: false,
            min_scale: 0.8,
            max_scale: 2.0,

            enable_marquee: true,
            marquee_speed_px: 40.0,
            marquee_wait_sec: 0.8,
            time_display_mode: TimeDisplayMode::Corners,
        }
    }
}

impl WindowStyle {
    /// Pull every numeric field back into its supported range
    pub fn clamp(&mut self) {
        self.window_opacity = self.window_opacity.clamp(0.0, 1.0);

        self.ui_scale = self.ui_scale.clamp(0.5, 2.0);
        self.min_scale = self.min_scale.clamp(0.1, 10.0);
        self.max_scale = self.max_scale.clamp(0.1, 10.0);
        if self.min_scale > self.max_scale {
            std::mem::swap(&mut self.min_scale, &mut self.max_scale);
        }

        self.window_rounding = self.window_rounding.clamp(0.0, 50.0);
        self.album_art_rounding = self.album_art_rounding.clamp(0.0, 50.0);
        self.progress_bar_height = self.progress_bar_height.clamp(0.0, 50.0);
        self.progress_bar_rounding = self.progress_bar_rounding.clamp(0.0, 50.0);
        self.album_art_size = self.album_art_size.clamp(16.0, 512.0);

        self.marquee_speed_px = self.marquee_speed_px.clamp(0.0, 1000.0);
        self.marquee_wait_sec = self.marquee_wait_sec.clamp(0.0, 10.0);

        for color in [
            &mut self.background_color,
            &mut self.accent_color,
            &mut self.accent_color2,
            &mut self.text_color,
            &mut self.text_color_dim,
            &mut self.text_color_faint,
        ] {
            for channel in color.iter_mut() {
                *channel = channel.clamp(0.0, 1.0);
            }
        }
    }
}

/// Persisted plugin settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub version: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub hide_when_not_playing: bool,
    #[serde(default)]
    pub window_style: WindowStyle,
}

fn default_true() -> bool {
    true
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            enabled: true,
            hide_when_not_playing: true,
            window_style: WindowStyle::default(),
        }
    }
}

impl OverlayConfig {
    /// Parse a document, rejecting other versions
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut config: OverlayConfig = serde_json::from_str(text)?;
        if config.version != CONFIG_VERSION {
            return Err(ConfigError::VersionMismatch {
                found: config.version,
                expected: CONFIG_VERSION,
            });
        }
        config.window_style.clamp();
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Reads and writes `config.json` inside a settings directory
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CONFIG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, falling back to (and persisting) defaults when the
    /// file is missing, unreadable, of another version or malformed.
    pub fn load_or_reset(&self) -> OverlayConfig {
        match self.load() {
            Ok(Some(config)) => {
                info!("Config loaded from {}", self.path.display());
                config
            }
            Ok(None) => {
                info!("Config not found; creating defaults at {}", self.path.display());
                self.reset()
            }
            Err(e) => {
                warn!("Resetting config to defaults: {}", e);
                self.reset()
            }
        }
    }

    /// Load the config; `Ok(None)` when there is no file yet
    pub fn load(&self) -> Result<Option<OverlayConfig>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        OverlayConfig::from_json(&text).map(Some)
    }

    /// Write via `config.json.tmp` and rename over the target
    pub fn save(&self, config: &OverlayConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }

        let json = config.to_json()?;
        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| ConfigError::io(&tmp_path, e))?;
            file.write_all(json.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| ConfigError::io(&tmp_path, e))?;
        }

        if let Err(first) = fs::rename(&tmp_path, &self.path) {
            // some platforms refuse to rename over an existing file
            debug!("Rename over config failed ({}), retrying after removal", first);
            let _ = fs::remove_file(&self.path);
            fs::rename(&tmp_path, &self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        }

        debug!("Config saved to {}", self.path.display());
        Ok(())
    }

    fn reset(&self) -> OverlayConfig {
        let config = OverlayConfig::default();
        if let Err(e) = self.save(&config) {
            warn!("Failed to save default config: {}", e);
        }
        config
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
