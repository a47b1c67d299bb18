use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::track_key::TrackKey;

/// Snapshot of the current OS media session.
///
/// Always produced whole by a single refresh pass; the default value means
/// "no media" and is what gets published when there is no session or a
/// refresh fails.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaState {
    pub is_playing: bool,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_sec: i64,
    /// Always within `0..=duration_sec`
    pub position_sec: i64,
    /// `position_sec / duration_sec`, or 0 when the duration is unknown
    pub progress01: f32,
    /// Cached album art on disk, `None` when there is none
    #[serde(default)]
    pub album_art_path: Option<PathBuf>,
    pub has_album_art: bool,
}

impl MediaState {
    /// Identity of the track this snapshot describes
    pub fn track_key(&self) -> TrackKey {
        TrackKey::new(&self.title, &self.artist, &self.album)
    }

    /// Whether there is nothing to show (stopped and no metadata)
    pub fn is_idle(&self) -> bool {
        !self.is_playing && self.title.is_empty()
    }

    /// Whether the snapshot carries any track metadata at all
    pub fn has_track(&self) -> bool {
        !self.title.is_empty() || !self.artist.is_empty()
    }

    /// Set position and duration from raw timeline seconds, keeping the
    /// clamping and progress invariants.
    pub fn set_timeline(&mut self, end_sec: i64, position_sec: i64) {
        let duration = end_sec.max(0);
        let position = position_sec.clamp(0, duration);

        self.duration_sec = duration;
        self.position_sec = position;
        self.progress01 = progress_fraction(position, duration);
    }

    /// Drop any album art fields
    pub fn clear_album_art(&mut self) {
        self.album_art_path = None;
        self.has_album_art = false;
    }
}

/// `position / duration` clamped to `0..=1`, or 0 for a non-positive duration
pub fn progress_fraction(position_sec: i64, duration_sec: i64) -> f32 {
    if duration_sec > 0 {
        (position_sec as f32 / duration_sec as f32).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Format whole seconds as `m:ss` (`0:00` for anything non-positive)
pub fn format_time(seconds: i64) -> String {
    if seconds <= 0 {
        return "0:00".to_string();
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
