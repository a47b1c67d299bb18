//! Playback position smoothing
//!
//! The OS reports the timeline rarely (about once a second, sometimes much
//! less), while the overlay draws every frame. The predictor anchors on the
//! last reported position and advances it with wall-clock time until a new
//! report or a track change arrives.

use std::time::Instant;

use crate::models::MediaState;
use crate::track_key::TrackKey;

#[derive(Debug, Clone)]
pub struct PositionPredictor {
    last_track: Option<TrackKey>,
    last_raw_position: i64,
    anchor_position: i64,
    anchor_time: Instant,
}

impl Default for PositionPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionPredictor {
    pub fn new() -> Self {
        Self {
            last_track: None,
            last_raw_position: 0,
            anchor_position: 0,
            anchor_time: Instant::now(),
        }
    }

    /// Position to display right now
    pub fn current_position(&mut self, state: &MediaState) -> i64 {
        self.position_at(state, Instant::now())
    }

    /// Position to display at `now`.
    ///
    /// Re-anchors whenever the track identity or the raw reported position
    /// changes. While paused (or with an unknown duration) the raw position is
    /// returned as is; while playing the anchor advances by whole elapsed
    /// seconds and is pinned to `0..=duration`.
    pub fn position_at(&mut self, state: &MediaState, now: Instant) -> i64 {
        let track = state.track_key();
        let track_changed = self.last_track.as_ref() != Some(&track);

        if track_changed || state.position_sec != self.last_raw_position {
            self.last_track = Some(track);
            self.last_raw_position = state.position_sec;
            self.anchor_position = state.position_sec;
            self.anchor_time = now;
        }

        if !state.is_playing || state.duration_sec <= 0 {
            return state.position_sec.clamp(0, state.duration_sec.max(0));
        }

        let elapsed = now.saturating_duration_since(self.anchor_time).as_secs();
        let elapsed = i64::try_from(elapsed).unwrap_or(i64::MAX);
        self.anchor_position
            .saturating_add(elapsed)
            .clamp(0, state.duration_sec)
    }

    /// Predicted position as a `0..=1` fraction of the duration
    pub fn progress_at(&mut self, state: &MediaState, now: Instant) -> f32 {
        let position = self.position_at(state, now);
        crate::models::progress_fraction(position, state.duration_sec)
    }
}
