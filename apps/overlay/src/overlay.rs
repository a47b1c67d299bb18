//! Text rendering of the overlay

use rhythm_core::{MediaState, TimeDisplayMode, WindowStyle, format_time, progress_fraction};

pub const IDLE_TEXT: &str = "No music playing";
const BAR_CELLS: usize = 10;

/// `▕████░░░░░░▏` for a progress in `0..=1`
pub fn progress_bar(progress: f32) -> String {
    let filled = (progress.clamp(0.0, 1.0) * BAR_CELLS as f32).round() as usize;
    format!(
        "▕{}{}▏",
        "█".repeat(filled),
        "░".repeat(BAR_CELLS - filled)
    )
}

/// One-line overlay for `state`, showing `position` instead of the raw
/// position so the bar moves smoothly between timeline updates.
pub fn overlay_line(state: &MediaState, position: i64, style: &WindowStyle) -> String {
    if state.is_idle() {
        return IDLE_TEXT.to_string();
    }

    let mut line = format!("♪ {}", state.title);
    if !state.artist.is_empty() {
        line.push_str(" — ");
        line.push_str(&state.artist);
    }
    if style.show_album_info && !state.album.is_empty() {
        line.push_str(&format!(" ({})", state.album));
    }

    let elapsed = format_time(position);
    let total = format_time(state.duration_sec);
    let bar = style
        .show_progress_bar
        .then(|| progress_bar(progress_fraction(position, state.duration_sec)));

    match (style.time_display_mode, bar) {
        (TimeDisplayMode::CenterSlash, Some(bar)) => {
            line.push_str(&format!(" [{} / {}] {}", elapsed, total, bar));
        }
        (TimeDisplayMode::CenterSlash, None) => {
            line.push_str(&format!(" [{} / {}]", elapsed, total));
        }
        (TimeDisplayMode::Corners, Some(bar)) => {
            line.push_str(&format!(" {} {} {}", elapsed, bar, total));
        }
        (TimeDisplayMode::Corners, None) => {
            line.push_str(&format!(" {} {}", elapsed, total));
        }
    }
    line
}
