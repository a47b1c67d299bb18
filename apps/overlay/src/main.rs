//! RocketRhythm - headless host for the "now playing" overlay
//!
//! Drives the plugin the way the game would: one `on_frame` per frame, window
//! confirmations on the following frame, settings saved at unload. The overlay
//! itself is printed as a single text line whenever it changes.

mod cli;
mod host;
mod overlay;
mod plugin;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use rhythm_core::{ConfigStore, MediaController, PluginWindow};
use rhythm_media_session::SessionBridge;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Args;
use host::{ConsoleHost, WindowEvent};
use plugin::{PLUGIN_NAME, RocketRhythm};

const DEFAULT_LOG_FILTER: &str = "info,rocket_rhythm=debug,rhythm_media_session=debug";

fn main() -> Result<()> {
    let args = Args::parse();

    // Flushes the file log on exit
    let _log_guard = init_logging(args.log_dir.as_deref())?;

    tracing::info!("Starting RocketRhythm overlay");

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let plugin_dir = data_dir.join(PLUGIN_NAME);
    tracing::info!("Data directory: {}", plugin_dir.display());

    let host = Arc::new(ConsoleHost::new());
    let bridge = SessionBridge::new(&data_dir);
    let mut plugin = RocketRhythm::new(bridge, ConfigStore::new(&plugin_dir), host.clone());
    if args.disable {
        plugin.set_enabled(false);
    }
    if args.show_when_idle {
        plugin.set_hide_when_not_playing(false);
    }
    plugin.render_settings();

    let run_for = (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs));
    run_frames(&mut plugin, &host, args.fps, run_for);

    tracing::debug!(
        "Last media state: {:?} (enabled={})",
        plugin.state(),
        plugin.config().enabled
    );
    plugin.on_unload();
    drop(plugin);
    tracing::info!("RocketRhythm overlay stopped");
    Ok(())
}

fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "rocket-rhythm.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Platform data directory of the game host
fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| anyhow!("Failed to get data directory"))?;
    Ok(base.join("bakkesmod").join("data"))
}

/// Tick the plugin at `fps` until `run_for` elapses (forever when `None`)
fn run_frames<M: MediaController>(
    plugin: &mut RocketRhythm<M>,
    host: &ConsoleHost,
    fps: u32,
    run_for: Option<Duration>,
) {
    let frame = Duration::from_secs(1) / fps.max(1);
    let start = Instant::now();
    let mut next_frame = start;
    let mut shown = String::new();

    loop {
        let now = Instant::now();
        if run_for.is_some_and(|limit| now.duration_since(start) >= limit) {
            break;
        }

        for event in host.take_window_events() {
            match event {
                WindowEvent::Opened(name) if name == plugin.plugin_name() => plugin.on_open(),
                WindowEvent::Closed(name) if name == plugin.plugin_name() => plugin.on_close(),
                other => tracing::debug!("Ignoring window event {:?}", other),
            }
        }

        plugin.on_frame(now);

        if plugin.overlay_line() != shown {
            shown = plugin.overlay_line().to_string();
            if !shown.is_empty() {
                println!("{}", shown);
            }
        }

        next_frame += frame;
        let now = Instant::now();
        if next_frame > now {
            thread::sleep(next_frame - now);
        } else {
            // Fell behind; don't try to catch up with a burst of frames.
            next_frame = now;
        }
    }
}
