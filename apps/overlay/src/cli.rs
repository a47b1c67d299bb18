//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

/// RocketRhythm - "now playing" overlay driven by the system media session
#[derive(Parser, Debug)]
#[command(name = "rocket-rhythm")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Host data directory; settings and album art go to <DATA_DIR>/RocketRhythm
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Frames per second of the render loop
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub fps: u32,

    /// Run for this many seconds, save settings and exit (0 runs until killed)
    #[arg(long, default_value_t = 0)]
    pub duration_secs: u64,

    /// Also write daily rolling log files to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Turn the overlay off (saved to settings)
    #[arg(long)]
    pub disable: bool,

    /// Keep the overlay open when nothing is playing (saved to settings)
    #[arg(long)]
    pub show_when_idle: bool,
}
