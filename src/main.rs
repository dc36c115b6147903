// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use reelcam::backends::camera::types::CameraPosition;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "reelcam")]
#[command(about = "Multi-segment camera capture and reel composition")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file (default: ~/.config/reelcam/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a recorded segment (duration, size, audio)
    Probe {
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compose segments into one reel
    Merge {
        /// Segments in recording order, as `position:path` (e.g. `front:clip.mp4`)
        #[arg(required = true)]
        segments: Vec<String>,

        /// Output file (default: a new reel in the work directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the transform applied to a segment
    Transform {
        /// Natural width of the video track
        #[arg(short = 'W', long)]
        width: u32,

        /// Natural height of the video track
        #[arg(short = 'H', long)]
        height: u32,

        /// Camera the segment was recorded with
        #[arg(short, long, default_value = "back")]
        position: CameraPosition,
    },

    /// List H.264 encoders in priority order
    Encoders,

    /// Interactive capture session reading intents from stdin
    Session,

    /// Pulse the torch (back) or the display (front)
    Flash {
        #[arg(short, long, default_value = "back")]
        position: CameraPosition,

        /// Pulse length in milliseconds
        #[arg(long, default_value = "500")]
        millis: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control the log level, e.g. RUST_LOG=reelcam=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => reelcam::Config::load_from(path),
        None => reelcam::Config::load(),
    };

    match cli.command {
        Commands::Probe { file, json } => cli::probe(&file, json),
        Commands::Merge {
            segments,
            output,
            json,
        } => cli::merge(&config, &segments, output, json),
        Commands::Transform {
            width,
            height,
            position,
        } => cli::transform(width, height, position),
        Commands::Encoders => cli::list_encoders(),
        Commands::Session => cli::session(&config),
        Commands::Flash { position, millis } => cli::flash(position, millis),
    }
}
