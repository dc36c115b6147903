// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - probing and merging recorded segments
//! - inspecting segment transforms and available encoders
//! - an interactive capture session driven from stdin
//! - pulsing the torch or display

use reelcam::app::{CameraSession, Intent, Signal};
use reelcam::backends::camera::pipewire::PipeWireCaptureDevice;
use reelcam::backends::camera::types::{CameraPosition, Dimensions};
use reelcam::constants::MAX_BRIGHTNESS;
use reelcam::controls::{DisplayBrightness, IlluminationMode, VirtualBrightness};
use reelcam::flash::{self, Backlight, FlashHardware};
use reelcam::pipelines::video::encoder_selection::enumerate_h264_encoders;
use reelcam::pipelines::video::{
    CompositionResult, GstMediaBackend, MediaBackend, Segment, SegmentCompositionEngine,
    render_size, segment_transform,
};
use reelcam::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::warn;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Print what a probe learns about a segment file
pub fn probe(file: &Path, json: bool) -> CliResult {
    let media = GstMediaBackend::new()?;
    let asset = media.load_asset(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&asset)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Duration: {:.2}s", asset.duration.as_secs_f64());
    match asset.video {
        Some(size) => println!("Video: {}", size),
        None => println!("Video: none"),
    }
    println!("Audio: {}", if asset.has_audio { "yes" } else { "no" });
    Ok(())
}

/// Compose `position:path` segments into one reel
pub fn merge(config: &Config, args: &[String], output: Option<PathBuf>, json: bool) -> CliResult {
    let segments = args
        .iter()
        .enumerate()
        .map(|(order, arg)| parse_segment_arg(order as u32, arg))
        .collect::<Result<Vec<_>, _>>()?;

    let media = Arc::new(GstMediaBackend::new()?);
    let engine = SegmentCompositionEngine::new(
        media,
        config.storage(),
        config.export_preset,
        config.frame_rate,
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let mut result = runtime.block_on(engine.compose(segments.into()));

    if let (Some(target), Some(produced)) = (output, result.output_location.as_ref())
        && result.status.has_output()
    {
        move_file(produced, &target)?;
        result.output_location = Some(target);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if result.status.has_output() {
        Ok(())
    } else {
        Err("Composition produced no reel".into())
    }
}

/// Print the transform and flip for a segment of the given size
pub fn transform(width: u32, height: u32, position: CameraPosition) -> CliResult {
    let natural = Dimensions::new(width, height);
    let transform = segment_transform(natural, position);

    println!("Natural size: {}", natural);
    println!("Render size: {}", render_size(natural));
    println!("Transform: {}", transform);
    match transform.flip_method() {
        Some(method) => println!("Flip: {} (videoflip method={})", method, method.gst_nick()),
        None => println!("Flip: not an axis-aligned transform"),
    }
    Ok(())
}

/// List H.264 encoders in selection order
pub fn list_encoders() -> CliResult {
    gstreamer::init()?;

    let encoders = enumerate_h264_encoders();
    if encoders.is_empty() {
        println!("No H.264 encoders found.");
        return Ok(());
    }

    println!("Available H.264 encoders (highest priority first):");
    for encoder in encoders {
        println!(
            "  {:<14} {}{}",
            encoder.element_name,
            encoder.display_name,
            if encoder.is_hardware { " [hardware]" } else { "" }
        );
    }
    Ok(())
}

/// Pulse the back torch or the display backlight
pub fn flash(position: CameraPosition, millis: u64) -> CliResult {
    let pulse = Duration::from_millis(millis);

    match position {
        CameraPosition::Back => {
            let hardware = FlashHardware::detect();
            if !hardware.has_devices() {
                return Err(hardware
                    .permission_error
                    .unwrap_or_else(|| "No flash LEDs found".to_string())
                    .into());
            }
            println!("Torch on for {}ms", millis);
            flash::all_on(&hardware.devices)?;
            std::thread::sleep(pulse);
            flash::all_off(&hardware.devices)?;
        }
        CameraPosition::Front => {
            let mut backlight = Backlight::discover().ok_or("No writable backlight found")?;
            let original = backlight.brightness()?;
            println!("Display at full brightness for {}ms", millis);
            backlight.set_brightness(MAX_BRIGHTNESS)?;
            std::thread::sleep(pulse);
            backlight.set_brightness(original)?;
        }
    }
    Ok(())
}

/// Run a capture session; intents are read line by line from stdin and
/// signals are printed as JSON lines
pub fn session(config: &Config) -> CliResult {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_session(config))
}

async fn run_session(config: &Config) -> CliResult {
    let device = PipeWireCaptureDevice::new(config);
    let display: Box<dyn DisplayBrightness> = match Backlight::discover() {
        Some(backlight) => Box::new(backlight),
        None => Box::new(VirtualBrightness::default()),
    };
    let media = Arc::new(GstMediaBackend::new()?);

    let (handle, mut signals) =
        CameraSession::new(Box::new(device), display, media, config).spawn();

    let printer = tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            print_signal(&signal);
        }
    });

    eprintln!("{}", SESSION_HELP);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Ok(SessionCommand::Intent(intent)) => {
                if let Err(e) = handle.send(intent).await {
                    eprintln!("{}", e);
                    break;
                }
            }
            Ok(SessionCommand::Status) => match handle.status().await {
                Some(status) => println!("{}", serde_json::to_string(&status)?),
                None => break,
            },
            Ok(SessionCommand::Help) => eprintln!("{}", SESSION_HELP),
            Ok(SessionCommand::Quit) => break,
            Ok(SessionCommand::Empty) => {}
            Err(e) => eprintln!("{}", e),
        }
    }

    eprintln!("Finishing session...");
    handle.shutdown().await;
    if let Err(e) = printer.await {
        warn!(error = %e, "Signal printer failed");
    }
    Ok(())
}

const SESSION_HELP: &str = "Commands: start, stop, switch, zoom <scale>, pinch-end, \
flash <on|off>, photo, undo, export, reset, preview <on|off>, status, help, quit";

#[derive(Debug)]
enum SessionCommand {
    Intent(Intent),
    Status,
    Help,
    Quit,
    Empty,
}

fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(SessionCommand::Empty);
    };
    let argument = words.next();

    let intent = match command {
        "start" => Intent::StartRecording,
        "stop" => Intent::StopRecording,
        "switch" => Intent::SwitchCamera,
        "zoom" => {
            let scale = argument
                .ok_or("zoom needs a pinch scale")?
                .parse::<f64>()
                .map_err(|e| format!("Invalid pinch scale: {}", e))?;
            Intent::PinchChanged(scale)
        }
        "pinch-end" => Intent::PinchEnded,
        "flash" => Intent::SetFlash(
            argument
                .ok_or("flash needs on or off")?
                .parse::<IlluminationMode>()?,
        ),
        "photo" => Intent::CapturePhoto,
        "undo" => Intent::RemoveLastPhoto,
        "export" => Intent::ExportPhotos,
        "reset" => Intent::Reset,
        "preview" => match argument {
            Some("on") => Intent::SetPreviewActive(true),
            Some("off") => Intent::SetPreviewActive(false),
            _ => return Err("preview needs on or off".to_string()),
        },
        "status" => return Ok(SessionCommand::Status),
        "help" | "?" => return Ok(SessionCommand::Help),
        "quit" | "exit" => return Ok(SessionCommand::Quit),
        other => return Err(format!("Unknown command '{}'", other)),
    };
    Ok(SessionCommand::Intent(intent))
}

/// `front:clip.mp4` -> segment recorded with the front camera
fn parse_segment_arg(order: u32, arg: &str) -> Result<Segment, String> {
    let (position, path) = arg
        .split_once(':')
        .ok_or_else(|| format!("Expected position:path, got '{}'", arg))?;
    let position = position.parse::<CameraPosition>()?;
    if path.is_empty() {
        return Err(format!("Missing path in '{}'", arg));
    }

    Ok(Segment {
        location: PathBuf::from(path),
        position,
        order,
        recorded_for: Duration::ZERO,
    })
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    // rename fails across filesystems
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

fn print_result(result: &CompositionResult) {
    match &result.output_location {
        Some(path) => println!("Reel: {}", path.display()),
        None => println!("Reel: none"),
    }
    println!("Status: {:?}", result.status);
    println!("Segments: {}", result.segment_count);
    println!("Duration: {:.2}s", result.duration.as_secs_f64());
}

fn print_signal(signal: &Signal) {
    match serde_json::to_string(signal) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(error = %e, ?signal, "Failed to serialize signal"),
    }
}
