// SPDX-License-Identifier: MPL-2.0

//! GStreamer implementation of [`MediaBackend`]
//!
//! Probing prerolls `filesrc ! decodebin` into fake sinks and reads the
//! negotiated caps. Export decodes every included segment, rotates it upright
//! with `videoflip`, normalises size and frame rate, and chains the segments
//! through `concat` into one H.264/AAC MP4.

use super::composition::{AssetInfo, CompositionPlan, MediaBackend, TimelineInstruction};
use super::encoder_selection::{EncoderConfig, select_encoders};
use crate::backends::camera::types::Dimensions;
use crate::constants::ExportPreset;
use crate::constants::pipeline::SILENCE_SAMPLE_RATE;
use crate::constants::timing::PROBE_TIMEOUT;
use crate::errors::CompositionError;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SILENCE_SAMPLES_PER_BUFFER: u64 = 1024;

/// Export may run slower than real time on software encoders
const EXPORT_REALTIME_FACTOR: u32 = 10;
const EXPORT_MIN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct ProbedStreams {
    video: Option<Dimensions>,
    has_audio: bool,
}

/// Probes and exports with the system's GStreamer plugins
#[derive(Debug, Default, Clone, Copy)]
pub struct GstMediaBackend;

impl GstMediaBackend {
    pub fn new() -> Result<Self, CompositionError> {
        gst::init().map_err(|e| {
            CompositionError::ExportFailed(format!("Failed to initialize GStreamer: {}", e))
        })?;
        Ok(Self)
    }
}

impl MediaBackend for GstMediaBackend {
    fn load_asset(&self, path: &Path) -> Result<AssetInfo, CompositionError> {
        let unreadable =
            |msg: String| CompositionError::AssetUnreadable(format!("{}: {}", path.display(), msg));

        if !path.is_file() {
            return Err(unreadable("file not found".into()));
        }

        let pipeline = gst::Pipeline::new();
        let filesrc = gst::ElementFactory::make("filesrc")
            .property("location", path.to_string_lossy().as_ref())
            .build()
            .map_err(|e| unreadable(format!("Failed to create filesrc: {}", e)))?;
        let decodebin = gst::ElementFactory::make("decodebin")
            .build()
            .map_err(|e| unreadable(format!("Failed to create decodebin: {}", e)))?;
        pipeline
            .add_many([&filesrc, &decodebin])
            .map_err(|e| unreadable(format!("Failed to build probe pipeline: {}", e)))?;
        filesrc
            .link(&decodebin)
            .map_err(|_| unreadable("Failed to link filesrc to decodebin".into()))?;

        let streams = Arc::new(Mutex::new(ProbedStreams::default()));
        let pipeline_weak = pipeline.downgrade();
        let probed = Arc::clone(&streams);
        decodebin.connect_pad_added(move |_, pad| {
            let Some(pipeline) = pipeline_weak.upgrade() else {
                return;
            };
            record_stream(pad, &probed);

            // Every decoded stream needs a sink or preroll never completes
            let Ok(sink) = gst::ElementFactory::make("fakesink")
                .property("sync", false)
                .build()
            else {
                return;
            };
            if pipeline.add(&sink).is_err() {
                return;
            }
            let _ = sink.sync_state_with_parent();
            if let Some(sink_pad) = sink.static_pad("sink")
                && let Err(e) = pad.link(&sink_pad)
            {
                warn!(error = ?e, "Failed to link probe sink");
            }
        });

        let result = preroll_and_query(&pipeline).map_err(unreadable);
        let _ = pipeline.set_state(gst::State::Null);
        let duration = result?;

        let streams = streams
            .lock()
            .map_err(|_| unreadable("probe state poisoned".into()))?;
        let info = AssetInfo {
            duration,
            video: streams.video,
            has_audio: streams.has_audio,
        };
        debug!(path = %path.display(), ?info, "Probed segment");
        Ok(info)
    }

    fn export(
        &self,
        plan: &CompositionPlan,
        output: &Path,
        preset: ExportPreset,
    ) -> Result<(), CompositionError> {
        let failed = CompositionError::ExportFailed;

        let description = export_description(plan);
        debug!(%description, "Export source graph");
        let pipeline = gst::parse::launch(&description)
            .map_err(|e| failed(format!("Failed to create pipeline: {}", e)))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| failed("Failed to downcast to Pipeline".into()))?;

        let render = plan.render_size;
        let config = EncoderConfig::for_export(preset, render.width, render.height);
        let encoders = select_encoders(&config, plan.has_audio()).map_err(failed)?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", output.to_string_lossy().as_ref())
            .build()
            .map_err(|e| failed(format!("Failed to create filesink: {}", e)))?;

        pipeline
            .add_many([&encoders.video, &encoders.parser, &encoders.muxer, &filesink])
            .map_err(|e| failed(format!("Failed to add encoders: {}", e)))?;

        let video_out = pipeline
            .by_name("vout")
            .ok_or_else(|| failed("Missing video tail".into()))?;
        video_out
            .link(&encoders.video)
            .map_err(|_| failed("Failed to link video to encoder".into()))?;
        encoders
            .video
            .link(&encoders.parser)
            .map_err(|_| failed("Failed to link encoder to parser".into()))?;
        encoders
            .parser
            .link(&encoders.muxer)
            .map_err(|_| failed("Failed to link video encoder to muxer".into()))?;

        if let Some(audio_encoder) = &encoders.audio {
            let audio_out = pipeline
                .by_name("aout")
                .ok_or_else(|| failed("Missing audio tail".into()))?;
            pipeline
                .add(audio_encoder)
                .map_err(|e| failed(format!("Failed to add audio encoder: {}", e)))?;
            audio_out
                .link(audio_encoder)
                .map_err(|_| failed("Failed to link audio to encoder".into()))?;
            audio_encoder
                .link(&encoders.muxer)
                .map_err(|_| failed("Failed to link audio encoder to muxer".into()))?;
        }

        encoders
            .muxer
            .link(&filesink)
            .map_err(|_| failed("Failed to link muxer to filesink".into()))?;

        info!(
            encoder = encoders.video_encoder_name,
            bitrate_kbps = config.bitrate_kbps(),
            output = %output.display(),
            "Starting export"
        );
        let result = run_to_eos(&pipeline, export_timeout(plan)).map_err(failed);
        let _ = pipeline.set_state(gst::State::Null);

        if result.is_err() {
            // Never leave a truncated reel behind
            let _ = std::fs::remove_file(output);
        }
        result
    }
}

fn record_stream(pad: &gst::Pad, streams: &Mutex<ProbedStreams>) {
    let Some(caps) = pad.current_caps() else {
        return;
    };
    let Some(structure) = caps.structure(0) else {
        return;
    };
    let Ok(mut streams) = streams.lock() else {
        return;
    };

    let name = structure.name();
    if name.starts_with("video/") {
        if streams.video.is_none()
            && let (Ok(width), Ok(height)) =
                (structure.get::<i32>("width"), structure.get::<i32>("height"))
        {
            streams.video = Some(Dimensions::new(width as u32, height as u32));
        }
    } else if name.starts_with("audio/") {
        streams.has_audio = true;
    }
}

/// Pause the pipeline and read its duration once prerolled
fn preroll_and_query(pipeline: &gst::Pipeline) -> Result<Duration, String> {
    pipeline
        .set_state(gst::State::Paused)
        .map_err(|e| format!("Failed to pause pipeline: {:?}", e))?;

    let bus = pipeline.bus().ok_or("No bus on pipeline")?;
    let deadline = std::time::Instant::now() + PROBE_TIMEOUT;

    while std::time::Instant::now() < deadline {
        let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(100)) else {
            continue;
        };
        match msg.view() {
            gst::MessageView::Error(err) => {
                return Err(format!("Pipeline error: {}", err.error()));
            }
            gst::MessageView::AsyncDone(_) => {
                let duration = pipeline
                    .query_duration::<gst::ClockTime>()
                    .ok_or("Duration unknown")?;
                return Ok(Duration::from_nanos(duration.nseconds()));
            }
            _ => {}
        }
    }

    Err("Timeout waiting for preroll".into())
}

/// Play until EOS; errors and timeouts fail the run
fn run_to_eos(pipeline: &gst::Pipeline, timeout: Duration) -> Result<(), String> {
    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| format!("Failed to start export: {:?}", e))?;

    let bus = pipeline.bus().ok_or("No bus available")?;
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    match bus.timed_pop_filtered(
        gst::ClockTime::from_mseconds(timeout_ms),
        &[gst::MessageType::Eos, gst::MessageType::Error],
    ) {
        Some(msg) => match msg.view() {
            gst::MessageView::Eos(_) => Ok(()),
            gst::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "GStreamer error during export"
                );
                Err(format!("Export error: {}", err.error()))
            }
            _ => Err("Unexpected bus message".into()),
        },
        None => Err(format!("Export timed out after {:?}", timeout)),
    }
}

fn export_timeout(plan: &CompositionPlan) -> Duration {
    (plan.total_duration() * EXPORT_REALTIME_FACTOR).max(EXPORT_MIN_TIMEOUT)
}

/// Frames per second encoded in the plan's frame duration
fn frame_rate(plan: &CompositionPlan) -> u32 {
    let secs = plan.frame_duration.as_secs_f64();
    if secs > 0.0 { (1.0 / secs).round() as u32 } else { 30 }
}

fn quoted(path: &Path) -> String {
    format!("\"{}\"", path.to_string_lossy().replace('"', "\\\""))
}

/// Number of silence buffers covering `duration`
fn silence_buffers(duration: Duration) -> u64 {
    let samples = duration.as_nanos() * u128::from(SILENCE_SAMPLE_RATE as u32) / 1_000_000_000;
    let buffers = samples.div_ceil(u128::from(SILENCE_SAMPLES_PER_BUFFER));
    u64::try_from(buffers).unwrap_or(u64::MAX).max(1)
}

fn segment_description(
    index: usize,
    instruction: &TimelineInstruction,
    fps: u32,
    render: Dimensions,
    with_audio: bool,
) -> String {
    let flip = instruction
        .transform
        .flip_method()
        .map(|method| format!("videoflip method={} ! ", method.gst_nick()))
        .unwrap_or_else(|| {
            warn!(transform = %instruction.transform, "Transform is not a right-angle flip");
            String::new()
        });

    let mut description = format!(
        "filesrc location={location} ! decodebin name=d{index} \
         d{index}. ! video/x-raw ! queue ! videoconvert ! {flip}videoscale ! videorate ! \
         video/x-raw,width={w},height={h},framerate={fps}/1,pixel-aspect-ratio=1/1 ! vc. ",
        location = quoted(&instruction.source),
        w = render.width,
        h = render.height,
    );

    if with_audio {
        let audio_caps = format!("audio/x-raw,rate={},channels=2", SILENCE_SAMPLE_RATE);
        if instruction.include_audio {
            description.push_str(&format!(
                "d{index}. ! audio/x-raw ! queue ! audioconvert ! audioresample ! {audio_caps} ! ac. "
            ));
        } else {
            description.push_str(&format!(
                "audiotestsrc wave=silence num-buffers={} samplesperbuffer={} ! {audio_caps} ! ac. ",
                silence_buffers(instruction.duration),
                SILENCE_SAMPLES_PER_BUFFER,
            ));
        }
    }

    description
}

/// `gst-launch` description of the decode and concat stage
///
/// Ends in `queue name=vout` (and `queue name=aout` when any segment carries
/// audio); the encoder tail is linked to those by name.
pub fn export_description(plan: &CompositionPlan) -> String {
    let fps = frame_rate(plan);
    let with_audio = plan.has_audio();

    let mut description = String::from("concat name=vc ! videoconvert ! queue name=vout ");
    if with_audio {
        description.push_str("concat name=ac ! audioconvert ! queue name=aout ");
    }
    for (index, instruction) in plan.instructions.iter().enumerate() {
        description.push_str(&segment_description(
            index,
            instruction,
            fps,
            plan.render_size,
            with_audio,
        ));
    }
    description.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::CameraPosition;
    use crate::pipelines::video::transform::segment_transform;
    use std::path::PathBuf;

    fn instruction(order: u32, position: CameraPosition, audio: bool) -> TimelineInstruction {
        let natural = Dimensions::new(1920, 1080);
        TimelineInstruction {
            order,
            source: PathBuf::from(format!("/tmp/segment-{order:03}.mp4")),
            position,
            start: Duration::from_secs(u64::from(order) * 2),
            duration: Duration::from_secs(2),
            natural_size: natural,
            transform: segment_transform(natural, position),
            include_audio: audio,
        }
    }

    fn plan(instructions: Vec<TimelineInstruction>) -> CompositionPlan {
        CompositionPlan {
            instructions,
            skipped: Vec::new(),
            render_size: Dimensions::new(1080, 1920),
            frame_duration: Duration::from_nanos(1_000_000_000 / 30),
        }
    }

    #[test]
    fn test_description_orders_segments_and_flips() {
        let plan = plan(vec![
            instruction(0, CameraPosition::Back, true),
            instruction(1, CameraPosition::Front, true),
        ]);
        let description = export_description(&plan);

        let first = description.find("segment-000").unwrap();
        let second = description.find("segment-001").unwrap();
        assert!(first < second);
        assert!(description.contains("videoflip method=clockwise"));
        assert!(description.contains("videoflip method=upper-left-diagonal"));
        assert!(description.contains("width=1080,height=1920,framerate=30/1"));
        assert!(description.contains("queue name=aout"));
    }

    #[test]
    fn test_video_only_segment_gets_silence() {
        let plan = plan(vec![
            instruction(0, CameraPosition::Back, true),
            instruction(1, CameraPosition::Back, false),
        ]);
        let description = export_description(&plan);

        assert_eq!(description.matches("audiotestsrc wave=silence").count(), 1);
        assert!(!description.contains("d1. ! audio/x-raw"));
        // 2 s at 48 kHz in 1024-sample buffers
        assert!(description.contains("num-buffers=94"));
    }

    #[test]
    fn test_silent_reel_has_no_audio_tail() {
        let plan = plan(vec![instruction(0, CameraPosition::Back, false)]);
        let description = export_description(&plan);
        assert!(!description.contains("aout"));
        assert!(!description.contains("audiotestsrc"));
    }

    #[test]
    fn test_paths_are_quoted() {
        assert_eq!(
            quoted(Path::new("/tmp/my \"reel\".mp4")),
            "\"/tmp/my \\\"reel\\\".mp4\""
        );
    }
}
