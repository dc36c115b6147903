// SPDX-License-Identifier: MPL-2.0

//! PipeWire GStreamer pipelines for preview stills and segment recording

use super::super::types::*;
use crate::constants::{BitratePreset, pipeline, timing};
use crate::pipelines::video::encoder_selection::{EncoderConfig, select_encoders};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Nominal frame size used to pick the recording bitrate
const RECORDING_SIZE: (u32, u32) = (1920, 1080);

/// `pipewiresrc target-object` value for a configured device identifier
///
/// Accepts `pipewire-serial-<serial>`, `pipewire-<node>` or a bare node name.
pub fn target_object(device: &str) -> &str {
    device
        .strip_prefix("pipewire-serial-")
        .or_else(|| device.strip_prefix("pipewire-"))
        .unwrap_or(device)
}

fn pipewire_source(target: Option<&str>) -> BackendResult<gst::Element> {
    let mut builder = gst::ElementFactory::make("pipewiresrc").property("do-timestamp", true);
    if let Some(device) = target {
        let object = target_object(device);
        debug!(device, object, "PipeWire target");
        builder = builder.property("target-object", object);
    }
    builder
        .build()
        .map_err(|e| BackendError::NotAvailable(format!("Failed to create pipewiresrc: {}", e)))
}

fn make(factory: &str) -> BackendResult<gst::Element> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| BackendError::Pipeline(format!("Failed to create {}: {}", factory, e)))
}

fn link_chain(elements: &[&gst::Element]) -> BackendResult<()> {
    gst::Element::link_many(elements.iter().copied())
        .map_err(|_| BackendError::Pipeline("Failed to link pipeline elements".into()))
}

/// Fail fast on errors posted while the pipeline starts
fn check_start(pipeline: &gst::Pipeline) -> BackendResult<()> {
    let bus = pipeline
        .bus()
        .ok_or_else(|| BackendError::Pipeline("No bus available".into()))?;
    if let Some(msg) = bus.timed_pop_filtered(
        gst::ClockTime::from_mseconds(timing::START_ERROR_WINDOW.as_millis() as u64),
        &[gst::MessageType::Error],
    ) && let gst::MessageView::Error(err) = msg.view()
    {
        error!(
            error = %err.error(),
            debug = ?err.debug(),
            source = ?err.src().map(|s| s.name()),
            "GStreamer error during start"
        );
        return Err(BackendError::Pipeline(err.error().to_string()));
    }
    Ok(())
}

/// Live camera feed; the appsink keeps only the newest frame
pub struct PreviewPipeline {
    pipeline: gst::Pipeline,
    appsink: AppSink,
    rotation: SensorRotation,
}

impl PreviewPipeline {
    pub fn start(target: Option<&str>, rotation: SensorRotation) -> BackendResult<Self> {
        gst::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;

        let pipeline = gst::Pipeline::new();
        let source = pipewire_source(target)?;
        let convert = gst::ElementFactory::make("videoconvert")
            .property("n-threads", pipeline::videoconvert_threads())
            .build()
            .map_err(|e| BackendError::Pipeline(format!("Failed to create videoconvert: {}", e)))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", pipeline::OUTPUT_FORMAT)
            .build();
        let appsink = AppSink::builder()
            .caps(&caps)
            .max_buffers(pipeline::MAX_BUFFERS)
            .drop(true)
            .sync(false)
            .build();

        pipeline
            .add_many([&source, &convert, appsink.upcast_ref()])
            .map_err(|e| BackendError::Pipeline(e.to_string()))?;
        link_chain(&[&source, &convert, appsink.upcast_ref()])?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| BackendError::Pipeline(format!("Failed to start preview: {}", e)))?;
        if let Err(e) = check_start(&pipeline) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(e);
        }

        info!(?target, %rotation, "Preview pipeline running");
        Ok(Self {
            pipeline,
            appsink,
            rotation,
        })
    }

    /// Newest frame, waiting up to the still timeout for one to arrive
    pub fn latest_frame(&self) -> BackendResult<CameraFrame> {
        let timeout = gst::ClockTime::from_mseconds(timing::STILL_TIMEOUT.as_millis() as u64);
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .ok_or_else(|| BackendError::Pipeline("Timeout waiting for a frame".into()))?;
        frame_from_sample(&sample, self.rotation)
    }
}

impl Drop for PreviewPipeline {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

fn frame_from_sample(sample: &gst::Sample, rotation: SensorRotation) -> BackendResult<CameraFrame> {
    let caps = sample
        .caps()
        .ok_or_else(|| BackendError::Pipeline("No caps on sample".into()))?;
    let info = VideoInfo::from_caps(caps)
        .map_err(|_| BackendError::Pipeline("Unreadable video caps".into()))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| BackendError::Pipeline("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| BackendError::Pipeline("Failed to map buffer".into()))?;

    Ok(CameraFrame {
        width: info.width(),
        height: info.height(),
        data: Arc::from(map.as_slice()),
        stride: info.stride()[0] as u32,
        rotation,
        captured_at: Instant::now(),
    })
}

/// Centre crop for digital zoom; factors at or below 1 return the frame as is
pub fn crop_center(frame: &CameraFrame, factor: f64) -> CameraFrame {
    if !factor.is_finite() || factor <= 1.0 {
        return frame.clone();
    }

    let width = ((f64::from(frame.width) / factor).round() as u32).max(1);
    let height = ((f64::from(frame.height) / factor).round() as u32).max(1);
    let x0 = (frame.width - width) / 2;
    let y0 = (frame.height - height) / 2;

    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for row in y0..y0 + height {
        let start = (row * frame.stride + x0 * 4) as usize;
        data.extend_from_slice(&frame.data[start..start + (width * 4) as usize]);
    }

    CameraFrame {
        width,
        height,
        data: Arc::from(data),
        stride: width * 4,
        rotation: frame.rotation,
        captured_at: frame.captured_at,
    }
}

/// One segment being written: camera + microphone into H.264/AAC MP4
pub struct SegmentPipeline {
    pipeline: gst::Pipeline,
    location: PathBuf,
}

impl SegmentPipeline {
    pub fn start(
        video_target: Option<&str>,
        audio_target: Option<&str>,
        location: &Path,
        bitrate: BitratePreset,
    ) -> BackendResult<Self> {
        gst::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;

        let (width, height) = RECORDING_SIZE;
        let config = EncoderConfig::for_recording(bitrate, width, height);
        let encoders = select_encoders(&config, true).map_err(BackendError::Pipeline)?;
        let audio_encoder = encoders
            .audio
            .ok_or_else(|| BackendError::Pipeline("No audio encoder".into()))?;

        let pipeline = gst::Pipeline::new();
        let video_source = pipewire_source(video_target)?;
        let convert = make("videoconvert")?;
        let video_queue = make("queue")?;

        let audio_source = pipewire_source(audio_target)?;
        let audio_queue = gst::ElementFactory::make("queue")
            .property("max-size-buffers", 200u32)
            .property("max-size-time", 2_000_000_000u64)
            .build()
            .map_err(|e| BackendError::Pipeline(format!("Failed to create audio queue: {}", e)))?;
        let audio_convert = make("audioconvert")?;
        let audio_resample = make("audioresample")?;

        let filesink = gst::ElementFactory::make("filesink")
            .property("location", location.to_string_lossy().as_ref())
            .build()
            .map_err(|e| BackendError::Pipeline(format!("Failed to create filesink: {}", e)))?;

        pipeline
            .add_many([
                &video_source,
                &convert,
                &video_queue,
                &encoders.video,
                &encoders.parser,
                &encoders.muxer,
                &filesink,
                &audio_source,
                &audio_queue,
                &audio_convert,
                &audio_resample,
                &audio_encoder,
            ])
            .map_err(|e| BackendError::Pipeline(e.to_string()))?;

        link_chain(&[
            &video_source,
            &convert,
            &video_queue,
            &encoders.video,
            &encoders.parser,
            &encoders.muxer,
            &filesink,
        ])?;
        link_chain(&[
            &audio_source,
            &audio_queue,
            &audio_convert,
            &audio_resample,
            &audio_encoder,
            &encoders.muxer,
        ])?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| BackendError::Pipeline(format!("Failed to start recording: {}", e)))?;
        if let Err(e) = check_start(&pipeline) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(e);
        }

        info!(
            path = %location.display(),
            encoder = encoders.video_encoder_name,
            bitrate_kbps = config.bitrate_kbps(),
            "Segment recording started"
        );
        Ok(Self {
            pipeline,
            location: location.to_path_buf(),
        })
    }

    /// Drain through EOS so the muxer writes its index, then tear down
    pub fn finish(self) -> BackendResult<PathBuf> {
        if !self.pipeline.send_event(gst::event::Eos::new()) {
            warn!("Failed to send EOS event to pipeline");
        }

        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| BackendError::Pipeline("No bus available".into()))?;
        let timeout = gst::ClockTime::from_mseconds(timing::EOS_TIMEOUT.as_millis() as u64);
        let drained = match bus.timed_pop_filtered(
            timeout,
            &[gst::MessageType::Eos, gst::MessageType::Error],
        ) {
            Some(msg) => match msg.view() {
                gst::MessageView::Eos(_) => Ok(()),
                gst::MessageView::Error(err) => Err(BackendError::Pipeline(format!(
                    "Segment finalisation failed: {}",
                    err.error()
                ))),
                _ => Ok(()),
            },
            None => Err(BackendError::Pipeline("Timeout waiting for EOS".into())),
        };

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| BackendError::Pipeline(format!("Failed to stop pipeline: {}", e)))?;
        drained?;

        info!(path = %self.location.display(), "Segment sealed");
        Ok(self.location.clone())
    }
}

impl Drop for SegmentPipeline {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
