// SPDX-License-Identifier: GPL-3.0-only

//! PipeWire capture device
//!
//! PipeWire handles camera access and format negotiation; this backend wraps
//! it in GStreamer pipelines:
//!
//! - a preview pipeline feeding an RGBA appsink (stills are pulled from it)
//! - one recording pipeline per segment, torn down through EOS on seal
//!
//! The torch is driven through the sysfs flash LEDs.

pub mod enumeration;
pub mod pipeline;

pub use enumeration::{PipeWireCamera, enumerate_cameras, is_pipewire_available};
pub use pipeline::{PreviewPipeline, SegmentPipeline, crop_center, target_object};

use super::CaptureDevice;
use super::types::*;
use crate::config::Config;
use crate::constants::{BitratePreset, MIN_ZOOM};
use crate::flash::{FlashHardware, TorchLeds};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time for the scene to light up before a flash still is pulled
const FLASH_SETTLE: Duration = Duration::from_millis(150);

pub struct PipeWireCaptureDevice {
    front_target: Option<String>,
    back_target: Option<String>,
    audio_target: Option<String>,
    rotation: SensorRotation,
    bitrate: BitratePreset,
    available: bool,

    active: Option<CameraPosition>,
    configuring: bool,
    inputs: Vec<DeviceInput>,
    outputs: HashSet<OutputKind>,

    preview: Option<PreviewPipeline>,
    segment: Option<SegmentPipeline>,
    zoom: f64,
    flash: TorchLeds,
}

impl PipeWireCaptureDevice {
    /// Discover cameras and flash LEDs, resolving targets from `config`
    pub fn new(config: &Config) -> Self {
        let available = is_pipewire_available();
        let cameras = if available {
            enumerate_cameras()
        } else {
            warn!("pipewiresrc not available");
            Vec::new()
        };
        let (front_target, back_target) = enumeration::resolve_targets(
            &cameras,
            config.camera_target(CameraPosition::Front),
            config.camera_target(CameraPosition::Back),
        );

        let hardware = FlashHardware::detect();
        if let Some(msg) = &hardware.permission_error {
            warn!("{}", msg);
        }

        Self {
            front_target,
            back_target,
            audio_target: config.audio_device.clone(),
            rotation: config.sensor_rotation(),
            bitrate: config.bitrate_preset,
            available,
            active: None,
            configuring: false,
            inputs: Vec::new(),
            outputs: HashSet::new(),
            preview: None,
            segment: None,
            zoom: MIN_ZOOM,
            flash: TorchLeds::new(hardware.devices),
        }
    }

    fn target(&self, position: CameraPosition) -> Option<&str> {
        match position {
            CameraPosition::Front => self.front_target.as_deref(),
            CameraPosition::Back => self.back_target.as_deref(),
        }
    }

    fn selected_position(&self) -> Option<CameraPosition> {
        self.inputs.iter().find_map(|input| match input {
            DeviceInput::Video(position) => Some(*position),
            DeviceInput::Audio => None,
        })
    }

    fn restart_preview(&mut self) -> BackendResult<()> {
        self.preview = None;
        let position = self.active.ok_or(BackendError::NotRunning)?;
        self.preview = Some(PreviewPipeline::start(self.target(position), self.rotation)?);
        Ok(())
    }
}

impl CaptureDevice for PipeWireCaptureDevice {
    fn authorization_status(&self, kind: MediaKind) -> AuthorizationStatus {
        // PipeWire mediates access itself; a missing source element is the
        // only hard refusal we can detect up front
        match kind {
            MediaKind::Video if !self.available => AuthorizationStatus::Restricted,
            _ => AuthorizationStatus::Authorized,
        }
    }

    fn request_access(&mut self, kind: MediaKind) -> bool {
        self.authorization_status(kind) == AuthorizationStatus::Authorized
    }

    fn has_camera(&self, position: CameraPosition) -> bool {
        self.available && self.target(position).is_some()
    }

    fn begin_configuration(&mut self) {
        self.configuring = true;
    }

    fn commit_configuration(&mut self) {
        self.configuring = false;
        let selected = self.selected_position();
        if selected == self.active {
            return;
        }

        self.active = selected;
        self.zoom = MIN_ZOOM;
        info!(position = ?self.active, "Camera selection committed");
        if self.preview.is_some()
            && let Err(e) = self.restart_preview()
        {
            warn!(error = %e, "Failed to restart preview after reconfiguration");
        }
    }

    fn remove_all_inputs(&mut self) {
        self.inputs.clear();
    }

    fn can_add_input(&self, input: DeviceInput) -> bool {
        match input {
            DeviceInput::Video(position) => {
                self.has_camera(position)
                    && !self.inputs.iter().any(|i| matches!(i, DeviceInput::Video(_)))
            }
            DeviceInput::Audio => !self.inputs.contains(&DeviceInput::Audio),
        }
    }

    fn add_input(&mut self, input: DeviceInput) -> BackendResult<()> {
        if !self.can_add_input(input) {
            return Err(BackendError::DeviceNotFound(format!("{:?}", input)));
        }
        self.inputs.push(input);
        Ok(())
    }

    fn has_output(&self, kind: OutputKind) -> bool {
        self.outputs.contains(&kind)
    }

    fn add_output(&mut self, kind: OutputKind) -> BackendResult<()> {
        self.outputs.insert(kind);
        Ok(())
    }

    fn start_running(&mut self) -> BackendResult<()> {
        if self.preview.is_none() {
            self.restart_preview()?;
        }
        Ok(())
    }

    fn stop_running(&mut self) {
        self.preview = None;
    }

    fn is_running(&self) -> bool {
        self.preview.is_some()
    }

    fn start_recording(&mut self, path: &Path) -> BackendResult<()> {
        if self.segment.is_some() {
            return Err(BackendError::RecordingInProgress);
        }
        if !self.outputs.contains(&OutputKind::Movie) {
            return Err(BackendError::NotSupported("no movie output".into()));
        }
        let position = self.active.ok_or(BackendError::NotRunning)?;

        self.segment = Some(SegmentPipeline::start(
            self.target(position),
            self.audio_target.as_deref(),
            path,
            self.bitrate,
        )?);
        Ok(())
    }

    fn stop_recording(&mut self) -> BackendResult<PathBuf> {
        self.segment
            .take()
            .ok_or(BackendError::NoRecordingInProgress)?
            .finish()
    }

    fn is_recording(&self) -> bool {
        self.segment.is_some()
    }

    fn supports_flash(&self) -> bool {
        !self.flash.is_empty()
    }

    fn capture_still(&mut self, settings: StillSettings) -> BackendResult<CameraFrame> {
        let preview = self.preview.as_ref().ok_or(BackendError::NotRunning)?;

        let frame = if settings.flash {
            self.flash.pulse(FLASH_SETTLE, || preview.latest_frame())??
        } else {
            preview.latest_frame()?
        };
        debug!(width = frame.width, height = frame.height, zoom = self.zoom, "Still captured");
        Ok(crop_center(&frame, self.zoom))
    }

    fn set_zoom_factor(&mut self, factor: f64) -> BackendResult<()> {
        // No optical zoom control through PipeWire; applied to stills as a crop
        self.zoom = factor;
        Ok(())
    }

    fn has_torch(&self) -> bool {
        self.active == Some(CameraPosition::Back) && !self.flash.is_empty()
    }

    fn set_torch(&mut self, on: bool) -> BackendResult<()> {
        if on && !self.has_torch() {
            return Err(BackendError::NotSupported("no torch on this camera".into()));
        }
        self.flash.set(on)?;
        Ok(())
    }
}

impl Drop for PipeWireCaptureDevice {
    fn drop(&mut self) {
        if let Some(segment) = self.segment.take()
            && let Err(e) = segment.finish()
        {
            warn!(error = %e, "Failed to finalise segment on shutdown");
        }
        if !self.flash.is_empty() {
            let _ = self.flash.set(false);
        }
    }
}
