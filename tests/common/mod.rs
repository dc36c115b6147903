// SPDX-License-Identifier: GPL-3.0-only

//! In-test fakes for the capture device, display and media backend

#![allow(dead_code)]

use reelcam::backends::camera::{
    AuthorizationStatus, BackendError, BackendResult, CameraFrame, CameraPosition, CaptureDevice,
    DeviceInput, Dimensions, MediaKind, OutputKind, SensorRotation, StillSettings,
};
use reelcam::constants::ExportPreset;
use reelcam::controls::DisplayBrightness;
use reelcam::errors::CompositionError;
use reelcam::pipelines::video::{AssetInfo, CompositionPlan, MediaBackend};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, inspectable state of a [`FakeDevice`]
#[derive(Debug, Default)]
pub struct DeviceLog {
    pub events: Vec<String>,
    pub torch: bool,
    pub zoom: Option<f64>,
    pub missing: Vec<CameraPosition>,
}

impl DeviceLog {
    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

pub struct FakeDevice {
    pub video_status: AuthorizationStatus,
    log: Arc<Mutex<DeviceLog>>,
    inputs: Vec<DeviceInput>,
    outputs: Vec<OutputKind>,
    running: bool,
    recording: Option<PathBuf>,
}

impl FakeDevice {
    pub fn new() -> (Self, Arc<Mutex<DeviceLog>>) {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let device = Self {
            video_status: AuthorizationStatus::Authorized,
            log: Arc::clone(&log),
            inputs: Vec::new(),
            outputs: Vec::new(),
            running: false,
            recording: None,
        };
        (device, log)
    }

    fn push(&self, event: impl Into<String>) {
        self.log.lock().unwrap().events.push(event.into());
    }

    fn position(&self) -> Option<CameraPosition> {
        self.inputs.iter().find_map(|input| match input {
            DeviceInput::Video(p) => Some(*p),
            DeviceInput::Audio => None,
        })
    }
}

impl CaptureDevice for FakeDevice {
    fn authorization_status(&self, kind: MediaKind) -> AuthorizationStatus {
        match kind {
            MediaKind::Video => self.video_status,
            MediaKind::Audio => AuthorizationStatus::Authorized,
        }
    }

    fn request_access(&mut self, _kind: MediaKind) -> bool {
        false
    }

    fn has_camera(&self, position: CameraPosition) -> bool {
        !self.log.lock().unwrap().missing.contains(&position)
    }

    fn begin_configuration(&mut self) {}

    fn commit_configuration(&mut self) {}

    fn remove_all_inputs(&mut self) {
        self.inputs.clear();
    }

    fn can_add_input(&self, _input: DeviceInput) -> bool {
        true
    }

    fn add_input(&mut self, input: DeviceInput) -> BackendResult<()> {
        self.inputs.push(input);
        Ok(())
    }

    fn has_output(&self, kind: OutputKind) -> bool {
        self.outputs.contains(&kind)
    }

    fn add_output(&mut self, kind: OutputKind) -> BackendResult<()> {
        self.outputs.push(kind);
        Ok(())
    }

    fn start_running(&mut self) -> BackendResult<()> {
        self.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn start_recording(&mut self, path: &Path) -> BackendResult<()> {
        if self.recording.is_some() {
            return Err(BackendError::RecordingInProgress);
        }
        std::fs::write(path, b"segment").map_err(|e| BackendError::Pipeline(e.to_string()))?;
        let position = self.position().map_or("none".to_string(), |p| p.to_string());
        self.push(format!("open:{}", position));
        self.recording = Some(path.to_path_buf());
        Ok(())
    }

    fn stop_recording(&mut self) -> BackendResult<PathBuf> {
        let path = self
            .recording
            .take()
            .ok_or(BackendError::NoRecordingInProgress)?;
        self.push("seal");
        Ok(path)
    }

    fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    fn supports_flash(&self) -> bool {
        true
    }

    fn capture_still(&mut self, settings: StillSettings) -> BackendResult<CameraFrame> {
        self.push(format!("still:flash={}", settings.flash));
        // 2x2 frame
        Ok(CameraFrame::from_rgba(
            2,
            2,
            vec![
                255, 0, 0, 255, 0, 255, 0, 255, //
                0, 0, 255, 255, 255, 255, 255, 255,
            ],
            SensorRotation::None,
        ))
    }

    fn set_zoom_factor(&mut self, factor: f64) -> BackendResult<()> {
        self.log.lock().unwrap().zoom = Some(factor);
        Ok(())
    }

    fn has_torch(&self) -> bool {
        self.position() == Some(CameraPosition::Back)
    }

    fn set_torch(&mut self, on: bool) -> BackendResult<()> {
        self.log.lock().unwrap().torch = on;
        Ok(())
    }
}

/// Display brightness kept in shared memory
#[derive(Debug, Clone)]
pub struct FakeDisplay(pub Arc<Mutex<f64>>);

impl FakeDisplay {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }
}

impl DisplayBrightness for FakeDisplay {
    fn brightness(&self) -> io::Result<f64> {
        Ok(*self.0.lock().unwrap())
    }

    fn set_brightness(&mut self, value: f64) -> io::Result<()> {
        *self.0.lock().unwrap() = value;
        Ok(())
    }
}

/// Media backend answering probes by file name
///
/// Every segment lasts two seconds at 1920x1080 with audio unless its file
/// name contains one of the `unreadable` or `silent` markers.
#[derive(Debug, Default)]
pub struct FakeMedia {
    pub unreadable: Vec<String>,
    pub silent: Vec<String>,
    pub fail_export: bool,
    pub exports: Mutex<Vec<CompositionPlan>>,
}

pub const SEGMENT_LENGTH: Duration = Duration::from_secs(2);

impl FakeMedia {
    pub fn export_count(&self) -> usize {
        self.exports.lock().unwrap().len()
    }

    pub fn last_plan(&self) -> Option<CompositionPlan> {
        self.exports.lock().unwrap().last().cloned()
    }

    fn matches(markers: &[String], path: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        name.is_some_and(|name| markers.iter().any(|m| name.contains(m.as_str())))
    }
}

impl MediaBackend for FakeMedia {
    fn load_asset(&self, path: &Path) -> Result<AssetInfo, CompositionError> {
        if Self::matches(&self.unreadable, path) {
            return Err(CompositionError::AssetUnreadable(format!(
                "{}: moov atom not found",
                path.display()
            )));
        }
        Ok(AssetInfo {
            duration: SEGMENT_LENGTH,
            video: Some(Dimensions::new(1920, 1080)),
            has_audio: !Self::matches(&self.silent, path),
        })
    }

    fn export(
        &self,
        plan: &CompositionPlan,
        output: &Path,
        _preset: ExportPreset,
    ) -> Result<(), CompositionError> {
        self.exports.lock().unwrap().push(plan.clone());
        if self.fail_export {
            return Err(CompositionError::ExportFailed("no encoder".to_string()));
        }
        std::fs::write(output, b"reel").map_err(|e| CompositionError::ExportFailed(e.to_string()))
    }
}
