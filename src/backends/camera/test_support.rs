// SPDX-License-Identifier: GPL-3.0-only

//! In-memory capture device for unit tests

use super::CaptureDevice;
use super::types::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Observable state of a [`FakeDevice`], shared with the test body
#[derive(Debug, Default)]
pub struct FakeDeviceLog {
    pub events: Vec<String>,
    pub zoom: Option<f64>,
    pub torch: bool,
    /// Back camera without flash LEDs
    pub torchless: bool,
    pub fail_next_seal: bool,
    pub missing: Vec<CameraPosition>,
}

pub struct FakeDevice {
    pub log: Arc<Mutex<FakeDeviceLog>>,
    pub video_status: AuthorizationStatus,
    pub audio_status: AuthorizationStatus,
    pub grant_on_prompt: bool,
    inputs: Vec<DeviceInput>,
    outputs: Vec<OutputKind>,
    running: bool,
    recording: Option<PathBuf>,
}

impl FakeDevice {
    pub fn new() -> (Self, Arc<Mutex<FakeDeviceLog>>) {
        let log = Arc::new(Mutex::new(FakeDeviceLog::default()));
        let device = Self {
            log: Arc::clone(&log),
            video_status: AuthorizationStatus::Authorized,
            audio_status: AuthorizationStatus::Authorized,
            grant_on_prompt: true,
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
            MediaKind::Audio => self.audio_status,
        }
    }

    fn request_access(&mut self, kind: MediaKind) -> bool {
        self.push(format!("prompt:{}", kind));
        self.grant_on_prompt
    }

    fn has_camera(&self, position: CameraPosition) -> bool {
        !self.log.lock().unwrap().missing.contains(&position)
    }

    fn begin_configuration(&mut self) {
        self.push("begin");
    }

    fn commit_configuration(&mut self) {
        self.push("commit");
    }

    fn remove_all_inputs(&mut self) {
        self.inputs.clear();
    }

    fn can_add_input(&self, _input: DeviceInput) -> bool {
        true
    }

    fn add_input(&mut self, input: DeviceInput) -> BackendResult<()> {
        if let DeviceInput::Video(p) = input {
            self.push(format!("input:{}", p));
        }
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
        self.push(format!("open:{}", self.position().map_or("none".into(), |p| p.to_string())));
        self.recording = Some(path.to_path_buf());
        Ok(())
    }

    fn stop_recording(&mut self) -> BackendResult<PathBuf> {
        let path = self.recording.take().ok_or(BackendError::NoRecordingInProgress)?;
        let fail = std::mem::take(&mut self.log.lock().unwrap().fail_next_seal);
        if fail {
            return Err(BackendError::Pipeline("muxer refused EOS".into()));
        }
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
        // 2x1 frame: red then blue
        Ok(CameraFrame::from_rgba(
            2,
            1,
            vec![255, 0, 0, 255, 0, 0, 255, 255],
            SensorRotation::None,
        ))
    }

    fn set_zoom_factor(&mut self, factor: f64) -> BackendResult<()> {
        self.log.lock().unwrap().zoom = Some(factor);
        Ok(())
    }

    fn has_torch(&self) -> bool {
        !self.log.lock().unwrap().torchless && self.position() == Some(CameraPosition::Back)
    }

    fn set_torch(&mut self, on: bool) -> BackendResult<()> {
        self.log.lock().unwrap().torch = on;
        Ok(())
    }
}
