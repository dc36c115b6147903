// SPDX-License-Identifier: GPL-3.0-only

//! Capture device session manager
//!
//! The manager provides:
//! - Exclusive ownership of the capture device
//! - Permission negotiation for camera and microphone
//! - Atomic reconfiguration through [`ConfigurationTransaction`]
//! - Camera switching that cooperates with the recording state machine

use super::CaptureDevice;
use super::types::*;
use crate::errors::{AppError, CameraError, RecordingError};
use crate::pipelines::video::recorder::{RecordingStateMachine, SwitchTicket};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Open configuration transaction on the capture device
///
/// Commits when dropped, so every exit path (including `?`) closes the
/// transaction.
pub struct ConfigurationTransaction<'a> {
    device: &'a mut (dyn CaptureDevice + 'static),
    open: &'a mut bool,
}

impl Deref for ConfigurationTransaction<'_> {
    type Target = dyn CaptureDevice;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl DerefMut for ConfigurationTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.device
    }
}

impl Drop for ConfigurationTransaction<'_> {
    fn drop(&mut self) {
        self.device.commit_configuration();
        *self.open = false;
        debug!("Configuration committed");
    }
}

/// Exclusive owner of the camera + microphone capture session
pub struct DeviceSessionManager {
    device: Box<dyn CaptureDevice + 'static>,
    position: CameraPosition,
    configured: bool,
    transaction_open: bool,
}

impl DeviceSessionManager {
    /// Take ownership of a capture device
    ///
    /// The session is not configured until [`configure_session`](Self::configure_session)
    /// succeeds.
    pub fn new(device: Box<dyn CaptureDevice + 'static>, position: CameraPosition) -> Self {
        Self {
            device,
            position,
            configured: false,
            transaction_open: false,
        }
    }

    /// Position of the configured camera
    pub fn position(&self) -> CameraPosition {
        self.position
    }

    /// Whether the last configuration succeeded
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Check camera and microphone access, prompting where undetermined
    ///
    /// Any denied or restricted answer short-circuits to a terminal `Denied`;
    /// there is no retry.
    pub fn request_permissions(&mut self) -> PermissionResult {
        for kind in [MediaKind::Video, MediaKind::Audio] {
            let granted = match self.device.authorization_status(kind) {
                AuthorizationStatus::Authorized => true,
                AuthorizationStatus::Denied | AuthorizationStatus::Restricted => false,
                AuthorizationStatus::NotDetermined => {
                    info!(media = %kind, "Requesting access");
                    self.device.request_access(kind)
                }
            };

            if !granted {
                warn!(media = %kind, "Access denied");
                return PermissionResult::Denied;
            }
        }

        info!("Camera and microphone access granted");
        PermissionResult::Granted
    }

    /// Open a configuration transaction
    pub fn begin_configuration(&mut self) -> Result<ConfigurationTransaction<'_>, CameraError> {
        if self.transaction_open {
            return Err(CameraError::ConfigurationInProgress);
        }

        self.device.begin_configuration();
        self.transaction_open = true;

        Ok(ConfigurationTransaction {
            device: self.device.as_mut(),
            open: &mut self.transaction_open,
        })
    }

    /// Reconfigure the session for a camera position
    ///
    /// Refused while a segment is open; a recording session has to go through
    /// [`switch_position`](Self::switch_position).
    pub fn configure_session(&mut self, position: CameraPosition) -> Result<(), CameraError> {
        if self.device.is_recording() {
            return Err(CameraError::Backend(BackendError::RecordingInProgress));
        }
        self.apply_configuration(position)
    }

    /// Reconfigure after the open segment was sealed for a switch
    ///
    /// Only a sealed recording yields a [`SwitchTicket`], so the device can never
    /// be reconfigured underneath an open segment.
    pub fn reconfigure_sealed(&mut self, ticket: &SwitchTicket) -> Result<(), CameraError> {
        self.apply_configuration(ticket.target())
    }

    fn apply_configuration(&mut self, position: CameraPosition) -> Result<(), CameraError> {
        info!(%position, "Configuring capture session");
        self.configured = false;

        let mut tx = self.begin_configuration()?;
        tx.remove_all_inputs();

        if !tx.has_camera(position) {
            warn!(%position, "No camera for position");
            return Err(CameraError::DeviceUnavailable(position));
        }

        let video = DeviceInput::Video(position);
        if !tx.can_add_input(video) || !tx.can_add_input(DeviceInput::Audio) {
            return Err(CameraError::InputRejected(format!(
                "session refused {} camera or microphone input",
                position
            )));
        }
        tx.add_input(video)
            .map_err(|e| CameraError::InputRejected(e.to_string()))?;
        tx.add_input(DeviceInput::Audio)
            .map_err(|e| CameraError::InputRejected(e.to_string()))?;

        for kind in [OutputKind::Movie, OutputKind::Still] {
            if !tx.has_output(kind) {
                tx.add_output(kind)?;
            }
        }
        drop(tx);

        self.position = position;
        self.configured = true;
        info!(%position, "Capture session configured");
        Ok(())
    }

    /// Switch to another camera
    ///
    /// Idle: plain reconfiguration. Recording: seal the open segment, reconfigure,
    /// open a new segment tagged with the new position, strictly in that order.
    /// A failed reconfiguration leaves the recorder in `Sealing`; calling this
    /// again retries the reconfiguration for the pending target.
    pub fn switch_position(
        &mut self,
        to: CameraPosition,
        recorder: &mut RecordingStateMachine,
    ) -> Result<(), AppError> {
        let ticket = if recorder.is_sealing() {
            recorder
                .pending_switch()
                .ok_or(AppError::Recording(RecordingError::NotRecording))?
        } else if recorder.is_recording() {
            recorder.seal_for_switch(self, to)?
        } else {
            self.configure_session(to)?;
            return Ok(());
        };

        if let Err(e) = self.reconfigure_sealed(&ticket) {
            warn!(error = %e, target = %ticket.target(), "Reconfiguration failed mid-recording");
            return Err(RecordingError::SwitchInterrupted(e.to_string()).into());
        }

        recorder.resume_after_switch(ticket, self)?;
        Ok(())
    }

    /// Start the hardware session (preview may run while idle)
    pub fn start_preview(&mut self) -> Result<(), CameraError> {
        if !self.device.is_running() {
            self.device.start_running()?;
            info!("Capture session running");
        }
        Ok(())
    }

    /// Stop the hardware session
    pub fn stop_preview(&mut self) {
        if self.device.is_running() {
            self.device.stop_running();
            info!("Capture session stopped");
        }
    }

    /// Whether the hardware session is running
    pub fn is_running(&self) -> bool {
        self.device.is_running()
    }

    /// Whether a segment is open on the device
    pub fn is_recording(&self) -> bool {
        self.device.is_recording()
    }

    /// Begin writing a segment
    pub fn start_segment(&mut self, path: &Path) -> BackendResult<()> {
        self.device.start_recording(path)
    }

    /// Finalise the open segment
    pub fn seal_segment(&mut self) -> BackendResult<PathBuf> {
        self.device.stop_recording()
    }

    /// Whether the still output can fire a flash
    pub fn supports_flash(&self) -> bool {
        self.device.supports_flash()
    }

    /// Capture one still frame
    pub fn capture_still(&mut self, settings: StillSettings) -> BackendResult<CameraFrame> {
        self.device.capture_still(settings)
    }

    /// Apply an already clamped zoom factor
    pub fn set_zoom_factor(&mut self, factor: f64) -> BackendResult<()> {
        self.device.set_zoom_factor(factor)
    }

    /// Whether the active camera has a torch
    pub fn has_torch(&self) -> bool {
        self.device.has_torch()
    }

    /// Switch the torch on or off
    pub fn set_torch(&mut self, on: bool) -> BackendResult<()> {
        self.device.set_torch(on)
    }
}

impl std::fmt::Debug for DeviceSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSessionManager")
            .field("position", &self.position)
            .field("configured", &self.configured)
            .field("running", &self.device.is_running())
            .field("recording", &self.device.is_recording())
            .finish()
    }
}
