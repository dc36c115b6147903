// SPDX-License-Identifier: MPL-2.0

//! Zoom and illumination control
//!
//! [`ZoomFlashController`] turns gesture and flash intents into device calls.
//! Optical zoom and the physical torch exist only on the back camera; the
//! front camera gets simulated illumination through the display backlight.

pub mod illumination;
pub mod zoom;

pub use illumination::{
    DisplayBrightness, IlluminationEffect, IlluminationMode, IlluminationState, VirtualBrightness,
};
pub use zoom::{ZoomState, clamp_zoom};

use crate::backends::camera::DeviceSessionManager;
use crate::backends::camera::types::CameraPosition;
use crate::constants::{MAX_BRIGHTNESS, MIN_ZOOM};
use crate::errors::CameraError;
use tracing::{debug, info, warn};

pub struct ZoomFlashController {
    zoom: ZoomState,
    illumination: IlluminationState,
    sensitivity: f64,
    display: Box<dyn DisplayBrightness>,
}

impl ZoomFlashController {
    pub fn new(
        display: Box<dyn DisplayBrightness>,
        sensitivity: f64,
        position: CameraPosition,
    ) -> Self {
        Self {
            zoom: ZoomState::new(),
            illumination: IlluminationState::new(position),
            sensitivity,
            display,
        }
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn illumination(&self) -> &IlluminationState {
        &self.illumination
    }

    /// Apply a pinch scale; `None` on the front camera (no optical zoom)
    pub fn on_pinch_changed(
        &mut self,
        scale: f64,
        device: &mut DeviceSessionManager,
    ) -> Result<Option<f64>, CameraError> {
        if device.position() == CameraPosition::Front {
            return Ok(None);
        }

        let factor = self.zoom.pinch_changed(scale, self.sensitivity);
        device.set_zoom_factor(factor)?;
        debug!(scale, factor, "Zoom applied");
        Ok(Some(factor))
    }

    /// Commit the current factor as the next gesture's baseline
    pub fn on_pinch_ended(&mut self) {
        self.zoom.pinch_ended();
        debug!(baseline = self.zoom.baseline(), "Zoom baseline committed");
    }

    pub fn set_illumination(&mut self, mode: IlluminationMode, device: &mut DeviceSessionManager) {
        info!(?mode, position = %self.illumination.position(), "Illumination mode");
        let effects = self.illumination.set_mode(mode);
        self.apply(effects, device);
    }

    pub fn on_recording_changed(&mut self, recording: bool, device: &mut DeviceSessionManager) {
        let effects = self.illumination.set_recording(recording);
        self.apply(effects, device);
    }

    /// Switch the torch off while the back camera is still configured
    pub fn before_position_change(&mut self, device: &mut DeviceSessionManager) {
        let effects = self.illumination.leave_position();
        self.apply(effects, device);
    }

    /// Follow a camera switch: reset zoom and re-evaluate illumination
    pub fn on_position_changed(&mut self, device: &mut DeviceSessionManager) {
        let position = device.position();
        self.zoom.reset();
        if position == CameraPosition::Back
            && let Err(e) = device.set_zoom_factor(MIN_ZOOM)
        {
            warn!(error = %e, "Failed to reset zoom");
        }

        let effects = self.illumination.set_position(position);
        self.apply(effects, device);
    }

    /// Put the display back if an episode is still open (session teardown)
    pub fn release(&mut self, device: &mut DeviceSessionManager) {
        let effects = self.illumination.set_recording(false);
        self.apply(effects, device);
    }

    fn apply(&mut self, effects: Vec<IlluminationEffect>, device: &mut DeviceSessionManager) {
        for effect in effects {
            match effect {
                IlluminationEffect::Torch(true) if !device.has_torch() => {
                    debug!("No torch on this camera");
                    self.illumination.torch_unavailable();
                }
                IlluminationEffect::Torch(on) => match device.set_torch(on) {
                    Ok(()) => info!(on, "Torch"),
                    Err(e) => {
                        warn!(error = %e, on, "Failed to switch torch");
                        if on {
                            self.illumination.torch_unavailable();
                        }
                    }
                },
                IlluminationEffect::SimulateFlash => match self.display.brightness() {
                    Ok(original) => {
                        self.illumination.brightness_captured(original);
                        if let Err(e) = self.display.set_brightness(MAX_BRIGHTNESS) {
                            warn!(error = %e, "Failed to raise display brightness");
                        }
                        info!(original, "Front illumination on");
                    }
                    Err(e) => warn!(error = %e, "Failed to read display brightness"),
                },
                IlluminationEffect::RestoreBrightness(original) => {
                    match self.display.set_brightness(original) {
                        Ok(()) => info!(original, "Front illumination off"),
                        Err(e) => warn!(error = %e, original, "Failed to restore display brightness"),
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ZoomFlashController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoomFlashController")
            .field("zoom", &self.zoom)
            .field("illumination", &self.illumination)
            .field("sensitivity", &self.sensitivity)
            .finish()
    }
}
