// SPDX-License-Identifier: MPL-2.0

//! Illumination state
//!
//! The back camera has a physical torch. The front camera has none, so
//! illumination is simulated by driving the display to full brightness and
//! restoring the previous value afterwards.
//!
//! The state tracks what is physically engaged and derives the effects needed
//! to reach the desired state after every change. The original brightness is
//! captured once per episode and handed back exactly once.

use crate::backends::camera::types::CameraPosition;
use serde::{Deserialize, Serialize};
use std::io;

/// User-selected illumination preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IlluminationMode {
    #[default]
    Off,
    On,
}

impl std::str::FromStr for IlluminationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Ok(IlluminationMode::On),
            "off" | "false" | "0" => Ok(IlluminationMode::Off),
            other => Err(format!("Unknown illumination mode '{}'", other)),
        }
    }
}

/// Process-wide display brightness (0.0 ..= 1.0)
pub trait DisplayBrightness: Send {
    fn brightness(&self) -> io::Result<f64>;
    fn set_brightness(&mut self, value: f64) -> io::Result<()>;
}

/// In-memory brightness for systems without a controllable backlight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualBrightness {
    value: f64,
}

impl VirtualBrightness {
    pub fn new(value: f64) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
        }
    }
}

impl Default for VirtualBrightness {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl DisplayBrightness for VirtualBrightness {
    fn brightness(&self) -> io::Result<f64> {
        Ok(self.value)
    }

    fn set_brightness(&mut self, value: f64) -> io::Result<()> {
        self.value = value.clamp(0.0, 1.0);
        Ok(())
    }
}

/// Hardware action needed to reach the desired illumination
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IlluminationEffect {
    /// Switch the back torch
    Torch(bool),
    /// Capture the current brightness and force the display to maximum
    SimulateFlash,
    /// Put the captured brightness back
    RestoreBrightness(f64),
}

/// Illumination preference plus what is physically engaged
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IlluminationState {
    mode: IlluminationMode,
    position: CameraPosition,
    recording: bool,
    torch_engaged: bool,
    saved_brightness: Option<f64>,
}

impl IlluminationState {
    pub fn new(position: CameraPosition) -> Self {
        Self {
            mode: IlluminationMode::Off,
            position,
            recording: false,
            torch_engaged: false,
            saved_brightness: None,
        }
    }

    pub fn mode(&self) -> IlluminationMode {
        self.mode
    }

    pub fn position(&self) -> CameraPosition {
        self.position
    }

    /// Illumination is only engaged while recording
    pub fn is_active_during_recording(&self) -> bool {
        self.recording
    }

    pub fn torch_engaged(&self) -> bool {
        self.torch_engaged
    }

    /// Front overlay is showing (display forced to maximum)
    pub fn overlay_showing(&self) -> bool {
        self.saved_brightness.is_some()
    }

    pub fn saved_brightness(&self) -> Option<f64> {
        self.saved_brightness
    }

    pub fn set_mode(&mut self, mode: IlluminationMode) -> Vec<IlluminationEffect> {
        self.mode = mode;
        self.reconcile()
    }

    pub fn set_recording(&mut self, recording: bool) -> Vec<IlluminationEffect> {
        self.recording = recording;
        self.reconcile()
    }

    pub fn set_position(&mut self, position: CameraPosition) -> Vec<IlluminationEffect> {
        self.position = position;
        self.reconcile()
    }

    /// Release the torch ahead of a camera reconfiguration
    ///
    /// The LEDs belong to the back camera, so they are switched off while it
    /// is still active. The next position change re-evaluates everything.
    pub fn leave_position(&mut self) -> Vec<IlluminationEffect> {
        if !self.torch_engaged {
            return Vec::new();
        }
        self.torch_engaged = false;
        vec![IlluminationEffect::Torch(false)]
    }

    /// The torch could not be lit
    pub fn torch_unavailable(&mut self) {
        self.torch_engaged = false;
    }

    /// Record the brightness read before forcing the display to maximum
    ///
    /// Ignored if a value was already captured in this episode.
    pub fn brightness_captured(&mut self, original: f64) {
        if self.saved_brightness.is_none() {
            self.saved_brightness = Some(original);
        }
    }

    fn wants_light(&self) -> bool {
        self.mode == IlluminationMode::On && self.recording
    }

    fn reconcile(&mut self) -> Vec<IlluminationEffect> {
        let mut effects = Vec::new();

        let torch = self.wants_light() && self.position == CameraPosition::Back;
        if torch != self.torch_engaged {
            self.torch_engaged = torch;
            effects.push(IlluminationEffect::Torch(torch));
        }

        let overlay = self.wants_light() && self.position == CameraPosition::Front;
        match (overlay, self.saved_brightness) {
            (true, None) => effects.push(IlluminationEffect::SimulateFlash),
            (false, Some(original)) => {
                self.saved_brightness = None;
                effects.push(IlluminationEffect::RestoreBrightness(original));
            }
            _ => {}
        }

        effects
    }
}
