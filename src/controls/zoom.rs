// SPDX-License-Identifier: MPL-2.0

//! Pinch-to-zoom state

use crate::constants::{MAX_ZOOM, MIN_ZOOM};

/// Clamp a zoom factor to the supported range; NaN maps to the minimum
pub fn clamp_zoom(factor: f64) -> f64 {
    if factor.is_nan() {
        return MIN_ZOOM;
    }
    factor.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Zoom factor plus the baseline the current gesture is anchored to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    factor: f64,
    baseline: f64,
    is_adjusting: bool,
}

impl ZoomState {
    pub fn new() -> Self {
        Self {
            factor: MIN_ZOOM,
            baseline: MIN_ZOOM,
            is_adjusting: false,
        }
    }

    /// Current clamped factor
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Factor the next gesture starts from
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// A pinch gesture is in progress
    pub fn is_adjusting(&self) -> bool {
        self.is_adjusting
    }

    /// Apply a cumulative gesture scale; returns the new clamped factor
    ///
    /// `scale` is relative to the start of the gesture, so repeated calls
    /// within one gesture do not compound.
    pub fn pinch_changed(&mut self, scale: f64, sensitivity: f64) -> f64 {
        self.is_adjusting = true;
        self.factor = clamp_zoom(self.baseline * (1.0 + (scale - 1.0) * sensitivity));
        self.factor
    }

    /// Anchor the next gesture at the current factor
    pub fn pinch_ended(&mut self) {
        self.is_adjusting = false;
        self.baseline = self.factor;
    }

    /// Back to 1x (camera switch)
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new()
    }
}
