// SPDX-License-Identifier: MPL-2.0

//! Per-segment geometric correction
//!
//! Segments are recorded in sensor orientation (landscape). Composition turns
//! every segment upright with a quarter turn and mirrors front-camera segments
//! so that the merged reel shows them the way the preview did.
//!
//! Transforms use row-vector affine matrices (`p' = p · M`) in pixel space
//! with `y` pointing down:
//!
//! ```text
//! x' = a·x + c·y + tx
//! y' = b·x + d·y + ty
//! ```

use crate::backends::camera::types::{CameraPosition, Dimensions};
use serde::Serialize;
use std::fmt;

/// 2D affine transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// Rotation by `radians`; positive turns +x towards +y (clockwise on screen)
    pub fn rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// `self` followed by `next`
    pub fn then(&self, next: &Self) -> Self {
        Self {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            tx: self.tx * next.a + self.ty * next.c + next.tx,
            ty: self.tx * next.b + self.ty * next.d + next.ty,
        }
    }

    // The builder methods prepend, so the last call is the first step applied
    // to a point.

    pub fn translated_by(&self, tx: f64, ty: f64) -> Self {
        Self::translation(tx, ty).then(self)
    }

    pub fn rotated_by(&self, radians: f64) -> Self {
        Self::rotation(radians).then(self)
    }

    pub fn scaled_by(&self, sx: f64, sy: f64) -> Self {
        Self::scale(sx, sy).then(self)
    }

    /// Map a point
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Whether the transform reverses orientation (contains a reflection)
    pub fn is_mirrored(&self) -> bool {
        self.determinant() < 0.0
    }

    /// Equivalent pixel-exact flip, if the linear part is a right-angle
    /// rotation and/or a mirror
    pub fn flip_method(&self) -> Option<FlipMethod> {
        let snap = |v: f64| -> Option<i8> {
            let r = v.round();
            ((v - r).abs() < 1e-6 && r.abs() <= 1.0).then_some(r as i8)
        };

        let linear = (snap(self.a)?, snap(self.b)?, snap(self.c)?, snap(self.d)?);
        let method = match linear {
            (1, 0, 0, 1) => FlipMethod::Identity,
            (0, 1, -1, 0) => FlipMethod::Clockwise,
            (-1, 0, 0, -1) => FlipMethod::Rotate180,
            (0, -1, 1, 0) => FlipMethod::CounterClockwise,
            (-1, 0, 0, 1) => FlipMethod::HorizontalFlip,
            (1, 0, 0, -1) => FlipMethod::VerticalFlip,
            (0, 1, 1, 0) => FlipMethod::UpperLeftDiagonal,
            (0, -1, -1, 0) => FlipMethod::UpperRightDiagonal,
            _ => return None,
        };
        Some(method)
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for AffineTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[a={} b={} c={} d={} tx={} ty={}]",
            tidy(self.a),
            tidy(self.b),
            tidy(self.c),
            tidy(self.d),
            tidy(self.tx),
            tidy(self.ty)
        )
    }
}

fn tidy(v: f64) -> f64 {
    let r = (v * 1e6).round() / 1e6;
    if r == 0.0 { 0.0 } else { r }
}

/// Right-angle rotations and mirrors, named after GStreamer's `videoflip` methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlipMethod {
    Identity,
    Clockwise,
    Rotate180,
    CounterClockwise,
    HorizontalFlip,
    VerticalFlip,
    UpperLeftDiagonal,
    UpperRightDiagonal,
}

impl FlipMethod {
    /// Nick of the `videoflip` `method` property
    pub fn gst_nick(self) -> &'static str {
        match self {
            FlipMethod::Identity => "none",
            FlipMethod::Clockwise => "clockwise",
            FlipMethod::Rotate180 => "rotate-180",
            FlipMethod::CounterClockwise => "counterclockwise",
            FlipMethod::HorizontalFlip => "horizontal-flip",
            FlipMethod::VerticalFlip => "vertical-flip",
            FlipMethod::UpperLeftDiagonal => "upper-left-diagonal",
            FlipMethod::UpperRightDiagonal => "upper-right-diagonal",
        }
    }

    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            FlipMethod::Clockwise
                | FlipMethod::CounterClockwise
                | FlipMethod::UpperLeftDiagonal
                | FlipMethod::UpperRightDiagonal
        )
    }
}

impl fmt::Display for FlipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.gst_nick())
    }
}

/// Upright correction for a segment of `natural` size recorded at `position`
///
/// A quarter turn moved back into the positive quadrant; front-camera segments
/// are additionally mirrored across the long axis of the upright frame.
pub fn segment_transform(natural: Dimensions, position: CameraPosition) -> AffineTransform {
    let height = f64::from(natural.height);

    let upright = AffineTransform::IDENTITY
        .translated_by(height, 0.0)
        .rotated_by(std::f64::consts::FRAC_PI_2);

    match position {
        CameraPosition::Back => upright,
        CameraPosition::Front => upright.scaled_by(1.0, -1.0).translated_by(0.0, -height),
    }
}

/// Output frame size of a composition whose first segment has `natural` size
pub fn render_size(natural: Dimensions) -> Dimensions {
    natural.swapped()
}
