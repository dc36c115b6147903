// SPDX-License-Identifier: MPL-2.0

//! Orientation normalization for captured stills
//!
//! Frames arrive in sensor orientation. Normalization drops the alpha channel,
//! mirrors front-camera frames so they match the preview, and rotates every
//! frame upright.

use crate::backends::camera::types::{CameraFrame, CameraPosition, SensorRotation};
use crate::errors::PhotoError;
use image::{RgbImage, imageops};
use tracing::debug;

/// Upright RGB still
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub image: RgbImage,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    fn new(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
        }
    }
}

/// Mirror (front camera only) and rotate a raw frame upright
pub fn normalize(frame: &CameraFrame, position: CameraPosition) -> Result<ProcessedImage, PhotoError> {
    let raw = convert_rgba_to_rgb(frame)?;

    // Mirror across the axis that ends up vertical once the frame is upright,
    // so the result is a plain left/right mirror of the upright image.
    let mirrored = match position {
        CameraPosition::Back => raw,
        CameraPosition::Front if frame.rotation.swaps_dimensions() => imageops::flip_vertical(&raw),
        CameraPosition::Front => imageops::flip_horizontal(&raw),
    };

    let upright = match frame.rotation {
        SensorRotation::None => mirrored,
        SensorRotation::Rotate90 => imageops::rotate90(&mirrored),
        SensorRotation::Rotate180 => imageops::rotate180(&mirrored),
        SensorRotation::Rotate270 => imageops::rotate270(&mirrored),
    };

    debug!(
        %position,
        rotation = %frame.rotation,
        width = upright.width(),
        height = upright.height(),
        "Still normalized"
    );
    Ok(ProcessedImage::new(upright))
}

/// Convert RGBA rows (honouring the stride) to an RGB image
fn convert_rgba_to_rgb(frame: &CameraFrame) -> Result<RgbImage, PhotoError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;

    if width == 0 || height == 0 {
        return Err(PhotoError::CaptureFailed("empty frame".into()));
    }
    if stride < width * 4 || frame.data.len() < stride * (height - 1) + width * 4 {
        return Err(PhotoError::CaptureFailed(format!(
            "RGBA data too small for {}x{} (stride {}, {} bytes)",
            width,
            height,
            stride,
            frame.data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in frame.data.chunks(stride).take(height) {
        rgb.extend(row[..width * 4].chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]));
    }

    RgbImage::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| PhotoError::CaptureFailed("Failed to create RGB image".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    // Landscape 2x1 frame: red on the left, blue on the right
    fn frame(rotation: SensorRotation) -> CameraFrame {
        CameraFrame::from_rgba(2, 1, [RED, BLUE].concat(), rotation)
    }

    fn px(image: &RgbImage, x: u32, y: u32) -> [u8; 3] {
        image.get_pixel(x, y).0
    }

    #[test]
    fn test_back_unrotated_is_untouched() {
        let out = normalize(&frame(SensorRotation::None), CameraPosition::Back).unwrap();
        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(px(&out.image, 0, 0), [255, 0, 0]);
    }

    #[test]
    fn test_front_unrotated_is_mirrored() {
        let out = normalize(&frame(SensorRotation::None), CameraPosition::Front).unwrap();
        assert_eq!(px(&out.image, 0, 0), [0, 0, 255]);
        assert_eq!(px(&out.image, 1, 0), [255, 0, 0]);
    }

    #[test]
    fn test_quarter_turn_swaps_dimensions() {
        let back = normalize(&frame(SensorRotation::Rotate90), CameraPosition::Back).unwrap();
        assert_eq!((back.width, back.height), (1, 2));
        // Clockwise: the left column becomes the top row
        assert_eq!(px(&back.image, 0, 0), [255, 0, 0]);

        let front = normalize(&frame(SensorRotation::Rotate90), CameraPosition::Front).unwrap();
        assert_eq!((front.width, front.height), (1, 2));
        assert_eq!(px(&front.image, 0, 0), [255, 0, 0]);
    }

    #[test]
    fn test_front_quarter_turn_mirrors_upright_image() {
        // 2x2 frame so the left/right mirror of the upright image is observable
        let data = [RED, BLUE, BLUE, BLUE].concat();
        let frame = CameraFrame::from_rgba(2, 2, data, SensorRotation::Rotate90);

        let back = normalize(&frame, CameraPosition::Back).unwrap();
        let front = normalize(&frame, CameraPosition::Front).unwrap();

        // Upright back image has red at top-right; front mirrors it to top-left
        assert_eq!(px(&back.image, 1, 0), [255, 0, 0]);
        assert_eq!(px(&front.image, 0, 0), [255, 0, 0]);
        assert_eq!(px(&front.image, 1, 0), [0, 0, 255]);
    }

    #[test]
    fn test_padded_stride() {
        let mut data = [RED, BLUE].concat();
        data.extend_from_slice(&[0; 8]);
        data.extend([BLUE, RED].concat());
        let mut frame = CameraFrame::from_rgba(2, 2, data, SensorRotation::None);
        frame.stride = 16;

        let out = normalize(&frame, CameraPosition::Back).unwrap();
        assert_eq!(px(&out.image, 0, 1), [0, 0, 255]);
        assert_eq!(px(&out.image, 1, 1), [255, 0, 0]);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let frame = CameraFrame::from_rgba(4, 4, vec![0; 8], SensorRotation::None);
        assert!(matches!(
            normalize(&frame, CameraPosition::Back),
            Err(PhotoError::CaptureFailed(_))
        ));
    }
}
