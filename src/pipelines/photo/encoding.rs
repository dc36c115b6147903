// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding
//!
//! Normalized stills are handed to the publish pipeline as JPEG files.

use super::processing::ProcessedImage;
use crate::errors::PhotoError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extension of encoded photos
pub const PHOTO_EXTENSION: &str = "jpg";

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// JPEG photo encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoEncoder {
    quality: EncodingQuality,
}

impl PhotoEncoder {
    pub fn new(quality: EncodingQuality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> EncodingQuality {
        self.quality
    }

    /// Encode an upright still as JPEG
    pub fn encode(&self, processed: &ProcessedImage) -> Result<EncodedImage, PhotoError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut cursor,
            self.quality.jpeg_quality(),
        );
        encoder
            .encode(
                processed.image.as_raw(),
                processed.width,
                processed.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

        debug!(size = buffer.len(), "Encoding complete");
        Ok(EncodedImage {
            data: buffer,
            width: processed.width,
            height: processed.height,
        })
    }

    /// Write an encoded photo as `IMG_<index>.jpg` inside `output_dir`
    pub fn save(
        &self,
        encoded: &EncodedImage,
        output_dir: &Path,
        index: usize,
    ) -> Result<PathBuf, PhotoError> {
        let filepath = output_dir.join(format!("IMG_{:02}.{}", index, PHOTO_EXTENSION));
        std::fs::write(&filepath, &encoded.data)?;

        info!(
            path = %filepath.display(),
            width = encoded.width,
            height = encoded.height,
            "Photo saved"
        );
        Ok(filepath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_jpeg_quality_values() {
        assert_eq!(EncodingQuality::Low.jpeg_quality(), 60);
        assert_eq!(EncodingQuality::Maximum.jpeg_quality(), 98);
        assert_eq!(EncodingQuality::default(), EncodingQuality::High);
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let image = RgbImage::from_pixel(8, 4, image::Rgb([200, 10, 10]));
        let processed = ProcessedImage {
            image,
            width: 8,
            height: 4,
        };

        let encoded = PhotoEncoder::default().encode(&processed).unwrap();
        assert_eq!(&encoded.data[..2], &[0xFF, 0xD8]);

        let tmp = tempfile::tempdir().unwrap();
        let path = PhotoEncoder::default().save(&encoded, tmp.path(), 1).unwrap();
        assert!(path.ends_with("IMG_01.jpg"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
    }
}
