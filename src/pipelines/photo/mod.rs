// SPDX-License-Identifier: MPL-2.0

//! Still photo capture
//!
//! ```text
//! DeviceSessionManager → capture_still → normalize → PhotoSet (≤ 5)
//!                                                       ↓ export
//!                                                    JPEG files
//! ```
//!
//! Capture runs on the session owner; only the export to disk is moved off
//! the interactive path.

pub mod encoding;
pub mod processing;

pub use encoding::{EncodingQuality, PhotoEncoder};
pub use processing::{ProcessedImage, normalize};

use crate::backends::camera::DeviceSessionManager;
use crate::backends::camera::types::{CameraPosition, StillSettings};
use crate::constants::MAX_PHOTOS;
use crate::controls::IlluminationMode;
use crate::errors::PhotoError;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One normalized still
#[derive(Debug, Clone)]
pub struct Photo {
    pub image: ProcessedImage,
    pub position: CameraPosition,
    pub captured_at: DateTime<Local>,
}

/// Capacity-bounded, ordered set of stills
#[derive(Debug, Clone)]
pub struct PhotoSet {
    photos: Vec<Photo>,
    capacity: usize,
}

impl PhotoSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            photos: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.photos.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    fn push(&mut self, photo: Photo) -> Result<usize, PhotoError> {
        if self.is_full() {
            return Err(PhotoError::LimitReached);
        }
        self.photos.push(photo);
        Ok(self.photos.len() - 1)
    }

    fn pop(&mut self) -> Option<Photo> {
        self.photos.pop()
    }

    fn clear(&mut self) {
        self.photos.clear();
    }

    /// Encode every still as JPEG into `dir`, in capture order
    pub fn export(&self, dir: &Path, quality: EncodingQuality) -> Result<Vec<PathBuf>, PhotoError> {
        std::fs::create_dir_all(dir)?;
        let encoder = PhotoEncoder::new(quality);

        self.photos
            .iter()
            .enumerate()
            .map(|(index, photo)| {
                let encoded = encoder.encode(&photo.image)?;
                encoder.save(&encoded, dir, index + 1)
            })
            .collect()
    }
}

impl Default for PhotoSet {
    fn default() -> Self {
        Self::new(MAX_PHOTOS)
    }
}

/// Outcome of removing the most recent photo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Photos remain
    Removed { remaining: usize },
    /// The set is now empty ("no photos taken")
    Emptied,
    /// The set was already empty
    NothingToRemove,
}

/// Captures discrete, orientation-normalized stills
#[derive(Debug, Default)]
pub struct PhotoCaptureController {
    photos: PhotoSet,
}

impl PhotoCaptureController {
    pub fn new(capacity: usize) -> Self {
        Self {
            photos: PhotoSet::new(capacity),
        }
    }

    pub fn photos(&self) -> &PhotoSet {
        &self.photos
    }

    /// Capture one still and append it; returns its index in the set
    ///
    /// A full set is rejected before the device is touched. A failed capture
    /// leaves the set unchanged.
    pub fn capture(
        &mut self,
        device: &mut DeviceSessionManager,
        illumination: IlluminationMode,
    ) -> Result<usize, PhotoError> {
        if self.photos.is_full() {
            warn!(count = self.photos.len(), "Photo limit reached");
            return Err(PhotoError::LimitReached);
        }

        let position = device.position();
        let settings = StillSettings {
            flash: illumination == IlluminationMode::On
                && position == CameraPosition::Back
                && device.supports_flash(),
        };

        let frame = device
            .capture_still(settings)
            .map_err(|e| PhotoError::CaptureFailed(e.to_string()))?;
        let image = normalize(&frame, position)?;

        let index = self.photos.push(Photo {
            image,
            position,
            captured_at: Local::now(),
        })?;
        info!(%position, index, flash = settings.flash, "Photo captured");
        Ok(index)
    }

    /// Drop the most recent still
    pub fn remove_last(&mut self) -> RemoveOutcome {
        match self.photos.pop() {
            None => RemoveOutcome::NothingToRemove,
            Some(_) if self.photos.is_empty() => RemoveOutcome::Emptied,
            Some(_) => RemoveOutcome::Removed {
                remaining: self.photos.len(),
            },
        }
    }

    pub fn clear(&mut self) {
        self.photos.clear();
    }
}
