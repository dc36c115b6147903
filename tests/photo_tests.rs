// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for still capture and photo export

mod common;

use common::FakeDevice;
use reelcam::backends::camera::{CameraPosition, DeviceSessionManager};
use reelcam::constants::MAX_PHOTOS;
use reelcam::controls::IlluminationMode;
use reelcam::errors::PhotoError;
use reelcam::pipelines::photo::{EncodingQuality, PhotoCaptureController, RemoveOutcome};

fn configured(position: CameraPosition) -> DeviceSessionManager {
    let (fake, _log) = FakeDevice::new();
    let mut device = DeviceSessionManager::new(Box::new(fake), position);
    device.configure_session(position).unwrap();
    device
}

#[test]
fn test_sixth_photo_is_refused() {
    let mut device = configured(CameraPosition::Back);
    let mut controller = PhotoCaptureController::default();

    for expected in 0..MAX_PHOTOS {
        assert_eq!(controller.capture(&mut device, IlluminationMode::Off), Ok(expected));
    }
    assert_eq!(
        controller.capture(&mut device, IlluminationMode::Off),
        Err(PhotoError::LimitReached)
    );
    assert_eq!(controller.photos().len(), MAX_PHOTOS);
}

#[test]
fn test_remove_down_to_empty() {
    let mut device = configured(CameraPosition::Front);
    let mut controller = PhotoCaptureController::default();
    controller.capture(&mut device, IlluminationMode::Off).unwrap();
    controller.capture(&mut device, IlluminationMode::Off).unwrap();

    assert_eq!(controller.remove_last(), RemoveOutcome::Removed { remaining: 1 });
    assert_eq!(controller.remove_last(), RemoveOutcome::Emptied);
    assert_eq!(controller.remove_last(), RemoveOutcome::NothingToRemove);
}

#[test]
fn test_export_writes_jpegs_in_capture_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = PhotoCaptureController::default();

    let mut back = configured(CameraPosition::Back);
    let mut front = configured(CameraPosition::Front);
    controller.capture(&mut back, IlluminationMode::Off).unwrap();
    controller.capture(&mut front, IlluminationMode::Off).unwrap();

    let paths = controller
        .photos()
        .export(dir.path(), EncodingQuality::High)
        .unwrap();
    assert_eq!(paths.len(), 2);

    for (path, photo) in paths.iter().zip(controller.photos().photos()) {
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));

        let decoded = image::open(path).unwrap();
        assert_eq!(decoded.width(), photo.image.width);
        assert_eq!(decoded.height(), photo.image.height);
    }
}
