// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use reelcam::Config;
use reelcam::backends::camera::{CameraPosition, SensorRotation};
use reelcam::constants::ExportPreset;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.pinch_sensitivity, 1.0);
    assert_eq!(config.max_recording(), Duration::from_secs(20));
    assert_eq!(config.frame_rate, 30);
    assert_eq!(config.export_preset, ExportPreset::Highest);
    assert_eq!(config.initial_position, CameraPosition::Back);
    assert_eq!(config.sensor_rotation(), SensorRotation::Rotate90);
}

#[test]
fn test_missing_file_gives_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::load_from(&tmp.path().join("config.toml"));
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(
        &path,
        "max_recording_secs = 45\ninitial_position = \"front\"\nfront_device = \"pipewire-serial-42\"\n",
    )
    .unwrap();

    let config = Config::load_from(&path);
    assert_eq!(config.max_recording_secs, 45);
    assert_eq!(config.initial_position, CameraPosition::Front);
    assert_eq!(config.camera_target(CameraPosition::Front), Some("pipewire-serial-42"));
    assert_eq!(config.camera_target(CameraPosition::Back), None);
    assert_eq!(config.frame_rate, 30);
}

#[test]
fn test_malformed_file_gives_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "frame_rate = \"fast\"\n[[[").unwrap();

    assert_eq!(Config::load_from(&path), Config::default());
}

#[test]
fn test_invalid_values_are_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "pinch_sensitivity = -2.0\nframe_rate = 0\n").unwrap();

    let config = Config::load_from(&path);
    assert_eq!(config.pinch_sensitivity, 1.0);
    assert_eq!(config.frame_rate, 30);
}

#[test]
fn test_save_then_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("config.toml");
    let config = Config {
        export_preset: ExportPreset::Low,
        work_dir: Some(tmp.path().join("work")),
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path), config);
}
