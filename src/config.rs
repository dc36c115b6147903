// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as TOML at `<config dir>/reelcam/config.toml`. A missing file yields
//! the defaults; a malformed file is reported and replaced by the defaults.

use crate::backends::camera::types::{CameraPosition, SensorRotation};
use crate::constants::{BitratePreset, DEFAULT_FRAME_RATE, DEFAULT_MAX_RECORDING, ExportPreset};
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::EncodingQuality;
use crate::storage::MediaStorage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const CONFIG_DIR: &str = "reelcam";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Multiplier applied to the pinch delta
    pub pinch_sensitivity: f64,
    /// Recording budget per session, summed across segments
    pub max_recording_secs: u64,
    /// Frame rate of composed reels
    pub frame_rate: u32,
    /// Reel export quality
    pub export_preset: ExportPreset,
    /// Bitrate table used for segment recording
    pub bitrate_preset: BitratePreset,
    /// Directory for segments, reels and exported photos
    pub work_dir: Option<PathBuf>,
    /// Camera selected at startup
    pub initial_position: CameraPosition,
    /// PipeWire target for the front camera (`pipewire-serial-N` or node name)
    pub front_device: Option<String>,
    /// PipeWire target for the back camera
    pub back_device: Option<String>,
    /// PipeWire target for the microphone
    pub audio_device: Option<String>,
    /// Clockwise rotation that makes sensor frames upright
    pub sensor_rotation_degrees: i32,
    /// JPEG quality of exported photos
    pub photo_quality: EncodingQuality,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pinch_sensitivity: 1.0,
            max_recording_secs: DEFAULT_MAX_RECORDING.as_secs(),
            frame_rate: DEFAULT_FRAME_RATE,
            export_preset: ExportPreset::default(),
            bitrate_preset: BitratePreset::default(),
            work_dir: None,
            initial_position: CameraPosition::Back,
            front_device: None,
            back_device: None,
            audio_device: None,
            sensor_rotation_degrees: 90,
            photo_quality: EncodingQuality::default(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
    }

    /// Load from the default location
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No config directory on this system, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => {
                    debug!("Loaded config from {:?}", path);
                    config.sanitized()
                }
                Err(e) => {
                    warn!("Failed to parse {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // Out-of-range values fall back to their defaults
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.pinch_sensitivity.is_finite() || self.pinch_sensitivity <= 0.0 {
            warn!(value = self.pinch_sensitivity, "Invalid pinch_sensitivity");
            self.pinch_sensitivity = defaults.pinch_sensitivity;
        }
        if self.frame_rate == 0 {
            warn!("Invalid frame_rate 0");
            self.frame_rate = defaults.frame_rate;
        }
        self
    }

    pub fn max_recording(&self) -> Duration {
        Duration::from_secs(self.max_recording_secs)
    }

    pub fn sensor_rotation(&self) -> SensorRotation {
        SensorRotation::from_degrees_int(self.sensor_rotation_degrees)
    }

    pub fn storage(&self) -> MediaStorage {
        match &self.work_dir {
            Some(dir) => MediaStorage::new(dir),
            None => MediaStorage::default(),
        }
    }

    /// PipeWire target configured for a camera position
    pub fn camera_target(&self, position: CameraPosition) -> Option<&str> {
        match position {
            CameraPosition::Front => self.front_device.as_deref(),
            CameraPosition::Back => self.back_device.as_deref(),
        }
    }
}
