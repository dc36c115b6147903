// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lowest zoom factor applied to the device
pub const MIN_ZOOM: f64 = 1.0;

/// Highest zoom factor applied to the device
pub const MAX_ZOOM: f64 = 3.0;

/// Capacity of a photo set
pub const MAX_PHOTOS: usize = 5;

/// Recording budget of one session, summed across segments
pub const DEFAULT_MAX_RECORDING: Duration = Duration::from_secs(20);

/// Frame rate of composed reels
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Display brightness used for simulated front illumination
pub const MAX_BRIGHTNESS: f64 = 1.0;

/// Video encoder bitrate presets
///
/// These presets define the target bitrate for video encoding based on resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Target bitrate in kbps for a frame of the given size
    ///
    /// Portrait frames are classified by their long edge.
    pub fn bitrate_kbps(&self, width: u32, height: u32) -> u32 {
        self.bitrate_for_tier(get_resolution_tier(width.max(height)))
    }

    pub fn bitrate_for_tier(&self, tier: ResolutionTier) -> u32 {
        match (tier, self) {
            (ResolutionTier::SD, BitratePreset::Low) => 1_000,
            (ResolutionTier::SD, BitratePreset::Medium) => 2_000,
            (ResolutionTier::SD, BitratePreset::High) => 4_000,
            (ResolutionTier::HD, BitratePreset::Low) => 2_500,
            (ResolutionTier::HD, BitratePreset::Medium) => 5_000,
            (ResolutionTier::HD, BitratePreset::High) => 10_000,
            (ResolutionTier::FullHD, BitratePreset::Low) => 4_000,
            (ResolutionTier::FullHD, BitratePreset::Medium) => 8_000,
            (ResolutionTier::FullHD, BitratePreset::High) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::Low) => 8_000,
            (ResolutionTier::TwoK, BitratePreset::Medium) => 16_000,
            (ResolutionTier::TwoK, BitratePreset::High) => 32_000,
            (ResolutionTier::FourK, BitratePreset::Low) => 15_000,
            (ResolutionTier::FourK, BitratePreset::Medium) => 30_000,
            (ResolutionTier::FourK, BitratePreset::High) => 50_000,
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// SD: 640x480 and below
    SD,
    /// HD: 1280x720
    HD,
    /// Full HD: 1920x1080
    FullHD,
    /// 2K: 2560x1440
    TwoK,
    /// 4K: 3840x2160 and above
    FourK,
}

/// Get the resolution tier for the long edge of a frame
pub fn get_resolution_tier(long_edge: u32) -> ResolutionTier {
    match long_edge {
        w if w >= 3840 => ResolutionTier::FourK,
        w if w >= 2560 => ResolutionTier::TwoK,
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Quality preset of the composed reel export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPreset {
    /// Highest available quality
    #[default]
    Highest,
    Medium,
    Low,
}

impl ExportPreset {
    /// Bitrate table used for the export encoder
    pub fn bitrate_preset(&self) -> BitratePreset {
        match self {
            ExportPreset::Highest => BitratePreset::High,
            ExportPreset::Medium => BitratePreset::Medium,
            ExportPreset::Low => BitratePreset::Low,
        }
    }

    /// x264 `speed-preset` nick
    pub fn x264_speed_preset(&self) -> &'static str {
        match self {
            ExportPreset::Highest => "slow",
            ExportPreset::Medium => "medium",
            ExportPreset::Low => "veryfast",
        }
    }

    /// AAC bitrate in bits per second
    pub fn audio_bitrate_bps(&self) -> i32 {
        match self {
            ExportPreset::Highest => 192_000,
            ExportPreset::Medium => 128_000,
            ExportPreset::Low => 96_000,
        }
    }
}

impl std::str::FromStr for ExportPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "highest" | "high" => Ok(ExportPreset::Highest),
            "medium" => Ok(ExportPreset::Medium),
            "low" => Ok(ExportPreset::Low),
            other => Err(format!("Unknown export preset '{}'", other)),
        }
    }
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Get number of threads for videoconvert based on available CPU threads
    pub fn videoconvert_threads() -> u32 {
        std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(4)
    }

    /// Pixel format delivered to the still appsink
    pub const OUTPUT_FORMAT: &str = "RGBA";

    /// Sample rate of generated silence for video-only segments
    pub const SILENCE_SAMPLE_RATE: i32 = 48_000;
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Window in which a starting pipeline may still report an error
    pub const START_ERROR_WINDOW: Duration = Duration::from_millis(500);

    /// Time allowed for a segment muxer to finish after EOS
    pub const EOS_TIMEOUT: Duration = Duration::from_secs(5);

    /// Time allowed for probing one segment
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Time allowed for a still frame to arrive after the preview started
    pub const STILL_TIMEOUT: Duration = Duration::from_secs(2);
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portrait_uses_long_edge() {
        assert_eq!(
            BitratePreset::High.bitrate_kbps(1080, 1920),
            BitratePreset::High.bitrate_kbps(1920, 1080)
        );
        assert_eq!(BitratePreset::Medium.bitrate_kbps(720, 1280), 5_000);
    }

    #[test]
    fn test_export_preset_parse() {
        assert_eq!("Highest".parse::<ExportPreset>(), Ok(ExportPreset::Highest));
        assert!("ultra".parse::<ExportPreset>().is_err());
        assert_eq!(ExportPreset::Highest.bitrate_preset(), BitratePreset::High);
    }
}
