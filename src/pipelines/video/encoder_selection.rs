// SPDX-License-Identifier: MPL-2.0

//! Encoder selection for segment recording and reel export
//!
//! Segments and reels are always H.264 + AAC in MP4 so they can be
//! concatenated without negotiating containers. Hardware encoders are
//! preferred; x264/OpenH264 are the software fallbacks.

use crate::constants::{BitratePreset, ExportPreset};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// H.264 encoders in priority order: (element, display name, hardware)
const H264_ENCODERS: [(&str, &str, bool); 8] = [
    ("vah264enc", "VA-API H.264 (HW)", true),
    ("vaapih264enc", "VA-API H.264 (HW)", true),
    ("nvh264enc", "NVIDIA H.264 (HW)", true),
    ("qsvh264enc", "Intel QSV H.264 (HW)", true),
    ("amfh264enc", "AMD AMF H.264 (HW)", true),
    ("v4l2h264enc", "V4L2 H.264 (HW)", true),
    ("x264enc", "x264 H.264 (SW)", false),
    ("openh264enc", "OpenH264 H.264 (SW)", false),
];

/// AAC encoders in priority order
const AAC_ENCODERS: [&str; 4] = ["avenc_aac", "fdkaacenc", "voaacenc", "faac"];

const PARSER: &str = "h264parse";
const MUXER: &str = "mp4mux";

/// OpenH264 rejects frames above this pixel count (level 5.2)
pub const OPENH264_MAX_PIXELS: u32 = 3840 * 2160;

/// An encoder element present on this system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    pub element_name: &'static str,
    pub display_name: &'static str,
    pub is_hardware: bool,
    /// Index in the priority table (lower wins)
    pub priority: usize,
}

/// Encoding parameters for one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub bitrate_preset: BitratePreset,
    /// x264 `speed-preset` nick
    pub speed_preset: &'static str,
    pub audio_bitrate_bps: i32,
    /// Frame size the encoder will see
    pub width: u32,
    pub height: u32,
}

impl EncoderConfig {
    /// Live segment recording: favour latency over compression
    pub fn for_recording(bitrate_preset: BitratePreset, width: u32, height: u32) -> Self {
        Self {
            bitrate_preset,
            speed_preset: "veryfast",
            audio_bitrate_bps: 128_000,
            width,
            height,
        }
    }

    /// Offline reel export at the given quality
    pub fn for_export(preset: ExportPreset, width: u32, height: u32) -> Self {
        Self {
            bitrate_preset: preset.bitrate_preset(),
            speed_preset: preset.x264_speed_preset(),
            audio_bitrate_bps: preset.audio_bitrate_bps(),
            width,
            height,
        }
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_preset.bitrate_kbps(self.width, self.height)
    }
}

/// Elements of an H.264/AAC/MP4 encoding tail
pub struct SelectedEncoders {
    pub video: gst::Element,
    pub parser: gst::Element,
    /// `None` when the pipeline carries no audio
    pub audio: Option<gst::Element>,
    pub muxer: gst::Element,
    pub video_encoder_name: &'static str,
}

/// H.264 encoders available on this system, best first
pub fn enumerate_h264_encoders() -> Vec<EncoderInfo> {
    if gst::init().is_err() {
        return Vec::new();
    }

    H264_ENCODERS
        .iter()
        .enumerate()
        .filter(|(_, (name, _, _))| gst::ElementFactory::find(name).is_some())
        .map(|(priority, (element_name, display_name, is_hardware))| EncoderInfo {
            element_name,
            display_name,
            is_hardware: *is_hardware,
            priority,
        })
        .collect()
}

/// Build the encoder tail for `config`
///
/// OpenH264 is skipped for frames it cannot encode.
pub fn select_encoders(config: &EncoderConfig, with_audio: bool) -> Result<SelectedEncoders, String> {
    gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

    let pixels = config.width.saturating_mul(config.height);
    let (name, video) = H264_ENCODERS
        .iter()
        .filter(|(name, _, _)| *name != "openh264enc" || pixels <= OPENH264_MAX_PIXELS)
        .find_map(|(name, _, hardware)| {
            let element = gst::ElementFactory::make(name).build().ok()?;
            info!(encoder = %name, hardware, "Selected video encoder");
            Some((*name, element))
        })
        .ok_or_else(|| {
            "No H.264 encoder available. Please install gstreamer1-plugins-ugly (x264enc) or gstreamer1-plugin-openh264"
                .to_string()
        })?;
    configure_video_encoder(&video, name, config);

    let parser = gst::ElementFactory::make(PARSER)
        .build()
        .map_err(|e| format!("Failed to create {}: {}", PARSER, e))?;
    // Segments must be seekable and carry their duration
    let muxer = gst::ElementFactory::make(MUXER)
        .property("faststart", true)
        .build()
        .map_err(|e| format!("Failed to create {}: {}", MUXER, e))?;

    let audio = if with_audio {
        Some(select_aac_encoder(config.audio_bitrate_bps)?)
    } else {
        None
    };

    Ok(SelectedEncoders {
        video,
        parser,
        audio,
        muxer,
        video_encoder_name: name,
    })
}

fn select_aac_encoder(bitrate_bps: i32) -> Result<gst::Element, String> {
    for name in AAC_ENCODERS {
        if let Ok(encoder) = gst::ElementFactory::make(name).build() {
            info!(encoder = %name, bitrate_bps, "Selected audio encoder");
            let value = audio_bitrate_value(name, bitrate_bps);
            if encoder.has_property("bitrate") {
                encoder.set_property_from_str("bitrate", &value.to_string());
            }
            return Ok(encoder);
        }
    }

    Err("No AAC encoder available. Please install gstreamer1-libav (avenc_aac) or gstreamer1-plugins-bad (voaacenc)".to_string())
}

/// Bitrate in the unit the named H.264 encoder expects
pub fn video_bitrate_value(encoder_name: &str, kbps: u32) -> u32 {
    match encoder_name {
        "openh264enc" => kbps * 1000,
        _ => kbps,
    }
}

/// Bitrate in the unit the named AAC encoder expects
pub fn audio_bitrate_value(encoder_name: &str, bps: i32) -> i32 {
    match encoder_name {
        "faac" => bps / 1000,
        _ => bps,
    }
}

fn configure_video_encoder(encoder: &gst::Element, encoder_name: &str, config: &EncoderConfig) {
    let bitrate = video_bitrate_value(encoder_name, config.bitrate_kbps());

    match encoder_name {
        "x264enc" => {
            encoder.set_property_from_str("speed-preset", config.speed_preset);
            encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property("bitrate", bitrate);
            debug!(preset = config.speed_preset, bitrate, "Configured x264enc");
        }
        "openh264enc" => {
            encoder.set_property_from_str("rate-control", "bitrate");
            encoder.set_property("bitrate", bitrate);
            encoder.set_property_from_str("usage-type", "camera");
            debug!(bitrate_bps = bitrate, "Configured openh264enc");
        }
        "vaapih264enc" | "vah264enc" | "amfh264enc" => {
            encoder.set_property_from_str("rate-control", "cbr");
            encoder.set_property("bitrate", bitrate);
        }
        "nvh264enc" => {
            encoder.set_property("bitrate", bitrate);
            encoder.set_property_from_str("rc-mode", "vbr");
        }
        "qsvh264enc" => {
            encoder.set_property("bitrate", bitrate);
        }
        _ => {
            warn!(encoder = encoder_name, "Using encoder defaults");
        }
    }
}

/// Log every H.264 encoder found, for `reelcam probe`
pub fn log_available_encoders() {
    let encoders = enumerate_h264_encoders();
    if encoders.is_empty() {
        warn!("No H.264 encoders found");
    }
    for encoder in &encoders {
        info!(
            encoder = encoder.element_name,
            name = encoder.display_name,
            hardware = encoder.is_hardware,
            "Available encoder"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_encoders_ranked_first() {
        let first_software = H264_ENCODERS.iter().position(|(_, _, hw)| !hw).unwrap();
        assert!(H264_ENCODERS[..first_software].iter().all(|(_, _, hw)| *hw));
        assert!(H264_ENCODERS[first_software..].iter().all(|(_, _, hw)| !hw));
    }

    #[test]
    fn test_export_config_follows_preset() {
        let high = EncoderConfig::for_export(ExportPreset::Highest, 1080, 1920);
        let low = EncoderConfig::for_export(ExportPreset::Low, 1080, 1920);
        assert_eq!(high.bitrate_kbps(), 16_000);
        assert_eq!(low.bitrate_kbps(), 4_000);
        assert_eq!(high.speed_preset, "slow");
        assert!(low.audio_bitrate_bps < high.audio_bitrate_bps);
    }

    #[test]
    fn test_bitrate_units_per_encoder() {
        assert_eq!(video_bitrate_value("x264enc", 8_000), 8_000);
        assert_eq!(video_bitrate_value("openh264enc", 8_000), 8_000_000);
        assert_eq!(audio_bitrate_value("avenc_aac", 128_000), 128_000);
        assert_eq!(audio_bitrate_value("faac", 128_000), 128);
    }
}
