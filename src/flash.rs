// SPDX-License-Identifier: GPL-3.0-only

//! Torch LEDs and display backlight via Linux sysfs
//!
//! Flash LEDs are exposed at `/sys/class/leds/*:flash`. We use torch mode
//! (brightness file) which is group-writable by `feedbackd`, avoiding the
//! root-only `flash_strobe`/`flash_brightness` interface.
//!
//! The display backlight at `/sys/class/backlight/*` drives the simulated
//! front-camera illumination.

use crate::controls::DisplayBrightness;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const LEDS_DIR: &str = "/sys/class/leds";
const BACKLIGHT_DIR: &str = "/sys/class/backlight";

/// A flash LED device discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Human-readable name (directory basename)
    name: String,
}

impl FlashDevice {
    /// Writable `*:flash` LEDs on this system
    pub fn discover() -> Vec<FlashDevice> {
        FlashHardware::detect().devices
    }

    /// Get the device name (e.g. "white:flash")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set raw brightness value (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    /// Turn off the LED
    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at a fraction of max brightness (0.0 = off, 1.0 = full)
    pub fn torch(&self, intensity: f32) -> io::Result<()> {
        let clamped = intensity.clamp(0.0, 1.0);
        let value = (clamped * self.max_brightness as f32).round() as u32;
        self.set_brightness(value)
    }
}

/// Result of hardware flash detection.
///
/// Separates "hardware exists" from "we can control it" so the user gets a
/// permission hint instead of a silently missing torch.
pub struct FlashHardware {
    /// Devices we can actually control (writable)
    pub devices: Vec<FlashDevice>,
    /// User-facing error if hardware was found but not writable
    pub permission_error: Option<String>,
}

impl FlashHardware {
    /// Scan `/sys/class/leds/` for `*:flash` entries.
    pub fn detect() -> FlashHardware {
        Self::detect_in(Path::new(LEDS_DIR))
    }

    /// Scan an alternative sysfs `leds` directory
    pub fn detect_in(leds_dir: &Path) -> FlashHardware {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            warn!(path = %leds_dir.display(), "Cannot read LED class directory; flash discovery skipped");
            return FlashHardware {
                devices: Vec::new(),
                permission_error: None,
            };
        };

        let mut devices = Vec::new();
        let mut permission_failures: Vec<PathBuf> = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };

            if !name_str.ends_with(":flash") {
                continue;
            }

            let led_path = entry.path();
            let brightness_path = led_path.join("brightness");
            let Some(max_brightness) = read_max_brightness(&led_path) else {
                continue;
            };

            match std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                Ok(_) => {
                    info!(name = name_str, max_brightness, "Discovered flash LED");
                    devices.push(FlashDevice {
                        path: led_path,
                        max_brightness,
                        name: name_str.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        path = %brightness_path.display(),
                        "Flash LED found but not writable"
                    );
                    permission_failures.push(brightness_path);
                }
            }
        }

        // Deterministic ordering (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));

        let permission_error = if !permission_failures.is_empty() && devices.is_empty() {
            Some(Self::build_permission_error(&permission_failures))
        } else {
            None
        };

        FlashHardware {
            devices,
            permission_error,
        }
    }

    /// Whether any controllable flash devices were found
    pub fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    /// Build a user-friendly permission error message.
    ///
    /// Detects the current username, the required group from file ownership,
    /// and whether `doas` or `sudo` is available.
    fn build_permission_error(failures: &[PathBuf]) -> String {
        let username = std::env::var("USER").unwrap_or_else(|_| "user".to_string());

        let escalation_tool = if Path::new("/usr/bin/doas").exists() {
            "doas"
        } else {
            "sudo"
        };

        let group = failures
            .first()
            .and_then(|path| {
                let gid = std::fs::metadata(path).ok()?.gid();
                let group_contents = std::fs::read_to_string("/etc/group").ok()?;
                group_contents.lines().find_map(|line| {
                    let parts: Vec<&str> = line.split(':').collect();
                    (parts.len() >= 3 && parts[2].parse::<u32>().ok() == Some(gid))
                        .then(|| parts[0].to_string())
                })
            })
            .unwrap_or_else(|| "feedbackd".to_string());

        format!(
            "Flash LEDs detected but cannot be controlled.\n\n\
             Run: {escalation_tool} adduser {username} {group}\n\n\
             Then log out and back in."
        )
    }
}

/// Turn on all flash devices at full brightness
pub fn all_on(devices: &[FlashDevice]) -> io::Result<()> {
    let mut last_error = None;
    for dev in devices {
        if let Err(e) = dev.torch(1.0) {
            warn!(device = %dev.name, error = %e, "Failed to turn on flash LED");
            last_error = Some(e);
        }
    }
    last_error.map_or(Ok(()), Err)
}

/// Turn off all flash devices
pub fn all_off(devices: &[FlashDevice]) -> io::Result<()> {
    let mut last_error = None;
    for dev in devices {
        if let Err(e) = dev.off() {
            warn!(device = %dev.name, error = %e, "Failed to turn off flash LED");
            last_error = Some(e);
        }
    }
    last_error.map_or(Ok(()), Err)
}

/// Flash LEDs shared by the torch and flash stills
#[derive(Debug, Default)]
pub struct TorchLeds {
    devices: Vec<FlashDevice>,
    lit: bool,
}

impl TorchLeds {
    pub fn new(devices: Vec<FlashDevice>) -> Self {
        Self {
            devices,
            lit: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Torch currently on
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn set(&mut self, on: bool) -> io::Result<()> {
        let result = if on {
            all_on(&self.devices)
        } else {
            all_off(&self.devices)
        };
        self.lit = on;
        result
    }

    /// Light the LEDs for the duration of `capture`
    ///
    /// A lit torch already lights the scene and stays on afterwards.
    pub fn pulse<T>(&self, settle: Duration, capture: impl FnOnce() -> T) -> io::Result<T> {
        if self.lit || self.devices.is_empty() {
            return Ok(capture());
        }

        all_on(&self.devices)?;
        std::thread::sleep(settle);
        let captured = capture();
        all_off(&self.devices)?;
        Ok(captured)
    }
}

/// Display backlight exposed at `/sys/class/backlight/<name>`
#[derive(Debug, Clone)]
pub struct Backlight {
    path: PathBuf,
    max_brightness: u32,
}

impl Backlight {
    /// First writable backlight on this system
    pub fn discover() -> Option<Backlight> {
        Self::discover_in(Path::new(BACKLIGHT_DIR))
    }

    /// First writable backlight in an alternative sysfs directory
    pub fn discover_in(dir: &Path) -> Option<Backlight> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        let backlight = entries.into_iter().find_map(|path| {
            let max_brightness = read_max_brightness(&path)?;
            std::fs::OpenOptions::new()
                .write(true)
                .open(path.join("brightness"))
                .ok()?;
            Some(Backlight {
                path,
                max_brightness,
            })
        });

        match &backlight {
            Some(b) => info!(path = %b.path.display(), max = b.max_brightness, "Discovered backlight"),
            None => debug!(path = %dir.display(), "No writable backlight"),
        }
        backlight
    }
}

impl DisplayBrightness for Backlight {
    fn brightness(&self) -> io::Result<f64> {
        let raw = std::fs::read_to_string(self.path.join("brightness"))?;
        let value: u32 = raw
            .trim()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(f64::from(value.min(self.max_brightness)) / f64::from(self.max_brightness))
    }

    fn set_brightness(&mut self, value: f64) -> io::Result<()> {
        let raw = (value.clamp(0.0, 1.0) * f64::from(self.max_brightness)).round() as u32;
        std::fs::write(self.path.join("brightness"), raw.to_string())
    }
}

fn read_max_brightness(dir: &Path) -> Option<u32> {
    let path = dir.join("max_brightness");
    match std::fs::read_to_string(&path) {
        Ok(s) => match s.trim().parse::<u32>() {
            Ok(v) if v > 0 => Some(v),
            _ => {
                warn!(path = %path.display(), "Invalid max_brightness value");
                None
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read max_brightness");
            None
        }
    }
}
