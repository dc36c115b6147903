// SPDX-License-Identifier: MPL-2.0

//! Reelcam - multi-segment camera capture and reel composition
//!
//! A recording session is split into segments whenever the camera is
//! switched; stopping hands the segments to the composition engine, which
//! produces one continuous reel. Photos are collected into a small set that
//! can be exported for publishing.
//!
//! # Architecture
//!
//! - [`app`]: session task owning the device, recorder, photos and controls
//! - [`backends`]: capture device abstraction and the PipeWire backend
//! - [`controls`]: zoom and illumination
//! - [`pipelines`]: photo capture, segment recording and composition
//! - [`config`]: user configuration
//! - [`storage`]: segment, reel and photo locations
//! - [`flash`]: sysfs flash LEDs and display backlight

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod controls;
pub mod errors;
pub mod flash;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use app::{CameraSession, Intent, SessionHandle, SessionStatus, Signal};
pub use backends::camera::CaptureDevice;
pub use config::Config;
pub use constants::{BitratePreset, ExportPreset};
pub use errors::{AppError, AppResult};
