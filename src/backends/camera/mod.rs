// SPDX-License-Identifier: MPL-2.0

//! Capture device abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ CameraSession (app)  │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ DeviceSessionManager │  ← Exclusive owner, configuration transactions
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureDevice trait  │  ← Common interface
//! └──────────┬───────────┘
//!            │
//!            ▼
//!       ┌────────┐
//!       │PipeWire│  ← Concrete implementation
//!       └────────┘
//! ```

pub mod manager;
pub mod pipewire;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use manager::{ConfigurationTransaction, DeviceSessionManager};
pub use types::*;

use std::path::{Path, PathBuf};

/// Hardware capture session: camera + microphone inputs, movie + still outputs
///
/// Implementations are driven by a single owner ([`DeviceSessionManager`]); none
/// of the methods need to be reentrant.
pub trait CaptureDevice: Send {
    // ===== Permissions =====

    /// Current authorization for a media type
    fn authorization_status(&self, kind: MediaKind) -> AuthorizationStatus;

    /// Prompt for access; returns whether access was granted
    fn request_access(&mut self, kind: MediaKind) -> bool;

    // ===== Configuration =====

    /// Whether a camera exists at the given position
    fn has_camera(&self, position: CameraPosition) -> bool;

    /// Open a configuration transaction
    fn begin_configuration(&mut self);

    /// Apply all changes made since `begin_configuration`
    fn commit_configuration(&mut self);

    /// Detach every input
    fn remove_all_inputs(&mut self);

    /// Whether the session would accept this input
    fn can_add_input(&self, input: DeviceInput) -> bool;

    /// Attach an input
    fn add_input(&mut self, input: DeviceInput) -> BackendResult<()>;

    /// Whether an output of this kind is attached
    fn has_output(&self, kind: OutputKind) -> bool;

    /// Attach an output
    fn add_output(&mut self, kind: OutputKind) -> BackendResult<()>;

    // ===== Running =====

    /// Start the hardware session (feeds the preview)
    fn start_running(&mut self) -> BackendResult<()>;

    /// Stop the hardware session
    fn stop_running(&mut self);

    /// Whether the hardware session is running
    fn is_running(&self) -> bool;

    // ===== Movie output =====

    /// Begin writing a segment to `path`
    fn start_recording(&mut self, path: &Path) -> BackendResult<()>;

    /// Finish the open segment and return its final location
    fn stop_recording(&mut self) -> BackendResult<PathBuf>;

    /// Whether a segment is open
    fn is_recording(&self) -> bool;

    // ===== Still output =====

    /// Whether the still output can fire a flash
    fn supports_flash(&self) -> bool;

    /// Capture one still frame
    fn capture_still(&mut self, settings: StillSettings) -> BackendResult<CameraFrame>;

    // ===== Device controls =====

    /// Apply an optical zoom factor to the active camera
    fn set_zoom_factor(&mut self, factor: f64) -> BackendResult<()>;

    /// Whether the active camera has a torch
    fn has_torch(&self) -> bool;

    /// Switch the torch on or off
    ///
    /// Switching off is accepted on any camera and darkens all flash LEDs.
    fn set_torch(&mut self, on: bool) -> BackendResult<()>;
}
