// SPDX-License-Identifier: MPL-2.0

//! Error types for capture, recording, photo and composition

use crate::backends::camera::types::{BackendError, CameraPosition};
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Capture device errors
    Camera(CameraError),
    /// Recording state machine errors
    Recording(RecordingError),
    /// Still capture errors
    Photo(PhotoError),
    /// Composition / export errors
    Composition(CompositionError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Capture device errors
#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    /// Camera or microphone access denied or restricted
    PermissionDenied,
    /// No capture device exists for the requested position
    DeviceUnavailable(CameraPosition),
    /// The session refused the video or audio input
    InputRejected(String),
    /// A configuration transaction is already open
    ConfigurationInProgress,
    /// Device backend failure
    Backend(BackendError),
}

/// Recording state machine errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingError {
    /// Start requested while a segment is open
    AlreadyRecording,
    /// Stop or switch requested with no open segment
    NotRecording,
    /// Reset requested while the hardware is still recording
    ResetWhileRecording,
    /// Device reconfiguration failed between sealing and reopening
    SwitchInterrupted(String),
    /// A single segment could not be opened or sealed
    CaptureFailed(String),
    /// The session already used its whole recording budget
    DurationLimitReached,
}

/// Photo capture errors
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoError {
    /// The photo set is full
    LimitReached,
    /// Frame capture failed
    CaptureFailed(String),
    /// Encoding failed
    EncodingFailed(String),
    /// Save failed
    SaveFailed(String),
}

/// Composition errors
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionError {
    /// Nothing was handed over
    NoSegments,
    /// Every segment was skipped
    NoReadableSegments,
    /// A segment file could not be probed
    AssetUnreadable(String),
    /// The export stage produced no output
    ExportFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Composition(e) => write!(f, "Composition error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied => write!(f, "Camera or microphone access denied"),
            CameraError::DeviceUnavailable(position) => {
                write!(f, "No {} camera available", position)
            }
            CameraError::InputRejected(msg) => write!(f, "Input rejected: {}", msg),
            CameraError::ConfigurationInProgress => {
                write!(f, "A configuration transaction is already open")
            }
            CameraError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::NotRecording => write!(f, "No recording in progress"),
            RecordingError::ResetWhileRecording => {
                write!(f, "Cannot reset while recording; stop first")
            }
            RecordingError::SwitchInterrupted(msg) => {
                write!(f, "Camera switch interrupted: {}", msg)
            }
            RecordingError::CaptureFailed(msg) => write!(f, "Segment capture failed: {}", msg),
            RecordingError::DurationLimitReached => write!(f, "Maximum recording duration reached"),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::LimitReached => write!(f, "Photo limit reached"),
            PhotoError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl fmt::Display for CompositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionError::NoSegments => write!(f, "No segments to compose"),
            CompositionError::NoReadableSegments => write!(f, "No readable segments"),
            CompositionError::AssetUnreadable(msg) => write!(f, "Unreadable asset: {}", msg),
            CompositionError::ExportFailed(msg) => write!(f, "Export failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for PhotoError {}
impl std::error::Error for CompositionError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<CompositionError> for AppError {
    fn from(err: CompositionError) -> Self {
        AppError::Composition(err)
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        CameraError::Backend(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(CameraError::Backend(err))
    }
}

// Conversions for I/O errors
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_errors_wrap_into_app_error() {
        let err: AppError = PhotoError::LimitReached.into();
        assert_eq!(err, AppError::Photo(PhotoError::LimitReached));
        assert_eq!(err.to_string(), "Photo error: Photo limit reached");
    }

    #[test]
    fn test_backend_error_is_camera_error() {
        let err: AppError = BackendError::RecordingInProgress.into();
        assert!(matches!(
            err,
            AppError::Camera(CameraError::Backend(BackendError::RecordingInProgress))
        ));
    }

    #[test]
    fn test_device_unavailable_names_position() {
        let msg = CameraError::DeviceUnavailable(CameraPosition::Front).to_string();
        assert_eq!(msg, "No front camera available");
    }
}
