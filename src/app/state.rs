// SPDX-License-Identifier: GPL-3.0-only

//! Messages exchanged with the camera session task

use crate::backends::camera::types::CameraPosition;
use crate::controls::IlluminationMode;
use crate::pipelines::video::{CompositionResult, RecordingState};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;

/// Intents issued by the UI layer
#[derive(Debug)]
pub enum Intent {
    // ===== Recording =====
    StartRecording,
    StopRecording,
    SwitchCamera,

    // ===== Zoom / illumination =====
    PinchChanged(f64),
    PinchEnded,
    SetFlash(IlluminationMode),

    // ===== Photos =====
    CapturePhoto,
    RemoveLastPhoto,
    ExportPhotos,

    // ===== Session =====
    Reset,
    SetPreviewActive(bool),
    QueryStatus(oneshot::Sender<SessionStatus>),
    Shutdown,
}

/// Signals emitted back to the UI layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    PreviewReady {
        position: CameraPosition,
    },
    PreviewStopped,
    /// Terminal for this session; access can only be granted in system settings
    PermissionDenied,
    RecordingStarted {
        position: CameraPosition,
        remaining: Duration,
    },
    RecordingStopped {
        segments: usize,
        /// Stopped because the recording budget ran out
        auto: bool,
    },
    SegmentSealed {
        count: usize,
    },
    CameraSwitched {
        position: CameraPosition,
    },
    ZoomChanged {
        factor: f64,
    },
    CompositionStarted {
        segments: usize,
    },
    CompositionFinished {
        result: CompositionResult,
    },
    PhotoCaptured {
        index: usize,
    },
    PhotoLimitReached,
    PhotoRemoved {
        remaining: usize,
    },
    NoPhotosTaken,
    PhotosExported {
        paths: Vec<PathBuf>,
    },
    SessionReset,
    Error {
        message: String,
    },
}

impl Signal {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Signal::Error {
            message: err.to_string(),
        }
    }
}

/// Serializable view of [`RecordingState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RecorderPhase {
    Idle,
    Recording {
        position: CameraPosition,
        order: u32,
    },
    Sealing {
        from: CameraPosition,
        to: CameraPosition,
    },
}

impl From<&RecordingState> for RecorderPhase {
    fn from(state: &RecordingState) -> Self {
        match state {
            RecordingState::Idle => RecorderPhase::Idle,
            RecordingState::Recording {
                position, order, ..
            } => RecorderPhase::Recording {
                position: *position,
                order: *order,
            },
            RecordingState::Sealing { from, to } => RecorderPhase::Sealing {
                from: *from,
                to: *to,
            },
        }
    }
}

/// Snapshot of the session for status queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub position: CameraPosition,
    pub recorder: RecorderPhase,
    pub segment_count: usize,
    pub photo_count: usize,
    pub zoom: f64,
    pub illumination: IlluminationMode,
    pub preview_running: bool,
    pub compositions_in_flight: usize,
    pub idle_for_mode_switch: bool,
}
