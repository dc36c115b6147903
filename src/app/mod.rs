// SPDX-License-Identifier: GPL-3.0-only

//! Camera session task
//!
//! [`CameraSession`] is the single owner of the capture device, the recorder,
//! the photo set and the zoom/illumination controls. It runs as one tokio task:
//! intents arrive through a [`SessionHandle`], signals leave on a channel.
//! Every intent is handled to completion before the next one is read, so
//! device configuration transactions never overlap.
//!
//! Composition runs outside the session task on a [`JoinSet`]; each run gets
//! an immutable snapshot of its session's segments.

pub mod state;

pub use state::{Intent, RecorderPhase, SessionStatus, Signal};

use crate::backends::camera::types::{CameraPosition, PermissionResult};
use crate::backends::camera::{CaptureDevice, DeviceSessionManager};
use crate::config::Config;
use crate::controls::{DisplayBrightness, ZoomFlashController};
use crate::errors::{AppError, PhotoError};
use crate::pipelines::photo::{EncodingQuality, PhotoCaptureController, RemoveOutcome};
use crate::pipelines::video::{
    CompositionResult, MediaBackend, RecordingStateMachine, SegmentCompositionEngine,
};
use crate::storage::MediaStorage;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const INTENT_CAPACITY: usize = 32;

pub struct CameraSession {
    device: DeviceSessionManager,
    recorder: RecordingStateMachine,
    photos: PhotoCaptureController,
    controls: ZoomFlashController,
    engine: SegmentCompositionEngine,
    storage: MediaStorage,
    photo_quality: EncodingQuality,
    compositions: JoinSet<(Uuid, CompositionResult)>,
}

impl CameraSession {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        display: Box<dyn DisplayBrightness>,
        media: Arc<dyn MediaBackend>,
        config: &Config,
    ) -> Self {
        let storage = config.storage();
        let position = config.initial_position;

        Self {
            device: DeviceSessionManager::new(device, position),
            recorder: RecordingStateMachine::new(storage.clone(), config.max_recording()),
            photos: PhotoCaptureController::default(),
            controls: ZoomFlashController::new(display, config.pinch_sensitivity, position),
            engine: SegmentCompositionEngine::new(
                media,
                storage.clone(),
                config.export_preset,
                config.frame_rate,
            ),
            storage,
            photo_quality: config.photo_quality,
            compositions: JoinSet::new(),
        }
    }

    /// Safe to leave capture mode: nothing recorded, composing or taken
    pub fn is_idle_for_mode_switch(&self) -> bool {
        !self.recorder.is_active()
            && self.recorder.segment_count() == 0
            && self.compositions.is_empty()
            && self.photos.photos().is_empty()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            position: self.device.position(),
            recorder: RecorderPhase::from(self.recorder.state()),
            segment_count: self.recorder.segment_count(),
            photo_count: self.photos.photos().len(),
            zoom: self.controls.zoom().factor(),
            illumination: self.controls.illumination().mode(),
            preview_running: self.device.is_running(),
            compositions_in_flight: self.compositions.len(),
            idle_for_mode_switch: self.is_idle_for_mode_switch(),
        }
    }

    /// Run the session on its own task
    pub fn spawn(self) -> (SessionHandle, mpsc::Receiver<Signal>) {
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_CAPACITY);
        let (signal_tx, signal_rx) = mpsc::channel(INTENT_CAPACITY * 4);
        let task = tokio::spawn(self.run(intent_rx, signal_tx));

        (
            SessionHandle {
                intents: intent_tx,
                task,
            },
            signal_rx,
        )
    }

    async fn run(mut self, mut intents: mpsc::Receiver<Intent>, signals: mpsc::Sender<Signal>) {
        let mut out = Vec::new();
        let opened = self.open(&mut out);
        emit(&signals, &mut out).await;
        if !opened {
            info!("Camera session closed before start");
            return;
        }

        loop {
            let deadline = self.recording_deadline();
            tokio::select! {
                intent = intents.recv() => match intent {
                    None | Some(Intent::Shutdown) => break,
                    Some(Intent::QueryStatus(reply)) => self.reply_status(reply),
                    Some(intent) => self.handle(intent, &mut out),
                },
                Some(joined) = self.compositions.join_next(), if !self.compositions.is_empty() => {
                    self.composition_joined(joined, &mut out);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    info!("Recording budget exhausted");
                    self.stop_recording(true, &mut out);
                }
            }
            emit(&signals, &mut out).await;
        }

        self.shutdown(&mut out).await;
        emit(&signals, &mut out).await;
        info!("Camera session ended");
    }

    /// Permissions, initial configuration and preview
    ///
    /// Returns `false` when access was denied; the session cannot continue.
    fn open(&mut self, out: &mut Vec<Signal>) -> bool {
        if self.device.request_permissions() == PermissionResult::Denied {
            out.push(Signal::PermissionDenied);
            return false;
        }

        let position = self.device.position();
        if let Err(e) = self.device.configure_session(position) {
            error!(error = %e, %position, "Initial configuration failed");
            out.push(Signal::error(e));
            return true;
        }
        self.start_preview(out);
        true
    }

    fn handle(&mut self, intent: Intent, out: &mut Vec<Signal>) {
        debug!(?intent, "Intent");
        match intent {
            Intent::StartRecording => self.start_recording(out),
            Intent::StopRecording => self.stop_recording(false, out),
            Intent::SwitchCamera => self.switch_camera(out),
            Intent::PinchChanged(scale) => {
                match self.controls.on_pinch_changed(scale, &mut self.device) {
                    Ok(Some(factor)) => out.push(Signal::ZoomChanged { factor }),
                    Ok(None) => {}
                    Err(e) => out.push(Signal::error(e)),
                }
            }
            Intent::PinchEnded => self.controls.on_pinch_ended(),
            Intent::SetFlash(mode) => self.controls.set_illumination(mode, &mut self.device),
            Intent::CapturePhoto => self.capture_photo(out),
            Intent::RemoveLastPhoto => match self.photos.remove_last() {
                RemoveOutcome::Removed { remaining } => out.push(Signal::PhotoRemoved { remaining }),
                RemoveOutcome::Emptied | RemoveOutcome::NothingToRemove => {
                    out.push(Signal::NoPhotosTaken)
                }
            },
            Intent::ExportPhotos => self.export_photos(out),
            Intent::Reset => self.reset(out),
            Intent::SetPreviewActive(active) => self.set_preview_active(active, out),
            Intent::QueryStatus(reply) => self.reply_status(reply),
            Intent::Shutdown => {}
        }
    }

    fn reply_status(&self, reply: oneshot::Sender<SessionStatus>) {
        if reply.send(self.status()).is_err() {
            debug!("Status requester went away");
        }
    }

    /// Auto-stop instant of the open segment
    fn recording_deadline(&self) -> Option<Instant> {
        self.recorder
            .is_recording()
            .then(|| Instant::now() + self.recorder.remaining_duration())
    }

    fn start_preview(&mut self, out: &mut Vec<Signal>) {
        match self.device.start_preview() {
            Ok(()) => out.push(Signal::PreviewReady {
                position: self.device.position(),
            }),
            Err(e) => {
                warn!(error = %e, "Preview failed to start");
                out.push(Signal::error(e));
            }
        }
    }

    fn set_preview_active(&mut self, active: bool, out: &mut Vec<Signal>) {
        if active {
            self.start_preview(out);
        } else if self.recorder.is_active() {
            warn!("Preview must keep running while recording");
            out.push(Signal::error("Cannot stop the preview while recording"));
        } else {
            self.device.stop_preview();
            out.push(Signal::PreviewStopped);
        }
    }

    fn start_recording(&mut self, out: &mut Vec<Signal>) {
        if let Err(e) = self.recorder.start(&mut self.device) {
            warn!(error = %e, "Start refused");
            out.push(Signal::error(e));
            return;
        }

        self.controls.on_recording_changed(true, &mut self.device);
        out.push(Signal::RecordingStarted {
            position: self.device.position(),
            remaining: self.recorder.remaining_duration(),
        });
    }

    /// Terminal stop; composition is started here and nowhere else
    fn stop_recording(&mut self, auto: bool, out: &mut Vec<Signal>) {
        let outcome = match self.recorder.stop(&mut self.device) {
            Ok(outcome) => outcome,
            Err(e) => {
                out.push(Signal::error(e));
                return;
            }
        };
        self.controls.on_recording_changed(false, &mut self.device);

        if let Some(e) = outcome.seal_error {
            out.push(Signal::error(e));
        }

        let Some(handoff) = outcome.handoff else {
            out.push(Signal::RecordingStopped { segments: 0, auto });
            return;
        };

        let segments = handoff.segments.len();
        out.push(Signal::SegmentSealed { count: segments });
        out.push(Signal::RecordingStopped { segments, auto });

        let engine = self.engine.clone();
        let session = handoff.session_id;
        self.compositions
            .spawn(async move { (session, engine.compose(handoff.segments).await) });
        out.push(Signal::CompositionStarted { segments });
    }

    fn switch_camera(&mut self, out: &mut Vec<Signal>) {
        let from = self.device.position();
        let to = self
            .recorder
            .pending_switch()
            .map_or_else(|| from.toggled(), |ticket| ticket.target());
        let was_active = self.recorder.is_active();

        self.controls.before_position_change(&mut self.device);
        if let Err(e) = self.device.switch_position(to, &mut self.recorder) {
            warn!(error = %e, %from, %to, "Camera switch failed");
            out.push(Signal::error(&e));
            if !was_active {
                self.restore_position(from);
            }
            return;
        }

        self.controls.on_position_changed(&mut self.device);
        if was_active {
            out.push(Signal::SegmentSealed {
                count: self.recorder.segment_count(),
            });
        }
        out.push(Signal::CameraSwitched { position: to });
    }

    // Idle switch failed: fall back to the previous camera so the preview keeps running
    fn restore_position(&mut self, position: CameraPosition) {
        match self.device.configure_session(position) {
            Ok(()) => info!(%position, "Kept previous camera"),
            Err(e) => error!(error = %e, %position, "Previous camera unavailable too"),
        }
    }

    fn capture_photo(&mut self, out: &mut Vec<Signal>) {
        let mode = self.controls.illumination().mode();
        match self.photos.capture(&mut self.device, mode) {
            Ok(index) => out.push(Signal::PhotoCaptured { index }),
            Err(PhotoError::LimitReached) => out.push(Signal::PhotoLimitReached),
            Err(e) => out.push(Signal::error(e)),
        }
    }

    fn export_photos(&mut self, out: &mut Vec<Signal>) {
        let set = self.photos.photos();
        if set.is_empty() {
            out.push(Signal::NoPhotosTaken);
            return;
        }

        let exported = self
            .storage
            .photo_dir()
            .map_err(PhotoError::from)
            .and_then(|dir| set.export(&dir, self.photo_quality));
        match exported {
            Ok(paths) => out.push(Signal::PhotosExported { paths }),
            Err(e) => out.push(Signal::error(e)),
        }
    }

    fn reset(&mut self, out: &mut Vec<Signal>) {
        match self.recorder.reset() {
            Ok(discarded) => {
                if let Some(session) = discarded {
                    self.storage.discard_session(session);
                }
                self.photos.clear();
                info!("Session reset");
                out.push(Signal::SessionReset);
            }
            Err(e) => {
                warn!(error = %e, "Reset refused");
                out.push(Signal::error(AppError::from(e)));
            }
        }
    }

    fn composition_joined(
        &mut self,
        joined: Result<(Uuid, CompositionResult), JoinError>,
        out: &mut Vec<Signal>,
    ) {
        match joined {
            Ok((session, result)) => {
                if result.status.has_output() {
                    self.storage.discard_session(session);
                } else {
                    warn!(%session, "Composition produced no reel; keeping segments");
                }
                out.push(Signal::CompositionFinished { result });
            }
            Err(e) => {
                error!(error = %e, "Composition task failed");
                out.push(Signal::error(format!("Composition task failed: {}", e)));
            }
        }
    }

    /// Close the session: finish the recording, restore the display, wait for reels
    async fn shutdown(&mut self, out: &mut Vec<Signal>) {
        if self.recorder.is_active() {
            self.stop_recording(false, out);
        }
        self.controls.release(&mut self.device);
        self.device.stop_preview();

        while let Some(joined) = self.compositions.join_next().await {
            self.composition_joined(joined, out);
        }
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("device", &self.device)
            .field("recorder", &self.recorder.state())
            .field("controls", &self.controls)
            .field("compositions", &self.compositions.len())
            .finish()
    }
}

async fn emit(signals: &mpsc::Sender<Signal>, out: &mut Vec<Signal>) {
    for signal in out.drain(..) {
        debug!(?signal, "Signal");
        if signals.send(signal).await.is_err() {
            debug!("Signal receiver dropped");
        }
    }
}

/// Sends intents to a running [`CameraSession`]
#[derive(Debug)]
pub struct SessionHandle {
    intents: mpsc::Sender<Intent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, intent: Intent) -> Result<(), String> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| "Camera session has ended".to_string())
    }

    pub async fn status(&self) -> Option<SessionStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::QueryStatus(tx)).await.ok()?;
        rx.await.ok()
    }

    /// Stop the session and wait until pending reels are finished
    pub async fn shutdown(self) {
        let _ = self.intents.send(Intent::Shutdown).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "Camera session task failed");
        }
    }
}
