// SPDX-License-Identifier: MPL-2.0

//! Multi-segment recording state machine
//!
//! ```text
//!            start                    switch (seal)
//!   Idle ───────────▶ Recording(p) ───────────────▶ Sealing(p → p')
//!    ▲                  │    ▲                          │
//!    │   terminal stop  │    └──── resume (new segment) ┘
//!    └──────────────────┘            after reconfigure
//! ```
//!
//! Segments sealed on a camera switch stay in the session. Only the terminal
//! stop hands the ordered list over for composition, exactly once per session.

use crate::backends::camera::DeviceSessionManager;
use crate::backends::camera::types::CameraPosition;
use crate::errors::RecordingError;
use crate::storage::MediaStorage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// One continuously recorded clip from a single camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Sealed file
    pub location: PathBuf,
    /// Camera the clip was recorded with
    pub position: CameraPosition,
    /// Recording order within the session, starting at 0
    pub order: u32,
    /// Wall-clock time the segment was open
    pub recorded_for: Duration,
}

/// Recorder state
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingState {
    /// No open segment
    Idle,
    /// A segment is being written
    Recording {
        position: CameraPosition,
        order: u32,
        location: PathBuf,
        started_at: Instant,
    },
    /// Segment sealed for a camera switch; waiting for the device
    Sealing {
        from: CameraPosition,
        to: CameraPosition,
    },
}

/// Proof that the open segment was sealed for a camera switch
///
/// Only [`RecordingStateMachine::seal_for_switch`] (or a retry of a pending
/// switch) creates one, and [`DeviceSessionManager::reconfigure_sealed`]
/// requires it.
#[derive(Debug)]
pub struct SwitchTicket {
    from: CameraPosition,
    to: CameraPosition,
}

impl SwitchTicket {
    /// Position the device is switching away from
    pub fn source(&self) -> CameraPosition {
        self.from
    }

    /// Position the device has to be reconfigured for
    pub fn target(&self) -> CameraPosition {
        self.to
    }
}

/// Segments of one session, handed to composition after the terminal stop
#[derive(Debug, Clone)]
pub struct SessionHandoff {
    pub session_id: Uuid,
    /// Immutable snapshot, in recording order
    pub segments: Arc<[Segment]>,
    pub switch_count: u32,
}

/// Result of a terminal stop
#[derive(Debug)]
pub struct StopOutcome {
    /// Present when at least one segment was sealed during the session
    pub handoff: Option<SessionHandoff>,
    /// The last segment could not be sealed; earlier segments are unaffected
    pub seal_error: Option<RecordingError>,
}

#[derive(Debug)]
struct RecordingSession {
    id: Uuid,
    segments: Vec<Segment>,
    next_order: u32,
    switch_count: u32,
}

impl RecordingSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            segments: Vec::new(),
            next_order: 0,
            switch_count: 0,
        }
    }

    fn sealed_duration(&self) -> Duration {
        self.segments.iter().map(|s| s.recorded_for).sum()
    }
}

/// Authoritative recording state: idle / recording / between segments
#[derive(Debug)]
pub struct RecordingStateMachine {
    state: RecordingState,
    session: Option<RecordingSession>,
    storage: MediaStorage,
    max_duration: Duration,
}

impl RecordingStateMachine {
    pub fn new(storage: MediaStorage, max_duration: Duration) -> Self {
        Self {
            state: RecordingState::Idle,
            session: None,
            storage,
            max_duration,
        }
    }

    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    /// A segment is open
    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecordingState::Recording { .. })
    }

    /// Between segments of a camera switch
    pub fn is_sealing(&self) -> bool {
        matches!(self.state, RecordingState::Sealing { .. })
    }

    /// Recording or sealing: the session has not been terminated
    pub fn is_active(&self) -> bool {
        !matches!(self.state, RecordingState::Idle)
    }

    /// Sealed segments of the current session
    pub fn segments(&self) -> &[Segment] {
        self.session
            .as_ref()
            .map(|s| s.segments.as_slice())
            .unwrap_or(&[])
    }

    pub fn segment_count(&self) -> usize {
        self.segments().len()
    }

    /// Camera switches performed while recording in the current session
    pub fn switch_count(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.switch_count)
    }

    /// Footage recorded so far, including the open segment
    pub fn recorded_duration(&self) -> Duration {
        let sealed = self
            .session
            .as_ref()
            .map_or(Duration::ZERO, RecordingSession::sealed_duration);

        match &self.state {
            RecordingState::Recording { started_at, .. } => sealed + started_at.elapsed(),
            _ => sealed,
        }
    }

    /// Recording budget left for this session
    pub fn remaining_duration(&self) -> Duration {
        self.max_duration.saturating_sub(self.recorded_duration())
    }

    /// `Idle → Recording(p)` with `p` the device's configured position
    pub fn start(&mut self, device: &mut DeviceSessionManager) -> Result<(), RecordingError> {
        if self.is_active() {
            return Err(RecordingError::AlreadyRecording);
        }
        if self.remaining_duration().is_zero() {
            return Err(RecordingError::DurationLimitReached);
        }

        self.open_segment(device.position(), device)?;
        Ok(())
    }

    /// Terminal stop: seal the open segment and hand the session over
    pub fn stop(&mut self, device: &mut DeviceSessionManager) -> Result<StopOutcome, RecordingError> {
        let seal_error = match std::mem::replace(&mut self.state, RecordingState::Idle) {
            RecordingState::Idle => return Err(RecordingError::NotRecording),
            RecordingState::Recording {
                position,
                order,
                started_at,
                ..
            } => self.seal(device, position, order, started_at).err(),
            RecordingState::Sealing { from, to } => {
                info!(%from, %to, "Stopping during an interrupted switch");
                None
            }
        };

        let handoff = self
            .session
            .take()
            .filter(|session| !session.segments.is_empty())
            .map(|session| SessionHandoff {
                session_id: session.id,
                segments: Arc::from(session.segments),
                switch_count: session.switch_count,
            });

        match &handoff {
            Some(h) => info!(
                session = %h.session_id,
                segments = h.segments.len(),
                switches = h.switch_count,
                "Recording session finished"
            ),
            None => warn!("Recording session finished without any sealed segment"),
        }

        Ok(StopOutcome {
            handoff,
            seal_error,
        })
    }

    /// `Recording(p) → Sealing(p → to)`: seal without triggering composition
    ///
    /// If sealing fails the recorder still moves to `Sealing` (the hardware has
    /// stopped writing) and the error is returned.
    pub fn seal_for_switch(
        &mut self,
        device: &mut DeviceSessionManager,
        to: CameraPosition,
    ) -> Result<SwitchTicket, RecordingError> {
        let (from, order, started_at) = match &self.state {
            RecordingState::Recording {
                position,
                order,
                started_at,
                ..
            } => (*position, *order, *started_at),
            _ => return Err(RecordingError::NotRecording),
        };

        self.state = RecordingState::Sealing { from, to };
        self.seal(device, from, order, started_at)?;

        if let Some(session) = self.session.as_mut() {
            session.switch_count += 1;
        }
        info!(%from, %to, segments = self.segment_count(), "Segment sealed for camera switch");

        Ok(SwitchTicket { from, to })
    }

    /// Re-issue the ticket of a switch whose reconfiguration failed
    pub(crate) fn pending_switch(&self) -> Option<SwitchTicket> {
        match self.state {
            RecordingState::Sealing { from, to } => Some(SwitchTicket { from, to }),
            _ => None,
        }
    }

    /// `Sealing → Recording(to)`: open a new segment on the reconfigured device
    pub fn resume_after_switch(
        &mut self,
        ticket: SwitchTicket,
        device: &mut DeviceSessionManager,
    ) -> Result<(), RecordingError> {
        match self.state {
            RecordingState::Sealing { to, .. } if to == ticket.to => {}
            _ => return Err(RecordingError::NotRecording),
        }

        if device.position() != ticket.to || !device.is_configured() {
            return Err(RecordingError::SwitchInterrupted(format!(
                "device is not configured for the {} camera",
                ticket.to
            )));
        }

        self.open_segment(ticket.to, device)
    }

    /// Discard all segments and return to `Idle`
    ///
    /// Refused while a segment is open: the hardware recording must be stopped
    /// first.
    pub fn reset(&mut self) -> Result<Option<Uuid>, RecordingError> {
        if self.is_recording() {
            error!("Reset requested while recording");
            return Err(RecordingError::ResetWhileRecording);
        }

        self.state = RecordingState::Idle;
        let discarded = self.session.take().map(|s| s.id);
        info!(session = ?discarded, "Recorder reset");
        Ok(discarded)
    }

    fn open_segment(
        &mut self,
        position: CameraPosition,
        device: &mut DeviceSessionManager,
    ) -> Result<(), RecordingError> {
        let session = self.session.get_or_insert_with(RecordingSession::new);
        let order = session.next_order;
        let location = self
            .storage
            .segment_path(session.id, order)
            .map_err(|e| RecordingError::CaptureFailed(e.to_string()))?;

        device
            .start_segment(&location)
            .map_err(|e| RecordingError::CaptureFailed(e.to_string()))?;

        session.next_order += 1;
        info!(%position, order, path = %location.display(), "Segment opened");

        self.state = RecordingState::Recording {
            position,
            order,
            location,
            started_at: Instant::now(),
        };
        Ok(())
    }

    fn seal(
        &mut self,
        device: &mut DeviceSessionManager,
        position: CameraPosition,
        order: u32,
        started_at: Instant,
    ) -> Result<(), RecordingError> {
        let location = device.seal_segment().map_err(|e| {
            error!(error = %e, order, "Failed to seal segment");
            RecordingError::CaptureFailed(e.to_string())
        })?;

        let segment = Segment {
            location,
            position,
            order,
            recorded_for: started_at.elapsed(),
        };
        info!(
            %position,
            order,
            duration_ms = segment.recorded_for.as_millis() as u64,
            "Segment sealed"
        );

        self.session
            .get_or_insert_with(RecordingSession::new)
            .segments
            .push(segment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::test_support::{FakeDevice, FakeDeviceLog};
    use std::sync::Mutex;

    fn setup() -> (
        DeviceSessionManager,
        RecordingStateMachine,
        Arc<Mutex<FakeDeviceLog>>,
        tempfile::TempDir,
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let (device, log) = FakeDevice::new();
        let mut manager = DeviceSessionManager::new(Box::new(device), CameraPosition::Back);
        manager.configure_session(CameraPosition::Back).unwrap();
        let recorder =
            RecordingStateMachine::new(MediaStorage::new(tmp.path()), Duration::from_secs(20));
        (manager, recorder, log, tmp)
    }

    #[test]
    fn test_start_stop_hands_over_one_segment() {
        let (mut dev, mut rec, _log, _tmp) = setup();

        rec.start(&mut dev).unwrap();
        assert!(rec.is_recording());
        assert_eq!(rec.start(&mut dev), Err(RecordingError::AlreadyRecording));

        let outcome = rec.stop(&mut dev).unwrap();
        let handoff = outcome.handoff.unwrap();
        assert_eq!(handoff.segments.len(), 1);
        assert_eq!(handoff.segments[0].position, CameraPosition::Back);
        assert_eq!(handoff.switch_count, 0);
        assert!(outcome.seal_error.is_none());
        assert_eq!(rec.state(), &RecordingState::Idle);
        assert_eq!(rec.segment_count(), 0);
    }

    #[test]
    fn test_stop_while_idle_is_rejected() {
        let (mut dev, mut rec, _log, _tmp) = setup();
        assert!(matches!(rec.stop(&mut dev), Err(RecordingError::NotRecording)));
    }

    #[test]
    fn test_switches_seal_before_reconfigure() {
        let (mut dev, mut rec, log, _tmp) = setup();
        log.lock().unwrap().events.clear();

        rec.start(&mut dev).unwrap();
        dev.switch_position(CameraPosition::Front, &mut rec).unwrap();
        dev.switch_position(CameraPosition::Back, &mut rec).unwrap();
        assert_eq!(rec.segment_count(), 2);
        assert_eq!(rec.switch_count(), 2);

        let handoff = rec.stop(&mut dev).unwrap().handoff.unwrap();
        let positions: Vec<_> = handoff.segments.iter().map(|s| s.position).collect();
        assert_eq!(
            positions,
            [CameraPosition::Back, CameraPosition::Front, CameraPosition::Back]
        );
        let orders: Vec<_> = handoff.segments.iter().map(|s| s.order).collect();
        assert_eq!(orders, [0, 1, 2]);

        let events = log.lock().unwrap().events.clone();
        let seal = events.iter().position(|e| e == "seal").unwrap();
        let reconfigure = events.iter().position(|e| e == "begin").unwrap();
        let reopen = events.iter().position(|e| e == "open:front").unwrap();
        assert!(seal < reconfigure && reconfigure < reopen);
    }

    #[test]
    fn test_failed_reconfiguration_stays_sealing_and_retries() {
        let (mut dev, mut rec, log, _tmp) = setup();
        rec.start(&mut dev).unwrap();

        log.lock().unwrap().missing.push(CameraPosition::Front);
        let err = dev.switch_position(CameraPosition::Front, &mut rec).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::AppError::Recording(RecordingError::SwitchInterrupted(_))
        ));
        assert!(rec.is_sealing());
        assert_eq!(rec.segment_count(), 1);

        log.lock().unwrap().missing.clear();
        dev.switch_position(CameraPosition::Front, &mut rec).unwrap();
        assert!(rec.is_recording());
        assert_eq!(dev.position(), CameraPosition::Front);
        assert_eq!(rec.segment_count(), 1);
    }

    #[test]
    fn test_failed_seal_keeps_earlier_segments() {
        let (mut dev, mut rec, log, _tmp) = setup();
        rec.start(&mut dev).unwrap();
        dev.switch_position(CameraPosition::Front, &mut rec).unwrap();

        log.lock().unwrap().fail_next_seal = true;
        let outcome = rec.stop(&mut dev).unwrap();
        assert!(matches!(
            outcome.seal_error,
            Some(RecordingError::CaptureFailed(_))
        ));
        assert_eq!(outcome.handoff.unwrap().segments.len(), 1);
    }

    #[test]
    fn test_reset_refused_while_recording() {
        let (mut dev, mut rec, _log, _tmp) = setup();
        rec.start(&mut dev).unwrap();
        assert_eq!(rec.reset(), Err(RecordingError::ResetWhileRecording));
        assert!(rec.is_recording());
    }

    #[test]
    fn test_reset_from_sealing_discards_segments() {
        let (mut dev, mut rec, log, _tmp) = setup();
        rec.start(&mut dev).unwrap();
        log.lock().unwrap().missing.push(CameraPosition::Front);
        let _ = dev.switch_position(CameraPosition::Front, &mut rec);

        assert!(rec.reset().unwrap().is_some());
        assert_eq!(rec.state(), &RecordingState::Idle);
        assert_eq!(rec.segment_count(), 0);
    }

    #[test]
    fn test_exhausted_budget_refuses_start() {
        let tmp = tempfile::tempdir().unwrap();
        let (device, _log) = FakeDevice::new();
        let mut dev = DeviceSessionManager::new(Box::new(device), CameraPosition::Back);
        dev.configure_session(CameraPosition::Back).unwrap();
        let mut rec = RecordingStateMachine::new(MediaStorage::new(tmp.path()), Duration::ZERO);

        assert_eq!(rec.start(&mut dev), Err(RecordingError::DurationLimitReached));
        assert!(!rec.is_active());
    }
}
