// SPDX-License-Identifier: MPL-2.0

//! Multi-segment recording and reel composition
//!
//! - [`recorder`]: segment state machine driving the capture device
//! - [`transform`]: per-segment orientation correction
//! - [`composition`]: probe, plan and export of a finished session
//! - [`gst_media`]: GStreamer probing and export
//! - [`encoder_selection`]: H.264/AAC encoder choice

pub mod composition;
pub mod encoder_selection;
pub mod gst_media;
pub mod recorder;
pub mod transform;

pub use composition::{
    AssetInfo, CompositionPlan, CompositionResult, CompositionStatus, MediaBackend,
    SegmentCompositionEngine, TimelineInstruction, build_plan,
};
pub use encoder_selection::{EncoderConfig, log_available_encoders};
pub use gst_media::GstMediaBackend;
pub use recorder::{
    RecordingState, RecordingStateMachine, Segment, SessionHandoff, StopOutcome, SwitchTicket,
};
pub use transform::{AffineTransform, FlipMethod, render_size, segment_transform};
