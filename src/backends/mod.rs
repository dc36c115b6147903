// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for capture hardware
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Session task (app)                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │  DeviceSessionManager                        │
//! │     │                                        │
//! │     └── dyn CaptureDevice                    │
//! │            └── PipeWireCaptureDevice         │
//! │                 (pipewiresrc + GStreamer)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`camera`]: capture device trait, configuration transactions and the
//!   PipeWire implementation

pub mod camera;
