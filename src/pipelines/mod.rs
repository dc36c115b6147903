// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for photo and video capture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Still Frame  │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG Files  │
//! │   (RGBA)     │     │  - Upright/mirror │     │  (on export) │
//! │              │     │  - Photo set      │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Node  │ ──▶ │  Video Pipeline   │ ──▶ │   MP4 Reel   │
//! │  (PipeWire)  │     │  - Segments       │     │              │
//! │              │     │  - Composition    │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! Heavy work (encoding, probing, export) runs on blocking tasks so the
//! session actor keeps answering intents.

pub mod photo;
pub mod video;
