// SPDX-License-Identifier: MPL-2.0

//! Segment composition
//!
//! ```text
//! Arc<[Segment]> ──probe (concurrent)──▶ AssetInfo per segment
//!                                          │
//!                                  build_plan (pure)
//!                                          │
//!                                          ▼
//!                CompositionPlan: one instruction per readable segment,
//!                back to back on a shared timeline, each with its own
//!                upright/mirror transform
//!                                          │
//!                               MediaBackend::export
//!                                          ▼
//!                                  CompositionResult
//! ```
//!
//! The engine only reads the handed-over snapshot, so a new recording session
//! can run while a previous export is still in flight.

use super::recorder::Segment;
use super::transform::{AffineTransform, render_size, segment_transform};
use crate::backends::camera::types::{CameraPosition, Dimensions};
use crate::constants::ExportPreset;
use crate::errors::CompositionError;
use crate::storage::MediaStorage;
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What a probe learned about one segment file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetInfo {
    pub duration: Duration,
    /// Natural size of the first video track, if any
    pub video: Option<Dimensions>,
    pub has_audio: bool,
}

/// Reads segment files and renders composition plans
pub trait MediaBackend: Send + Sync + 'static {
    /// Probe a segment file
    fn load_asset(&self, path: &Path) -> Result<AssetInfo, CompositionError>;

    /// Render `plan` into a single file at `output`
    fn export(
        &self,
        plan: &CompositionPlan,
        output: &Path,
        preset: ExportPreset,
    ) -> Result<(), CompositionError>;
}

/// One segment placed on the composition timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineInstruction {
    pub order: u32,
    pub source: PathBuf,
    pub position: CameraPosition,
    /// Insertion time on the shared timeline
    pub start: Duration,
    pub duration: Duration,
    pub natural_size: Dimensions,
    pub transform: AffineTransform,
    /// `false` for video-only segments (silence is inserted instead)
    pub include_audio: bool,
}

impl TimelineInstruction {
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// A segment left out of the composition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSegment {
    pub order: u32,
    pub location: PathBuf,
    pub reason: String,
}

/// Everything an exporter needs to render the merged reel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionPlan {
    pub instructions: Vec<TimelineInstruction>,
    pub skipped: Vec<SkippedSegment>,
    pub render_size: Dimensions,
    pub frame_duration: Duration,
}

impl CompositionPlan {
    /// Sum of all included segment durations
    pub fn total_duration(&self) -> Duration {
        self.instructions
            .last()
            .map_or(Duration::ZERO, TimelineInstruction::end)
    }

    /// At least one included segment carries audio
    pub fn has_audio(&self) -> bool {
        self.instructions.iter().any(|i| i.include_audio)
    }
}

/// Terminal or pending state of a composition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompositionStatus {
    Pending,
    Succeeded,
    /// Exported, but the listed segment orders were unreadable and left out
    PartialMerge { skipped: Vec<u32> },
    Failed { reason: String },
}

impl CompositionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CompositionStatus::Pending)
    }

    /// An output file was produced
    pub fn has_output(&self) -> bool {
        matches!(
            self,
            CompositionStatus::Succeeded | CompositionStatus::PartialMerge { .. }
        )
    }
}

/// Outcome delivered to the caller once composition finishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionResult {
    /// Location reserved for the reel (absent if none could be allocated)
    pub output_location: Option<PathBuf>,
    pub status: CompositionStatus,
    /// Timeline duration of the exported reel
    pub duration: Duration,
    /// Segments included in the reel
    pub segment_count: usize,
}

impl CompositionResult {
    fn failed(output_location: Option<PathBuf>, err: &CompositionError) -> Self {
        Self {
            output_location,
            status: CompositionStatus::Failed {
                reason: err.to_string(),
            },
            duration: Duration::ZERO,
            segment_count: 0,
        }
    }
}

/// Lay the probed segments out back to back
///
/// `assets` must be in the same order as `segments`. Segments without a
/// readable video track are skipped; segments without audio are kept
/// video-only. The render size is the first included segment's natural size,
/// rotated.
pub fn build_plan(
    segments: &[Segment],
    assets: Vec<Result<AssetInfo, CompositionError>>,
    frame_rate: u32,
) -> Result<CompositionPlan, CompositionError> {
    if segments.is_empty() {
        return Err(CompositionError::NoSegments);
    }

    let mut instructions = Vec::with_capacity(segments.len());
    let mut skipped = Vec::new();
    let mut last_time = Duration::ZERO;

    for (segment, asset) in segments.iter().zip(assets) {
        let readable = asset.and_then(|info| match info.video {
            Some(size) if size.width > 0 && size.height > 0 && !info.duration.is_zero() => {
                Ok((info, size))
            }
            Some(_) => Err(CompositionError::AssetUnreadable(
                "empty video track".to_string(),
            )),
            None => Err(CompositionError::AssetUnreadable(
                "no video track".to_string(),
            )),
        });

        let (info, natural_size) = match readable {
            Ok(readable) => readable,
            Err(e) => {
                warn!(order = segment.order, path = %segment.location.display(), error = %e, "Skipping segment");
                skipped.push(SkippedSegment {
                    order: segment.order,
                    location: segment.location.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        instructions.push(TimelineInstruction {
            order: segment.order,
            source: segment.location.clone(),
            position: segment.position,
            start: last_time,
            duration: info.duration,
            natural_size,
            transform: segment_transform(natural_size, segment.position),
            include_audio: info.has_audio,
        });
        last_time += info.duration;
    }

    let render = instructions
        .first()
        .map(|first| render_size(first.natural_size))
        .ok_or(CompositionError::NoReadableSegments)?;

    Ok(CompositionPlan {
        render_size: render,
        frame_duration: Duration::from_secs(1) / frame_rate.max(1),
        instructions,
        skipped,
    })
}

/// Merges the segments of a finished session into one reel
#[derive(Clone)]
pub struct SegmentCompositionEngine {
    backend: Arc<dyn MediaBackend>,
    storage: MediaStorage,
    preset: ExportPreset,
    frame_rate: u32,
}

impl SegmentCompositionEngine {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        storage: MediaStorage,
        preset: ExportPreset,
        frame_rate: u32,
    ) -> Self {
        Self {
            backend,
            storage,
            preset,
            frame_rate,
        }
    }

    /// Run [`compose`](Self::compose) as an independent task
    pub fn spawn(&self, segments: Arc<[Segment]>) -> tokio::task::JoinHandle<CompositionResult> {
        let engine = self.clone();
        tokio::spawn(async move { engine.compose(segments).await })
    }

    /// Probe, plan and export; never panics on media errors
    pub async fn compose(&self, segments: Arc<[Segment]>) -> CompositionResult {
        info!(segments = segments.len(), preset = ?self.preset, "Composition started");

        let assets = self.probe_all(&segments).await;
        let plan = match build_plan(&segments, assets, self.frame_rate) {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "Nothing to compose");
                return CompositionResult::failed(None, &e);
            }
        };

        let output = match self.storage.reel_path() {
            Ok(path) => path,
            Err(e) => {
                let err = CompositionError::ExportFailed(format!("no output location: {}", e));
                error!(error = %err, "Composition failed");
                return CompositionResult::failed(None, &err);
            }
        };

        info!(
            included = plan.instructions.len(),
            skipped = plan.skipped.len(),
            render_size = %plan.render_size,
            duration_ms = plan.total_duration().as_millis() as u64,
            output = %output.display(),
            "Exporting reel"
        );

        let backend = Arc::clone(&self.backend);
        let preset = self.preset;
        let export_plan = plan.clone();
        let export_path = output.clone();
        let exported = tokio::task::spawn_blocking(move || {
            backend.export(&export_plan, &export_path, preset)
        })
        .await
        .unwrap_or_else(|e| Err(CompositionError::ExportFailed(format!("export task: {}", e))));

        if let Err(e) = exported {
            error!(error = %e, "Export failed");
            return CompositionResult::failed(Some(output), &e);
        }

        let status = if plan.skipped.is_empty() {
            CompositionStatus::Succeeded
        } else {
            CompositionStatus::PartialMerge {
                skipped: plan.skipped.iter().map(|s| s.order).collect(),
            }
        };
        info!(?status, output = %output.display(), "Composition finished");

        CompositionResult {
            output_location: Some(output),
            status,
            duration: plan.total_duration(),
            segment_count: plan.instructions.len(),
        }
    }

    async fn probe_all(&self, segments: &[Segment]) -> Vec<Result<AssetInfo, CompositionError>> {
        let probes = segments.iter().map(|segment| {
            let backend = Arc::clone(&self.backend);
            let path = segment.location.clone();
            tokio::task::spawn_blocking(move || backend.load_asset(&path))
        });

        // join_all keeps the input order
        join_all(probes)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(CompositionError::AssetUnreadable(format!("probe task: {}", e)))
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for SegmentCompositionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentCompositionEngine")
            .field("storage", &self.storage)
            .field("preset", &self.preset)
            .field("frame_rate", &self.frame_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(order: u32, position: CameraPosition) -> Segment {
        Segment {
            location: PathBuf::from(format!("/tmp/segment-{:03}.mp4", order)),
            position,
            order,
            recorded_for: Duration::from_secs(1),
        }
    }

    fn asset(millis: u64, audio: bool) -> Result<AssetInfo, CompositionError> {
        Ok(AssetInfo {
            duration: Duration::from_millis(millis),
            video: Some(Dimensions::new(1920, 1080)),
            has_audio: audio,
        })
    }

    #[test]
    fn test_plan_places_segments_back_to_back() {
        let segments = [
            segment(0, CameraPosition::Back),
            segment(1, CameraPosition::Front),
            segment(2, CameraPosition::Back),
        ];
        let plan = build_plan(
            &segments,
            vec![asset(1500, true), asset(2000, true), asset(500, true)],
            30,
        )
        .unwrap();

        let starts: Vec<_> = plan.instructions.iter().map(|i| i.start.as_millis()).collect();
        assert_eq!(starts, [0, 1500, 3500]);
        assert_eq!(plan.total_duration(), Duration::from_millis(4000));
        assert_eq!(plan.render_size, Dimensions::new(1080, 1920));
        assert_eq!(plan.frame_duration, Duration::from_secs(1) / 30);

        let mirrored: Vec<_> = plan
            .instructions
            .iter()
            .map(|i| i.transform.is_mirrored())
            .collect();
        assert_eq!(mirrored, [false, true, false]);
    }

    #[test]
    fn test_unreadable_segment_is_skipped() {
        let segments = [
            segment(0, CameraPosition::Back),
            segment(1, CameraPosition::Front),
            segment(2, CameraPosition::Back),
        ];
        let plan = build_plan(
            &segments,
            vec![
                asset(1000, true),
                Err(CompositionError::AssetUnreadable("moov atom not found".into())),
                asset(700, true),
            ],
            30,
        )
        .unwrap();

        let orders: Vec<_> = plan.instructions.iter().map(|i| i.order).collect();
        assert_eq!(orders, [0, 2]);
        assert_eq!(plan.instructions[1].start, Duration::from_millis(1000));
        assert_eq!(plan.total_duration(), Duration::from_millis(1700));
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].order, 1);
    }

    #[test]
    fn test_audio_less_segment_kept_video_only() {
        let segments = [segment(0, CameraPosition::Back), segment(1, CameraPosition::Back)];
        let plan = build_plan(&segments, vec![asset(1000, false), asset(1000, true)], 30).unwrap();

        assert_eq!(plan.instructions.len(), 2);
        assert!(!plan.instructions[0].include_audio);
        assert!(plan.has_audio());
    }

    #[test]
    fn test_render_size_follows_first_included_segment() {
        let segments = [segment(0, CameraPosition::Back), segment(1, CameraPosition::Front)];
        let assets = vec![
            Ok(AssetInfo {
                duration: Duration::from_secs(1),
                video: None,
                has_audio: true,
            }),
            Ok(AssetInfo {
                duration: Duration::from_secs(1),
                video: Some(Dimensions::new(1280, 720)),
                has_audio: true,
            }),
        ];

        let plan = build_plan(&segments, assets, 30).unwrap();
        assert_eq!(plan.render_size, Dimensions::new(720, 1280));
    }

    #[test]
    fn test_nothing_readable() {
        let segments = [segment(0, CameraPosition::Back)];
        let err = build_plan(
            &segments,
            vec![Err(CompositionError::AssetUnreadable("truncated".into()))],
            30,
        )
        .unwrap_err();
        assert_eq!(err, CompositionError::NoReadableSegments);

        assert_eq!(
            build_plan(&[], Vec::new(), 30).unwrap_err(),
            CompositionError::NoSegments
        );
    }
}
