// SPDX-License-Identifier: MPL-2.0

//! Integration tests for segment composition

mod common;

use common::{FakeMedia, SEGMENT_LENGTH};
use reelcam::backends::camera::{CameraPosition, Dimensions};
use reelcam::constants::ExportPreset;
use reelcam::pipelines::video::{
    CompositionStatus, FlipMethod, Segment, SegmentCompositionEngine,
};
use reelcam::storage::MediaStorage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn segments(positions: &[CameraPosition]) -> Arc<[Segment]> {
    positions
        .iter()
        .enumerate()
        .map(|(order, &position)| Segment {
            location: PathBuf::from(format!("/segments/segment-{:03}.mp4", order)),
            position,
            order: order as u32,
            recorded_for: SEGMENT_LENGTH,
        })
        .collect()
}

fn engine(media: Arc<FakeMedia>, dir: &tempfile::TempDir) -> SegmentCompositionEngine {
    SegmentCompositionEngine::new(
        media,
        MediaStorage::new(dir.path()),
        ExportPreset::Highest,
        30,
    )
}

#[tokio::test]
async fn test_unreadable_middle_segment_gives_partial_merge() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia {
        unreadable: vec!["segment-001".into()],
        ..FakeMedia::default()
    });

    let result = engine(media.clone(), &dir)
        .compose(segments(&[
            CameraPosition::Back,
            CameraPosition::Front,
            CameraPosition::Back,
        ]))
        .await;

    assert_eq!(result.status, CompositionStatus::PartialMerge { skipped: vec![1] });
    assert!(result.status.is_terminal());
    assert_eq!(result.segment_count, 2);
    assert_eq!(result.duration, SEGMENT_LENGTH * 2);
    assert!(result.output_location.unwrap().exists());

    let plan = media.last_plan().unwrap();
    let starts: Vec<_> = plan.instructions.iter().map(|i| i.start).collect();
    assert_eq!(starts, [Duration::ZERO, SEGMENT_LENGTH]);
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].order, 1);
}

#[tokio::test]
async fn test_video_only_segment_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia {
        silent: vec!["segment-000".into()],
        ..FakeMedia::default()
    });

    let result = engine(media.clone(), &dir)
        .compose(segments(&[CameraPosition::Front, CameraPosition::Back]))
        .await;

    assert_eq!(result.status, CompositionStatus::Succeeded);
    let plan = media.last_plan().unwrap();
    let audio: Vec<_> = plan.instructions.iter().map(|i| i.include_audio).collect();
    assert_eq!(audio, [false, true]);
    assert!(plan.has_audio());
}

#[tokio::test]
async fn test_front_segments_are_mirrored_and_rotated() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia::default());

    engine(media.clone(), &dir)
        .compose(segments(&[CameraPosition::Back, CameraPosition::Front]))
        .await;

    let plan = media.last_plan().unwrap();
    // 1920x1080 landscape sensor frames become a portrait reel
    assert_eq!(plan.render_size, Dimensions::new(1080, 1920));
    assert!(!plan.instructions[0].transform.is_mirrored());
    assert!(plan.instructions[1].transform.is_mirrored());
    assert_eq!(plan.instructions[0].transform.flip_method(), Some(FlipMethod::Clockwise));
    assert_eq!(plan.frame_duration, Duration::from_secs(1) / 30);
}

#[tokio::test]
async fn test_nothing_readable_fails_without_export() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia {
        unreadable: vec!["segment".into()],
        ..FakeMedia::default()
    });

    let result = engine(media.clone(), &dir)
        .compose(segments(&[CameraPosition::Back, CameraPosition::Front]))
        .await;

    assert!(matches!(result.status, CompositionStatus::Failed { .. }));
    assert!(!result.status.has_output());
    assert_eq!(result.output_location, None);
    assert_eq!(media.export_count(), 0);
}

#[tokio::test]
async fn test_export_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia {
        fail_export: true,
        ..FakeMedia::default()
    });

    let result = engine(media.clone(), &dir)
        .compose(segments(&[CameraPosition::Back]))
        .await;

    let CompositionStatus::Failed { reason } = &result.status else {
        panic!("export failure not reported: {:?}", result.status);
    };
    assert!(reason.contains("no encoder"));
    assert!(result.output_location.is_some());
    assert_eq!(media.export_count(), 1);
}

#[tokio::test]
async fn test_spawned_compositions_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia::default());
    let engine = engine(media.clone(), &dir);

    let first = engine.spawn(segments(&[CameraPosition::Back]));
    let second = engine.spawn(segments(&[CameraPosition::Front, CameraPosition::Back]));
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert_eq!(first.segment_count, 1);
    assert_eq!(second.segment_count, 2);
    assert_ne!(first.output_location, second.output_location);
    assert_eq!(media.export_count(), 2);
}
