//! Scene segmentation integration tests.

mod common;

use common::{FRAME_TICKS, record};
use streamscope::{AnalyzerError, FrameRecord, FrameType, SceneDetector, SceneInfo, SceneOptions};

/// Frames with the given sizes; indices in `keys` are keyframes.
fn frames(sizes: &[usize], keys: &[usize]) -> Vec<FrameRecord> {
    sizes
        .iter()
        .enumerate()
        .map(|(index, &size)| {
            let key = keys.contains(&index);
            let frame_type = if key { FrameType::Intra } else { FrameType::Predicted };
            record(index as i64, frame_type, key, size, 25)
        })
        .collect()
}

fn detector(threshold: f64) -> SceneDetector {
    SceneDetector::new(SceneOptions::new().with_threshold(threshold))
        .expect("Failed to create scene detector")
}

fn bounds(scenes: &[SceneInfo]) -> Vec<(usize, usize)> {
    scenes
        .iter()
        .map(|scene| (scene.start_frame, scene.end_frame))
        .collect()
}

fn assert_partition(scenes: &[SceneInfo], frame_count: usize) {
    let covered: usize = scenes.iter().map(|scene| scene.frame_count).sum();
    assert_eq!(covered, frame_count);
    if let (Some(first), Some(last)) = (scenes.first(), scenes.last()) {
        assert_eq!(first.start_frame, 0);
        assert_eq!(last.end_frame, frame_count - 1);
    }
    for (index, pair) in scenes.windows(2).enumerate() {
        assert_eq!(pair[1].start_frame, pair[0].end_frame + 1);
        assert_eq!(pair[0].scene_index, index);
    }
}

// ── boundaries ─────────────────────────────────────────────────────

#[test]
fn keyframe_with_large_size_change_starts_scene() {
    let input = frames(&[1000, 1000, 1400, 1400], &[0, 2]);
    let scenes = detector(0.3).detect(&input);

    assert_eq!(bounds(&scenes), vec![(0, 1), (2, 3)]);
    assert_eq!(scenes[1].start_pts, 2 * FRAME_TICKS);
    assert_eq!(scenes[1].end_pts, 3 * FRAME_TICKS);
}

#[test]
fn non_keyframe_needs_twice_the_threshold() {
    // 1000 -> 1500 is +50 %: below 60 % without a keyframe.
    // 1500 -> 2500 is +67 %: above 60 %.
    let input = frames(&[1000, 1500, 2500], &[0]);
    let scenes = detector(0.3).detect(&input);

    assert_eq!(bounds(&scenes), vec![(0, 1), (2, 2)]);
}

#[test]
fn regular_keyframes_do_not_split_steady_content() {
    let sizes = vec![1000; 90];
    let input = frames(&sizes, &[0, 30, 60]);
    let scenes = detector(0.3).detect(&input);

    assert_eq!(scenes.len(), 1);
    assert_eq!(scenes[0].frame_count, 90);
}

#[test]
fn boundary_on_last_frame_keeps_final_scene() {
    let input = frames(&[1000, 1000, 1000, 9000], &[0, 3]);
    let scenes = detector(0.3).detect(&input);

    assert_eq!(bounds(&scenes), vec![(0, 2), (3, 3)]);
    assert_eq!(scenes[1].frame_count, 1);
    assert_partition(&scenes, input.len());
}

#[test]
fn empty_previous_frame_never_marks_boundary() {
    let input = frames(&[0, 5000, 5000], &[0, 1]);
    let scenes = detector(0.3).detect(&input);
    assert_eq!(scenes.len(), 1);
}

#[test]
fn shrinking_frames_count_as_change() {
    let input = frames(&[4000, 4000, 1000, 1000], &[0, 2]);
    let scenes = detector(0.3).detect(&input);
    assert_eq!(bounds(&scenes), vec![(0, 1), (2, 3)]);
}

// ── summaries ──────────────────────────────────────────────────────

#[test]
fn scene_summaries() {
    let input = frames(&[1000, 1200, 3000, 3000, 3300], &[0, 2]);
    let scenes = detector(0.3).detect(&input);

    assert_eq!(scenes.len(), 2);
    assert!((scenes[0].average_size - 1100.0).abs() < 1e-9);
    assert!((scenes[1].average_size - 3100.0).abs() < 1e-9);
    assert_eq!(scenes[1].start_timestamp, input[2].timestamp);
    assert_eq!(scenes[1].end_timestamp, input[4].timestamp);
    assert!((scenes[1].duration() - 2.0 / 30.0).abs() < 1e-9);

    let average = SceneDetector::average_duration(&scenes);
    assert!((average - (1.0 / 30.0 + 2.0 / 30.0) / 2.0).abs() < 1e-9);
}

#[test]
fn empty_input_has_no_scenes() {
    let scenes = detector(0.3).detect(&[]);
    assert!(scenes.is_empty());
    assert_eq!(SceneDetector::average_duration(&scenes), 0.0);
}

// ── determinism and completeness ───────────────────────────────────

#[test]
fn detection_is_deterministic_and_complete() {
    let sizes: Vec<usize> = (0..300).map(|index| 800 + (index * 7919) % 2400).collect();
    let keys: Vec<usize> = (0..300).step_by(25).collect();
    let input = frames(&sizes, &keys);

    for threshold in [0.0, 0.1, 0.3, 0.5, 0.9, 5.0] {
        let detector = detector(threshold);
        let first = detector.detect(&input);
        let second = detector.detect(&input);

        assert_eq!(first, second);
        assert_partition(&first, input.len());
    }
}

#[test]
fn lower_threshold_never_finds_fewer_scenes() {
    let sizes: Vec<usize> = (0..200).map(|index| 500 + (index * 104_729) % 3000).collect();
    let keys: Vec<usize> = (0..200).step_by(10).collect();
    let input = frames(&sizes, &keys);

    let counts: Vec<usize> = [0.1, 0.3, 0.5, 0.7, 0.9]
        .into_iter()
        .map(|threshold| detector(threshold).detect(&input).len())
        .collect();
    assert!(counts.windows(2).all(|pair| pair[0] >= pair[1]), "{counts:?}");
}

// ── configuration ──────────────────────────────────────────────────

#[test]
fn invalid_thresholds_are_rejected() {
    for threshold in [-0.1, f64::NAN, f64::INFINITY] {
        let result = SceneDetector::new(SceneOptions::new().with_threshold(threshold));
        assert!(matches!(result, Err(AnalyzerError::InvalidConfiguration(_))));
    }
}

#[test]
fn default_threshold() {
    assert_eq!(SceneOptions::new().threshold(), 0.3);
    assert_eq!(SceneDetector::default().options().threshold(), 0.3);
}

#[test]
fn scene_serializes_with_report_field_names() {
    let input = frames(&[1000, 1000], &[0]);
    let scenes = detector(0.3).detect(&input);
    let json = serde_json::to_value(&scenes[0]).expect("Failed to serialize scene");

    assert_eq!(json["sceneIndex"], 0);
    assert_eq!(json["startFrameNumber"], 0);
    assert_eq!(json["endFrameNumber"], 1);
    assert_eq!(json["frameCount"], 2);
    assert_eq!(json["startPts"], 0);
    assert_eq!(json["endPts"], FRAME_TICKS);
    assert!(json.get("averageSize").is_some());
    assert!(json.get("startTimestamp").is_some());
    assert!(json.get("endTimestamp").is_some());
}
