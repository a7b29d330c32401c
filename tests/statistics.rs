//! Frame and bitrate statistics integration tests.

mod common;

use common::{record, records_from_pattern};
use streamscope::{AnalyzerError, BitrateAnalyzer, FrameRecord, FrameStatistics, FrameType};

fn constant_frames(count: usize, size: usize) -> Vec<FrameRecord> {
    (0..count)
        .map(|index| record(index as i64, FrameType::Predicted, false, size, 20))
        .collect()
}

// ── frame statistics ───────────────────────────────────────────────

#[test]
fn frame_statistics_counts_and_averages() {
    let mut frames = records_from_pattern("IPBP?");
    for (frame, qp) in frames.iter_mut().zip([20, 22, 30, 24, 0]) {
        frame.qp = qp;
    }
    let stats = FrameStatistics::compute(&frames);

    assert_eq!(stats.total_frames, 5);
    assert_eq!(stats.intra_frames, 1);
    assert_eq!(stats.predicted_frames, 2);
    assert_eq!(stats.bi_predicted_frames, 1);
    assert_eq!(stats.min_frame_size, 1000);
    assert_eq!(stats.max_frame_size, 1004);
    assert!((stats.average_frame_size - 1002.0).abs() < 1e-9);
    assert!((stats.average_qp - 19.2).abs() < 1e-9);
}

#[test]
fn frame_statistics_of_empty_input() {
    assert_eq!(FrameStatistics::compute(&[]), FrameStatistics::default());
}

#[test]
fn frame_statistics_serializes_with_report_names() {
    let stats = FrameStatistics::compute(&records_from_pattern("IPB"));
    let json = serde_json::to_value(&stats).expect("Failed to serialize statistics");

    assert_eq!(json["iFrames"], 1);
    assert_eq!(json["pFrames"], 1);
    assert_eq!(json["bFrames"], 1);
    assert!(json.get("averageQP").is_some());
}

// ── bitrate ────────────────────────────────────────────────────────

#[test]
fn constant_bitrate_over_whole_list() {
    let frames = constant_frames(90, 1000);
    let stats = BitrateAnalyzer::default().analyze(&frames);

    let span = 89.0 / 30.0;
    let expected = 90.0 * 8000.0 / span;
    assert!((stats.average_bitrate - expected).abs() < 1e-6);
    assert_eq!(stats.time_series.len(), 3);
    assert!(stats.min_bitrate <= stats.average_bitrate);
    assert!(stats.max_bitrate >= stats.average_bitrate);
}

#[test]
fn time_series_buckets_start_at_first_uncovered_frame() {
    let frames = constant_frames(90, 1000);
    let analyzer = BitrateAnalyzer::new(1.0, 30.0).expect("Failed to create analyzer");
    let stats = analyzer.analyze(&frames);

    let starts: Vec<f64> = stats.time_series.iter().map(|point| point.timestamp).collect();
    for (start, expected) in starts.iter().zip([0.0, 1.0, 2.0]) {
        assert!((start - expected).abs() < 1e-9);
    }
}

#[test]
fn single_frame_uses_nominal_rate() {
    let frames = constant_frames(1, 1000);
    let analyzer = BitrateAnalyzer::new(1.0, 25.0).expect("Failed to create analyzer");

    let batch = analyzer.analyze(&frames);
    assert!((batch.average_bitrate - 8000.0 * 25.0).abs() < 1e-6);

    let window = analyzer.analyze_window(&frames);
    assert_eq!(window.average_bitrate, 0.0);
    assert!(window.time_series.is_empty());
}

#[test]
fn empty_input_yields_zero_bitrate() {
    let analyzer = BitrateAnalyzer::default();
    assert_eq!(analyzer.analyze(&[]).average_bitrate, 0.0);
    assert_eq!(analyzer.analyze_window(&[]).average_bitrate, 0.0);
}

#[test]
fn window_bitrate_reports_spread() {
    let mut frames = constant_frames(60, 1000);
    for frame in frames.iter_mut().skip(30) {
        frame.size = 4000;
    }
    let stats = BitrateAnalyzer::default().analyze_window(&frames);

    assert!(stats.max_bitrate > stats.min_bitrate);
    assert!(stats.std_deviation > 0.0);
    assert_eq!(stats.time_series.len(), 2);
}

#[test]
fn invalid_bucket_or_rate_is_rejected() {
    for (bucket, rate) in [(0.0, 30.0), (-1.0, 30.0), (f64::NAN, 30.0), (1.0, 0.0), (1.0, f64::INFINITY)] {
        assert!(matches!(
            BitrateAnalyzer::new(bucket, rate),
            Err(AnalyzerError::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn bitrate_statistics_serialize_with_report_names() {
    let stats = BitrateAnalyzer::default().analyze(&constant_frames(30, 500));
    let json = serde_json::to_value(&stats).expect("Failed to serialize bitrate");

    assert!(json.get("averageBitrate").is_some());
    assert!(json.get("stdDeviation").is_some());
    assert!(json["timeSeriesData"].is_array());
}
