//! AnalysisOptions, AnalyzerOptions, EngineOptions and DuplicateOptions tests.

use streamscope::{
    AnalysisOptions, AnalyzerOptions, DuplicateOptions, EngineOptions, FfmpegLogLevel,
    resolve_thread_count,
};

// ── AnalysisOptions builder ──────────────────────────────────────

#[test]
fn analysis_options_defaults() {
    let options = AnalysisOptions::new();
    let debug = format!("{options:?}");
    assert!(debug.contains("AnalysisOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("batch_size: 1"));
    assert!(debug.contains("frame_limit: None"));
}

#[test]
fn analysis_options_with_batch_size_clamps_zero() {
    let options = AnalysisOptions::new().with_batch_size(0);
    let debug = format!("{options:?}");
    // Clamped to 1.
    assert!(debug.contains("batch_size: 1"));
}

#[test]
fn analysis_options_with_frame_limit() {
    let options = AnalysisOptions::new().with_frame_limit(500);
    assert!(format!("{options:?}").contains("frame_limit: Some(500)"));
}

#[test]
fn analysis_options_with_cancellation() {
    let options = AnalysisOptions::new().with_cancellation(streamscope::CancellationToken::new());
    assert!(format!("{options:?}").contains("has_cancellation: true"));
}

// ── AnalyzerOptions ──────────────────────────────────────────────

#[test]
fn analyzer_options_defaults() {
    let options = AnalyzerOptions::new();
    assert_eq!(options.max_window_size(), 300);
    assert_eq!(options.anomaly_capacity(), 100);
    assert_eq!(options.nominal_frame_rate(), 30.0);
    assert_eq!(options, AnalyzerOptions::default());
}

#[test]
fn analyzer_options_builder() {
    let options = AnalyzerOptions::new()
        .with_max_window_size(600)
        .with_anomaly_capacity(20)
        .with_nominal_frame_rate(25.0);
    assert_eq!(options.max_window_size(), 600);
    assert_eq!(options.anomaly_capacity(), 20);
    assert_eq!(options.nominal_frame_rate(), 25.0);
}

// ── DuplicateOptions ─────────────────────────────────────────────

#[test]
fn duplicate_options_defaults() {
    let options = DuplicateOptions::new();
    assert_eq!(options.size_tolerance_percent(), 1.0);
    assert!(options.requires_same_qp());
    assert!(options.requires_same_type());
}

#[test]
fn duplicate_options_builder() {
    let options = DuplicateOptions::new()
        .with_size_tolerance(5.0)
        .with_same_qp(false)
        .with_same_type(false);
    assert_eq!(options.size_tolerance_percent(), 5.0);
    assert!(!options.requires_same_qp());
    assert!(!options.requires_same_type());
}

// ── EngineOptions ────────────────────────────────────────────────

#[test]
fn engine_options_thread_count() {
    assert_eq!(
        EngineOptions::new().effective_thread_count(),
        resolve_thread_count(0)
    );
    assert_eq!(EngineOptions::new().with_thread_count(1).effective_thread_count(), 1);
    assert!(
        EngineOptions::new()
            .with_thread_count(10_000)
            .effective_thread_count()
            <= resolve_thread_count(0)
    );
}

#[test]
fn engine_options_debug_shows_selection() {
    let options = EngineOptions::new()
        .with_stream_index(2)
        .with_log_level(FfmpegLogLevel::Quiet);
    let debug = format!("{options:?}");
    assert!(debug.contains("stream_index: Some(2)"));
    assert!(debug.contains("Quiet"));
}

// ── FfmpegLogLevel ───────────────────────────────────────────────

#[test]
fn log_level_names_round_trip_through_from_str() {
    for level in [
        FfmpegLogLevel::Quiet,
        FfmpegLogLevel::Error,
        FfmpegLogLevel::Warning,
        FfmpegLogLevel::Debug,
        FfmpegLogLevel::Trace,
    ] {
        assert_eq!(level.name().parse::<FfmpegLogLevel>().ok(), Some(level));
        assert_eq!(level.to_string(), level.name());
    }
}
