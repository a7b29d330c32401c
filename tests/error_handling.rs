//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::path::Path;

use streamscope::{
    AnalysisOptions, AnalyzerError, EngineOptions, FfmpegEngine, FfmpegLogLevel, VideoAnalysis,
};

#[test]
fn open_nonexistent_file() {
    let result = FfmpegEngine::open_file("this_file_does_not_exist.mp4", &EngineOptions::new());
    let Err(error) = result else {
        panic!("Expected error for missing file");
    };

    assert!(matches!(error, AnalyzerError::SourceOpen { .. }));
    assert!(error.is_engine_error());
    let error_message = error.to_string();
    assert!(
        error_message.contains("Failed to open stream source"),
        "Error message should mention source open failure: {error_message}",
    );
    assert!(error_message.contains("this_file_does_not_exist.mp4"));
}

#[test]
fn open_invalid_file() {
    // Create a temporary file with garbage content.
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegEngine::open_file(&invalid_file_path, &EngineOptions::new());
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn analysis_of_missing_file_fails() {
    let result = VideoAnalysis::new(AnalysisOptions::new()).run_file("missing/input.mp4");
    assert!(matches!(result, Err(AnalyzerError::SourceOpen { .. })));
}

#[test]
fn audio_only_file_has_no_video_stream() {
    let path = "tests/fixtures/sample_audio.wav";
    if !Path::new(path).exists() {
        return;
    }

    let result = FfmpegEngine::open_file(path, &EngineOptions::new());
    assert!(matches!(result, Err(AnalyzerError::NoVideoStream)));
}

#[test]
fn out_of_range_stream_index() {
    let path = "tests/fixtures/sample_video.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let options = EngineOptions::new().with_stream_index(42);
    let result = FfmpegEngine::open_file(path, &options);
    assert!(matches!(result, Err(AnalyzerError::NoVideoStream)));
}

#[test]
fn unknown_log_level_is_rejected() {
    let result = "chatty".parse::<FfmpegLogLevel>();
    assert!(matches!(result, Err(AnalyzerError::InvalidConfiguration(_))));

    assert_eq!("WARN".parse::<FfmpegLogLevel>().ok(), Some(FfmpegLogLevel::Warning));
    assert_eq!("error".parse::<FfmpegLogLevel>().ok(), Some(FfmpegLogLevel::Error));
}

#[test]
fn error_families() {
    assert!(AnalyzerError::DecodeError("bad slice".to_string()).is_engine_error());
    assert!(AnalyzerError::NoVideoStream.is_engine_error());
    assert!(!AnalyzerError::Cancelled.is_engine_error());
    assert!(!AnalyzerError::PoolClosed.is_engine_error());
    assert!(!AnalyzerError::InvalidConfiguration("x".to_string()).is_engine_error());
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: AnalyzerError = io.into();
    assert!(matches!(error, AnalyzerError::IoError(_)));
    assert!(error.to_string().contains("denied"));
}
