//! Async adapter integration tests (feature `async`).

#![cfg(feature = "async")]

mod common;

use std::time::Duration;

use common::{FRAME_TICKS, ScriptedEngine, Step, steady_script, unit};
use streamscope::{
    AnalysisFuture, AnalysisOptions, AnalyzerError, AnalyzerOptions, AnomalyKind, PictureType,
    SlidingWindowAnalyzer, VideoAnalysis, anomaly_stream, frame_stream,
};
use tokio_stream::StreamExt;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn frame_stream_yields_analyzed_frames() {
    let mut analyzer =
        SlidingWindowAnalyzer::new(ScriptedEngine::new(steady_script(20)), AnalyzerOptions::new())
            .expect("Failed to create analyzer");
    let stream = frame_stream(&mut analyzer, None);
    analyzer.start().expect("Failed to start analyzer");

    let frames: Vec<_> = tokio::time::timeout(Duration::from_secs(10), stream.take(20).collect())
        .await
        .expect("Timed out waiting for frames");

    assert_eq!(frames.len(), 20);
    assert_eq!(frames[19].pts, 19 * FRAME_TICKS);
    analyzer.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn frame_stream_ends_with_the_source() {
    let mut analyzer =
        SlidingWindowAnalyzer::new(ScriptedEngine::new(steady_script(12)), AnalyzerOptions::new())
            .expect("Failed to create analyzer");
    let stream = frame_stream(&mut analyzer, None);
    analyzer.start().expect("Failed to start analyzer");

    // No `take`: the stream must close on its own while the analyzer lives.
    let frames: Vec<_> = tokio::time::timeout(Duration::from_secs(10), stream.collect())
        .await
        .expect("Frame stream did not end after the source was exhausted");

    assert_eq!(frames.len(), 12);
    assert!(!analyzer.is_active());
    analyzer.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn anomaly_stream_yields_anomalies() {
    let script: Vec<Step> = (0..3)
        .map(|index| unit(index * FRAME_TICKS, PictureType::P, index == 0, 1000, 45))
        .collect();
    let mut analyzer = SlidingWindowAnalyzer::new(ScriptedEngine::new(script), AnalyzerOptions::new())
        .expect("Failed to create analyzer");
    let stream = anomaly_stream(&mut analyzer, Some(8));
    analyzer.start().expect("Failed to start analyzer");

    let anomalies: Vec<_> = tokio::time::timeout(Duration::from_secs(10), stream.take(3).collect())
        .await
        .expect("Timed out waiting for anomalies");

    assert!(anomalies.iter().all(|anomaly| anomaly.kind == AnomalyKind::QualityDrop));
    analyzer.stop();
}

#[tokio::test]
async fn analysis_future_reports_open_failure() {
    let result =
        AnalysisFuture::spawn(VideoAnalysis::new(AnalysisOptions::new()), "missing/input.mp4").await;
    assert!(matches!(result, Err(AnalyzerError::SourceOpen { .. })));
}
