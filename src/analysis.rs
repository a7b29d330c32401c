//! Batch analysis of a whole stream.
//!
//! [`VideoAnalysis`] collects every frame record through a blocking
//! [`FramePump`], runs GOP segmentation, frame statistics, bitrate analysis
//! and scene segmentation in parallel on a [`WorkerPool`], then marks
//! duplicates. The result is one
//! [`AnalysisReport`].
//!
//! Batch analysis fails fast: any engine error, invalid option or
//! cancellation aborts the run and no partial report is returned.
//!
//! # Example
//!
//! ```no_run
//! use streamscope::{AnalysisOptions, VideoAnalysis};
//!
//! let report = VideoAnalysis::new(AnalysisOptions::new()).run_file("input.mp4")?;
//! println!(
//!     "{} frames, {} GOPs, {:.0} bps average",
//!     report.frames.len(),
//!     report.gops.len(),
//!     report.bitrate.average_bitrate
//! );
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::AnalysisOptions;
use crate::duplicate::{DuplicateFrameDetector, DuplicateSummary};
use crate::engine::DecodeEngine;
use crate::error::AnalyzerError;
use crate::ffmpeg_engine::FfmpegEngine;
use crate::frame::FrameRecord;
use crate::gop::{GopSegment, GopSegmenter};
use crate::metadata::StreamMetadata;
use crate::pool::WorkerPool;
use crate::progress::{OperationType, ProgressTracker};
use crate::pump::{FramePump, PumpMode};
use crate::scene::{SceneDetector, SceneInfo};
use crate::statistics::{BitrateAnalyzer, BitrateStatistics, FrameStatistics};

/// GOP length summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GopSummary {
    /// Mean GOP length in frames.
    pub average_length: f64,
    /// Longest GOP in frames.
    pub max_length: usize,
    /// Shortest GOP in frames.
    pub min_length: usize,
}

/// Everything a batch analysis produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Metadata of the analyzed stream.
    #[serde(rename = "streamInfo")]
    pub metadata: StreamMetadata,
    /// Frame statistics over all frames.
    #[serde(rename = "statistics")]
    pub frame_statistics: FrameStatistics,
    /// Whole-stream bitrate statistics.
    pub bitrate: BitrateStatistics,
    /// GOP length summary.
    pub gop_summary: GopSummary,
    /// Duplicate detection outcome.
    pub duplicates: DuplicateSummary,
    /// GOP segments in order.
    pub gops: Vec<GopSegment>,
    /// Scenes in order; together they cover every frame.
    pub scenes: Vec<SceneInfo>,
    /// Every frame in presentation order, with duplicate marks applied.
    pub frames: Vec<FrameRecord>,
}

/// Batch analysis driver.
#[derive(Debug, Clone, Default)]
pub struct VideoAnalysis {
    options: AnalysisOptions,
}

impl VideoAnalysis {
    /// Create a driver with the given options.
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    /// The options this driver runs with.
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Open `path` with FFmpeg and analyze it.
    pub fn run_file<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport, AnalyzerError> {
        self.validate()?;
        let engine = FfmpegEngine::open_file(path, &self.options.engine)?;
        self.run_engine(engine)
    }

    /// Analyze an already opened engine.
    pub fn run_engine<E: DecodeEngine>(&self, engine: E) -> Result<AnalysisReport, AnalyzerError> {
        let mut pump = FramePump::new(engine, PumpMode::Blocking);
        self.run_pump(&mut pump)
    }

    /// Analyze from the pump's current position to the end of the stream.
    pub fn run_pump<E: DecodeEngine>(
        &self,
        pump: &mut FramePump<E>,
    ) -> Result<AnalysisReport, AnalyzerError> {
        self.validate()?;
        let metadata = pump.stream_metadata().clone();
        log::debug!(
            "Analyzing {} stream ({}x{}, {:.2}s)",
            metadata.codec,
            metadata.width,
            metadata.height,
            metadata.duration
        );

        let frames = self.collect(pump, &metadata)?;
        let PostProcessed {
            gops,
            statistics: frame_statistics,
            bitrate,
            scenes,
            mut frames,
        } = self.post_process(frames, &metadata)?;

        self.check_cancelled()?;
        let detector = DuplicateFrameDetector::new(self.options.duplicates);
        let duplicates = detector.detect(&mut frames)?;
        self.report_stage(OperationType::DuplicateDetection);

        let gop_summary = GopSummary {
            average_length: GopSegmenter::average_length(&gops),
            max_length: GopSegmenter::max_length(&gops),
            min_length: GopSegmenter::min_length(&gops),
        };

        Ok(AnalysisReport {
            metadata,
            frame_statistics,
            bitrate,
            gop_summary,
            duplicates,
            gops,
            scenes,
            frames,
        })
    }

    fn validate(&self) -> Result<(), AnalyzerError> {
        self.bitrate_analyzer(30.0)?;
        self.options.scenes.validate()?;
        self.options.duplicates.validate()
    }

    fn bitrate_analyzer(&self, frame_rate: f64) -> Result<BitrateAnalyzer, AnalyzerError> {
        let nominal = if frame_rate > 0.0 { frame_rate } else { 30.0 };
        BitrateAnalyzer::new(self.options.bitrate_bucket_seconds, nominal)
    }

    fn check_cancelled(&self) -> Result<(), AnalyzerError> {
        if self.options.is_cancelled() {
            return Err(AnalyzerError::Cancelled);
        }
        Ok(())
    }

    fn collect<E: DecodeEngine>(
        &self,
        pump: &mut FramePump<E>,
        metadata: &StreamMetadata,
    ) -> Result<Vec<FrameRecord>, AnalyzerError> {
        let estimated = (metadata.duration * metadata.frame_rate).round();
        let total = (estimated > 0.0).then_some(estimated as u64);
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.options.progress),
            OperationType::FrameCollection,
            total,
            self.options.batch_size,
        );

        let mut frames = Vec::new();
        while self.options.frame_limit.is_none_or(|limit| frames.len() < limit) {
            self.check_cancelled()?;
            match pump.next_frame()? {
                Some(frame) => {
                    tracker.advance(Some(frame.timestamp));
                    frames.push(frame);
                }
                None => break,
            }
        }
        tracker.finish();

        log::debug!("Collected {} frames", frames.len());
        Ok(frames)
    }

    fn post_process(
        &self,
        frames: Vec<FrameRecord>,
        metadata: &StreamMetadata,
    ) -> Result<PostProcessed, AnalyzerError> {
        self.check_cancelled()?;
        let bitrate_analyzer = self.bitrate_analyzer(metadata.frame_rate)?;
        let scene_detector = SceneDetector::new(self.options.scenes)?;
        let frames = Arc::new(frames);
        let pool = WorkerPool::new(self.options.worker_threads)?;

        let gops = {
            let frames = Arc::clone(&frames);
            pool.submit(move || GopSegmenter::segment(&frames))?
        };
        let statistics = {
            let frames = Arc::clone(&frames);
            pool.submit(move || FrameStatistics::compute(&frames))?
        };
        let bitrate = {
            let frames = Arc::clone(&frames);
            pool.submit(move || bitrate_analyzer.analyze(&frames))?
        };
        let scenes = {
            let frames = Arc::clone(&frames);
            pool.submit(move || scene_detector.detect(&frames))?
        };
        pool.wait_all();

        let gops = gops.join()?;
        self.report_stage(OperationType::GopSegmentation);
        let statistics = statistics.join()?;
        let bitrate = bitrate.join()?;
        self.report_stage(OperationType::StatisticsComputation);
        let scenes = scenes.join()?;
        self.report_stage(OperationType::SceneDetection);
        pool.shutdown();

        let frames = Arc::try_unwrap(frames).unwrap_or_else(|shared| (*shared).clone());
        Ok(PostProcessed {
            gops,
            statistics,
            bitrate,
            scenes,
            frames,
        })
    }

    fn report_stage(&self, operation: OperationType) {
        let mut tracker =
            ProgressTracker::new(Arc::clone(&self.options.progress), operation, Some(1), 1);
        tracker.advance(None);
    }
}

struct PostProcessed {
    gops: Vec<GopSegment>,
    statistics: FrameStatistics,
    bitrate: BitrateStatistics,
    scenes: Vec<SceneInfo>,
    frames: Vec<FrameRecord>,
}
