//! # streamscope
//!
//! Structural telemetry for compressed video streams: per-frame records,
//! Group of Pictures segmentation, bitrate and quality statistics,
//! duplicate-frame grouping and live anomaly detection.
//!
//! `streamscope` does not look at pixels. It drives a codec engine (FFmpeg via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) by default) through a
//! pull-based decode pump and reasons about what comes out: frame types,
//! compressed sizes, quantizers and timestamps.
//!
//! ## Quick Start
//!
//! ### Analyze a File
//!
//! ```no_run
//! use streamscope::{AnalysisOptions, VideoAnalysis};
//!
//! let report = VideoAnalysis::new(AnalysisOptions::new()).run_file("input.mp4")?;
//! println!("{} frames in {} GOPs", report.frames.len(), report.gops.len());
//! println!("average bitrate: {:.0} bps", report.bitrate.average_bitrate);
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```
//!
//! ### Pull Frame Records
//!
//! ```no_run
//! use streamscope::{EngineOptions, FfmpegEngine, FramePump, PumpMode};
//!
//! let engine = FfmpegEngine::open_file("input.mp4", &EngineOptions::new())?;
//! for frame in FramePump::new(engine, PumpMode::Blocking) {
//!     let frame = frame?;
//!     println!("{:>8} {:?} {:>6} bytes qp={}", frame.pts, frame.frame_type, frame.size, frame.qp);
//! }
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```
//!
//! ### Monitor a Live Stream
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use streamscope::{AnalyzerOptions, EngineOptions, SlidingWindowAnalyzer};
//!
//! let mut analyzer = SlidingWindowAnalyzer::open_live(
//!     "rtsp://camera.local/stream",
//!     &EngineOptions::new(),
//!     AnalyzerOptions::new(),
//! )?;
//! analyzer.enable_streaming_export("frames.jsonl")?;
//! analyzer.start()?;
//! std::thread::sleep(Duration::from_secs(30));
//! for anomaly in analyzer.anomalies() {
//!     println!("{anomaly}");
//! }
//! analyzer.stop();
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```
//!
//! ## Features
//!
//! - **Decode pump**: ordered frame records with strictly increasing PTS,
//!   end-of-stream draining and reset for a second pass
//! - **GOP segmentation**: per-GOP type counts and sizes, length reducers
//! - **Statistics**: frame-type counts, size and QP averages, bucketed
//!   bitrate time series
//! - **Duplicate detection**: size/QP/type heuristics chained into groups
//! - **Scene segmentation**: size-delta boundaries with per-scene summaries
//! - **Live analysis**: bounded sliding window, anomaly log, callbacks and
//!   JSON-Lines export on one background thread
//! - **Worker pool**: parallel post-processing with panic-safe task handles
//! - **Progress & cancellation**: cooperative callbacks and
//!   `CancellationToken` for long-running batch analyses
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `FrameStream`, `AnomalyStream` and `AnalysisFuture` via Tokio |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system. See the
//! [README](https://github.com/skanderjeddi/streamscope#installation) for
//! platform-specific instructions.

pub mod analysis;
pub mod analyzer;
pub mod anomaly;
pub mod config;
pub mod duplicate;
pub mod engine;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod ffmpeg_engine;
pub mod frame;
pub mod gop;
pub mod metadata;
pub mod pool;
pub mod progress;
pub mod pump;
pub mod scene;
pub mod statistics;
#[cfg(feature = "async")]
pub mod stream;

pub use analysis::{AnalysisReport, GopSummary, VideoAnalysis};
pub use analyzer::{AnalyzerState, AnomalyCallback, BufferStatus, FrameCallback, SlidingWindowAnalyzer};
pub use anomaly::{Anomaly, AnomalyKind};
pub use config::{AnalysisOptions, AnalyzerOptions};
pub use duplicate::{DuplicateFrameDetector, DuplicateOptions, DuplicateSummary};
pub use engine::{
    CompressedUnit, DecodeEngine, EngineOptions, RawFrame, ReadOutcome, ReceiveOutcome, SendOutcome,
    resolve_thread_count,
};
pub use error::AnalyzerError;
pub use export::{JsonLinesWriter, write_json};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use ffmpeg_engine::FfmpegEngine;
pub use frame::{FrameRecord, FrameType, FrameTypeRule, PictureType};
pub use gop::{GopSegment, GopSegmenter};
pub use metadata::{StreamMetadata, TileInfo, TimeBase};
pub use pool::{TaskHandle, WorkerPool};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use pump::{FramePump, PumpMode};
pub use scene::{SceneDetector, SceneInfo, SceneOptions};
pub use statistics::{BitrateAnalyzer, BitratePoint, BitrateStatistics, FrameStatistics};
#[cfg(feature = "async")]
pub use stream::{AnalysisFuture, AnomalyStream, FrameStream, anomaly_stream, frame_stream};
