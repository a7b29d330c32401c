//! Analysis configuration.
//!
//! [`AnalyzerOptions`] sizes and tunes a
//! [`SlidingWindowAnalyzer`](crate::SlidingWindowAnalyzer);
//! [`AnalysisOptions`] threads progress callbacks, cancellation and tuning
//! through a batch [`VideoAnalysis`](crate::VideoAnalysis) without polluting
//! every function signature. Both are validated where they are consumed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use streamscope::{AnalysisOptions, CancellationToken, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = AnalysisOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(100);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::duplicate::DuplicateOptions;
use crate::engine::EngineOptions;
use crate::error::AnalyzerError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::scene::SceneOptions;

/// Settings for a [`SlidingWindowAnalyzer`](crate::SlidingWindowAnalyzer).
///
/// Defaults: 300-frame window, 100 anomalies, 30 fps nominal rate, 10 ms
/// backoff, 3x spike factor, QP threshold 40, low-water mark 10.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOptions {
    pub(crate) max_window_size: usize,
    pub(crate) anomaly_capacity: usize,
    pub(crate) nominal_frame_rate: f64,
    pub(crate) backoff: Duration,
    pub(crate) spike_factor: f64,
    pub(crate) quality_qp_threshold: i32,
    pub(crate) low_water_mark: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            max_window_size: 300,
            anomaly_capacity: 100,
            nominal_frame_rate: 30.0,
            backoff: Duration::from_millis(10),
            spike_factor: 3.0,
            quality_qp_threshold: 40,
            low_water_mark: 10,
        }
    }
}

impl AnalyzerOptions {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of frames kept in the rolling window.
    #[must_use]
    pub fn with_max_window_size(mut self, frames: usize) -> Self {
        self.max_window_size = frames;
        self
    }

    /// Maximum number of anomalies kept in the log.
    #[must_use]
    pub fn with_anomaly_capacity(mut self, entries: usize) -> Self {
        self.anomaly_capacity = entries;
        self
    }

    /// Frame rate assumed by the frame-drop rule.
    #[must_use]
    pub fn with_nominal_frame_rate(mut self, fps: f64) -> Self {
        self.nominal_frame_rate = fps;
        self
    }

    /// Sleep between polls when the live source has no frame ready.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Size ratio above which a frame counts as a bitrate spike.
    #[must_use]
    pub fn with_spike_factor(mut self, factor: f64) -> Self {
        self.spike_factor = factor;
        self
    }

    /// QP above which a frame counts as a quality drop.
    #[must_use]
    pub fn with_quality_qp_threshold(mut self, qp: i32) -> Self {
        self.quality_qp_threshold = qp;
        self
    }

    /// Buffered frame count below which the analyzer reports buffering.
    #[must_use]
    pub fn with_low_water_mark(mut self, frames: usize) -> Self {
        self.low_water_mark = frames;
        self
    }

    /// Maximum window size in frames.
    pub fn max_window_size(&self) -> usize {
        self.max_window_size
    }

    /// Maximum anomaly log length.
    pub fn anomaly_capacity(&self) -> usize {
        self.anomaly_capacity
    }

    /// Nominal frame rate in frames per second.
    pub fn nominal_frame_rate(&self) -> f64 {
        self.nominal_frame_rate
    }

    pub(crate) fn validate(&self) -> Result<(), AnalyzerError> {
        if self.max_window_size == 0 {
            return Err(AnalyzerError::InvalidConfiguration(
                "window size must be at least one frame".to_string(),
            ));
        }
        if self.anomaly_capacity == 0 {
            return Err(AnalyzerError::InvalidConfiguration(
                "anomaly capacity must be at least one entry".to_string(),
            ));
        }
        if !self.nominal_frame_rate.is_finite() || self.nominal_frame_rate <= 0.0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "nominal frame rate must be positive (got {})",
                self.nominal_frame_rate
            )));
        }
        if !self.spike_factor.is_finite() || self.spike_factor <= 0.0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "spike factor must be positive (got {})",
                self.spike_factor
            )));
        }
        Ok(())
    }
}

/// Configuration for a batch [`VideoAnalysis`](crate::VideoAnalysis).
///
/// All fields have sensible defaults: no progress callback, no cancellation,
/// progress every frame, no frame limit, one-second bitrate buckets, default
/// duplicate and scene rules and an auto-sized worker pool.
#[derive(Clone)]
pub struct AnalysisOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
    pub(crate) frame_limit: Option<usize>,
    pub(crate) bitrate_bucket_seconds: f64,
    pub(crate) duplicates: DuplicateOptions,
    pub(crate) scenes: SceneOptions,
    pub(crate) worker_threads: usize,
    pub(crate) engine: EngineOptions,
}

impl Debug for AnalysisOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalysisOptions")
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("frame_limit", &self.frame_limit)
            .field("bitrate_bucket_seconds", &self.bitrate_bucket_seconds)
            .field("duplicates", &self.duplicates)
            .field("scenes", &self.scenes)
            .field("worker_threads", &self.worker_threads)
            .field("engine", &self.engine)
            .finish()
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
            frame_limit: None,
            bitrate_bucket_seconds: 1.0,
            duplicates: DuplicateOptions::default(),
            scenes: SceneOptions::default(),
            worker_threads: 0,
            engine: EngineOptions::default(),
        }
    }

    /// Attach a progress callback, fired every
    /// [`batch_size`](AnalysisOptions::with_batch_size) frames.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token. Cancelling it makes the analysis return
    /// [`AnalyzerError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Stop collecting after `frames` frames.
    #[must_use]
    pub fn with_frame_limit(mut self, frames: usize) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Width of the bitrate time-series buckets in seconds.
    #[must_use]
    pub fn with_bitrate_bucket(mut self, seconds: f64) -> Self {
        self.bitrate_bucket_seconds = seconds;
        self
    }

    /// Duplicate matching rules.
    #[must_use]
    pub fn with_duplicates(mut self, options: DuplicateOptions) -> Self {
        self.duplicates = options;
        self
    }

    /// Scene segmentation sensitivity.
    #[must_use]
    pub fn with_scenes(mut self, options: SceneOptions) -> Self {
        self.scenes = options;
        self
    }

    /// Worker threads for post-processing (`0` = auto-detect).
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Engine settings used when the analysis opens a file.
    #[must_use]
    pub fn with_engine(mut self, options: EngineOptions) -> Self {
        self.engine = options;
        self
    }

    /// Whether cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
