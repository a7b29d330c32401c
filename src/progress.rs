//! Progress reporting and cancellation support.
//!
//! [`ProgressCallback`] observes long-running batch analyses,
//! [`CancellationToken`] requests cooperative cancellation, and
//! [`ProgressInfo`] is the snapshot delivered to callbacks.
//!
//! The same token type is handed to live FFmpeg sources as their interrupt
//! flag, so cancelling it also aborts a blocking network read.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use streamscope::{AnalysisOptions, ProgressCallback, ProgressInfo, VideoAnalysis};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {} frames", info.operation, info.current);
//!     }
//! }
//!
//! let options = AnalysisOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_batch_size(100);
//! let report = VideoAnalysis::new(options).run_file("input.mp4")?;
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Pulling frame records out of the decoder.
    FrameCollection,
    /// Segmenting frames into groups of pictures.
    GopSegmentation,
    /// Computing bitrate and frame statistics.
    StatisticsComputation,
    /// Marking duplicate frames.
    DuplicateDetection,
    /// Splitting frames into scenes.
    SceneDetection,
}

/// A snapshot of analysis progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many items have been processed so far.
    pub current: u64,
    /// Total items expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Presentation time (seconds) of the item just processed.
    pub current_timestamp: Option<f64>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`]; callbacks are infallible
/// and cannot halt the operation. Use [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during an operation.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. Default when nothing is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share the same flag.
///
/// ```
/// use streamscope::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Clear a previous cancellation request so the token can be reused.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks progress timing and emits callbacks every `batch_size` items.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one completed item.
    pub(crate) fn advance(&mut self, timestamp: Option<f64>) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(timestamp);
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, timestamp: Option<f64>) {
        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current as f32 / total as f32) * 100.0);

        let info = ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
            current_timestamp: timestamp,
        };

        self.callback.on_progress(&info);
    }
}
