//! Async adapters (feature `async`).
//!
//! [`FrameStream`] and [`AnomalyStream`] turn the live analyzer's synchronous
//! callbacks into [`tokio_stream::Stream`]s. The callbacks use `try_send` on a
//! bounded channel, so a slow consumer loses items instead of stalling the
//! analysis thread. [`AnalysisFuture`] runs a batch
//! [`VideoAnalysis`](crate::VideoAnalysis) on a blocking thread.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use streamscope::{AnalyzerOptions, EngineOptions, SlidingWindowAnalyzer, frame_stream};
//!
//! # async fn example() -> Result<(), streamscope::AnalyzerError> {
//! let mut analyzer = SlidingWindowAnalyzer::open_live(
//!     "rtsp://camera.local/stream",
//!     &EngineOptions::new(),
//!     AnalyzerOptions::new(),
//! )?;
//! let mut frames = frame_stream(&mut analyzer, None);
//! analyzer.start()?;
//!
//! while let Some(frame) = frames.next().await {
//!     println!("{} {:?} {} bytes", frame.pts, frame.frame_type, frame.size);
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{Receiver, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::analysis::{AnalysisReport, VideoAnalysis};
use crate::analyzer::SlidingWindowAnalyzer;
use crate::anomaly::Anomaly;
use crate::engine::DecodeEngine;
use crate::error::AnalyzerError;
use crate::frame::FrameRecord;

/// Default bounded-channel capacity for the live streams.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Frames analyzed by a [`SlidingWindowAnalyzer`], as a stream.
///
/// Ends once the source is exhausted or fails, or when the analyzer is
/// dropped. A plain `stop()` leaves the stream open for the next run.
pub struct FrameStream {
    receiver: Receiver<FrameRecord>,
}

impl Stream for FrameStream {
    type Item = FrameRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Anomalies detected by a [`SlidingWindowAnalyzer`], as a stream.
///
/// Ends under the same conditions as [`FrameStream`].
pub struct AnomalyStream {
    receiver: Receiver<Anomaly>,
}

impl Stream for AnomalyStream {
    type Item = Anomaly;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Install a frame callback on `analyzer` that feeds the returned stream.
///
/// Replaces any frame callback already set and takes effect on the next
/// [`start`](SlidingWindowAnalyzer::start). `capacity` defaults to 256.
pub fn frame_stream<E: DecodeEngine + 'static>(
    analyzer: &mut SlidingWindowAnalyzer<E>,
    capacity: Option<usize>,
) -> FrameStream {
    let capacity = capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1);
    let (sender, receiver) = tokio::sync::mpsc::channel(capacity);

    analyzer.set_frame_callback(Arc::new(move |frame: &FrameRecord| {
        if let Err(TrySendError::Full(frame)) = sender.try_send(frame.clone()) {
            log::warn!("Frame stream full, dropping frame pts={}", frame.pts);
        }
    }));

    FrameStream { receiver }
}

/// Install an anomaly callback on `analyzer` that feeds the returned stream.
///
/// Replaces any anomaly callback already set and takes effect on the next
/// [`start`](SlidingWindowAnalyzer::start). `capacity` defaults to 256.
pub fn anomaly_stream<E: DecodeEngine + 'static>(
    analyzer: &mut SlidingWindowAnalyzer<E>,
    capacity: Option<usize>,
) -> AnomalyStream {
    let capacity = capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1);
    let (sender, receiver) = tokio::sync::mpsc::channel(capacity);

    analyzer.set_anomaly_callback(Arc::new(move |anomaly: &Anomaly| {
        if let Err(TrySendError::Full(anomaly)) = sender.try_send(anomaly.clone()) {
            log::warn!("Anomaly stream full, dropping {anomaly}");
        }
    }));

    AnomalyStream { receiver }
}

/// A batch analysis running on a blocking thread.
///
/// ```no_run
/// use streamscope::{AnalysisFuture, AnalysisOptions, VideoAnalysis};
///
/// # async fn example() -> Result<(), streamscope::AnalyzerError> {
/// let report = AnalysisFuture::spawn(VideoAnalysis::new(AnalysisOptions::new()), "input.mp4").await?;
/// println!("{} frames", report.frames.len());
/// # Ok(())
/// # }
/// ```
pub struct AnalysisFuture {
    handle: JoinHandle<Result<AnalysisReport, AnalyzerError>>,
}

impl AnalysisFuture {
    /// Start analyzing `path` on tokio's blocking pool. Must be called from
    /// within a tokio runtime.
    pub fn spawn<P: Into<PathBuf>>(analysis: VideoAnalysis, path: P) -> Self {
        let path = path.into();
        let handle = tokio::task::spawn_blocking(move || analysis.run_file(&path));
        Self { handle }
    }
}

impl Future for AnalysisFuture {
    type Output = Result<AnalysisReport, AnalyzerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|result| {
            result.unwrap_or_else(|error| Err(AnalyzerError::TaskPanicked(error.to_string())))
        })
    }
}
