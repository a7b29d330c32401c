//! Codec engine capability contract.
//!
//! [`DecodeEngine`] is the boundary between this crate and whatever actually
//! parses containers and decodes pictures. [`FfmpegEngine`](crate::FfmpegEngine)
//! implements it on top of `ffmpeg-next`; [`FramePump`](crate::FramePump)
//! drives any implementation through the send/receive protocol.
//!
//! The engine reports outcomes rather than raw status codes. "Try again"
//! conditions are expressed as [`SendOutcome::TryAgain`],
//! [`ReceiveOutcome::NeedsInput`] and [`ReadOutcome::Pending`]; only fatal
//! conditions come back as `Err`.

use crate::error::AnalyzerError;
use crate::ffmpeg::FfmpegLogLevel;
use crate::frame::PictureType;
use crate::metadata::StreamMetadata;
use crate::progress::CancellationToken;

/// Read-only view of a compressed unit (packet) produced by the demuxer.
pub trait CompressedUnit {
    /// Container stream this unit belongs to.
    fn stream_index(&self) -> usize;
    /// Payload size in bytes.
    fn size(&self) -> usize;
    /// Presentation timestamp, if the container carries one.
    fn pts(&self) -> Option<i64>;
}

/// A decoded frame as reported by the engine, before classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFrame {
    /// Presentation timestamp in stream ticks.
    pub pts: Option<i64>,
    /// Decode timestamp of the packet that produced the frame.
    pub dts: Option<i64>,
    /// Keyframe flag.
    pub is_keyframe: bool,
    /// Codec-reported picture type.
    pub picture_type: PictureType,
    /// Per-frame quantizer, if the codec exposes one.
    pub quantizer: Option<i32>,
}

/// Result of asking the demuxer for the next compressed unit.
#[derive(Debug)]
pub enum ReadOutcome<U> {
    /// A unit was read.
    Unit(U),
    /// No data is ready yet (non-blocking live source).
    Pending,
    /// The input has no more units.
    EndOfInput,
}

/// Result of forwarding a unit to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The decoder took the unit.
    Accepted,
    /// The decoder must emit frames before it can accept more input.
    TryAgain,
}

/// Result of asking the decoder for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReceiveOutcome {
    /// A decoded frame.
    Frame(RawFrame),
    /// The decoder needs more input before it can produce a frame.
    NeedsInput,
    /// The decoder has been flushed and will produce nothing more.
    Exhausted,
}

/// Capability contract of a codec/demuxer engine.
///
/// An engine is opened on one stream and selects one video stream index.
/// Resources are released on `Drop`.
pub trait DecodeEngine: Send {
    /// The engine's compressed unit type. Units may be held by a pump that
    /// moves to the analysis thread.
    type Unit: CompressedUnit + Send;

    /// Metadata of the selected video stream.
    fn stream_metadata(&self) -> &StreamMetadata;

    /// Read the next compressed unit from the demuxer.
    fn read_unit(&mut self) -> Result<ReadOutcome<Self::Unit>, AnalyzerError>;

    /// Forward a unit to the decoder.
    fn send_unit(&mut self, unit: &Self::Unit) -> Result<SendOutcome, AnalyzerError>;

    /// Signal end of input so the decoder releases its buffered frames.
    fn send_end_of_input(&mut self) -> Result<(), AnalyzerError>;

    /// Receive the next decoded frame, if any.
    fn receive_frame(&mut self) -> Result<ReceiveOutcome, AnalyzerError>;

    /// Seek the demuxer to `seconds` (nearest preceding keyframe).
    fn seek(&mut self, seconds: f64) -> Result<(), AnalyzerError>;

    /// Drop all decoder-internal state (buffered frames and references).
    fn flush(&mut self);

    /// Token that aborts a blocking operation in progress when cancelled.
    ///
    /// File-backed engines have nothing to abort and return `None`.
    fn interrupt_handle(&self) -> Option<CancellationToken> {
        None
    }
}

/// Resolve a requested decode/worker thread count.
///
/// `0` means auto-detect; any other value is clamped to the hardware
/// concurrency. The result is never below one.
pub fn resolve_thread_count(requested: usize) -> usize {
    let hardware = num_cpus::get().max(1);
    let wanted = if requested == 0 { hardware } else { requested };
    wanted.min(hardware).max(1)
}

/// Options applied when an engine opens a stream.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Decoder thread count (`0` = auto-detect).
    pub(crate) thread_count: usize,
    /// Explicit video stream index. `None` picks the best video stream.
    pub(crate) stream_index: Option<usize>,
    /// FFmpeg console verbosity to apply before opening.
    pub(crate) log_level: Option<FfmpegLogLevel>,
}

impl EngineOptions {
    /// Default options: auto thread count, best video stream, FFmpeg log
    /// level untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the decoder thread count (`0` = auto-detect).
    #[must_use]
    pub fn with_thread_count(mut self, threads: usize) -> Self {
        self.thread_count = threads;
        self
    }

    /// Select a specific container stream index.
    #[must_use]
    pub fn with_stream_index(mut self, index: usize) -> Self {
        self.stream_index = Some(index);
        self
    }

    /// Set FFmpeg's own log level when the engine opens.
    #[must_use]
    pub fn with_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// The thread count the decoder will actually use.
    pub fn effective_thread_count(&self) -> usize {
        resolve_thread_count(self.thread_count)
    }
}
