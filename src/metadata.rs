//! Stream metadata types.
//!
//! [`StreamMetadata`] is produced once when a [`DecodeEngine`](crate::DecodeEngine)
//! opens a stream and is read-only afterwards. [`TimeBase`] converts the
//! engine's native timestamp ticks to seconds.

use serde::Serialize;

/// A rational time base: one tick lasts `numerator / denominator` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeBase {
    /// Tick numerator.
    pub numerator: i32,
    /// Tick denominator. A zero denominator is treated as one.
    pub denominator: i32,
}

impl TimeBase {
    /// Create a time base of `numerator / denominator` seconds per tick.
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Seconds per tick as a float.
    pub fn as_f64(self) -> f64 {
        self.numerator as f64 / self.denominator.max(1) as f64
    }

    /// Convert a tick count to seconds.
    pub fn ticks_to_seconds(self, ticks: i64) -> f64 {
        ticks as f64 * self.as_f64()
    }

    /// Convert seconds to the nearest tick count. Returns 0 for a degenerate
    /// time base.
    pub fn seconds_to_ticks(self, seconds: f64) -> i64 {
        let per_tick = self.as_f64();
        if per_tick <= 0.0 {
            return 0;
        }
        (seconds / per_tick).round() as i64
    }
}

impl Default for TimeBase {
    /// MPEG-TS style 90 kHz clock.
    fn default() -> Self {
        Self::new(1, 90_000)
    }
}

/// Codec-specific tiling layout (reported for AV1 streams only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileInfo {
    /// Number of tile columns.
    pub columns: u32,
    /// Number of tile rows.
    pub rows: u32,
}

/// Metadata for the selected video stream.
///
/// # Example
///
/// ```no_run
/// use streamscope::{EngineOptions, FfmpegEngine, FramePump, PumpMode};
///
/// let engine = FfmpegEngine::open_file("input.mp4", &EngineOptions::new())?;
/// let pump = FramePump::new(engine, PumpMode::Blocking);
/// let metadata = pump.stream_metadata();
/// println!("{} {}x{} @ {:.2} fps", metadata.codec, metadata.width, metadata.height, metadata.frame_rate);
/// # Ok::<(), streamscope::AnalyzerError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[must_use]
pub struct StreamMetadata {
    /// Codec identifier (e.g. `"h264"`, `"hevc"`, `"av1"`).
    pub codec: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frame rate in frames per second. Zero when unknown.
    pub frame_rate: f64,
    /// Duration in seconds. Zero for unbounded live sources.
    pub duration: f64,
    /// Nominal bit rate in bits per second. Zero when unknown.
    pub bit_rate: i64,
    /// Pixel format name (e.g. `"yuv420p"`).
    pub pixel_format: String,
    /// Index of the stream inside its container.
    pub stream_index: usize,
    /// Tiling layout, if the codec exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_info: Option<TileInfo>,
    /// Time base used for all PTS/DTS values of this stream.
    pub time_base: TimeBase,
}

impl StreamMetadata {
    /// Whether the source has no known end (live stream).
    pub fn is_unbounded(&self) -> bool {
        self.duration <= 0.0
    }

    /// Expected interval between frames, falling back to `fallback_rate`
    /// when the stream does not report a frame rate.
    pub fn frame_interval(&self, fallback_rate: f64) -> f64 {
        let rate = if self.frame_rate > 0.0 {
            self.frame_rate
        } else {
            fallback_rate
        };
        if rate > 0.0 { 1.0 / rate } else { 0.0 }
    }
}
