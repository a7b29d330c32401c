//! Frame and bitrate statistics over materialized frame lists.
//!
//! Both reducers are pure functions of their input slice. They are used on
//! whole-file frame lists by [`VideoAnalysis`](crate::VideoAnalysis) and on
//! copied-out window subsets by
//! [`SlidingWindowAnalyzer`](crate::SlidingWindowAnalyzer).

use serde::Serialize;

use crate::error::AnalyzerError;
use crate::frame::{FrameRecord, FrameType};

/// Per-type counts, size and QP averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStatistics {
    /// Number of frames.
    pub total_frames: usize,
    /// Intra-coded frames.
    #[serde(rename = "iFrames")]
    pub intra_frames: usize,
    /// Predicted frames.
    #[serde(rename = "pFrames")]
    pub predicted_frames: usize,
    /// Bi-predicted frames.
    #[serde(rename = "bFrames")]
    pub bi_predicted_frames: usize,
    /// Mean compressed frame size in bytes.
    pub average_frame_size: f64,
    /// Largest compressed frame in bytes.
    pub max_frame_size: usize,
    /// Smallest compressed frame in bytes.
    pub min_frame_size: usize,
    /// Mean quantization parameter.
    #[serde(rename = "averageQP")]
    pub average_qp: f64,
}

impl FrameStatistics {
    /// Reduce `frames`. Empty input yields all-zero statistics.
    pub fn compute(frames: &[FrameRecord]) -> Self {
        if frames.is_empty() {
            return Self::default();
        }

        let mut stats = Self {
            total_frames: frames.len(),
            min_frame_size: usize::MAX,
            ..Self::default()
        };
        let mut total_size: u64 = 0;
        let mut total_qp: i64 = 0;

        for frame in frames {
            match frame.frame_type {
                FrameType::Intra => stats.intra_frames += 1,
                FrameType::Predicted => stats.predicted_frames += 1,
                FrameType::BiPredicted => stats.bi_predicted_frames += 1,
                FrameType::Unknown => {}
            }
            total_size += frame.size as u64;
            total_qp += i64::from(frame.qp);
            stats.max_frame_size = stats.max_frame_size.max(frame.size);
            stats.min_frame_size = stats.min_frame_size.min(frame.size);
        }

        stats.average_frame_size = total_size as f64 / frames.len() as f64;
        stats.average_qp = total_qp as f64 / frames.len() as f64;
        stats
    }
}

/// One sample of a bitrate time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BitratePoint {
    /// Start of the bucket in seconds.
    pub timestamp: f64,
    /// Bits per second over the bucket.
    pub bitrate: f64,
}

/// Average, extremes, spread and time series of a bitrate measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BitrateStatistics {
    /// Total bits over elapsed seconds.
    pub average_bitrate: f64,
    /// Highest bucket bitrate.
    pub max_bitrate: f64,
    /// Lowest bucket bitrate.
    pub min_bitrate: f64,
    /// Population standard deviation of bucket bitrates around the average.
    #[serde(rename = "stdDeviation")]
    pub std_deviation: f64,
    /// Bucketed bitrate samples in time order.
    #[serde(rename = "timeSeriesData")]
    pub time_series: Vec<BitratePoint>,
}

/// Bucketed bitrate reducer.
///
/// Frames are grouped into consecutive buckets of `bucket_seconds`, each
/// starting at the first frame not covered by the previous bucket. A bucket's
/// bitrate is its bits over the span between its first and last frame, or
/// over `frames / nominal_frame_rate` when that span is not positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitrateAnalyzer {
    bucket_seconds: f64,
    nominal_frame_rate: f64,
}

impl Default for BitrateAnalyzer {
    fn default() -> Self {
        Self {
            bucket_seconds: 1.0,
            nominal_frame_rate: 30.0,
        }
    }
}

impl BitrateAnalyzer {
    /// Create an analyzer with the given bucket width and fallback frame
    /// rate.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::InvalidConfiguration`] unless both values are finite
    /// and positive.
    pub fn new(bucket_seconds: f64, nominal_frame_rate: f64) -> Result<Self, AnalyzerError> {
        if !bucket_seconds.is_finite() || bucket_seconds <= 0.0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "bitrate bucket must be a positive number of seconds (got {bucket_seconds})"
            )));
        }
        if !nominal_frame_rate.is_finite() || nominal_frame_rate <= 0.0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "nominal frame rate must be positive (got {nominal_frame_rate})"
            )));
        }
        Ok(Self {
            bucket_seconds,
            nominal_frame_rate,
        })
    }

    /// Bucket width in seconds.
    pub fn bucket_seconds(&self) -> f64 {
        self.bucket_seconds
    }

    /// Whole-list analysis. A non-positive overall span falls back to the
    /// nominal frame rate for the duration.
    pub fn analyze(&self, frames: &[FrameRecord]) -> BitrateStatistics {
        let Some(span) = span_seconds(frames) else {
            return BitrateStatistics::default();
        };
        let duration = if span > 0.0 {
            span
        } else {
            frames.len() as f64 / self.nominal_frame_rate
        };
        self.with_average(frames, total_bits(frames) / duration)
    }

    /// Windowed analysis for live data. A non-positive span yields zero
    /// statistics.
    pub fn analyze_window(&self, frames: &[FrameRecord]) -> BitrateStatistics {
        match span_seconds(frames) {
            Some(span) if span > 0.0 => self.with_average(frames, total_bits(frames) / span),
            _ => BitrateStatistics::default(),
        }
    }

    fn with_average(&self, frames: &[FrameRecord], average: f64) -> BitrateStatistics {
        let time_series = self.time_series(frames);

        let (min, max) = time_series
            .iter()
            .fold((average, average), |(min, max), point| {
                (min.min(point.bitrate), max.max(point.bitrate))
            });

        let std_deviation = if time_series.is_empty() {
            0.0
        } else {
            let variance = time_series
                .iter()
                .map(|point| (point.bitrate - average).powi(2))
                .sum::<f64>()
                / time_series.len() as f64;
            variance.sqrt()
        };

        BitrateStatistics {
            average_bitrate: average,
            max_bitrate: max,
            min_bitrate: min,
            std_deviation,
            time_series,
        }
    }

    fn time_series(&self, frames: &[FrameRecord]) -> Vec<BitratePoint> {
        let mut points = Vec::new();
        let mut start = 0;

        while start < frames.len() {
            let bucket_start = frames[start].timestamp;
            let bucket_end = bucket_start + self.bucket_seconds;
            let end = frames[start..]
                .iter()
                .position(|frame| frame.timestamp >= bucket_end)
                .map_or(frames.len(), |offset| start + offset);
            // A frame always belongs to its own bucket.
            let end = end.max(start + 1);

            let bucket = &frames[start..end];
            let span = bucket[bucket.len() - 1].timestamp - bucket[0].timestamp;
            let duration = if span > 0.0 {
                span
            } else {
                bucket.len() as f64 / self.nominal_frame_rate
            };
            points.push(BitratePoint {
                timestamp: bucket_start,
                bitrate: total_bits(bucket) / duration,
            });

            start = end;
        }

        points
    }
}

fn total_bits(frames: &[FrameRecord]) -> f64 {
    frames.iter().map(FrameRecord::bits).sum()
}

fn span_seconds(frames: &[FrameRecord]) -> Option<f64> {
    Some(frames.last()?.timestamp - frames.first()?.timestamp)
}
