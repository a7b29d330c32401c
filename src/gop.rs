//! Group of Pictures segmentation.
//!
//! [`GopSegmenter`] splits an ordered frame list into [`GopSegment`]s. A new
//! segment starts at every frame that is both intra-coded and flagged as a
//! keyframe; frames before the first such frame form segment 0.
//!
//! # Example
//!
//! ```
//! use streamscope::{FrameRecord, FrameType, GopSegmenter};
//!
//! let frames: Vec<FrameRecord> = [FrameType::Intra, FrameType::Predicted, FrameType::Intra]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(i, kind)| {
//!         FrameRecord::new(i as i64, i as i64, kind, 100, 0, kind == FrameType::Intra, i as f64)
//!     })
//!     .collect();
//!
//! let segments = GopSegmenter::segment(&frames);
//! assert_eq!(segments.len(), 2);
//! assert_eq!(GopSegmenter::max_length(&segments), 2);
//! ```

use serde::Serialize;

use crate::frame::{FrameRecord, FrameType};

/// One group of pictures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GopSegment {
    /// Zero-based segment index.
    #[serde(rename = "gopIndex")]
    pub index: usize,
    /// PTS of the first frame in the segment.
    pub start_pts: i64,
    /// PTS of the last frame in the segment.
    pub end_pts: i64,
    /// Number of frames in the segment.
    pub frame_count: usize,
    /// Intra-coded frames.
    #[serde(rename = "iFrameCount")]
    pub intra_count: usize,
    /// Predicted frames.
    #[serde(rename = "pFrameCount")]
    pub predicted_count: usize,
    /// Bi-predicted frames.
    #[serde(rename = "bFrameCount")]
    pub bi_predicted_count: usize,
    /// Frames whose type the codec did not report.
    pub unknown_count: usize,
    /// Sum of compressed frame sizes in bytes.
    pub total_size: u64,
    /// Open-GOP flag. Open GOPs are not detected, so this is always `false`.
    #[serde(rename = "isOpenGOP")]
    pub is_open: bool,
}

impl GopSegment {
    fn from_frames(index: usize, frames: &[FrameRecord]) -> Option<Self> {
        let first = frames.first()?;
        let last = frames.last()?;

        let mut segment = GopSegment {
            index,
            start_pts: first.pts,
            end_pts: last.pts,
            frame_count: frames.len(),
            intra_count: 0,
            predicted_count: 0,
            bi_predicted_count: 0,
            unknown_count: 0,
            total_size: 0,
            is_open: false,
        };

        for frame in frames {
            match frame.frame_type {
                FrameType::Intra => segment.intra_count += 1,
                FrameType::Predicted => segment.predicted_count += 1,
                FrameType::BiPredicted => segment.bi_predicted_count += 1,
                FrameType::Unknown => segment.unknown_count += 1,
            }
            segment.total_size += frame.size as u64;
        }

        Some(segment)
    }
}

/// Stateless GOP segmentation and length reducers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GopSegmenter;

impl GopSegmenter {
    /// Split `frames` into segments. Empty input yields an empty list.
    pub fn segment(frames: &[FrameRecord]) -> Vec<GopSegment> {
        log::debug!("Segmenting {} frames into GOPs", frames.len());

        let mut segments = Vec::new();
        let mut start = 0;

        for (position, frame) in frames.iter().enumerate().skip(1) {
            if frame.starts_gop() {
                segments.extend(GopSegment::from_frames(segments.len(), &frames[start..position]));
                start = position;
            }
        }
        segments.extend(GopSegment::from_frames(segments.len(), &frames[start..]));

        segments
    }

    /// Mean segment length in frames (0 for no segments).
    pub fn average_length(segments: &[GopSegment]) -> f64 {
        if segments.is_empty() {
            return 0.0;
        }
        let total: usize = segments.iter().map(|segment| segment.frame_count).sum();
        total as f64 / segments.len() as f64
    }

    /// Longest segment in frames (0 for no segments).
    pub fn max_length(segments: &[GopSegment]) -> usize {
        segments
            .iter()
            .map(|segment| segment.frame_count)
            .max()
            .unwrap_or(0)
    }

    /// Shortest segment in frames (0 for no segments).
    pub fn min_length(segments: &[GopSegment]) -> usize {
        segments
            .iter()
            .map(|segment| segment.frame_count)
            .min()
            .unwrap_or(0)
    }
}
