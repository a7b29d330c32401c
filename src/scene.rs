//! Size-delta scene segmentation.
//!
//! A scene boundary is placed before frame `i` when its compressed size moved
//! sharply relative to frame `i - 1`. Let `delta` be `|size_i - size_{i-1}|`
//! divided by `size_{i-1}` (zero when the earlier frame is empty). Frame `i`
//! then starts a new scene when
//!
//! - it is a keyframe and `delta > threshold`, or
//! - `delta > 2 * threshold` regardless of type.
//!
//! This is a structural heuristic, not a perceptual cut detector: no pixels
//! are compared. It is deterministic and partitions its input, so every frame
//! belongs to exactly one [`SceneInfo`].

use serde::Serialize;

use crate::error::AnalyzerError;
use crate::frame::FrameRecord;

/// Sensitivity of [`SceneDetector`].
///
/// ```
/// use streamscope::SceneOptions;
///
/// let options = SceneOptions::new().with_threshold(0.5);
/// assert_eq!(options.threshold(), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneOptions {
    threshold: f64,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self { threshold: 0.3 }
    }
}

impl SceneOptions {
    /// Relative size-change threshold of 0.3.
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative size change (0.3 = 30 %) that marks a boundary at a keyframe.
    /// Non-keyframes need twice as much.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Configured threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub(crate) fn validate(&self) -> Result<(), AnalyzerError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "scene threshold must be finite and non-negative (got {})",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// One contiguous run of frames between two scene boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneInfo {
    /// Position of the scene, starting at 0.
    pub scene_index: usize,
    /// PTS of the first frame.
    pub start_pts: i64,
    /// PTS of the last frame.
    pub end_pts: i64,
    /// Index of the first frame in the analyzed sequence.
    #[serde(rename = "startFrameNumber")]
    pub start_frame: usize,
    /// Index of the last frame (inclusive).
    #[serde(rename = "endFrameNumber")]
    pub end_frame: usize,
    /// Timestamp of the first frame in seconds.
    pub start_timestamp: f64,
    /// Timestamp of the last frame in seconds.
    pub end_timestamp: f64,
    /// Frames in the scene.
    pub frame_count: usize,
    /// Mean compressed size of the scene's frames, in bytes.
    pub average_size: f64,
}

impl SceneInfo {
    /// Seconds between the first and last frame.
    pub fn duration(&self) -> f64 {
        self.end_timestamp - self.start_timestamp
    }
}

/// Splits a frame sequence into scenes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneDetector {
    options: SceneOptions,
}

impl SceneDetector {
    /// Create a detector.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::InvalidConfiguration`] for a negative or non-finite
    /// threshold.
    pub fn new(options: SceneOptions) -> Result<Self, AnalyzerError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The options this detector applies.
    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// Partition `frames` into scenes. Empty input yields no scenes.
    pub fn detect(&self, frames: &[FrameRecord]) -> Vec<SceneInfo> {
        if frames.is_empty() {
            return Vec::new();
        }

        let mut starts = vec![0];
        starts.extend(
            frames
                .windows(2)
                .enumerate()
                .filter(|(_, pair)| self.is_boundary(&pair[0], &pair[1]))
                .map(|(index, _)| index + 1),
        );

        starts
            .iter()
            .enumerate()
            .map(|(scene_index, &start)| {
                let end = starts
                    .get(scene_index + 1)
                    .map_or(frames.len() - 1, |next| next - 1);
                scene(scene_index, start, end, frames)
            })
            .collect()
    }

    fn is_boundary(&self, previous: &FrameRecord, current: &FrameRecord) -> bool {
        let delta = if previous.size > 0 {
            current.size.abs_diff(previous.size) as f64 / previous.size as f64
        } else {
            0.0
        };

        let threshold = self.options.threshold;
        (current.is_keyframe && delta > threshold) || delta > threshold * 2.0
    }

    /// Mean scene duration in seconds; 0 for no scenes.
    pub fn average_duration(scenes: &[SceneInfo]) -> f64 {
        if scenes.is_empty() {
            return 0.0;
        }
        scenes.iter().map(SceneInfo::duration).sum::<f64>() / scenes.len() as f64
    }
}

fn scene(scene_index: usize, start: usize, end: usize, frames: &[FrameRecord]) -> SceneInfo {
    let first = &frames[start];
    let last = &frames[end];
    let members = &frames[start..=end];
    let total: usize = members.iter().map(|frame| frame.size).sum();

    SceneInfo {
        scene_index,
        start_pts: first.pts,
        end_pts: last.pts,
        start_frame: start,
        end_frame: end,
        start_timestamp: first.timestamp,
        end_timestamp: last.timestamp,
        frame_count: members.len(),
        average_size: total as f64 / members.len() as f64,
    }
}
