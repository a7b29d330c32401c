//! Near-duplicate frame detection.
//!
//! Adjacent frames whose compressed sizes differ by at most a tolerance (and,
//! optionally, share QP and frame type) are flagged as duplicates. Runs of
//! matching frames are chained into one group.
//!
//! Detection always starts by clearing previous results, so re-running with a
//! different configuration never depends on an earlier run.

use serde::Serialize;

use crate::error::AnalyzerError;
use crate::frame::FrameRecord;

/// Matching rules for [`DuplicateFrameDetector`].
///
/// ```
/// use streamscope::DuplicateOptions;
///
/// let options = DuplicateOptions::new()
///     .with_size_tolerance(2.5)
///     .with_same_qp(false);
/// assert_eq!(options.size_tolerance_percent(), 2.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateOptions {
    size_tolerance_percent: f32,
    require_same_qp: bool,
    require_same_type: bool,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            size_tolerance_percent: 1.0,
            require_same_qp: true,
            require_same_type: true,
        }
    }
}

impl DuplicateOptions {
    /// 1 % size tolerance, same QP and same type required.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum size difference, in percent of the earlier frame's size.
    #[must_use]
    pub fn with_size_tolerance(mut self, percent: f32) -> Self {
        self.size_tolerance_percent = percent;
        self
    }

    /// Require equal quantization parameters.
    #[must_use]
    pub fn with_same_qp(mut self, required: bool) -> Self {
        self.require_same_qp = required;
        self
    }

    /// Require equal frame types.
    #[must_use]
    pub fn with_same_type(mut self, required: bool) -> Self {
        self.require_same_type = required;
        self
    }

    /// Configured size tolerance in percent.
    pub fn size_tolerance_percent(&self) -> f32 {
        self.size_tolerance_percent
    }

    /// Whether QP equality is required.
    pub fn requires_same_qp(&self) -> bool {
        self.require_same_qp
    }

    /// Whether frame-type equality is required.
    pub fn requires_same_type(&self) -> bool {
        self.require_same_type
    }

    pub(crate) fn validate(&self) -> Result<(), AnalyzerError> {
        if !self.size_tolerance_percent.is_finite() || self.size_tolerance_percent < 0.0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "size tolerance must be a finite, non-negative percentage (got {})",
                self.size_tolerance_percent
            )));
        }
        Ok(())
    }
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSummary {
    /// Frames flagged as duplicates.
    pub duplicate_frames: usize,
    /// Distinct duplicate groups.
    pub groups: usize,
}

/// Marks consecutive near-duplicate frames in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateFrameDetector {
    options: DuplicateOptions,
}

impl DuplicateFrameDetector {
    /// Create a detector with the given rules.
    pub fn new(options: DuplicateOptions) -> Self {
        Self { options }
    }

    /// The rules this detector applies.
    pub fn options(&self) -> &DuplicateOptions {
        &self.options
    }

    /// Flag duplicates in `frames` and assign group ids starting at 0.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::InvalidConfiguration`] for a negative or non-finite
    /// tolerance. The frames are left untouched in that case.
    pub fn detect(&self, frames: &mut [FrameRecord]) -> Result<DuplicateSummary, AnalyzerError> {
        self.options.validate()?;

        for frame in frames.iter_mut() {
            frame.clear_duplicate();
        }

        let mut next_group: i64 = 0;
        for position in 1..frames.len() {
            let (head, tail) = frames.split_at_mut(position);
            let previous = &mut head[position - 1];
            let current = &mut tail[0];

            if !self.matches(previous, current) {
                continue;
            }

            if previous.duplicate_group == FrameRecord::NO_GROUP {
                previous.duplicate_group = next_group;
                next_group += 1;
            }
            previous.is_duplicate = true;
            current.is_duplicate = true;
            current.duplicate_group = previous.duplicate_group;
        }

        let summary = DuplicateSummary {
            duplicate_frames: frames.iter().filter(|frame| frame.is_duplicate).count(),
            groups: next_group as usize,
        };
        log::debug!(
            "Duplicate detection: {} frames in {} groups",
            summary.duplicate_frames,
            summary.groups
        );
        Ok(summary)
    }

    fn matches(&self, previous: &FrameRecord, current: &FrameRecord) -> bool {
        let allowed = previous.size as f64 * f64::from(self.options.size_tolerance_percent) / 100.0;
        let difference = current.size.abs_diff(previous.size) as f64;

        difference <= allowed
            && (!self.options.require_same_qp || current.qp == previous.qp)
            && (!self.options.require_same_type || current.frame_type == previous.frame_type)
    }
}
