//! Live anomaly events and the rules that raise them.
//!
//! Every incoming frame is checked once against the frame before it:
//!
//! - [`AnomalyKind::FrameDrop`]: the timestamp gap exceeds twice the expected
//!   frame interval.
//! - [`AnomalyKind::BitrateSpike`]: the frame is more than `spike_factor`
//!   times larger than its predecessor.
//! - [`AnomalyKind::QualityDrop`]: the frame's QP is above a fixed threshold
//!   (no predecessor needed).

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

use crate::frame::FrameRecord;

/// Category of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// Gap between consecutive frames larger than expected.
    FrameDrop,
    /// Sudden growth of the compressed frame size.
    BitrateSpike,
    /// Quantization parameter above the quality threshold.
    QualityDrop,
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            AnomalyKind::FrameDrop => "FRAME_DROP",
            AnomalyKind::BitrateSpike => "BITRATE_SPIKE",
            AnomalyKind::QualityDrop => "QUALITY_DROP",
        })
    }
}

/// One entry of the anomaly log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    /// What was detected.
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    /// Timestamp (seconds) of the frame that triggered it.
    pub timestamp: f64,
    /// Human-readable detail.
    pub description: String,
}

impl Display for Anomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{:.3}s] {}: {}", self.timestamp, self.kind, self.description)
    }
}

/// Thresholds for the per-frame anomaly checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AnomalyRules {
    /// Seconds between frames at the nominal frame rate.
    pub(crate) expected_interval: f64,
    pub(crate) spike_factor: f64,
    pub(crate) qp_threshold: i32,
}

impl AnomalyRules {
    /// Evaluate all rules for `frame`, in FrameDrop, BitrateSpike,
    /// QualityDrop order.
    pub(crate) fn evaluate(&self, previous: Option<&FrameRecord>, frame: &FrameRecord) -> Vec<Anomaly> {
        let mut found = Vec::new();

        if let Some(previous) = previous {
            let gap = frame.timestamp - previous.timestamp;
            if gap > 2.0 * self.expected_interval {
                found.push(Anomaly {
                    kind: AnomalyKind::FrameDrop,
                    timestamp: frame.timestamp,
                    description: format!("Frame drop detected: {gap:.6}s gap"),
                });
            }

            if frame.bits() > self.spike_factor * previous.bits() {
                found.push(Anomaly {
                    kind: AnomalyKind::BitrateSpike,
                    timestamp: frame.timestamp,
                    description: format!(
                        "Bitrate spike detected: {} bytes after {} bytes",
                        frame.size, previous.size
                    ),
                });
            }
        }

        if frame.qp > self.qp_threshold {
            found.push(Anomaly {
                kind: AnomalyKind::QualityDrop,
                timestamp: frame.timestamp,
                description: format!("Quality drop detected: QP={}", frame.qp),
            });
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameType;

    fn rules() -> AnomalyRules {
        AnomalyRules {
            expected_interval: 1.0 / 30.0,
            spike_factor: 3.0,
            qp_threshold: 40,
        }
    }

    fn frame(timestamp: f64, size: usize, qp: i32) -> FrameRecord {
        FrameRecord::new(0, 0, FrameType::Predicted, size, qp, false, timestamp)
    }

    #[test]
    fn first_frame_only_checks_quality() {
        let found = rules().evaluate(None, &frame(0.0, 100_000, 41));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, AnomalyKind::QualityDrop);
    }

    #[test]
    fn spike_requires_more_than_three_times() {
        let previous = frame(0.0, 1000, 20);
        assert!(rules().evaluate(Some(&previous), &frame(1.0 / 30.0, 3000, 20)).is_empty());

        let found = rules().evaluate(Some(&previous), &frame(1.0 / 30.0, 3001, 20));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, AnomalyKind::BitrateSpike);
    }

    #[test]
    fn all_rules_fire_in_order() {
        let previous = frame(0.0, 1000, 20);
        let found = rules().evaluate(Some(&previous), &frame(0.5, 5000, 50));
        let kinds: Vec<_> = found.iter().map(|anomaly| anomaly.kind).collect();
        assert_eq!(
            kinds,
            [AnomalyKind::FrameDrop, AnomalyKind::BitrateSpike, AnomalyKind::QualityDrop]
        );
        assert!(found[0].description.contains("0.500000s"));
    }
}
