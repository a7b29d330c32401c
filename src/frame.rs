//! Per-frame records and frame-type classification.
//!
//! A [`FrameRecord`] is created by [`FramePump`](crate::FramePump) for every
//! decoded frame. Its duplicate fields are the only part that is mutated later,
//! by [`DuplicateFrameDetector`](crate::DuplicateFrameDetector).
//!
//! How a decoded frame maps to a [`FrameType`] depends on the codec: most
//! codecs report a native picture type, while AV1 only distinguishes key and
//! inter frames. [`FrameTypeRule`] is resolved once per opened stream so the
//! per-frame path never branches on codec identity.

use serde::{Deserialize, Serialize};

/// Coding type of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameType {
    /// Intra-coded frame, decodable on its own.
    #[serde(rename = "I")]
    Intra,
    /// Predicted from earlier frames.
    #[serde(rename = "P")]
    Predicted,
    /// Predicted from earlier and later frames.
    #[serde(rename = "B")]
    BiPredicted,
    /// The codec did not report a usable type.
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl FrameType {
    /// Short label used in reports (`"I"`, `"P"`, `"B"`, `"UNKNOWN"`).
    pub fn label(self) -> &'static str {
        match self {
            FrameType::Intra => "I",
            FrameType::Predicted => "P",
            FrameType::BiPredicted => "B",
            FrameType::Unknown => "UNKNOWN",
        }
    }

    /// Parse a label produced by [`label`](FrameType::label). Anything else
    /// maps to [`FrameType::Unknown`].
    pub fn from_label(label: &str) -> Self {
        match label {
            "I" => FrameType::Intra,
            "P" => FrameType::Predicted,
            "B" => FrameType::BiPredicted,
            _ => FrameType::Unknown,
        }
    }
}

/// Picture type as reported by the codec engine for a raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    /// Intra picture.
    I,
    /// Predicted picture.
    P,
    /// Bi-predicted picture.
    B,
    /// Any other picture type (S, SI, SP, BI, none).
    Other,
}

/// Strategy for deriving a [`FrameType`] from a raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTypeRule {
    /// Map the codec's native picture type.
    PictureType,
    /// Use the keyframe flag only: key frames are intra, all others predicted.
    KeyframeFlag,
}

impl FrameTypeRule {
    /// Resolve the rule for a codec identifier.
    pub fn for_codec(codec: &str) -> Self {
        match codec.to_ascii_lowercase().as_str() {
            "av1" | "libdav1d" | "libaom-av1" => FrameTypeRule::KeyframeFlag,
            _ => FrameTypeRule::PictureType,
        }
    }

    /// Classify a frame.
    pub fn classify(self, picture_type: PictureType, is_keyframe: bool) -> FrameType {
        match self {
            FrameTypeRule::KeyframeFlag if is_keyframe => FrameType::Intra,
            FrameTypeRule::KeyframeFlag => FrameType::Predicted,
            FrameTypeRule::PictureType => match picture_type {
                PictureType::I => FrameType::Intra,
                PictureType::P => FrameType::Predicted,
                PictureType::B => FrameType::BiPredicted,
                PictureType::Other => FrameType::Unknown,
            },
        }
    }
}

/// Metadata for a single decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    /// Presentation timestamp in stream time-base ticks.
    pub pts: i64,
    /// Decode timestamp in stream time-base ticks.
    pub dts: i64,
    /// Coding type.
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    /// Size in bytes of the compressed unit that produced this frame.
    pub size: usize,
    /// Quantization parameter. Zero when the codec does not report one.
    pub qp: i32,
    /// Whether the codec flagged this frame as a keyframe.
    #[serde(rename = "isKeyFrame")]
    pub is_keyframe: bool,
    /// Presentation time in seconds.
    pub timestamp: f64,
    /// Whether this frame belongs to a duplicate run.
    pub is_duplicate: bool,
    /// Duplicate group, or `-1` when the frame is not a duplicate.
    #[serde(rename = "duplicateGroupId")]
    pub duplicate_group: i64,
}

impl FrameRecord {
    /// Group id used for frames outside any duplicate run.
    pub const NO_GROUP: i64 = -1;

    /// Create a record with no duplicate information.
    pub fn new(
        pts: i64,
        dts: i64,
        frame_type: FrameType,
        size: usize,
        qp: i32,
        is_keyframe: bool,
        timestamp: f64,
    ) -> Self {
        Self {
            pts,
            dts,
            frame_type,
            size,
            qp,
            is_keyframe,
            timestamp,
            is_duplicate: false,
            duplicate_group: Self::NO_GROUP,
        }
    }

    /// Size of the frame in bits.
    pub fn bits(&self) -> f64 {
        self.size as f64 * 8.0
    }

    /// Whether this frame opens a new group of pictures.
    pub fn starts_gop(&self) -> bool {
        self.frame_type == FrameType::Intra && self.is_keyframe
    }

    /// Clear duplicate flag and group.
    pub fn clear_duplicate(&mut self) {
        self.is_duplicate = false;
        self.duplicate_group = Self::NO_GROUP;
    }
}
