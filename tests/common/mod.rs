//! Shared helpers for integration tests: a scripted in-memory engine and
//! frame record builders.

#![allow(dead_code)]

use std::collections::VecDeque;

use streamscope::{
    AnalyzerError, CancellationToken, CompressedUnit, DecodeEngine, FrameRecord, FrameType,
    PictureType, RawFrame, ReadOutcome, ReceiveOutcome, SendOutcome, StreamMetadata, TimeBase,
};

/// Ticks per frame at 30 fps on a 90 kHz clock.
pub const FRAME_TICKS: i64 = 3000;

/// Compressed unit produced by [`ScriptedEngine`].
#[derive(Debug, Clone)]
pub struct ScriptedUnit {
    pub stream_index: usize,
    pub size: usize,
    pub pts: Option<i64>,
    pub frame: RawFrame,
}

impl CompressedUnit for ScriptedUnit {
    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn size(&self) -> usize {
        self.size
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }
}

/// One demuxer step.
#[derive(Debug, Clone)]
pub enum Step {
    Unit(ScriptedUnit),
    Pending,
    Fail(String),
}

/// A unit on stream 0 decoding to a frame with the same pts.
pub fn unit(pts: i64, picture: PictureType, key: bool, size: usize, qp: i32) -> Step {
    Step::Unit(ScriptedUnit {
        stream_index: 0,
        size,
        pts: Some(pts),
        frame: RawFrame {
            pts: Some(pts),
            dts: Some(pts),
            is_keyframe: key,
            picture_type: picture,
            quantizer: Some(qp),
        },
    })
}

/// A unit belonging to another container stream.
pub fn foreign_unit(pts: i64, size: usize) -> Step {
    match unit(pts, PictureType::P, false, size, 0) {
        Step::Unit(mut scripted) => {
            scripted.stream_index = 1;
            Step::Unit(scripted)
        }
        other => other,
    }
}

/// `count` steady frames, one second GOPs, 1 kB each, qp 20.
pub fn steady_script(count: usize) -> Vec<Step> {
    (0..count)
        .map(|index| {
            let key = index % 30 == 0;
            let picture = if key { PictureType::I } else { PictureType::P };
            unit(index as i64 * FRAME_TICKS, picture, key, 1000, 20)
        })
        .collect()
}

pub fn test_metadata(codec: &str) -> StreamMetadata {
    StreamMetadata {
        codec: codec.to_string(),
        width: 1280,
        height: 720,
        frame_rate: 30.0,
        duration: 0.0,
        bit_rate: 0,
        pixel_format: "yuv420p".to_string(),
        stream_index: 0,
        tile_info: None,
        time_base: TimeBase::new(1, 90_000),
    }
}

/// In-memory [`DecodeEngine`] that replays a fixed script.
///
/// The decoder holds back `delay` frames before releasing one. With
/// `reorder` it releases the lowest pts first, like a B-frame decoder.
pub struct ScriptedEngine {
    metadata: StreamMetadata,
    script: Vec<Step>,
    position: usize,
    decoded: VecDeque<RawFrame>,
    delay: usize,
    reorder: bool,
    refuse_next_send: bool,
    alternate_try_again: bool,
    endless: bool,
    swallow_every: usize,
    end_of_input: bool,
    interrupt: Option<CancellationToken>,
    pub sends: usize,
    pub refused: usize,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            metadata: test_metadata("h264"),
            script,
            position: 0,
            decoded: VecDeque::new(),
            delay: 0,
            reorder: false,
            refuse_next_send: false,
            alternate_try_again: false,
            endless: false,
            swallow_every: 0,
            end_of_input: false,
            interrupt: None,
            sends: 0,
            refused: 0,
        }
    }

    pub fn with_codec(mut self, codec: &str) -> Self {
        self.metadata.codec = codec.to_string();
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.metadata.duration = seconds;
        self
    }

    pub fn with_delay(mut self, frames: usize, reorder: bool) -> Self {
        self.delay = frames;
        self.reorder = reorder;
        self
    }

    /// Refuse every unit once with `TryAgain` before accepting it.
    pub fn with_alternating_try_again(mut self) -> Self {
        self.alternate_try_again = true;
        self.refuse_next_send = true;
        self
    }

    /// Report `Pending` forever once the script is exhausted.
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Accept every `nth` unit without ever producing its frame, like a
    /// decoder concealing a corrupt packet. `1` swallows everything.
    pub fn with_swallowed_units(mut self, nth: usize) -> Self {
        self.swallow_every = nth;
        self
    }

    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    fn release(&mut self) -> Option<RawFrame> {
        if self.reorder {
            let index = self
                .decoded
                .iter()
                .enumerate()
                .min_by_key(|(_, frame)| frame.pts.unwrap_or(i64::MAX))
                .map(|(index, _)| index)?;
            self.decoded.remove(index)
        } else {
            self.decoded.pop_front()
        }
    }
}

impl DecodeEngine for ScriptedEngine {
    type Unit = ScriptedUnit;

    fn stream_metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    fn read_unit(&mut self) -> Result<ReadOutcome<ScriptedUnit>, AnalyzerError> {
        let Some(step) = self.script.get(self.position).cloned() else {
            return Ok(if self.endless {
                ReadOutcome::Pending
            } else {
                ReadOutcome::EndOfInput
            });
        };
        self.position += 1;

        match step {
            Step::Unit(unit) => Ok(ReadOutcome::Unit(unit)),
            Step::Pending => Ok(ReadOutcome::Pending),
            Step::Fail(message) => Err(AnalyzerError::DecodeError(message)),
        }
    }

    fn send_unit(&mut self, unit: &ScriptedUnit) -> Result<SendOutcome, AnalyzerError> {
        if self.alternate_try_again && self.refuse_next_send {
            self.refuse_next_send = false;
            self.refused += 1;
            return Ok(SendOutcome::TryAgain);
        }
        self.refuse_next_send = self.alternate_try_again;
        self.sends += 1;
        if self.swallow_every > 0 && self.sends % self.swallow_every == 0 {
            return Ok(SendOutcome::Accepted);
        }
        self.decoded.push_back(unit.frame);
        Ok(SendOutcome::Accepted)
    }

    fn send_end_of_input(&mut self) -> Result<(), AnalyzerError> {
        self.end_of_input = true;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<ReceiveOutcome, AnalyzerError> {
        if self.end_of_input {
            return Ok(match self.release() {
                Some(frame) => ReceiveOutcome::Frame(frame),
                None => ReceiveOutcome::Exhausted,
            });
        }
        if self.decoded.len() > self.delay {
            if let Some(frame) = self.release() {
                return Ok(ReceiveOutcome::Frame(frame));
            }
        }
        Ok(ReceiveOutcome::NeedsInput)
    }

    fn seek(&mut self, seconds: f64) -> Result<(), AnalyzerError> {
        if seconds != 0.0 {
            return Err(AnalyzerError::DecodeError(format!(
                "scripted engine only seeks to 0 (got {seconds})"
            )));
        }
        self.position = 0;
        Ok(())
    }

    fn flush(&mut self) {
        self.decoded.clear();
        self.end_of_input = false;
        self.refuse_next_send = self.alternate_try_again;
    }

    fn interrupt_handle(&self) -> Option<CancellationToken> {
        self.interrupt.clone()
    }
}

/// Frame record builder for algorithm tests.
pub fn record(index: i64, frame_type: FrameType, key: bool, size: usize, qp: i32) -> FrameRecord {
    let pts = index * FRAME_TICKS;
    FrameRecord::new(pts, pts, frame_type, size, qp, key, pts as f64 / 90_000.0)
}

/// Records for a type pattern such as `"IPPBIPP"`; `I` frames are keyframes.
pub fn records_from_pattern(pattern: &str) -> Vec<FrameRecord> {
    pattern
        .chars()
        .enumerate()
        .map(|(index, symbol)| {
            let (frame_type, key) = match symbol {
                'I' => (FrameType::Intra, true),
                'i' => (FrameType::Intra, false),
                'P' => (FrameType::Predicted, false),
                'B' => (FrameType::BiPredicted, false),
                _ => (FrameType::Unknown, false),
            };
            record(index as i64, frame_type, key, 1000 + index, 25)
        })
        .collect()
}
