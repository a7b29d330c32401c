//! Pull-based decode pump.
//!
//! [`FramePump`] drives a [`DecodeEngine`] through the send/receive protocol
//! and turns every decoded frame into a [`FrameRecord`]. Each call to
//! [`next_frame`](FramePump::next_frame) first drains frames the engine has
//! already produced, then reads and forwards just enough compressed units to
//! obtain the next one. At end of input the engine is flushed and drained
//! before the pump reports that it is finished.
//!
//! In [`PumpMode::NonBlocking`] (live sources) a call performs at most one
//! read step and returns `Ok(None)` when no frame is ready yet, leaving
//! [`has_more`](FramePump::has_more) `true`.
//!
//! Output presentation timestamps are strictly increasing: the pump never
//! buffers or reorders frames, and a frame whose PTS does not move forward is
//! dropped with a warning.
//!
//! Forwarded units wait in a bounded FIFO until their frame comes out. Once a
//! frame with PTS `p` is emitted, units stamped at or before `p` can no longer
//! pair and are discarded; the oldest units are evicted past
//! [`FramePump::MAX_UNITS_IN_FLIGHT`].

use std::collections::VecDeque;

use crate::engine::{CompressedUnit, DecodeEngine, RawFrame, ReadOutcome, ReceiveOutcome, SendOutcome};
use crate::error::AnalyzerError;
use crate::frame::{FrameRecord, FrameTypeRule};
use crate::metadata::StreamMetadata;

/// How [`FramePump::next_frame`] waits for data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpMode {
    /// Keep reading until a frame is produced or the stream ends.
    #[default]
    Blocking,
    /// Perform at most one read step per call; return `None` if nothing is
    /// ready.
    NonBlocking,
}

/// A forwarded unit whose frame has not come out of the decoder yet.
#[derive(Debug, Clone, Copy)]
struct InFlightUnit {
    pts: Option<i64>,
    size: usize,
}

/// Ordered producer of [`FrameRecord`]s over one engine.
pub struct FramePump<E: DecodeEngine> {
    engine: E,
    mode: PumpMode,
    rule: FrameTypeRule,
    stream_index: usize,
    in_flight: VecDeque<InFlightUnit>,
    /// Unit refused with "try again"; re-sent after the next receive.
    held_unit: Option<E::Unit>,
    last_pts: Option<i64>,
    end_of_input_sent: bool,
    finished: bool,
}

impl<E: DecodeEngine> FramePump<E> {
    /// Upper bound on forwarded units still waiting for their frame.
    pub const MAX_UNITS_IN_FLIGHT: usize = 256;

    /// Wrap an opened engine. The frame-type rule is resolved here, once.
    pub fn new(engine: E, mode: PumpMode) -> Self {
        let metadata = engine.stream_metadata();
        let rule = FrameTypeRule::for_codec(&metadata.codec);
        let stream_index = metadata.stream_index;

        Self {
            engine,
            mode,
            rule,
            stream_index,
            in_flight: VecDeque::new(),
            held_unit: None,
            last_pts: None,
            end_of_input_sent: false,
            finished: false,
        }
    }

    /// Metadata of the stream being pumped.
    pub fn stream_metadata(&self) -> &StreamMetadata {
        self.engine.stream_metadata()
    }

    /// `false` once the engine is exhausted or a fatal error occurred.
    pub fn has_more(&self) -> bool {
        !self.finished
    }

    /// Current mode.
    pub fn mode(&self) -> PumpMode {
        self.mode
    }

    /// Forwarded units whose frame has not been emitted yet.
    pub fn units_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Borrow the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Produce the next frame record.
    ///
    /// Returns `Ok(None)` when the stream is finished, or in non-blocking mode
    /// when no frame is ready yet.
    ///
    /// # Errors
    ///
    /// Fatal engine errors abort the call and finish the pump; later calls
    /// return `Ok(None)`.
    pub fn next_frame(&mut self) -> Result<Option<FrameRecord>, AnalyzerError> {
        if self.finished {
            return Ok(None);
        }

        match self.step() {
            Ok(frame) => Ok(frame),
            Err(error) => {
                log::debug!("Frame pump stopped on engine error: {error}");
                self.finished = true;
                Err(error)
            }
        }
    }

    fn step(&mut self) -> Result<Option<FrameRecord>, AnalyzerError> {
        let mut read_once = false;

        loop {
            match self.engine.receive_frame()? {
                ReceiveOutcome::Frame(raw) => {
                    if let Some(record) = self.make_record(raw) {
                        return Ok(Some(record));
                    }
                    continue;
                }
                ReceiveOutcome::Exhausted => {
                    self.finished = true;
                    return Ok(None);
                }
                ReceiveOutcome::NeedsInput => {}
            }

            if let Some(unit) = self.held_unit.take() {
                self.forward(unit)?;
                continue;
            }

            if self.end_of_input_sent {
                // Flushed decoder asking for input: nothing left to drain.
                self.finished = true;
                return Ok(None);
            }

            if read_once && self.mode == PumpMode::NonBlocking {
                return Ok(None);
            }
            read_once = true;

            match self.engine.read_unit()? {
                ReadOutcome::Unit(unit) => {
                    if unit.stream_index() == self.stream_index {
                        self.forward(unit)?;
                    }
                }
                ReadOutcome::Pending => {
                    if self.mode == PumpMode::NonBlocking {
                        return Ok(None);
                    }
                }
                ReadOutcome::EndOfInput => {
                    self.engine.send_end_of_input()?;
                    self.end_of_input_sent = true;
                }
            }
        }
    }

    fn forward(&mut self, unit: E::Unit) -> Result<(), AnalyzerError> {
        match self.engine.send_unit(&unit)? {
            SendOutcome::Accepted => {
                if self.in_flight.len() == Self::MAX_UNITS_IN_FLIGHT {
                    if let Some(evicted) = self.in_flight.pop_front() {
                        log::debug!("Evicting unpaired unit (pts={:?})", evicted.pts);
                    }
                }
                self.in_flight.push_back(InFlightUnit {
                    pts: unit.pts(),
                    size: unit.size(),
                });
            }
            SendOutcome::TryAgain => {
                self.held_unit = Some(unit);
            }
        }
        Ok(())
    }

    /// Pair a raw frame with its originating unit and classify it. Returns
    /// `None` for frames that would break PTS ordering.
    fn make_record(&mut self, raw: RawFrame) -> Option<FrameRecord> {
        let size = self.take_unit_size(raw.pts);

        let pts = match (raw.pts, self.last_pts) {
            (Some(pts), _) => pts,
            (None, Some(last)) => last + 1,
            (None, None) => 0,
        };

        if let Some(last) = self.last_pts {
            if pts <= last {
                log::warn!("Dropping frame with non-increasing PTS {pts} (previous {last})");
                return None;
            }
        }
        self.last_pts = Some(pts);
        self.in_flight
            .retain(|unit| unit.pts.is_none_or(|unit_pts| unit_pts > pts));

        let time_base = self.engine.stream_metadata().time_base;
        let frame_type = self.rule.classify(raw.picture_type, raw.is_keyframe);

        Some(FrameRecord::new(
            pts,
            raw.dts.unwrap_or(pts),
            frame_type,
            size,
            raw.quantizer.unwrap_or(0),
            raw.is_keyframe,
            time_base.ticks_to_seconds(pts),
        ))
    }

    fn take_unit_size(&mut self, pts: Option<i64>) -> usize {
        let position = pts.and_then(|pts| {
            self.in_flight
                .iter()
                .position(|unit| unit.pts == Some(pts))
        });

        let unit = match position {
            Some(index) => self.in_flight.remove(index),
            None => self.in_flight.pop_front(),
        };
        unit.map_or(0, |unit| unit.size)
    }

    /// Seek back to the start and clear all decode state so the stream can be
    /// pumped again without reopening it.
    pub fn reset(&mut self) -> Result<(), AnalyzerError> {
        log::debug!("Resetting frame pump (stream={})", self.stream_index);
        self.engine.seek(0.0)?;
        self.engine.flush();
        self.in_flight.clear();
        self.held_unit = None;
        self.last_pts = None;
        self.end_of_input_sent = false;
        self.finished = false;
        Ok(())
    }

    /// Pull frames until the stream ends or `limit` frames were produced.
    ///
    /// Fails fast: on error no partial list is returned.
    pub fn collect_frames(&mut self, limit: Option<usize>) -> Result<Vec<FrameRecord>, AnalyzerError> {
        let mut frames = Vec::new();
        while limit.is_none_or(|limit| frames.len() < limit) {
            match self.next_frame()? {
                Some(frame) => frames.push(frame),
                None if self.finished => break,
                None => {}
            }
        }
        Ok(frames)
    }

    /// Consume the pump and return the engine.
    pub fn into_engine(self) -> E {
        self.engine
    }
}

impl<E: DecodeEngine> Iterator for FramePump<E> {
    type Item = Result<FrameRecord, AnalyzerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_frame() {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) if self.finished => return None,
                Ok(None) => continue,
                Err(error) => return Some(Err(error)),
            }
        }
    }
}
