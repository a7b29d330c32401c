//! [`DecodeEngine`] implementation backed by FFmpeg.
//!
//! Every FFmpeg resource is held by a single-owner `ffmpeg-next` wrapper
//! (`Input`, the video decoder, `Packet`, `frame::Video`) and released on
//! drop, so early returns and propagated errors never leak.
//!
//! The decoder runs with frame-level threading, which keeps output in
//! presentation order regardless of the thread count.
//!
//! # Example
//!
//! ```no_run
//! use streamscope::{EngineOptions, FfmpegEngine, FramePump, PumpMode};
//!
//! let engine = FfmpegEngine::open_file("input.mp4", &EngineOptions::new().with_thread_count(4))?;
//! let mut pump = FramePump::new(engine, PumpMode::Blocking);
//! while let Some(frame) = pump.next_frame()? {
//!     println!("{} {:?} {} bytes", frame.pts, frame.frame_type, frame.size);
//! }
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::{
        Id as CodecId,
        context::Context as CodecContext,
        threading::{Config as ThreadingConfig, Type as ThreadingType},
    },
    decoder::Video as VideoDecoder,
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    util::picture::Type as PictureKind,
};

use crate::engine::{
    CompressedUnit, DecodeEngine, EngineOptions, RawFrame, ReadOutcome, ReceiveOutcome,
    SendOutcome,
};
use crate::error::AnalyzerError;
use crate::ffmpeg::{ensure_initialized, is_try_again, set_ffmpeg_log_level};
use crate::frame::PictureType;
use crate::metadata::{StreamMetadata, TileInfo, TimeBase};
use crate::progress::CancellationToken;

impl CompressedUnit for Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }

    fn size(&self) -> usize {
        Packet::size(self)
    }

    fn pts(&self) -> Option<i64> {
        Packet::pts(self)
    }
}

/// FFmpeg demuxer + decoder for one video stream.
pub struct FfmpegEngine {
    input: Input,
    decoder: VideoDecoder,
    decoded: VideoFrame,
    metadata: StreamMetadata,
    interrupt: Option<CancellationToken>,
    source_name: String,
}

impl Debug for FfmpegEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegEngine")
            .field("source", &self.source_name)
            .field("metadata", &self.metadata)
            .field("live", &self.interrupt.is_some())
            .finish_non_exhaustive()
    }
}

impl FfmpegEngine {
    /// Open a file-backed stream.
    ///
    /// # Errors
    ///
    /// - [`AnalyzerError::SourceOpen`] if the file cannot be opened or parsed.
    /// - [`AnalyzerError::NoVideoStream`] if it has no (or not the selected)
    ///   video stream.
    /// - [`AnalyzerError::UnsupportedCodec`] if no decoder is available.
    pub fn open_file<P: AsRef<Path>>(path: P, options: &EngineOptions) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        log::debug!("Opening file source: {source_name}");

        prepare(options)?;
        let input = ffmpeg_next::format::input(&path).map_err(|error| AnalyzerError::SourceOpen {
            source_name: source_name.clone(),
            reason: error.to_string(),
        })?;

        Self::from_input(input, source_name, options, None)
    }

    /// Open a live stream (RTSP, HTTP, UDP, ...).
    ///
    /// The demuxer is switched to non-blocking reads and bound to an
    /// interrupt token, so [`DecodeEngine::interrupt_handle`] can abort a
    /// stalled network read.
    pub fn open_live(url: &str, options: &EngineOptions) -> Result<Self, AnalyzerError> {
        log::debug!("Opening live source: {url}");

        prepare(options)?;
        let token = CancellationToken::new();
        let interrupt = token.clone();
        let mut input = ffmpeg_next::format::input_with_interrupt(&url, move || {
            interrupt.is_cancelled()
        })
        .map_err(|error| AnalyzerError::SourceOpen {
            source_name: url.to_string(),
            reason: error.to_string(),
        })?;

        // SAFETY: the format context is valid for the lifetime of `input`;
        // only the flags word is touched.
        unsafe {
            (*input.as_mut_ptr()).flags |= ffmpeg_sys_next::AVFMT_FLAG_NONBLOCK as i32;
        }

        Self::from_input(input, url.to_string(), options, Some(token))
    }

    fn from_input(
        input: Input,
        source_name: String,
        options: &EngineOptions,
        interrupt: Option<CancellationToken>,
    ) -> Result<Self, AnalyzerError> {
        let stream_index = match options.stream_index {
            Some(index) => input
                .stream(index)
                .filter(|stream| stream.parameters().medium() == Type::Video)
                .map(|stream| stream.index())
                .ok_or(AnalyzerError::NoVideoStream)?,
            None => input
                .streams()
                .best(Type::Video)
                .map(|stream| stream.index())
                .ok_or(AnalyzerError::NoVideoStream)?,
        };

        let stream = input
            .stream(stream_index)
            .ok_or(AnalyzerError::NoVideoStream)?;
        let codec_id = stream.parameters().id();
        if ffmpeg_next::decoder::find(codec_id).is_none() {
            return Err(AnalyzerError::UnsupportedCodec(codec_id.name().to_string()));
        }

        let mut decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let thread_count = options.effective_thread_count();
        decoder_context.set_threading(ThreadingConfig {
            kind: ThreadingType::Frame,
            count: thread_count,
            ..Default::default()
        });
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| AnalyzerError::UnsupportedCodec(format!("{}: {error}", codec_id.name())))?;

        let raw_time_base = stream.time_base();
        let time_base = TimeBase::new(raw_time_base.numerator(), raw_time_base.denominator());

        let frame_rate = {
            let rate = stream.avg_frame_rate();
            if rate.denominator() != 0 && rate.numerator() > 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                let rate = stream.rate();
                if rate.denominator() != 0 && rate.numerator() > 0 {
                    rate.numerator() as f64 / rate.denominator() as f64
                } else {
                    0.0
                }
            }
        };

        let duration = if stream.duration() > 0 {
            time_base.ticks_to_seconds(stream.duration())
        } else if interrupt.is_none() && input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg_sys_next::AV_TIME_BASE)
        } else {
            0.0
        };

        let bit_rate = {
            let parameters = stream.parameters();
            // SAFETY: `parameters` borrows the stream's codecpar, which
            // outlives this read.
            let raw = unsafe { *parameters.as_ptr() };
            raw.bit_rate
        };

        let pixel_format = {
            let name = format!("{:?}", decoder.format()).to_ascii_lowercase();
            if name == "none" { "unknown".to_string() } else { name }
        };

        let tile_info = (codec_id == CodecId::AV1).then_some(TileInfo { columns: 1, rows: 1 });

        let metadata = StreamMetadata {
            codec: codec_id.name().to_string(),
            width: decoder.width(),
            height: decoder.height(),
            frame_rate,
            duration,
            bit_rate,
            pixel_format,
            stream_index,
            tile_info,
            time_base,
        };

        log::debug!(
            "Selected stream {} ({} {}x{}, {} decode threads)",
            stream_index,
            metadata.codec,
            metadata.width,
            metadata.height,
            thread_count
        );

        Ok(Self {
            input,
            decoder,
            decoded: VideoFrame::empty(),
            metadata,
            interrupt,
            source_name,
        })
    }

    /// Path or URL this engine was opened on.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    fn current_raw_frame(&self) -> RawFrame {
        // SAFETY: `decoded` holds a valid frame just returned by the decoder.
        let (packet_dts, quality) = unsafe {
            let raw = &*self.decoded.as_ptr();
            (raw.pkt_dts, raw.quality)
        };
        let dts = (packet_dts != ffmpeg_sys_next::AV_NOPTS_VALUE).then_some(packet_dts);
        let quantizer =
            (quality > 0).then(|| quality / ffmpeg_sys_next::FF_QP2LAMBDA as i32);

        let picture_type = match self.decoded.kind() {
            PictureKind::I => PictureType::I,
            PictureKind::P => PictureType::P,
            PictureKind::B => PictureType::B,
            _ => PictureType::Other,
        };

        RawFrame {
            pts: self.decoded.pts().or_else(|| self.decoded.timestamp()),
            dts,
            is_keyframe: self.decoded.is_key(),
            picture_type,
            quantizer,
        }
    }
}

fn prepare(options: &EngineOptions) -> Result<(), AnalyzerError> {
    ensure_initialized()?;
    if let Some(level) = options.log_level {
        set_ffmpeg_log_level(level);
    }
    Ok(())
}

impl DecodeEngine for FfmpegEngine {
    type Unit = Packet;

    fn stream_metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    fn read_unit(&mut self) -> Result<ReadOutcome<Packet>, AnalyzerError> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(ReadOutcome::Unit(packet)),
            Err(FfmpegError::Eof) => Ok(ReadOutcome::EndOfInput),
            Err(error) if is_try_again(&error) => Ok(ReadOutcome::Pending),
            // Interrupted by our own token: the caller is stopping, the
            // stream itself is still alive.
            Err(FfmpegError::Exit)
                if self
                    .interrupt
                    .as_ref()
                    .is_some_and(|token| token.is_cancelled()) =>
            {
                Ok(ReadOutcome::Pending)
            }
            Err(error) => Err(AnalyzerError::DecodeError(format!(
                "failed to read packet: {error}"
            ))),
        }
    }

    fn send_unit(&mut self, unit: &Packet) -> Result<SendOutcome, AnalyzerError> {
        match self.decoder.send_packet(unit) {
            Ok(()) => Ok(SendOutcome::Accepted),
            Err(error) if is_try_again(&error) => Ok(SendOutcome::TryAgain),
            Err(error) => Err(AnalyzerError::DecodeError(format!(
                "failed to send packet: {error}"
            ))),
        }
    }

    fn send_end_of_input(&mut self) -> Result<(), AnalyzerError> {
        match self.decoder.send_eof() {
            Ok(()) | Err(FfmpegError::Eof) => Ok(()),
            Err(error) => Err(AnalyzerError::from(error)),
        }
    }

    fn receive_frame(&mut self) -> Result<ReceiveOutcome, AnalyzerError> {
        match self.decoder.receive_frame(&mut self.decoded) {
            Ok(()) => Ok(ReceiveOutcome::Frame(self.current_raw_frame())),
            Err(FfmpegError::Eof) => Ok(ReceiveOutcome::Exhausted),
            Err(error) if is_try_again(&error) => Ok(ReceiveOutcome::NeedsInput),
            Err(error) => Err(AnalyzerError::DecodeError(format!(
                "failed to receive frame: {error}"
            ))),
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<(), AnalyzerError> {
        let target = (seconds.max(0.0) * f64::from(ffmpeg_sys_next::AV_TIME_BASE)) as i64;
        self.input
            .seek(target, ..target)
            .map_err(|error| AnalyzerError::DecodeError(format!("seek failed: {error}")))
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }

    fn interrupt_handle(&self) -> Option<CancellationToken> {
        self.interrupt.clone()
    }
}
