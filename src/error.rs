//! Error types for the `streamscope` crate.
//!
//! This module defines [`AnalyzerError`], the unified error type returned by
//! every fallible operation in the crate. Engine failures (open, corrupt or
//! unsupported input) are fatal and carry the upstream message; configuration
//! errors are raised at the call site before anything is mutated.
//!
//! Transient "try again" conditions reported by the codec are handled inside
//! [`FramePump`](crate::FramePump) and never appear here.

use std::io::Error as IoError;

use ffmpeg_next::Error as FfmpegError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The unified error type for all `streamscope` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalyzerError {
    /// The stream source (file path or URL) could not be opened.
    #[error("Failed to open stream source {source_name}: {reason}")]
    SourceOpen {
        /// The path or URL that was passed to the engine.
        source_name: String,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The source does not contain a video stream.
    #[error("No video stream found in source")]
    NoVideoStream,

    /// No decoder is available for the stream's codec.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The engine failed to decode the stream.
    #[error("Failed to decode video stream: {0}")]
    DecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An argument or option was rejected before any work started.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A task was submitted to a [`WorkerPool`](crate::WorkerPool) that is
    /// shutting down.
    #[error("Worker pool is closed")]
    PoolClosed,

    /// A pool task panicked instead of producing a value.
    #[error("Worker task panicked: {0}")]
    TaskPanicked(String),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error occurred while writing an export or report.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// A record could not be serialized to JSON.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] JsonError),
}

impl AnalyzerError {
    /// Returns `true` for the fatal engine family: open failures, missing or
    /// unsupported streams, and decode errors.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::SourceOpen { .. }
                | AnalyzerError::NoVideoStream
                | AnalyzerError::UnsupportedCodec(_)
                | AnalyzerError::DecodeError(_)
                | AnalyzerError::FfmpegError(_)
        )
    }
}

impl From<FfmpegError> for AnalyzerError {
    fn from(error: FfmpegError) -> Self {
        AnalyzerError::FfmpegError(error.to_string())
    }
}
