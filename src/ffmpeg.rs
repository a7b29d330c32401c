//! FFmpeg library glue: one-time initialisation, log verbosity and status
//! classification.
//!
//! FFmpeg logs to stderr through its own system, independent of the Rust
//! [`log`](https://crates.io/crates/log) facade this crate uses for its own
//! diagnostics. [`set_ffmpeg_log_level`] tunes that console output without
//! callers having to depend on `ffmpeg-next` directly.
//!
//! ```no_run
//! use streamscope::FfmpegLogLevel;
//!
//! streamscope::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::OnceLock;

use ffmpeg_next::Error as FfmpegError;
use ffmpeg_next::util::log::Level;

use crate::error::AnalyzerError;

/// FFmpeg internal log verbosity, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FfmpegLogLevel {
    /// No output at all.
    Quiet,
    /// Only conditions after which the process aborts.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Extremely verbose tracing.
    Trace,
}

impl FfmpegLogLevel {
    const ALL: [(FfmpegLogLevel, Level, &'static str); 9] = [
        (FfmpegLogLevel::Quiet, Level::Quiet, "quiet"),
        (FfmpegLogLevel::Panic, Level::Panic, "panic"),
        (FfmpegLogLevel::Fatal, Level::Fatal, "fatal"),
        (FfmpegLogLevel::Error, Level::Error, "error"),
        (FfmpegLogLevel::Warning, Level::Warning, "warning"),
        (FfmpegLogLevel::Info, Level::Info, "info"),
        (FfmpegLogLevel::Verbose, Level::Verbose, "verbose"),
        (FfmpegLogLevel::Debug, Level::Debug, "debug"),
        (FfmpegLogLevel::Trace, Level::Trace, "trace"),
    ];

    fn to_ffmpeg_level(self) -> Level {
        Self::ALL[self as usize].1
    }

    fn from_ffmpeg_level(level: Level) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(_, candidate, _)| *candidate == level)
            .map(|(ours, _, _)| *ours)
    }

    /// Lower-case name accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        Self::ALL[self as usize].2
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = AnalyzerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.to_ascii_lowercase();
        let lowered = if lowered == "warn" { "warning".to_string() } else { lowered };
        Self::ALL
            .iter()
            .find(|(_, _, name)| *name == lowered)
            .map(|(level, _, _)| *level)
            .ok_or_else(|| {
                AnalyzerError::InvalidConfiguration(format!("unknown FFmpeg log level '{value}'"))
            })
    }
}

/// Set FFmpeg's own console verbosity.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Current FFmpeg console verbosity, if it maps to a known level.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .and_then(FfmpegLogLevel::from_ffmpeg_level)
}

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialise the FFmpeg libraries once per process.
pub(crate) fn ensure_initialized() -> Result<(), AnalyzerError> {
    INIT.get_or_init(|| ffmpeg_next::init().map_err(|error| error.to_string()))
        .clone()
        .map_err(|reason| AnalyzerError::FfmpegError(format!("initialisation failed: {reason}")))
}

/// Whether an FFmpeg status means "try again later" rather than failure.
pub(crate) fn is_try_again(error: &FfmpegError) -> bool {
    matches!(error, FfmpegError::Other { errno } if *errno == ffmpeg_next::util::error::EAGAIN)
}
