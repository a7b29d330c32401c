//! Live sliding-window analysis.
//!
//! [`SlidingWindowAnalyzer`] owns a non-blocking [`FramePump`] and, while
//! running, exactly one background thread that pulls frames from it. Each
//! frame is pushed into a bounded FIFO window, checked against the previous
//! frame for anomalies, handed to the optional frame callback and appended to
//! the optional JSON-Lines export.
//!
//! The window and the anomaly log share one mutex. Every critical section is a
//! push/evict or a copy-out; statistics are computed on the copy after the
//! lock is released.
//!
//! A fatal engine error ends the background loop and leaves the analyzer
//! inactive but queryable: [`is_active`](SlidingWindowAnalyzer::is_active)
//! turns `false`, [`last_error`](SlidingWindowAnalyzer::last_error) holds the
//! message and everything already buffered stays readable.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use streamscope::{Anomaly, AnalyzerOptions, EngineOptions, SlidingWindowAnalyzer};
//!
//! let mut analyzer = SlidingWindowAnalyzer::open_live(
//!     "rtsp://camera.local/stream",
//!     &EngineOptions::new(),
//!     AnalyzerOptions::new(),
//! )?;
//! analyzer.set_anomaly_callback(Arc::new(|anomaly: &Anomaly| eprintln!("{anomaly}")));
//! analyzer.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! println!("{:?}", analyzer.current_bitrate_stats(5.0)?);
//! analyzer.stop();
//! # Ok::<(), streamscope::AnalyzerError>(())
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::anomaly::{Anomaly, AnomalyRules};
use crate::config::AnalyzerOptions;
use crate::engine::{DecodeEngine, EngineOptions};
use crate::error::AnalyzerError;
use crate::export::JsonLinesWriter;
use crate::ffmpeg_engine::FfmpegEngine;
use crate::frame::FrameRecord;
use crate::metadata::StreamMetadata;
use crate::progress::CancellationToken;
use crate::pump::{FramePump, PumpMode};
use crate::statistics::{BitrateAnalyzer, BitrateStatistics, FrameStatistics};

/// Callback invoked on the background thread for every analyzed frame.
pub type FrameCallback = Arc<dyn Fn(&FrameRecord) + Send + Sync>;

/// Callback invoked on the background thread for every detected anomaly.
pub type AnomalyCallback = Arc<dyn Fn(&Anomaly) + Send + Sync>;

/// Lifecycle state of a [`SlidingWindowAnalyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    /// No background thread.
    Idle,
    /// Background thread spawned (it may already have finished on its own).
    Running,
    /// `stop()` is joining the background thread.
    Stopping,
}

/// Snapshot of the window fill level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferStatus {
    /// Frames currently in the window.
    pub buffered_frames: usize,
    /// Seconds between the oldest and newest buffered frame.
    pub buffered_duration: f64,
    /// `true` while the window holds fewer frames than the low-water mark.
    pub is_buffering: bool,
}

#[derive(Default)]
struct WindowState {
    frames: VecDeque<FrameRecord>,
    anomalies: VecDeque<Anomaly>,
}

#[derive(Default)]
struct Callbacks {
    on_frame: Option<FrameCallback>,
    on_anomaly: Option<AnomalyCallback>,
}

#[derive(Default)]
struct Shared {
    window: Mutex<WindowState>,
    /// Released once the source ends, so channel-backed callbacks close.
    callbacks: Mutex<Callbacks>,
    running: AtomicBool,
    source_active: AtomicBool,
    frames_processed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    fn window(&self) -> MutexGuard<'_, WindowState> {
        self.window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_last_error(&self, message: Option<String>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = message;
    }

    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Hooks captured when the background loop starts.
struct Hooks {
    on_frame: Option<FrameCallback>,
    on_anomaly: Option<AnomalyCallback>,
    export: Option<JsonLinesWriter>,
}

/// What the background thread hands back when it exits.
struct LoopExit<E: DecodeEngine> {
    pump: FramePump<E>,
    export: Option<JsonLinesWriter>,
}

/// Incremental analyzer over a live frame stream.
pub struct SlidingWindowAnalyzer<E: DecodeEngine + 'static> {
    options: AnalyzerOptions,
    metadata: StreamMetadata,
    shared: Arc<Shared>,
    pump: Option<FramePump<E>>,
    worker: Option<JoinHandle<LoopExit<E>>>,
    interrupt: Option<CancellationToken>,
    state: AnalyzerState,
    export: Option<JsonLinesWriter>,
}

impl SlidingWindowAnalyzer<FfmpegEngine> {
    /// Open a live source with FFmpeg and wrap it in an analyzer.
    pub fn open_live(
        url: &str,
        engine_options: &EngineOptions,
        options: AnalyzerOptions,
    ) -> Result<Self, AnalyzerError> {
        let engine = FfmpegEngine::open_live(url, engine_options)?;
        Self::new(engine, options)
    }
}

impl<E: DecodeEngine + 'static> SlidingWindowAnalyzer<E> {
    /// Wrap an opened engine. The analyzer starts [`Idle`](AnalyzerState::Idle).
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::InvalidConfiguration`] for invalid window sizing or
    /// thresholds.
    pub fn new(engine: E, options: AnalyzerOptions) -> Result<Self, AnalyzerError> {
        options.validate()?;

        let interrupt = engine.interrupt_handle();
        let pump = FramePump::new(engine, PumpMode::NonBlocking);
        let metadata = pump.stream_metadata().clone();
        let shared = Arc::new(Shared::default());
        shared.source_active.store(true, Ordering::Release);

        Ok(Self {
            options,
            metadata,
            shared,
            pump: Some(pump),
            worker: None,
            interrupt,
            state: AnalyzerState::Idle,
            export: None,
        })
    }

    /// Metadata of the analyzed stream.
    pub fn stream_metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    /// Spawn the background loop. No-op while already running.
    ///
    /// Callbacks and the export sink are captured here; changing them while
    /// running takes effect on the next start.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::TaskPanicked`] if an earlier run lost the pump to a
    /// panicking callback, or [`AnalyzerError::IoError`] if the thread cannot
    /// be spawned.
    pub fn start(&mut self) -> Result<(), AnalyzerError> {
        if self.state == AnalyzerState::Running {
            return Ok(());
        }

        let pump = self.pump.take().ok_or_else(|| {
            AnalyzerError::TaskPanicked("analysis thread panicked in an earlier run".to_string())
        })?;

        if let Some(token) = &self.interrupt {
            token.reset();
        }
        self.shared.set_last_error(None);
        self.shared.running.store(true, Ordering::Release);
        self.shared.source_active.store(pump.has_more(), Ordering::Release);

        let hooks = {
            let callbacks = self.shared.callbacks();
            Hooks {
                on_frame: callbacks.on_frame.clone(),
                on_anomaly: callbacks.on_anomaly.clone(),
                export: self.export.take(),
            }
        };
        let settings = LoopSettings::from_options(&self.options);
        let shared = Arc::clone(&self.shared);

        let worker = thread::Builder::new()
            .name("streamscope-analyzer".to_string())
            .spawn(move || run_loop(pump, &shared, hooks, settings))?;

        log::debug!(
            "Sliding-window analyzer started (stream={}, window={})",
            self.metadata.stream_index,
            self.options.max_window_size
        );
        self.worker = Some(worker);
        self.state = AnalyzerState::Running;
        Ok(())
    }

    /// Cancel the background loop, abort any blocking read, join the thread
    /// and close the export sink. No-op while idle.
    ///
    /// Never returns the loop's error; see
    /// [`last_error`](SlidingWindowAnalyzer::last_error).
    pub fn stop(&mut self) {
        if self.state == AnalyzerState::Idle {
            return;
        }
        self.state = AnalyzerState::Stopping;

        self.shared.running.store(false, Ordering::Release);
        if let Some(token) = &self.interrupt {
            token.cancel();
        }

        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(exit) => {
                    self.pump = Some(exit.pump);
                    if let Some(export) = exit.export {
                        if let Err(error) = export.finish() {
                            log::warn!("Failed to close JSON-Lines export: {error}");
                        }
                    }
                }
                Err(_) => {
                    log::error!("Analysis thread panicked");
                    self.shared
                        .set_last_error(Some("analysis thread panicked".to_string()));
                    self.shared.source_active.store(false, Ordering::Release);
                }
            }
        }

        self.state = AnalyzerState::Idle;
        log::debug!(
            "Sliding-window analyzer stopped after {} frames",
            self.frames_processed()
        );
    }

    /// `true` while the source can still deliver frames: no fatal error and
    /// not exhausted.
    pub fn is_active(&self) -> bool {
        self.shared.source_active.load(Ordering::Acquire)
    }

    /// Message of the fatal error that ended the last run, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Total frames pulled from the source since construction.
    pub fn frames_processed(&self) -> u64 {
        self.shared.frames_processed.load(Ordering::Acquire)
    }

    /// Register the per-frame callback (captured at the next start).
    ///
    /// The analyzer releases its callbacks once the source is exhausted or
    /// fails; a later run needs them registered again.
    pub fn set_frame_callback(&mut self, callback: FrameCallback) {
        self.shared.callbacks().on_frame = Some(callback);
    }

    /// Register the per-anomaly callback (captured at the next start).
    pub fn set_anomaly_callback(&mut self, callback: AnomalyCallback) {
        self.shared.callbacks().on_anomaly = Some(callback);
    }

    /// Export every analyzed frame to `path` as JSON Lines, flushing after
    /// each record. The file is created immediately.
    ///
    /// # Errors
    ///
    /// [`AnalyzerError::IoError`] if the file cannot be created.
    pub fn enable_streaming_export<P: AsRef<Path>>(&mut self, path: P) -> Result<(), AnalyzerError> {
        self.export = Some(JsonLinesWriter::create(path)?);
        Ok(())
    }

    /// Bitrate statistics over the frames within `window_seconds` of the
    /// newest frame. Zero when the subset spans no time.
    pub fn current_bitrate_stats(&self, window_seconds: f64) -> Result<BitrateStatistics, AnalyzerError> {
        let frames = self.window_subset(window_seconds)?;
        let analyzer = BitrateAnalyzer::new(1.0, self.options.nominal_frame_rate)?;
        Ok(analyzer.analyze_window(&frames))
    }

    /// Frame statistics over the frames within `window_seconds` of the
    /// newest frame.
    pub fn current_frame_stats(&self, window_seconds: f64) -> Result<FrameStatistics, AnalyzerError> {
        let frames = self.window_subset(window_seconds)?;
        Ok(FrameStatistics::compute(&frames))
    }

    /// Copy of the anomaly log, oldest first.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.shared.window().anomalies.iter().cloned().collect()
    }

    /// Copy of every frame currently in the window, oldest first.
    pub fn window_frames(&self) -> Vec<FrameRecord> {
        self.shared.window().frames.iter().cloned().collect()
    }

    /// Number of frames currently in the window.
    pub fn window_len(&self) -> usize {
        self.shared.window().frames.len()
    }

    /// Window fill level.
    pub fn buffer_status(&self) -> BufferStatus {
        let (buffered_frames, buffered_duration) = {
            let window = self.shared.window();
            let duration = match (window.frames.front(), window.frames.back()) {
                (Some(first), Some(last)) => (last.timestamp - first.timestamp).max(0.0),
                _ => 0.0,
            };
            (window.frames.len(), duration)
        };

        BufferStatus {
            buffered_frames,
            buffered_duration,
            is_buffering: buffered_frames < self.options.low_water_mark,
        }
    }

    fn window_subset(&self, window_seconds: f64) -> Result<Vec<FrameRecord>, AnalyzerError> {
        if !window_seconds.is_finite() || window_seconds < 0.0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "window must be a finite, non-negative number of seconds (got {window_seconds})"
            )));
        }

        let window = self.shared.window();
        let Some(latest) = window.frames.back().map(|frame| frame.timestamp) else {
            return Ok(Vec::new());
        };
        let earliest = latest - window_seconds;
        Ok(window
            .frames
            .iter()
            .filter(|frame| frame.timestamp >= earliest && frame.timestamp <= latest)
            .cloned()
            .collect())
    }
}

impl<E: DecodeEngine + 'static> Drop for SlidingWindowAnalyzer<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy)]
struct LoopSettings {
    max_window_size: usize,
    anomaly_capacity: usize,
    backoff: Duration,
    rules: AnomalyRules,
}

impl LoopSettings {
    fn from_options(options: &AnalyzerOptions) -> Self {
        Self {
            max_window_size: options.max_window_size,
            anomaly_capacity: options.anomaly_capacity,
            backoff: options.backoff,
            rules: AnomalyRules {
                expected_interval: 1.0 / options.nominal_frame_rate,
                spike_factor: options.spike_factor,
                qp_threshold: options.quality_qp_threshold,
            },
        }
    }
}

fn run_loop<E: DecodeEngine>(
    mut pump: FramePump<E>,
    shared: &Shared,
    mut hooks: Hooks,
    settings: LoopSettings,
) -> LoopExit<E> {
    let mut previous: Option<FrameRecord> = None;

    while shared.running.load(Ordering::Acquire) {
        let frame = match pump.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) if pump.has_more() => {
                thread::sleep(settings.backoff);
                continue;
            }
            Ok(None) => {
                log::debug!("Live source exhausted");
                break;
            }
            Err(error) => {
                log::error!("Live analysis stopped on engine error: {error}");
                shared.set_last_error(Some(error.to_string()));
                break;
            }
        };

        {
            let mut window = shared.window();
            window.frames.push_back(frame.clone());
            while window.frames.len() > settings.max_window_size {
                window.frames.pop_front();
            }
        }
        shared.frames_processed.fetch_add(1, Ordering::AcqRel);

        let anomalies = settings.rules.evaluate(previous.as_ref(), &frame);
        if !anomalies.is_empty() {
            record_anomalies(shared, &anomalies, settings.anomaly_capacity);
            for anomaly in &anomalies {
                match &hooks.on_anomaly {
                    Some(callback) => callback(anomaly),
                    None => log::warn!("Anomaly detected: {anomaly}"),
                }
            }
        }

        if let Some(callback) = &hooks.on_frame {
            callback(&frame);
        }

        if let Some(export) = hooks.export.as_mut() {
            if let Err(error) = export.write_record(&frame) {
                log::warn!("Disabling JSON-Lines export after write failure: {error}");
                hooks.export = None;
            }
        }

        previous = Some(frame);
    }

    let export = hooks.export.take();
    drop(hooks);

    let source_active = pump.has_more();
    if !source_active {
        *shared.callbacks() = Callbacks::default();
    }
    shared.source_active.store(source_active, Ordering::Release);
    LoopExit { pump, export }
}

fn record_anomalies(shared: &Shared, anomalies: &[Anomaly], capacity: usize) {
    let mut window = shared.window();
    window.anomalies.extend(anomalies.iter().cloned());
    while window.anomalies.len() > capacity {
        window.anomalies.pop_front();
    }
}
