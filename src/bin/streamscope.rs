use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use streamscope::{
    AnalysisOptions, AnalysisReport, AnalyzerOptions, Anomaly, AnomalyKind, DecodeEngine,
    DuplicateOptions, EngineOptions, FfmpegEngine, FfmpegLogLevel, OperationType,
    ProgressCallback, ProgressInfo, SceneDetector, SceneOptions, SlidingWindowAnalyzer,
    StreamMetadata, VideoAnalysis,
};

const CLI_AFTER_HELP: &str = "Examples:\n  streamscope info input.mp4 --json\n  streamscope analyze input.mp4 --output report.json --progress\n  streamscope analyze input.mp4 --format csv --output frames.csv --max-frames 500\n  streamscope monitor rtsp://camera.local/stream --duration 60 --export frames.jsonl\n  streamscope completions zsh > _streamscope";

#[derive(Debug, Parser)]
#[command(
    name = "streamscope",
    version,
    about = "Frame, GOP, bitrate and anomaly telemetry for video streams",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Decoder and worker thread count (0 = auto-detect).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    /// Full analysis report as pretty-printed JSON.
    Json,
    /// One row per frame.
    Csv,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print stream metadata.
    #[command(
        about = "Print stream metadata",
        visible_alias = "probe",
        after_help = "Examples:\n  streamscope info input.mp4\n  streamscope info rtsp://camera.local/stream --json"
    )]
    Info {
        /// Input media path or URL.
        input: String,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Analyze a whole file: frames, GOPs, statistics and duplicates.
    #[command(
        about = "Analyze a video file",
        after_help = "Examples:\n  streamscope analyze input.mp4\n  streamscope analyze input.mp4 --output report.json --tolerance 2.5 --any-qp"
    )]
    Analyze {
        /// Input media path.
        input: PathBuf,
        /// Output file. Without it a summary is printed.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<usize>,
        /// Duplicate size tolerance in percent.
        #[arg(long, default_value_t = 1.0)]
        tolerance: f32,
        /// Do not require equal QP for duplicates.
        #[arg(long)]
        any_qp: bool,
        /// Do not require equal frame type for duplicates.
        #[arg(long)]
        any_type: bool,
        /// Bitrate time-series bucket width in seconds.
        #[arg(long, default_value_t = 1.0)]
        bucket: f64,
        /// Relative size change that starts a new scene at a keyframe.
        #[arg(long, default_value_t = 0.3)]
        scene_threshold: f64,
    },

    /// Watch a live stream and report anomalies as they happen.
    #[command(
        about = "Monitor a live stream",
        after_help = "Examples:\n  streamscope monitor rtsp://camera.local/stream\n  streamscope monitor udp://0.0.0.0:5000 --duration 120 --export frames.jsonl"
    )]
    Monitor {
        /// Stream URL (or a file, replayed as if live).
        input: String,
        /// Stop after this many seconds. Runs until the source ends otherwise.
        #[arg(long)]
        duration: Option<f64>,
        /// Append every frame to this JSON-Lines file.
        #[arg(long)]
        export: Option<PathBuf>,
        /// Seconds of history used for the periodic statistics line.
        #[arg(long, default_value_t = 5.0)]
        window: f64,
        /// Maximum frames kept in the sliding window.
        #[arg(long, default_value_t = 300)]
        max_window: usize,
        /// Seconds between statistics lines.
        #[arg(long, default_value_t = 1.0)]
        interval: f64,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn is_url(input: &str) -> bool {
    input.contains("://")
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn engine_options(global: &GlobalOptions) -> Result<EngineOptions, Box<dyn std::error::Error>> {
    let mut options = EngineOptions::new().with_thread_count(global.threads.unwrap_or(0));
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        options = options.with_log_level(parsed);
    }
    Ok(options)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        match info.operation {
            OperationType::FrameCollection => {
                if let Some(total) = info.total {
                    self.bar.set_length(total.max(info.current));
                }
                self.bar.set_position(info.current);
                if let Some(timestamp) = info.current_timestamp {
                    self.bar.set_message(format!("{timestamp:.2}s"));
                }
            }
            operation => self.bar.set_message(format!("{operation:?} done")),
        }
    }
}

fn metadata_json(metadata: &StreamMetadata) -> serde_json::Value {
    json!({
        "codec": metadata.codec,
        "width": metadata.width,
        "height": metadata.height,
        "frame_rate": metadata.frame_rate,
        "duration_seconds": metadata.duration,
        "bit_rate": metadata.bit_rate,
        "pixel_format": metadata.pixel_format,
        "stream_index": metadata.stream_index,
        "tile_info": metadata.tile_info.map(|tiles| json!({
            "columns": tiles.columns,
            "rows": tiles.rows,
        })),
        "live": metadata.is_unbounded(),
    })
}

fn print_metadata(metadata: &StreamMetadata) {
    println!("{}", "Stream Information".bold());
    println!("  Codec:        {}", metadata.codec);
    println!("  Resolution:   {}x{}", metadata.width, metadata.height);
    println!("  Frame rate:   {:.3} fps", metadata.frame_rate);
    if metadata.is_unbounded() {
        println!("  Duration:     live");
    } else {
        println!("  Duration:     {:.3}s", metadata.duration);
    }
    println!("  Bit rate:     {} bps", metadata.bit_rate);
    println!("  Pixel format: {}", metadata.pixel_format);
    if let Some(tiles) = metadata.tile_info {
        println!("  Tiles:        {}x{}", tiles.columns, tiles.rows);
    }
}

fn print_report_summary(report: &AnalysisReport) {
    print_metadata(&report.metadata);

    let stats = &report.frame_statistics;
    println!();
    println!("{}", "Frame Statistics".bold());
    println!("  Total frames:   {}", stats.total_frames);
    println!(
        "  I / P / B:      {} / {} / {}",
        stats.intra_frames, stats.predicted_frames, stats.bi_predicted_frames
    );
    println!("  Avg frame size: {:.0} bytes", stats.average_frame_size);
    println!(
        "  Min / max size: {} / {} bytes",
        stats.min_frame_size, stats.max_frame_size
    );
    println!("  Avg QP:         {:.2}", stats.average_qp);

    println!();
    println!("{}", "GOP Analysis".bold());
    println!("  GOPs:           {}", report.gops.len());
    println!("  Avg length:     {:.1}", report.gop_summary.average_length);
    println!(
        "  Min / max:      {} / {}",
        report.gop_summary.min_length, report.gop_summary.max_length
    );

    println!();
    println!("{}", "Bitrate".bold());
    println!("  Average:        {:.0} bps", report.bitrate.average_bitrate);
    println!(
        "  Min / max:      {:.0} / {:.0} bps",
        report.bitrate.min_bitrate, report.bitrate.max_bitrate
    );
    println!("  Std deviation:  {:.0} bps", report.bitrate.std_deviation);

    println!();
    println!("{}", "Duplicates".bold());
    println!(
        "  {} frame(s) in {} group(s)",
        report.duplicates.duplicate_frames, report.duplicates.groups
    );

    println!();
    println!("{}", "Scenes".bold());
    println!("  Scenes:         {}", report.scenes.len());
    println!(
        "  Avg duration:   {:.2}s",
        SceneDetector::average_duration(&report.scenes)
    );
}

fn write_frames_csv(path: &Path, report: &AnalysisReport) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = BufWriter::new(fs::File::create(path)?);
    writeln!(file, "pts,dts,type,size,qp,keyframe,timestamp,duplicate,duplicate_group")?;
    for frame in &report.frames {
        writeln!(
            file,
            "{},{},{},{},{},{},{:.6},{},{}",
            frame.pts,
            frame.dts,
            frame.frame_type.label(),
            frame.size,
            frame.qp,
            frame.is_keyframe,
            frame.timestamp,
            frame.is_duplicate,
            frame.duplicate_group
        )?;
    }
    file.flush()?;
    Ok(())
}

fn anomaly_line(anomaly: &Anomaly) -> String {
    let label = match anomaly.kind {
        AnomalyKind::FrameDrop => anomaly.kind.to_string().red().bold(),
        AnomalyKind::BitrateSpike => anomaly.kind.to_string().yellow().bold(),
        AnomalyKind::QualityDrop => anomaly.kind.to_string().magenta().bold(),
    };
    format!("{:>10.3}s {label} {}", anomaly.timestamp, anomaly.description)
}

fn parse_seconds(flag: &str, value: f64) -> Result<f64, Box<dyn std::error::Error>> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{flag} must be a non-negative number of seconds").into());
    }
    Ok(value)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let engine_options = engine_options(&cli.global)?;

    match cli.command {
        Commands::Info { input, json } => {
            let engine = if is_url(&input) {
                FfmpegEngine::open_live(&input, &engine_options)?
            } else {
                FfmpegEngine::open_file(&input, &engine_options)?
            };
            let metadata = engine.stream_metadata();
            if json {
                println!("{}", serde_json::to_string_pretty(&metadata_json(metadata))?);
            } else {
                print_metadata(metadata);
            }
        }
        Commands::Analyze {
            input,
            output,
            format,
            max_frames,
            tolerance,
            any_qp,
            any_type,
            bucket,
            scene_threshold,
        } => {
            if let Some(path) = &output {
                ensure_writable_path(path, cli.global.overwrite)?;
            }

            let duplicates = DuplicateOptions::new()
                .with_size_tolerance(tolerance)
                .with_same_qp(!any_qp)
                .with_same_type(!any_type);
            let mut options = AnalysisOptions::new()
                .with_engine(engine_options)
                .with_duplicates(duplicates)
                .with_bitrate_bucket(bucket)
                .with_scenes(SceneOptions::new().with_threshold(scene_threshold))
                .with_worker_threads(cli.global.threads.unwrap_or(0));
            if let Some(limit) = max_frames {
                options = options.with_frame_limit(limit);
            }

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new()?);
                options = options
                    .with_progress(progress.clone())
                    .with_batch_size(25);
                Some(progress)
            } else {
                None
            };

            if cli.global.verbose {
                eprintln!("analyzing {}", input.display());
            }
            let report = VideoAnalysis::new(options).run_file(&input)?;

            if let Some(progress) = progress {
                progress.bar.finish_with_message("done");
            }

            match (output, format) {
                (Some(path), ReportFormat::Json) => {
                    streamscope::write_json(&path, &report)?;
                    println!("{} {}", "saved".green().bold(), path.display());
                }
                (Some(path), ReportFormat::Csv) => {
                    write_frames_csv(&path, &report)?;
                    println!("{} {}", "saved".green().bold(), path.display());
                }
                (None, _) => {
                    print_report_summary(&report);
                    if cli.global.verbose {
                        println!();
                        for gop in &report.gops {
                            println!(
                                "  GOP {:>4}: pts {}..{} frames={} I={} P={} B={} bytes={}",
                                gop.index,
                                gop.start_pts,
                                gop.end_pts,
                                gop.frame_count,
                                gop.intra_count,
                                gop.predicted_count,
                                gop.bi_predicted_count,
                                gop.total_size
                            );
                        }
                    }
                }
            }
        }
        Commands::Monitor {
            input,
            duration,
            export,
            window,
            max_window,
            interval,
        } => {
            let window = parse_seconds("--window", window)?;
            let interval = parse_seconds("--interval", interval)?.max(0.1);
            let duration = duration
                .map(|value| parse_seconds("--duration", value))
                .transpose()?;

            let analyzer_options = AnalyzerOptions::new().with_max_window_size(max_window);
            let engine = if is_url(&input) {
                FfmpegEngine::open_live(&input, &engine_options)?
            } else {
                FfmpegEngine::open_file(&input, &engine_options)?
            };
            let mut analyzer = SlidingWindowAnalyzer::new(engine, analyzer_options)?;

            if let Some(path) = &export {
                ensure_writable_path(path, cli.global.overwrite)?;
                analyzer.enable_streaming_export(path)?;
            }
            analyzer.set_anomaly_callback(Arc::new(|anomaly: &Anomaly| {
                println!("{}", anomaly_line(anomaly));
            }));

            print_metadata(analyzer.stream_metadata());
            println!();
            analyzer.start()?;

            let started = Instant::now();
            while analyzer.is_active()
                && duration.is_none_or(|limit| started.elapsed().as_secs_f64() < limit)
            {
                thread::sleep(Duration::from_secs_f64(interval));

                let bitrate = analyzer.current_bitrate_stats(window)?;
                let frames = analyzer.current_frame_stats(window)?;
                let buffer = analyzer.buffer_status();
                let status = if buffer.is_buffering {
                    "buffering".yellow()
                } else {
                    "live".green()
                };
                println!(
                    "{} frames={} window={} bitrate={:.0} bps avg_qp={:.1} I/P/B={}/{}/{}",
                    status,
                    analyzer.frames_processed(),
                    buffer.buffered_frames,
                    bitrate.average_bitrate,
                    frames.average_qp,
                    frames.intra_frames,
                    frames.predicted_frames,
                    frames.bi_predicted_frames
                );
            }

            analyzer.stop();
            if let Some(error) = analyzer.last_error() {
                eprintln!("{} {}", "error:".red().bold(), error);
            }
            println!(
                "{} {}",
                "success:".green().bold(),
                format!(
                    "Analyzed {} frame(s), {} anomaly(ies) logged",
                    analyzer.frames_processed(),
                    analyzer.anomalies().len()
                )
                .green()
            );
            if let Some(path) = export {
                println!("{} {}", "saved".green().bold(), path.display());
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "streamscope", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands, ReportFormat, is_url, parse_log_level, parse_seconds};

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("quiet").is_some());
        assert!(parse_log_level("WARN").is_some());
        assert!(parse_log_level("warning").is_some());
        assert!(parse_log_level("trace").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn url_detection() {
        assert!(is_url("rtsp://camera.local/stream"));
        assert!(is_url("udp://0.0.0.0:5000"));
        assert!(!is_url("clips/input.mp4"));
    }

    #[test]
    fn seconds_must_be_non_negative() {
        assert_eq!(parse_seconds("--window", 2.5).unwrap(), 2.5);
        assert!(parse_seconds("--window", -1.0).is_err());
        assert!(parse_seconds("--window", f64::NAN).is_err());
    }

    #[test]
    fn analyze_arguments() {
        let cli = Cli::try_parse_from([
            "streamscope",
            "analyze",
            "input.mp4",
            "--format",
            "csv",
            "--max-frames",
            "100",
            "--any-qp",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                format,
                max_frames,
                any_qp,
                any_type,
                tolerance,
                scene_threshold,
                ..
            } => {
                assert_eq!(format, ReportFormat::Csv);
                assert_eq!(max_frames, Some(100));
                assert!(any_qp);
                assert!(!any_type);
                assert_eq!(tolerance, 1.0);
                assert_eq!(scene_threshold, 0.3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
