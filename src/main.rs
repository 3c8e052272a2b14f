//! Unit Finder - camera viewfinder that reads addresses and pulls out the unit number
//!
//! Frames from a camera feed are throttled, read with OCR under each of four
//! rotations, and searched for an address that passes the configured filter.
//! When one does, the apartment/unit number found in the same reading is shown.

mod analysis;
mod capture;
mod config;
mod pipeline;
mod vision;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver};
use std::io::Read;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::{AddressMatcher, UnitExtractor};
use crate::capture::frame::CapturedFrame;
use crate::capture::{DirectorySource, FramePump};
use crate::config::AppConfig;
use crate::pipeline::{
    ChannelSink, FrameThrottler, OrientationRetryScanner, PipelineCoordinator, PipelineState,
    ResultSink, RunOutcome, UnitMatch,
};
use crate::vision::{OcrsRecognizer, TextRecognizer};

/// Unit Finder - read an address off a camera feed and show the unit number
#[derive(Parser, Debug)]
#[command(name = "unit-finder")]
#[command(about = "Finds a qualifying address in camera frames and shows its apartment number")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Treat the images in a directory as a live camera feed
    Watch {
        /// Directory of frame images, played in file name order
        dir: PathBuf,
        /// Override the configured frame rate
        #[arg(long)]
        fps: Option<u32>,
        /// Restart the feed when it runs out
        #[arg(long = "loop")]
        loop_feed: bool,
        /// Keep scanning after the first match
        #[arg(long)]
        continuous: bool,
    },
    /// Run the pipeline once over a single image
    Scan {
        /// Image file
        image: PathBuf,
    },
    /// Match address and unit in plain text, without OCR
    Text {
        /// Text file (reads stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::InitConfig { force } => init_config(args.config.as_deref(), force),
        Command::Text { file } => {
            let config = load_or_default_config(args.config.as_deref())?;
            run_text(&config, file.as_deref(), args.json)
        }
        Command::Scan { image } => {
            let config = load_or_default_config(args.config.as_deref())?;
            run_scan(&config, &image, args.json)
        }
        Command::Watch {
            dir,
            fps,
            loop_feed,
            continuous,
        } => {
            let mut config = load_or_default_config(args.config.as_deref())?;
            if let Some(fps) = fps {
                config.capture.max_fps = fps;
            }
            config.capture.loop_feed |= loop_feed;
            run_watch(&config, &dir, continuous, args.json)
        }
    }
}

/// Load configuration from the given or default path, falling back to defaults
fn load_or_default_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = config::default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring unreadable configuration: {:#}", e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::default_config_path()?,
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_config(&AppConfig::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_text(config: &AppConfig, file: Option<&Path>, json: bool) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let address = AddressMatcher::new(config.filter.clone())
        .match_text(&text)
        .into_option();
    let unit = UnitExtractor::new().extract(&text).into_option();

    if json {
        println!(
            "{}",
            serde_json::json!({ "address": address, "unit": unit })
        );
    } else {
        println!("Address: {}", address.as_deref().unwrap_or("(no match)"));
        println!("Unit:    {}", unit.as_deref().unwrap_or("(not found)"));
    }
    Ok(())
}

fn build_recognizer(config: &AppConfig) -> Result<Arc<dyn TextRecognizer>> {
    let paths = config.ocr.model_paths()?;
    let oriented = config
        .capture
        .image_orientation(config.scanner.first_orientation);
    let recognizer = OcrsRecognizer::load(&paths)?.with_mirroring(oriented.mirrored);
    Ok(Arc::new(recognizer))
}

fn build_pipeline(
    config: &AppConfig,
    recognizer: Arc<dyn TextRecognizer>,
    sink: Arc<dyn ResultSink>,
) -> PipelineCoordinator {
    let oriented = config
        .capture
        .image_orientation(config.scanner.first_orientation);
    let scanner = OrientationRetryScanner::new(recognizer, AddressMatcher::new(config.filter.clone()))
        .with_first_orientation(oriented.rotation)
        .with_strategy(config.scanner.strategy)
        .with_ocr_timeout(config.scanner.ocr_timeout());
    let throttler = FrameThrottler::new(config.throttle.min_interval());

    info!(
        "Orientation order {:?}, {:?} strategy, one frame per {:?}",
        scanner.candidates(),
        config.scanner.strategy,
        throttler.min_interval()
    );

    PipelineCoordinator::new(throttler, scanner, sink, config.scanner.run_timeout())
}

fn run_scan(config: &AppConfig, image: &Path, json: bool) -> Result<()> {
    let decoded =
        image::open(image).with_context(|| format!("Failed to decode {}", image.display()))?;
    let frame = CapturedFrame::from_image(&decoded);

    let recognizer = build_recognizer(config)?;
    let (tx, _rx) = unbounded();
    let coordinator = build_pipeline(config, recognizer, Arc::new(ChannelSink::new(tx)));

    let runtime = tokio::runtime::Runtime::new()?;
    match runtime.block_on(coordinator.process(frame)) {
        RunOutcome::Matched(result) => present(&result, json)?,
        RunOutcome::TimedOut => println!("Scan timed out"),
        RunOutcome::Exhausted | RunOutcome::Dropped => println!("No matching address found"),
    }
    Ok(())
}

fn run_watch(config: &AppConfig, dir: &Path, continuous: bool, json: bool) -> Result<()> {
    let mut source = DirectorySource::open(dir, config.capture.loop_feed)?;
    if source.is_empty() {
        anyhow::bail!("No image files in {}", dir.display());
    }

    let recognizer = build_recognizer(config)?;
    let (tx, rx) = unbounded();
    let coordinator = build_pipeline(config, recognizer, Arc::new(ChannelSink::new(tx)));

    let runtime = tokio::runtime::Runtime::new()?;
    let pump = FramePump::new(config.capture.to_capture_config());

    info!(
        "Watching {} frames in {} at {} fps (Ctrl+C to stop)",
        source.len(),
        dir.display(),
        config.capture.max_fps
    );

    let mut found = false;
    pump.run(&mut source, |frame| {
        coordinator.on_frame(frame, runtime.handle());

        found |= drain_results(&rx, json);
        if found && !continuous {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    // Let the last admitted run finish before reporting
    let deadline = Instant::now() + config.scanner.run_timeout();
    while coordinator.state() != PipelineState::Idle && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    found |= drain_results(&rx, json);

    let stats = coordinator.stats();
    info!(
        "Feed finished: {} frames, {} admitted, {} dropped, {} matched, {} exhausted, {} timed out",
        stats.frames_seen,
        stats.frames_admitted,
        stats.frames_dropped,
        stats.runs_matched,
        stats.runs_exhausted,
        stats.runs_timed_out
    );
    match stats.last_match {
        Some(last) => info!("Last match: unit {} at {}", last.unit, last.address),
        None if !found => println!("No matching address found"),
        None => {}
    }
    Ok(())
}

/// Print any pending results; true if there were some
fn drain_results(rx: &Receiver<UnitMatch>, json: bool) -> bool {
    let mut any = false;
    for result in rx.try_iter() {
        any = true;
        if let Err(e) = present(&result, json) {
            warn!("Failed to print result: {}", e);
        }
    }
    any
}

fn present(result: &UnitMatch, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!();
        println!("    UNIT {}", result.unit);
        println!("    {}", result.address);
        println!();
    }
    Ok(())
}
