//! CANedge Signal Tables CLI
//!
//! Decodes a CAN log into one CSV table per known signal using the
//! canedge-decoder library, then prints which CAN IDs had no decoder.

use anyhow::{Context, Result};
use canedge_decoder::{formats, DecoderRegistry, FrameProcessor};
use clap::Parser;
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::{AppConfig, Overrides, Settings};

/// CANedge Signal Tables - Decode CAN logs into per-signal CSV tables
#[derive(Parser, Debug)]
#[command(name = "canedge-cli")]
#[command(about = "Decode CAN logs into per-signal CSV tables", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the CAN log file (MF4 or candump format)
    #[arg(value_name = "LOG")]
    log: PathBuf,

    /// Append to existing tables instead of recreating them
    #[arg(long)]
    append: bool,

    /// Directory for the output tables (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors and the final summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CANedge Signal Tables CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", canedge_decoder::VERSION);

    let settings = configure(&args)?;
    run(&args.log, &settings, args.quiet)
}

/// Resolve the run settings from the config file and flags
fn configure(args: &Args) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let overrides = Overrides {
        output_dir: args.output_dir.clone(),
        append: args.append,
        report: args.report.clone(),
    };

    let settings = config::configure(file, overrides);
    log::debug!("Resolved settings: {:?}", settings);
    Ok(settings)
}

/// Decode the log into tables and report unmatched IDs
fn run(log_path: &Path, settings: &Settings, quiet: bool) -> Result<()> {
    let frames = formats::open_log(log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

    let processor = FrameProcessor::new(DecoderRegistry::standard(), settings.run.clone())
        .with_context(|| {
            format!(
                "Failed to prepare output tables in {:?}",
                settings.run.output_dir()
            )
        })?;

    let summary = processor
        .process(frames)
        .with_context(|| format!("Failed to decode {:?}", log_path))?;

    report::print_summary(&summary, quiet);
    if let Some(path) = &settings.report {
        report::write_json(&summary, path)?;
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
