//! CAN Signal Decoder CLI Application
//!
//! This is the command-line interface for the CAN signal decoder.
//! It uses the can-signal-decoder library and adds:
//! - TOML configuration with command-line overrides
//! - Glob expansion of frame log inputs
//! - JSON Lines / delimited sample output
//! - End-of-run summary with an optional sample preview

use anyhow::{anyhow, bail, Context, Result};
use can_signal_decoder::catalog::parse_frame_id;
use can_signal_decoder::Decoder;
use clap::Parser;
use glob::glob;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod output;
mod report;

use config::{AppConfig, OutputFormat};
use report::RunReport;

/// CAN Signal Decoder - Decode CAN frame logs into physical signal values
#[derive(Parser, Debug)]
#[command(name = "can-signal-cli")]
#[command(about = "Decode CAN frame logs into physical signal values", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the signal catalog (JSON)
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Frame log file or glob pattern (can be repeated)
    #[arg(short, long, value_name = "PATTERN")]
    log: Vec<String>,

    /// Output file for decoded samples (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Column delimiter of the frame logs
    #[arg(long, value_name = "CHAR")]
    delimiter: Option<char>,

    /// Only decode these frame IDs (hex with 0x prefix or decimal, can be repeated)
    #[arg(long = "frame-id", value_name = "ID")]
    frame_ids: Vec<String>,

    /// Maximum number of frames to read
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<u64>,

    /// Stop at the first malformed record instead of skipping it
    #[arg(long)]
    fail_fast: bool,

    /// Reject values outside each signal's physical range
    #[arg(long)]
    validate_range: bool,

    /// Decode in parallel batches
    #[arg(long)]
    parallel: bool,

    /// Pairs per parallel batch
    #[arg(long, value_name = "COUNT")]
    batch_size: Option<usize>,

    /// Show the first N decoded samples in the summary
    #[arg(long, value_name = "N")]
    preview: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Signal Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using decoder library v{}", can_signal_decoder::VERSION);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = resolve_config(args)?;
    config.validate()?;

    let mut paths = Vec::new();
    for pattern in &config.input.frame_logs {
        paths.extend(expand_input(pattern)?);
    }
    log::info!("Resolved {} frame log file(s)", paths.len());

    let catalog_path = config
        .input
        .catalog
        .as_deref()
        .ok_or_else(|| anyhow!("No signal catalog given"))?;
    let decoder = Decoder::from_catalog_file(catalog_path)
        .with_context(|| format!("Failed to load signal catalog: {:?}", catalog_path))?;

    let mut sink = output::open_sink(
        config.output.format,
        config.output.path.as_deref(),
        config.output.delimiter,
    )?;

    let files = paths.len();
    let mut run = decoder.decode_files(paths, config.input.delimiter, config.decoding.clone());
    let mut preview = Vec::with_capacity(config.output.preview);
    let mut failure = None;

    for item in run.by_ref() {
        match item {
            Ok(sample) => {
                sink.write_sample(&sample)?;
                if preview.len() < config.output.preview {
                    preview.push(sample);
                }
            }
            Err(err) => {
                log::error!("Decode run aborted: {}", err);
                failure = Some(err);
                break;
            }
        }
    }
    sink.finish()?;
    drop(sink);

    let stats = run.stats();
    if !args.quiet {
        let report = RunReport {
            catalog: decoder.catalog_stats(),
            files,
            stats: &stats,
            preview: &preview,
            failure: failure.as_ref().map(|err| err.to_string()),
        };
        // Samples own stdout unless they go to a file
        if config.output.path.is_some() {
            report.write_to(&mut io::stdout().lock())?;
        } else {
            let mut stderr = io::stderr().lock();
            report.write_to(&mut stderr)?;
            stderr.flush()?;
        }
    }

    match failure {
        Some(err) => Err(anyhow::Error::new(err).context("Decode run aborted")),
        None => Ok(()),
    }
}

/// Load the config file (if any) and apply command-line overrides on top
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(catalog) = &args.catalog {
        config.input.catalog = Some(catalog.clone());
    }
    if !args.log.is_empty() {
        config.input.frame_logs = args.log.clone();
    }
    if let Some(delimiter) = args.delimiter {
        config.input.delimiter = delimiter;
    }
    if let Some(path) = &args.output {
        config.output.path = Some(path.clone());
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(preview) = args.preview {
        config.output.preview = preview;
    }

    let decoding = &mut config.decoding;
    if !args.frame_ids.is_empty() {
        let ids = args
            .frame_ids
            .iter()
            .map(|text| parse_frame_id(text).ok_or_else(|| anyhow!("Invalid frame ID: {:?}", text)))
            .collect::<Result<Vec<u32>>>()?;
        decoding.frame_filter = Some(ids);
    }
    if let Some(max_frames) = args.max_frames {
        decoding.max_frames = Some(max_frames);
    }
    if let Some(batch_size) = args.batch_size {
        decoding.batch_size = batch_size.max(1);
    }
    decoding.fail_fast |= args.fail_fast;
    decoding.validate_range |= args.validate_range;
    decoding.parallel |= args.parallel;

    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Expand a frame log argument into file paths
///
/// Plain paths are passed through untouched and reported later by the
/// reader if missing. Patterns must match at least one file.
fn expand_input(pattern: &str) -> Result<Vec<PathBuf>> {
    if !is_glob_pattern(pattern) {
        return Ok(vec![PathBuf::from(pattern)]);
    }

    let entries = glob(pattern).map_err(|err| anyhow!("Invalid input pattern {:?}: {}", pattern, err.msg))?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("Invalid input pattern {:?}", pattern))?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        bail!("No files match pattern {:?}", pattern);
    }
    Ok(matches)
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
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
