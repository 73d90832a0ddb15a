//! # Omniwave Application Entry Point
//!
//! Command-line front end for the wave generator. It resolves parameters
//! (CLI arguments > config file > defaults), loads the four dataset files,
//! and streams every generated point to stdout. Logs go to stderr; set
//! `RUST_LOG=debug` for per-run detail.
//!
//! ```bash
//! # Defaults: 31 days before, 0.01 after, 60 minute step, factor 64
//! omniwave
//!
//! # All four values or none
//! omniwave 365 0 1440 64
//!
//! # Count down to a date, JSON lines, blocking mode
//! omniwave --target-date 2030-01-01 --format json --sync
//! ```


use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use omniwave_lib::config::{Config, DatasetConfig};
use omniwave_lib::datasets::{self, DatasetTable};
use omniwave_lib::params::{self, WaveParams};
use omniwave_lib::renderer::{ConsoleSink, PointFormat};
use omniwave_lib::sequencer::{CancelToken, WaveSequencer};

/// Calculates a timewave to a given point.
#[derive(Parser, Debug)]
#[command(author, version, about, allow_negative_numbers = true)]
struct Cli {
    /// Days before the target point at which the wave starts
    days_before: Option<f64>,
    /// Days after the target point (stored, not yet used)
    days_after: Option<f64>,
    /// Time interval between points, in minutes
    step_minutes: Option<f64>,
    /// Wave factor, an integer within 2 - 10,000
    scale_factor: Option<i64>,

    /// Configuration file (defaults to ./omniwave.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Derive the days before the target from this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    target_date: Option<NaiveDate>,

    /// Directory holding kelley.txt, watkins.txt, sheliak.txt and huangti.txt
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Output format: text or json
    #[arg(long)]
    format: Option<PointFormat>,

    /// Fractional digits in text output
    #[arg(long)]
    precision: Option<usize>,

    /// Generate on the main thread instead of the blocking pool
    #[arg(long)]
    sync: bool,
}

/// Resolve the four wave inputs from CLI arguments, config, and the clock.
///
/// The positional values must be given all together or not at all. A target
/// date (CLI first, then config) replaces `days_before`.
fn resolve_params(cli: &Cli, config: &Config, now: NaiveDateTime) -> anyhow::Result<WaveParams> {
    let given = [
        cli.days_before.is_some(),
        cli.days_after.is_some(),
        cli.step_minutes.is_some(),
        cli.scale_factor.is_some(),
    ]
    .iter()
    .filter(|&&g| g)
    .count();
    if given != 0 && given != 4 {
        bail!("all four arguments are required: DAYS_BEFORE DAYS_AFTER STEP_MINUTES SCALE_FACTOR");
    }

    let wave = &config.wave;
    let mut days_before = cli.days_before.unwrap_or(wave.days_before);
    if let Some(target) = cli.target_date.or(wave.target_date) {
        days_before = params::days_until(target, now);
        debug!(%target, days_before, "derived start from target date");
    }

    let params = WaveParams::new(
        days_before,
        cli.days_after.unwrap_or(wave.days_after),
        cli.step_minutes.unwrap_or(wave.step_minutes),
        cli.scale_factor.unwrap_or(wave.scale_factor),
    )?;
    Ok(params)
}

/// Dataset locations: `--data-dir` wins over the config file.
fn resolve_datasets(cli: &Cli, config: Config) -> DatasetConfig {
    match &cli.data_dir {
        Some(dir) => DatasetConfig::in_dir(dir),
        None => config.datasets,
    }
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let params = resolve_params(&cli, &config, Local::now().naive_local())?;
    let format = cli.format.unwrap_or(config.output.format);
    let precision = cli.precision.unwrap_or(config.output.precision);
    let dataset_paths = resolve_datasets(&cli, config);

    let table = DatasetTable::from_files(dataset_paths.paths()).context("loading datasets")?;
    let table = datasets::install(table);

    info!(
        days_before = params.singularity(),
        step_days = params.step(),
        scale_factor = params.scale_factor(),
        points = params.point_count(),
        "generating wave"
    );

    let mut sequencer = WaveSequencer::new(params, table);
    let cancel = CancelToken::new();
    let sink = ConsoleSink::new(BufWriter::new(io::stdout()), format, precision);

    // Create Tokio runtime for the Ctrl-C watcher and async generation
    let rt = tokio::runtime::Runtime::new()?;
    {
        let cancel = cancel.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (outcome, sink) = if cli.sync {
        let mut sink = sink;
        let outcome = sequencer.generate(&mut sink, &cancel);
        (outcome, sink)
    } else {
        let run = rt.block_on(sequencer.generate_async(sink, cancel));
        (run.outcome, run.sink)
    };

    sink.finish().context("writing wave points")?;
    outcome?;
    Ok(())
}
