//! zigscan: compute, archive, and send textile scan paths.
//!
//! # Usage
//!
//! ```text
//! zigscan generate --calibration calibration_matrix.yaml \
//!     --background bg.png --object textile.png \
//!     [--spacing 20 --dilation 10 --threshold 50] \
//!     [--archive runs/ --sample denim_04] [--device 192.168.0.10:5000]
//! zigscan send --device 192.168.0.10:5000 --sample-id 4 coordinates/denim_04.txt
//! zigscan project --calibration calibration_matrix.yaml 612,512 100,80
//! zigscan lut --calibration calibration_matrix.yaml --width 1224 --height 1024 --output lut.txt
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default
//! `info`). Reports and projected coordinates go to stdout.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod generate;
mod project;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use zigscan_io::device::DEFAULT_TIMEOUT;
use zigscan_io::TcpDeviceLink;
use zigscan_pipeline::diagnostics::Clock;
use zigscan_pipeline::{PathSink, RunConfig, ScanAxis};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

/// Zig-zag treatment paths for textiles on a calibrated work plate.
#[derive(Parser)]
#[command(name = "zigscan", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Compute the scan path for one textile and optionally archive and
    /// send it.
    Generate(generate::GenerateArgs),

    /// Send a previously written coordinate file to the device.
    Send(SendArgs),

    /// Map points between image pixels and plate millimeters.
    Project(project::ProjectArgs),

    /// Write the plate coordinate of every pixel.
    Lut(project::LutArgs),
}

/// Per-run parameters shared by the commands that compute paths.
#[derive(Debug, Args)]
struct RunArgs {
    /// Foreground threshold on the smoothed difference (0-255).
    #[arg(long, default_value_t = RunConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Distance between scan lines in millimeters.
    #[arg(long, default_value_t = RunConfig::DEFAULT_SPACING_MM)]
    spacing: f64,

    /// Safety margin around the textile in millimeters.
    #[arg(long, default_value_t = RunConfig::DEFAULT_DILATION_MM)]
    dilation: f64,

    /// Image axis the scan lines follow.
    #[arg(long, value_enum, default_value_t = Axis::Rows)]
    scan_axis: Axis,

    /// Full run config as a JSON string.
    ///
    /// When provided, the individual run flags are ignored. The JSON must
    /// be a valid `RunConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Scan line axis selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Axis {
    /// Lines are image rows.
    Rows,
    /// Lines are image columns.
    Columns,
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Coordinate file as written by `generate --coordinates` or the archive.
    coordinates: PathBuf,

    /// Device controller address (`host:port`).
    #[arg(long)]
    device: String,

    /// Sample identifier sent in the frame header.
    #[arg(long, default_value_t = 0)]
    sample_id: i32,
}

/// Build a [`RunConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(args: &RunArgs) -> Result<RunConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(RunConfig {
        threshold: args.threshold,
        spacing_mm: args.spacing,
        dilation_mm: args.dilation,
        scan_axis: match args.scan_axis {
            Axis::Rows => ScanAxis::Rows,
            Axis::Columns => ScanAxis::Columns,
        },
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Generate(args) => generate::run(&args),
        Commands::Send(args) => run_send(&args),
        Commands::Project(args) => project::run_project(&args),
        Commands::Lut(args) => project::run_lut(&args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_send(args: &SendArgs) -> CliResult<()> {
    let text = std::fs::read_to_string(&args.coordinates)
        .map_err(|e| format!("Error reading {}: {e}", args.coordinates.display()))?;
    let path = zigscan_export::parse_coordinate_text(&text)?;
    tracing::info!(points = path.len(), file = %args.coordinates.display(), "read coordinates");

    let mut link = TcpDeviceLink::connect(&args.device, DEFAULT_TIMEOUT)?;
    link.send(args.sample_id, &path)?;
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
