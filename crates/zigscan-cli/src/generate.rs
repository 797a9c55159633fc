//! `zigscan generate`: one textile from frames to device.

use std::path::PathBuf;

use clap::Args;
use zigscan_io::device::DEFAULT_TIMEOUT;
use zigscan_io::{SampleArchive, TcpDeviceLink, load_calibration, load_frame, save_frame, save_mask};
use zigscan_pipeline::diagnostics::path_generation_with_diagnostics;
use zigscan_pipeline::{PathSink, Segmenter};

use crate::{CliResult, RunArgs, StdClock, config_from_cli};

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Calibration record (YAML, or JSON by extension).
    #[arg(long)]
    calibration: PathBuf,

    /// Frame of the empty work plate.
    #[arg(long)]
    background: PathBuf,

    /// Frame of the plate with the textile on it.
    #[arg(long)]
    object: PathBuf,

    #[command(flatten)]
    pub(crate) run: RunArgs,

    /// Width of the object-free band along the frame edges (pixels).
    #[arg(long, default_value_t = Segmenter::DEFAULT_BORDER_PX)]
    border_px: u32,

    /// Gaussian sigma applied to the difference image.
    #[arg(long, default_value_t = Segmenter::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Write the path overlay to this PNG.
    #[arg(long)]
    visualization: Option<PathBuf>,

    /// Write the foreground mask to this PNG.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Write the plate coordinates to this text file.
    #[arg(long)]
    coordinates: Option<PathBuf>,

    /// Archive frames, coordinates and a log row under this directory.
    #[arg(long, requires = "sample")]
    archive: Option<PathBuf>,

    /// Sample name used for archive file names.
    #[arg(long)]
    sample: Option<String>,

    /// Send the path to the device controller at `host:port`.
    #[arg(long)]
    device: Option<String>,

    /// Sample identifier sent in the frame header.
    #[arg(long, default_value_t = 0)]
    sample_id: i32,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

pub fn run(args: &GenerateArgs) -> CliResult<()> {
    let config = config_from_cli(&args.run)?;
    let segmenter = Segmenter {
        border_px: args.border_px,
        blur_sigma: args.blur_sigma,
    };
    let calib = load_calibration(&args.calibration)?;
    let background = load_frame(&args.background)?;
    let object = load_frame(&args.object)?;
    tracing::info!(?config, ?segmenter, "generating path");

    let (result, diagnostics) = path_generation_with_diagnostics(
        &calib,
        &object,
        &background,
        &config,
        &segmenter,
        &StdClock,
    )?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        println!("{}", diagnostics.report());
    }

    if let Some(ref path) = args.visualization {
        save_frame(path, &result.visualization)?;
        tracing::info!(path = %path.display(), "wrote visualization");
    }
    if let Some(ref path) = args.mask {
        save_mask(path, &result.mask)?;
        tracing::info!(path = %path.display(), "wrote mask");
    }
    if let Some(ref path) = args.coordinates {
        std::fs::write(path, zigscan_export::to_coordinate_text(&result.world_path))
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote coordinates");
    }
    if let (Some(dir), Some(sample)) = (&args.archive, &args.sample) {
        let mut archive = SampleArchive::open(dir, zigscan_io::now())?;
        archive.archive(
            sample,
            &background,
            &object,
            &result.world_path,
            &config,
            zigscan_io::now(),
        )?;
    }
    if let Some(ref addr) = args.device {
        let mut link = TcpDeviceLink::connect(addr, DEFAULT_TIMEOUT)?;
        link.send(args.sample_id, &result.world_path)?;
    }
    Ok(())
}
