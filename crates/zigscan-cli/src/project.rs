//! `zigscan project` and `zigscan lut`: the calibrated plane mapping on
//! its own.

use std::path::PathBuf;

use clap::Args;
use zigscan_io::load_calibration;
use zigscan_pipeline::{
    Dimensions, PixelPoint, WorldPoint, coordinate_lut, project_to_pixel, project_to_world,
};

use crate::CliResult;

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Calibration record (YAML, or JSON by extension).
    #[arg(long)]
    calibration: PathBuf,

    /// Points as `a,b`: pixel `u,v`, or plate `x,y` in millimeters with
    /// `--to-pixel`.
    #[arg(required = true, value_parser = parse_pair, allow_hyphen_values = true)]
    points: Vec<(f64, f64)>,

    /// Map plate millimeters to pixels instead.
    #[arg(long)]
    to_pixel: bool,

    /// Ignore lens distortion (treat pixels as already undistorted).
    #[arg(long)]
    no_distortion: bool,
}

#[derive(Debug, Args)]
pub struct LutArgs {
    /// Calibration record (YAML, or JSON by extension).
    #[arg(long)]
    calibration: PathBuf,

    /// Frame width in pixels.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    height: u32,

    /// Output coordinate file, one `x y` line per pixel in row-major order.
    #[arg(long)]
    output: PathBuf,
}

/// Parse `a,b` into a pair of finite numbers.
fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `a,b`, got {s:?}"))?;
    let number = |t: &str| {
        t.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("{t:?} is not a finite number"))
    };
    Ok((number(a)?, number(b)?))
}

pub fn run_project(args: &ProjectArgs) -> CliResult<()> {
    let calib = load_calibration(&args.calibration)?;
    let lens = !args.no_distortion;

    if args.to_pixel {
        let world: Vec<WorldPoint> = args
            .points
            .iter()
            .map(|&(x, y)| WorldPoint::new(x, y))
            .collect();
        for p in project_to_pixel(&world, &calib, lens)? {
            println!("{:10.5} {:10.5}", p.u, p.v);
        }
    } else {
        let pixels: Vec<PixelPoint> = args
            .points
            .iter()
            .map(|&(u, v)| PixelPoint::new(u, v))
            .collect();
        print!(
            "{}",
            zigscan_export::to_coordinate_text(&project_to_world(&pixels, &calib, lens)?)
        );
    }
    Ok(())
}

pub fn run_lut(args: &LutArgs) -> CliResult<()> {
    let calib = load_calibration(&args.calibration)?;
    let dimensions = Dimensions {
        width: args.width,
        height: args.height,
    };
    let lut = coordinate_lut(&calib, dimensions)?;
    std::fs::write(&args.output, zigscan_export::to_coordinate_text(&lut))
        .map_err(|e| format!("Error writing {}: {e}", args.output.display()))?;
    tracing::info!(
        %dimensions,
        entries = lut.len(),
        path = %args.output.display(),
        "wrote coordinate lookup table"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pairs_parse_with_signs_and_spaces() {
        assert_eq!(parse_pair("612,512").unwrap(), (612.0, 512.0));
        assert_eq!(parse_pair("-1.5, 2e1").unwrap(), (-1.5, 20.0));
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(parse_pair("612").is_err());
        assert!(parse_pair("a,1").is_err());
        assert!(parse_pair("1,inf").is_err());
    }
}
