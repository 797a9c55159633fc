//! Scale estimation, scan line sampling and boustrophedon ordering.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationParameters;
use crate::projection::project_to_world;
use crate::types::{Dimensions, Mask, PathGenerationError, PixelPoint, ScanAxis};

/// Pixel scale derived from the calibrated plate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleEstimate {
    /// Mean millimeters per pixel.
    pub pixmm: f64,
    /// Millimeters per pixel along the top, bottom, left and right frame
    /// edges.
    pub edge_ratios: [f64; 4],
}

/// Estimate millimeters per pixel from the frame corners.
///
/// The corners `(0, 0)`, `(W, 0)`, `(0, H)` and `(W, H)` are projected to
/// the plate with undistortion. Each frame edge gives one ratio: plate
/// length of the projected edge over its pixel length. The estimate is the
/// mean of the four.
///
/// The plate length is the Euclidean length of the projected edge, not
/// only its X extent (top and bottom edges) or Y extent (left and right
/// edges). Both agree for an overhead camera; the Euclidean length also
/// stays correct when the camera is rolled about its optical axis.
///
/// # Errors
///
/// Returns [`PathGenerationError::EmptyFrame`] for a zero-sized frame,
/// [`PathGenerationError::Projection`] if a corner cannot be projected and
/// [`PathGenerationError::DegenerateScale`] if the result is not a
/// positive finite number.
pub fn estimate_pixmm(
    calib: &CalibrationParameters,
    dimensions: Dimensions,
) -> Result<ScaleEstimate, PathGenerationError> {
    if dimensions.width == 0 || dimensions.height == 0 {
        return Err(PathGenerationError::EmptyFrame);
    }
    let w = f64::from(dimensions.width);
    let h = f64::from(dimensions.height);
    let corners = [
        PixelPoint::new(0.0, 0.0),
        PixelPoint::new(w, 0.0),
        PixelPoint::new(0.0, h),
        PixelPoint::new(w, h),
    ];
    let world = project_to_world(&corners, calib, true).map_err(PathGenerationError::Projection)?;

    let edge_ratios = [
        world[0].distance(world[1]) / w,
        world[2].distance(world[3]) / w,
        world[0].distance(world[2]) / h,
        world[1].distance(world[3]) / h,
    ];
    let pixmm = edge_ratios.iter().sum::<f64>() / 4.0;
    if !pixmm.is_finite() || pixmm <= 0.0 {
        return Err(PathGenerationError::DegenerateScale(pixmm));
    }
    Ok(ScaleEstimate { pixmm, edge_ratios })
}

/// Scan line step in pixels: `max(1, round(spacing_mm / pixmm))`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn line_skip(spacing_mm: f64, pixmm: f64) -> u32 {
    let skip = (spacing_mm / pixmm).round();
    if skip.is_finite() && skip >= 1.0 {
        skip.min(f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

/// Boundary crossings found on the sampled scan lines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Crossings {
    /// Crossing pixels in discovery order: line by line, and along each
    /// line in increasing coordinate.
    pub points: Vec<PixelPoint>,
    /// Number of scan lines visited.
    pub sampled_lines: usize,
    /// Number of visited lines with at least one crossing.
    pub lines_with_hits: usize,
}

/// Visit every `skip`-th line of `canvas` along `axis`, starting at 0, and
/// keep the first and last painted pixel of each.
///
/// Every line with a hit contributes exactly one pair, so a line with a
/// single painted pixel (a tangent at the top or bottom of a boundary)
/// contributes that pixel twice and the pairs stay aligned for
/// [`boustrophedon_order`]. Lines that cross several disjoint spans still
/// contribute only their outermost pair, so separate blobs on one line
/// merge into a single span.
#[must_use]
pub fn sample_crossings(canvas: &Mask, skip: u32, axis: ScanAxis) -> Crossings {
    let (width, height) = canvas.dimensions();
    let (lines, along) = match axis {
        ScanAxis::Rows => (height, width),
        ScanAxis::Columns => (width, height),
    };
    let pixel = |line: u32, pos: u32| match axis {
        ScanAxis::Rows => (pos, line),
        ScanAxis::Columns => (line, pos),
    };
    let lit = |line: u32, pos: u32| {
        let (x, y) = pixel(line, pos);
        canvas.get_pixel(x, y).0[0] > 0
    };

    let mut crossings = Crossings::default();
    for line in (0..lines).step_by(skip.max(1) as usize) {
        crossings.sampled_lines += 1;
        let Some(first) = (0..along).find(|&pos| lit(line, pos)) else {
            continue;
        };
        // `first` is lit, so the reverse search always succeeds.
        let last = (first..along).rev().find(|&pos| lit(line, pos)).unwrap_or(first);

        crossings.lines_with_hits += 1;
        for pos in [first, last] {
            let (x, y) = pixel(line, pos);
            crossings
                .points
                .push(PixelPoint::new(f64::from(x), f64::from(y)));
        }
    }
    crossings
}

/// Reorder crossings into a zig-zag traversal.
///
/// Points are taken in blocks of four (two consecutive lines, each entered
/// and left once) and each block is emitted as `p0, p1, p3, p2`, so every
/// second line is traversed in the opposite direction. Points left over
/// after the last full block are appended unchanged. No point is dropped
/// or duplicated.
#[must_use]
pub fn boustrophedon_order<T: Copy>(points: &[T]) -> Vec<T> {
    let mut ordered = Vec::with_capacity(points.len());
    let mut blocks = points.chunks_exact(4);
    for block in &mut blocks {
        ordered.extend_from_slice(&[block[0], block[1], block[3], block[2]]);
    }
    ordered.extend_from_slice(blocks.remainder());
    ordered
}

/// Largest distance between consecutive points, or 0 for fewer than two.
#[must_use]
pub fn max_step(points: &[PixelPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| pair[0].distance(pair[1]))
        .fold(0.0, f64::max)
}
