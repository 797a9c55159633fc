//! Boundary rasterization with a safety margin.
//!
//! Every boundary is stroked onto a blank canvas with a width of twice the
//! margin, so the painted band reaches roughly `dilation_mm` outside (and
//! inside) the region edge. Only the sampled scan lines are read back
//! afterwards, which makes the stroke a good enough stand-in for a true
//! morphological dilation.

use crate::contour::ContourSet;
use crate::raster::StrokeCanvas;
use crate::types::{Dimensions, Mask, PathGenerationError};

/// Stroke width in pixels for a margin of `dilation_mm` at `pixmm`
/// millimeters per pixel: `max(1, round(2 * dilation_mm / pixmm))`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn margin_stroke_px(dilation_mm: f64, pixmm: f64) -> u32 {
    let px = (2.0 * dilation_mm / pixmm).round();
    if px.is_finite() && px >= 1.0 {
        px.min(f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

/// Draw every boundary of `contours` as a closed stroke `stroke_px` wide.
///
/// The boundary pixels themselves are always set, so the band is closed
/// even where a thin stroke would miss a diagonal step.
///
/// # Errors
///
/// Returns [`PathGenerationError::EmptyFrame`] if the canvas has no
/// pixels.
pub fn rasterize_margin(
    contours: &ContourSet,
    dimensions: Dimensions,
    stroke_px: u32,
) -> Result<Mask, PathGenerationError> {
    let mut canvas = StrokeCanvas::new(dimensions)?;
    #[allow(clippy::cast_precision_loss)]
    let width = stroke_px.max(1) as f32;

    for boundary in &contours.boundaries {
        let points: Vec<(f64, f64)> = boundary
            .points
            .iter()
            .map(|&(x, y)| (f64::from(x), f64::from(y)))
            .collect();
        canvas.stroke(&points, width, true);
        canvas.stamp(boundary.points.iter().copied());
    }

    Ok(canvas.into_mask())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::contour::trace_boundaries;

    fn square_mask(size: u32, x0: u32, x1: u32) -> Mask {
        Mask::from_fn(size, size, |x, y| {
            let inside = (x0..x1).contains(&x) && (x0..x1).contains(&y);
            image::Luma([if inside { 255 } else { 0 }])
        })
    }

    #[test]
    fn stroke_width_rounds_twice_the_margin() {
        assert_eq!(margin_stroke_px(10.0, 1.0), 20);
        assert_eq!(margin_stroke_px(10.0, 0.5), 40);
        assert_eq!(margin_stroke_px(1.3, 1.0), 3);
        assert_eq!(margin_stroke_px(0.0, 1.0), 1);
        assert_eq!(margin_stroke_px(0.1, 1.0), 1);
    }

    #[test]
    fn margin_extends_outside_the_region() {
        let mask = square_mask(100, 30, 70);
        let contours = trace_boundaries(&mask).unwrap();
        let canvas = rasterize_margin(
            &contours,
            Dimensions {
                width: 100,
                height: 100,
            },
            10,
        )
        .unwrap();

        // Left edge sits at x = 30; the band reaches about 5 px either side.
        assert_eq!(canvas.get_pixel(26, 50).0[0], 255);
        assert_eq!(canvas.get_pixel(34, 50).0[0], 255);
        assert_eq!(canvas.get_pixel(22, 50).0[0], 0);
        // Interior well away from the edge is untouched.
        assert_eq!(canvas.get_pixel(50, 50).0[0], 0);
    }

    #[test]
    fn thin_stroke_still_covers_every_boundary_pixel() {
        // A diagonal staircase is where a one-pixel stroke can skip.
        let mask = Mask::from_fn(40, 40, |x, y| image::Luma([if x + y < 40 && x > 2 && y > 2 { 255 } else { 0 }]));
        let contours = trace_boundaries(&mask).unwrap();
        let canvas = rasterize_margin(
            &contours,
            Dimensions {
                width: 40,
                height: 40,
            },
            1,
        )
        .unwrap();
        for b in &contours.boundaries {
            for &(x, y) in &b.points {
                assert_eq!(canvas.get_pixel(x, y).0[0], 255, "({x}, {y})");
            }
        }
    }

    #[test]
    fn canvas_is_binary() {
        let mask = square_mask(60, 10, 40);
        let contours = trace_boundaries(&mask).unwrap();
        let canvas = rasterize_margin(
            &contours,
            Dimensions {
                width: 60,
                height: 60,
            },
            7,
        )
        .unwrap();
        assert!(canvas.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}
