//! Path visualization: the ordered scan path drawn over the source frame.

use crate::raster::StrokeCanvas;
use crate::types::{Dimensions, Frame, Mask, PathGenerationError, PixelPoint};

/// Width of the drawn path in pixels.
pub const PATH_LINE_WIDTH: f32 = 8.0;

/// Weight of the source frame in the blend.
pub const FRAME_WEIGHT: f64 = 0.7;

/// Weight of the path overlay in the blend.
pub const OVERLAY_WEIGHT: f64 = 0.3;

/// Paint the crossing points and the connecting path onto a blank canvas.
///
/// # Errors
///
/// Returns [`PathGenerationError::EmptyFrame`] if `dimensions` has no
/// pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn path_overlay(dimensions: Dimensions, path: &[PixelPoint]) -> Result<Mask, PathGenerationError> {
    let mut canvas = StrokeCanvas::new(dimensions)?;
    canvas.stamp(path.iter().map(|p| (p.u as u32, p.v as u32)));
    let points: Vec<(f64, f64)> = path.iter().map(|p| (p.u, p.v)).collect();
    if points.len() >= 2 {
        canvas.stroke(&points, PATH_LINE_WIDTH, false);
    }
    Ok(canvas.into_mask())
}

/// Blend a white-on-black overlay into `frame`:
/// `round(0.7 * frame + 0.3 * overlay)` per channel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend(frame: &Frame, overlay: &Mask) -> Frame {
    Frame::from_fn(frame.width(), frame.height(), |x, y| {
        let o = f64::from(overlay.get_pixel(x, y).0[0]);
        let src = frame.get_pixel(x, y).0;
        image::Rgb(src.map(|c| {
            FRAME_WEIGHT
                .mul_add(f64::from(c), OVERLAY_WEIGHT * o)
                .round()
                .clamp(0.0, 255.0) as u8
        }))
    })
}

/// Draw `path` over `frame`.
///
/// # Errors
///
/// Returns [`PathGenerationError::EmptyFrame`] for a zero-sized frame.
pub fn render_visualization(frame: &Frame, path: &[PixelPoint]) -> Result<Frame, PathGenerationError> {
    let overlay = path_overlay(Dimensions::of(frame), path)?;
    Ok(blend(frame, &overlay))
}
