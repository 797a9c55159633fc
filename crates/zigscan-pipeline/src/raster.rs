//! Binary stroke canvas backed by `tiny-skia`.
//!
//! Strokes are drawn with anti-aliasing off so the canvas converts to a
//! strict `{0, 255}` mask. Integer pixel `(x, y)` is addressed at its
//! center `(x + 0.5, y + 0.5)`, so a one-pixel stroke along a row covers
//! exactly that row.

use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::types::{Dimensions, Mask, PathGenerationError};

/// A blank canvas that accumulates strokes.
pub struct StrokeCanvas {
    pixmap: Pixmap,
    paint: Paint<'static>,
    dimensions: Dimensions,
}

impl StrokeCanvas {
    /// Allocate a blank canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PathGenerationError::EmptyFrame`] if either dimension is
    /// zero or the canvas cannot be allocated.
    pub fn new(dimensions: Dimensions) -> Result<Self, PathGenerationError> {
        let pixmap =
            Pixmap::new(dimensions.width, dimensions.height).ok_or(PathGenerationError::EmptyFrame)?;
        let mut paint = Paint::default();
        paint.set_color_rgba8(255, 255, 255, 255);
        paint.anti_alias = false;
        Ok(Self {
            pixmap,
            paint,
            dimensions,
        })
    }

    /// Canvas size.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Stroke a polyline through pixel positions with round caps and joins.
    ///
    /// A polyline that collapses to a single position is drawn as a disc of
    /// the stroke width. `closed` joins the last point back to the first.
    #[allow(clippy::cast_possible_truncation)]
    pub fn stroke(&mut self, points: &[(f64, f64)], width: f32, closed: bool) {
        let Some(&(x0, y0)) = points.first() else {
            return;
        };

        if points.iter().all(|&(x, y)| x == x0 && y == y0) {
            self.disc(x0, y0, width / 2.0);
            return;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(x0 as f32 + 0.5, y0 as f32 + 0.5);
        for &(x, y) in &points[1..] {
            pb.line_to(x as f32 + 0.5, y as f32 + 0.5);
        }
        if closed {
            pb.close();
        }
        let Some(path) = pb.finish() else {
            return;
        };

        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &self.paint, &stroke, Transform::identity(), None);
    }

    /// Fill a disc centered on pixel `(x, y)`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn disc(&mut self, x: f64, y: f64, radius: f32) {
        let radius = radius.max(0.5);
        if let Some(circle) = PathBuilder::from_circle(x as f32 + 0.5, y as f32 + 0.5, radius) {
            self.pixmap.fill_path(
                &circle,
                &self.paint,
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    /// Set individual pixels. Out-of-range pixels are ignored.
    pub fn stamp(&mut self, pixels: impl IntoIterator<Item = (u32, u32)>) {
        let width = self.dimensions.width as usize;
        let data = self.pixmap.data_mut();
        for (x, y) in pixels {
            if x < self.dimensions.width && y < self.dimensions.height {
                let off = (y as usize * width + x as usize) * 4;
                data[off..off + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
    }

    /// Convert to a binary mask: every painted pixel becomes 255.
    #[must_use]
    pub fn into_mask(self) -> Mask {
        let data = self.pixmap.data();
        Mask::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            let off = (y as usize * self.dimensions.width as usize + x as usize) * 4;
            image::Luma([if data[off + 3] > 0 { 255 } else { 0 }])
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn lit(mask: &Mask) -> Vec<(u32, u32)> {
        mask.enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn zero_sized_canvas_is_rejected() {
        assert!(matches!(
            StrokeCanvas::new(dims(0, 10)),
            Err(PathGenerationError::EmptyFrame)
        ));
    }

    #[test]
    fn blank_canvas_is_all_zero() {
        let mask = StrokeCanvas::new(dims(8, 6)).unwrap().into_mask();
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn one_pixel_horizontal_stroke_covers_its_row() {
        let mut canvas = StrokeCanvas::new(dims(20, 9)).unwrap();
        canvas.stroke(&[(3.0, 4.0), (15.0, 4.0)], 1.0, false);
        let mask = canvas.into_mask();
        for x in 4..15 {
            assert_eq!(mask.get_pixel(x, 4).0[0], 255, "({x}, 4)");
        }
        assert!(lit(&mask).iter().all(|&(_, y)| y == 4));
    }

    #[test]
    fn wide_stroke_reaches_half_width_each_side() {
        let mut canvas = StrokeCanvas::new(dims(40, 40)).unwrap();
        canvas.stroke(&[(5.0, 20.0), (35.0, 20.0)], 9.0, false);
        let mask = canvas.into_mask();
        assert_eq!(mask.get_pixel(20, 16).0[0], 255);
        assert_eq!(mask.get_pixel(20, 24).0[0], 255);
        assert_eq!(mask.get_pixel(20, 14).0[0], 0);
        assert_eq!(mask.get_pixel(20, 26).0[0], 0);
    }

    #[test]
    fn degenerate_polyline_draws_a_disc() {
        let mut canvas = StrokeCanvas::new(dims(30, 30)).unwrap();
        canvas.stroke(&[(15.0, 15.0), (15.0, 15.0)], 10.0, true);
        let mask = canvas.into_mask();
        assert_eq!(mask.get_pixel(15, 15).0[0], 255);
        assert_eq!(mask.get_pixel(15, 11).0[0], 255);
        assert_eq!(mask.get_pixel(15, 22).0[0], 0);
    }

    #[test]
    fn stamp_sets_exact_pixels_and_skips_out_of_range() {
        let mut canvas = StrokeCanvas::new(dims(5, 5)).unwrap();
        canvas.stamp([(1, 2), (4, 4), (9, 0)]);
        assert_eq!(lit(&canvas.into_mask()), vec![(1, 2), (4, 4)]);
    }
}
