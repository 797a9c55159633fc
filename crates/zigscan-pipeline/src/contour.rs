//! Region boundary extraction from a foreground mask.
//!
//! The mask is binarized at a fixed cut and traced with Suzuki-Abe border
//! following (`imageproc::contours::find_contours`), which reports every
//! boundary in the image: outer borders of each blob and the borders of
//! holes inside them, with their nesting.

use crate::types::{Mask, PathGenerationError};

/// Mask values strictly above this are foreground.
pub const BINARIZE_LEVEL: u8 = 127;

/// Whether a boundary encloses a blob or a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// Outer border of a foreground component.
    Outer,
    /// Border of a background hole inside a component.
    Hole,
}

/// One closed boundary in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// Boundary pixels in tracing order; the last point connects back to
    /// the first.
    pub points: Vec<(u32, u32)>,
    /// Outer border or hole border.
    pub kind: BoundaryKind,
    /// Index of the enclosing boundary in the same [`ContourSet`].
    pub parent: Option<usize>,
}

/// Every boundary of a binarized mask, with hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContourSet {
    /// Boundaries in discovery order (raster order of their first pixel).
    pub boundaries: Vec<Boundary>,
}

impl ContourSet {
    /// Number of boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Whether there are no boundaries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Number of outer (blob) boundaries.
    #[must_use]
    pub fn outer_count(&self) -> usize {
        self.boundaries
            .iter()
            .filter(|b| b.kind == BoundaryKind::Outer)
            .count()
    }

    /// Total number of boundary pixels.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.boundaries.iter().map(|b| b.points.len()).sum()
    }
}

/// Threshold `mask` to strictly `{0, 255}`.
#[must_use = "returns the binarized mask"]
pub fn binarize(mask: &Mask) -> Mask {
    let mut out = mask.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] > BINARIZE_LEVEL { 255 } else { 0 };
    }
    out
}

/// Binarize `mask` and extract every boundary.
///
/// # Errors
///
/// Returns [`PathGenerationError::EmptyRegion`] if the binarized mask has
/// no foreground and [`PathGenerationError::NoContours`] if tracing found
/// no boundary.
pub fn trace_boundaries(mask: &Mask) -> Result<ContourSet, PathGenerationError> {
    let binary = binarize(mask);
    if binary.pixels().all(|p| p.0[0] == 0) {
        return Err(PathGenerationError::EmptyRegion);
    }

    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&binary);

    let boundaries: Vec<Boundary> = contours
        .into_iter()
        .filter(|c| !c.points.is_empty())
        .map(|c| Boundary {
            points: c.points.into_iter().map(|p| (p.x, p.y)).collect(),
            kind: match c.border_type {
                imageproc::contours::BorderType::Outer => BoundaryKind::Outer,
                imageproc::contours::BorderType::Hole => BoundaryKind::Hole,
            },
            parent: c.parent,
        })
        .collect();

    if boundaries.is_empty() {
        return Err(PathGenerationError::NoContours);
    }
    Ok(ContourSet { boundaries })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled(width: u32, height: u32, rects: &[(u32, u32, u32, u32)], value: u8) -> Mask {
        Mask::from_fn(width, height, |x, y| {
            let hit = rects
                .iter()
                .any(|&(x0, y0, x1, y1)| (x0..x1).contains(&x) && (y0..y1).contains(&y));
            image::Luma([if hit { value } else { 0 }])
        })
    }

    #[test]
    fn binarize_cuts_at_127() {
        let mask = Mask::from_fn(4, 1, |x, _| image::Luma([[0, 127, 128, 255][x as usize]]));
        let bin = binarize(&mask);
        let values: Vec<u8> = bin.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 0, 255, 255]);
    }

    #[test]
    fn empty_mask_is_an_empty_region() {
        assert_eq!(
            trace_boundaries(&Mask::new(10, 10)),
            Err(PathGenerationError::EmptyRegion)
        );
    }

    #[test]
    fn faint_mask_is_an_empty_region() {
        // Everything at or below the cut.
        let mask = Mask::from_pixel(10, 10, image::Luma([127]));
        assert_eq!(trace_boundaries(&mask), Err(PathGenerationError::EmptyRegion));
    }

    #[test]
    fn rectangle_has_one_outer_boundary() {
        let mask = filled(20, 20, &[(5, 5, 15, 12)], 255);
        let set = trace_boundaries(&mask).unwrap();
        assert_eq!(set.len(), 1);
        let b = &set.boundaries[0];
        assert_eq!(b.kind, BoundaryKind::Outer);
        assert_eq!(b.parent, None);
        assert!(b.points.contains(&(5, 5)));
        assert!(b.points.contains(&(14, 11)));
        for &(x, y) in &b.points {
            assert!(x == 5 || x == 14 || y == 5 || y == 11, "({x}, {y}) is not on the border");
        }
    }

    #[test]
    fn ring_reports_hole_with_parent() {
        let mut mask = filled(30, 30, &[(5, 5, 25, 25)], 255);
        for y in 10..20 {
            for x in 10..20 {
                mask.put_pixel(x, y, image::Luma([0]));
            }
        }
        let set = trace_boundaries(&mask).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.outer_count(), 1);
        let hole = set
            .boundaries
            .iter()
            .find(|b| b.kind == BoundaryKind::Hole)
            .unwrap();
        let parent = hole.parent.unwrap();
        assert_eq!(set.boundaries[parent].kind, BoundaryKind::Outer);
    }

    #[test]
    fn separate_blobs_are_separate_boundaries() {
        let mask = filled(40, 20, &[(2, 2, 10, 10), (20, 5, 30, 15)], 200);
        let set = trace_boundaries(&mask).unwrap();
        assert_eq!(set.outer_count(), 2);
        assert!(set.point_count() > 8);
    }

    #[test]
    fn single_pixel_is_a_boundary() {
        let mut mask = Mask::new(10, 10);
        mask.put_pixel(4, 6, image::Luma([255]));
        let set = trace_boundaries(&mask).unwrap();
        assert_eq!(set.boundaries[0].points, vec![(4, 6)]);
    }
}
