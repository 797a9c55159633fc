//! Path synthesis: mask in, ordered plate path out.
//!
//! Stages run in a fixed order and each one only reads the output of the
//! previous:
//!
//! 1. estimate millimeters per pixel from the projected frame corners
//! 2. binarize the mask and trace every boundary
//! 3. stroke the boundaries with the safety margin
//! 4. keep the outermost crossings on every sampled scan line
//! 5. reorder the crossings into a zig-zag
//! 6. project the ordered crossings onto the plate
//! 7. draw the path over the frame

use crate::calibration::CalibrationParameters;
use crate::diagnostics::{
    Clock, NoClock, PathDiagnostics, PathSummary, StageDiagnostics, StageMetrics, count_set_pixels,
    timed,
};
use crate::types::{Dimensions, Frame, Mask, PathGenerationError, PathResult, RunConfig, WorldPoint};

/// Turn a foreground mask into an ordered scan path.
///
/// Uses `config.spacing_mm`, `config.dilation_mm` and `config.scan_axis`;
/// the threshold only matters to segmentation. The returned world path is
/// in traversal order and must not be re-sorted.
///
/// # Errors
///
/// Returns a [`PathGenerationError`] for an invalid configuration, a mask
/// that does not match the frame, an empty region, or a path that cannot
/// be projected.
pub fn synthesize(
    mask: &Mask,
    frame: &Frame,
    calib: &CalibrationParameters,
    config: &RunConfig,
) -> Result<PathResult, PathGenerationError> {
    synthesize_with_diagnostics(mask, frame, calib, config, &NoClock).map(|(result, _)| result)
}

/// [`synthesize`], recording per-stage diagnostics.
///
/// The returned diagnostics have no segmentation stage.
///
/// # Errors
///
/// See [`synthesize`].
#[allow(clippy::too_many_lines)]
pub fn synthesize_with_diagnostics<C: Clock>(
    mask: &Mask,
    frame: &Frame,
    calib: &CalibrationParameters,
    config: &RunConfig,
    clock: &C,
) -> Result<(PathResult, PathDiagnostics), PathGenerationError> {
    let total_start = clock.now();
    config.validate()?;

    let dims = Dimensions::of(frame);
    let mask_dims = Dimensions::of(mask);
    if mask_dims != dims {
        return Err(PathGenerationError::DimensionMismatch {
            mask: mask_dims,
            frame: dims,
        });
    }

    let (scale, duration) = timed(clock, || crate::scan::estimate_pixmm(calib, dims))?;
    tracing::debug!(pixmm = scale.pixmm, "estimated pixel scale");
    let scale_diag = StageDiagnostics::new(
        duration,
        StageMetrics::Scale {
            pixmm: scale.pixmm,
            edge_ratios: scale.edge_ratios,
        },
    );

    let (contours, duration) = timed(clock, || crate::contour::trace_boundaries(mask))?;
    tracing::debug!(
        boundaries = contours.len(),
        outer = contours.outer_count(),
        "traced region boundaries"
    );
    let contours_diag = StageDiagnostics::new(
        duration,
        StageMetrics::Contours {
            boundary_count: contours.len(),
            outer_count: contours.outer_count(),
            point_count: contours.point_count(),
        },
    );

    let stroke_px = crate::margin::margin_stroke_px(config.dilation_mm, scale.pixmm);
    let (canvas, duration) = timed(clock, || {
        crate::margin::rasterize_margin(&contours, dims, stroke_px)
    })?;
    let margin_diag = StageDiagnostics::new(
        duration,
        StageMetrics::Margin {
            stroke_px,
            painted_pixels: count_set_pixels(&canvas),
        },
    );

    let skip = crate::scan::line_skip(config.spacing_mm, scale.pixmm);
    let (crossings, duration) = timed(clock, || {
        Ok::<_, PathGenerationError>(crate::scan::sample_crossings(&canvas, skip, config.scan_axis))
    })?;
    tracing::debug!(
        skip,
        lines = crossings.sampled_lines,
        hits = crossings.lines_with_hits,
        crossings = crossings.points.len(),
        "sampled scan lines"
    );
    if crossings.points.is_empty() {
        return Err(PathGenerationError::NoCrossings);
    }
    let sampling_diag = StageDiagnostics::new(
        duration,
        StageMetrics::Sampling {
            skip,
            sampled_lines: crossings.sampled_lines,
            lines_with_hits: crossings.lines_with_hits,
            crossing_count: crossings.points.len(),
        },
    );

    let (pixel_path, duration) = timed(clock, || {
        Ok::<_, PathGenerationError>(crate::scan::boustrophedon_order(&crossings.points))
    })?;
    let ordering_diag = StageDiagnostics::new(
        duration,
        StageMetrics::Ordering {
            point_count: pixel_path.len(),
            max_step_px: crate::scan::max_step(&pixel_path),
        },
    );

    let (world_path, duration) = timed(clock, || {
        crate::projection::project_to_world(&pixel_path, calib, true)
            .map_err(PathGenerationError::Projection)
    })?;
    let projection_diag = StageDiagnostics::new(
        duration,
        StageMetrics::Projection {
            point_count: world_path.len(),
            extent_mm: extent(&world_path),
        },
    );

    let (visualization, duration) = timed(clock, || {
        crate::render::render_visualization(frame, &pixel_path)
    })?;
    let render_diag = StageDiagnostics::new(
        duration,
        StageMetrics::Render {
            line_width: crate::render::PATH_LINE_WIDTH,
        },
    );

    let diagnostics = PathDiagnostics {
        segmentation: None,
        scale: scale_diag,
        contours: contours_diag,
        margin: margin_diag,
        sampling: sampling_diag,
        ordering: ordering_diag,
        projection: projection_diag,
        render: render_diag,
        total_duration: clock.elapsed(&total_start),
        summary: PathSummary {
            image_width: dims.width,
            image_height: dims.height,
            pixmm: scale.pixmm,
            boundary_count: contours.len(),
            path_point_count: world_path.len(),
        },
    };

    let result = PathResult {
        visualization,
        world_path,
        pixel_path,
        mask: mask.clone(),
        pixmm: scale.pixmm,
    };
    Ok((result, diagnostics))
}

/// Bounding box `[min_x, min_y, max_x, max_y]`, or all zeros when empty.
fn extent(points: &[WorldPoint]) -> [f64; 4] {
    if points.is_empty() {
        return [0.0; 4];
    }
    points.iter().fold(
        [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
        |[min_x, min_y, max_x, max_y], p| {
            [min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y)]
        },
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nalgebra::{Matrix3, Vector3};

    use super::*;
    use crate::calibration::Distortion;
    use crate::types::{PixelPoint, ScanAxis};

    /// Overhead camera at 1000 mm with f = 1000 px: one pixel per millimeter.
    fn unit_scale(width: u32, height: u32) -> CalibrationParameters {
        CalibrationParameters::new(
            Matrix3::new(
                1000.0,
                0.0,
                f64::from(width) / 2.0,
                0.0,
                1000.0,
                f64::from(height) / 2.0,
                0.0,
                0.0,
                1.0,
            ),
            Distortion::default(),
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, 1000.0),
        )
        .unwrap()
    }

    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> Mask {
        Mask::from_fn(width, height, |x, y| {
            let inside = (x0..x1).contains(&x) && (y0..y1).contains(&y);
            image::Luma([if inside { 255 } else { 0 }])
        })
    }

    fn config(spacing_mm: f64, dilation_mm: f64) -> RunConfig {
        RunConfig {
            spacing_mm,
            dilation_mm,
            ..RunConfig::default()
        }
    }

    #[test]
    fn rectangle_produces_a_zig_zag_around_its_margin() {
        let (w, h) = (200, 160);
        let mask = rect_mask(w, h, 50, 40, 150, 120);
        let frame = Frame::from_pixel(w, h, image::Rgb([40, 40, 40]));
        let result = synthesize(&mask, &frame, &unit_scale(w, h), &config(10.0, 5.0)).unwrap();

        assert!((result.pixmm - 1.0).abs() < 1e-9);
        assert_eq!(result.world_path.len(), result.pixel_path.len());
        assert!(!result.pixel_path.is_empty());

        // Margin of 5 mm: crossings sit 5 px outside the region on each side.
        for p in &result.pixel_path {
            assert!(
                (44.0..=46.0).contains(&p.u) || (153.0..=155.0).contains(&p.u),
                "crossing at {p:?} is not on the margin"
            );
        }
        // Rows are sampled every 10 px from 0.
        for p in &result.pixel_path {
            assert!(p.v % 10.0 == 0.0, "row {} is not a sampled row", p.v);
        }
    }

    #[test]
    fn world_path_is_the_projected_pixel_path() {
        let (w, h) = (120, 100);
        let mask = rect_mask(w, h, 30, 30, 90, 70);
        let frame = Frame::new(w, h);
        let calib = unit_scale(w, h);
        let result = synthesize(&mask, &frame, &calib, &config(7.0, 2.0)).unwrap();
        let direct =
            crate::projection::project_to_world(&result.pixel_path, &calib, true).unwrap();
        assert_eq!(result.world_path, direct);
        // Unit scale with the principal point at the center.
        let first = result.pixel_path[0];
        let world = result.world_path[0];
        assert!((world.x - (first.u - 60.0)).abs() < 1e-9);
        assert!((world.y - (first.v - 50.0)).abs() < 1e-9);
    }

    #[test]
    fn synthesis_is_idempotent() {
        let (w, h) = (150, 130);
        let mask = Mask::from_fn(w, h, |x, y| {
            let d = (f64::from(x) - 75.0).hypot(f64::from(y) - 60.0);
            image::Luma([if d < 40.0 { 255 } else { 0 }])
        });
        let frame = Frame::from_fn(w, h, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 9]));
        let calib = unit_scale(w, h);
        let a = synthesize(&mask, &frame, &calib, &config(6.0, 3.0)).unwrap();
        let b = synthesize(&mask, &frame, &calib, &config(6.0, 3.0)).unwrap();
        assert_eq!(a.world_path, b.world_path);
        assert_eq!(a.pixel_path, b.pixel_path);
        assert_eq!(a.visualization, b.visualization);
    }

    #[test]
    fn consecutive_points_stay_within_the_diagonal() {
        let (w, h) = (180, 140);
        let mask = rect_mask(w, h, 20, 15, 160, 125);
        let frame = Frame::new(w, h);
        let calib = unit_scale(w, h);
        for spacing in [3.0, 4.0, 9.0, 11.0, 25.0] {
            let result = synthesize(&mask, &frame, &calib, &config(spacing, 1.0)).unwrap();
            let diagonal = Dimensions::of(&frame).diagonal();
            for pair in result.pixel_path.windows(2) {
                assert!(pair[0].distance(pair[1]) <= diagonal);
            }
        }
    }

    #[test]
    fn column_scan_samples_columns() {
        let (w, h) = (100, 100);
        let mask = rect_mask(w, h, 30, 20, 70, 80);
        let frame = Frame::new(w, h);
        let cfg = RunConfig {
            scan_axis: ScanAxis::Columns,
            ..config(10.0, 0.0)
        };
        let result = synthesize(&mask, &frame, &unit_scale(w, h), &cfg).unwrap();
        for p in &result.pixel_path {
            assert!(p.u % 10.0 == 0.0, "column {} is not sampled", p.u);
        }
        // Each sampled column is entered at the top edge and left at the bottom.
        assert_eq!(result.pixel_path[0], PixelPoint::new(30.0, 20.0));
        assert_eq!(result.pixel_path[1], PixelPoint::new(30.0, 79.0));
    }

    #[test]
    fn empty_mask_is_a_path_generation_error() {
        let mask = Mask::new(50, 50);
        let frame = Frame::new(50, 50);
        assert_eq!(
            synthesize(&mask, &frame, &unit_scale(50, 50), &RunConfig::default()).unwrap_err(),
            PathGenerationError::EmptyRegion
        );
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let mask = Mask::new(50, 40);
        let frame = Frame::new(50, 50);
        assert!(matches!(
            synthesize(&mask, &frame, &unit_scale(50, 50), &RunConfig::default()),
            Err(PathGenerationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn region_between_sampled_rows_has_no_crossings() {
        // A thin strip on rows 3..5; with a 20 px step only rows 0 and 20 are read.
        let mask = rect_mask(40, 30, 10, 3, 30, 5);
        let frame = Frame::new(40, 30);
        assert_eq!(
            synthesize(&mask, &frame, &unit_scale(40, 30), &config(20.0, 0.0)).unwrap_err(),
            PathGenerationError::NoCrossings
        );
    }

    #[test]
    fn invalid_config_is_rejected_before_any_work() {
        let mask = rect_mask(40, 30, 10, 10, 30, 20);
        let frame = Frame::new(40, 30);
        assert!(matches!(
            synthesize(&mask, &frame, &unit_scale(40, 30), &config(0.0, 1.0)),
            Err(PathGenerationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn diagnostics_match_the_result() {
        let (w, h) = (120, 100);
        let mask = rect_mask(w, h, 30, 30, 90, 70);
        let frame = Frame::new(w, h);
        let (result, diag) =
            synthesize_with_diagnostics(&mask, &frame, &unit_scale(w, h), &config(10.0, 2.0), &NoClock)
                .unwrap();
        assert!(diag.segmentation.is_none());
        assert_eq!(diag.summary.path_point_count, result.world_path.len());
        assert_eq!(diag.summary.boundary_count, 1);
        let crossings = result.pixel_path.len();
        assert!(matches!(
            diag.sampling.metrics,
            StageMetrics::Sampling { skip: 10, crossing_count, .. } if crossing_count == crossings
        ));
        assert!(matches!(
            diag.margin.metrics,
            StageMetrics::Margin { stroke_px: 4, .. }
        ));
    }

    #[test]
    fn extent_of_points() {
        let pts = [WorldPoint::new(1.0, -2.0), WorldPoint::new(-3.0, 4.0)];
        assert_eq!(extent(&pts), [-3.0, -2.0, 1.0, 4.0]);
        assert_eq!(extent(&[]), [0.0; 4]);
    }
}
