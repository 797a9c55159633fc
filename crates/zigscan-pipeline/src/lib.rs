//! zigscan-pipeline: Pure geometric pipeline (sans-IO).
//!
//! Turns a background frame and an object frame into an ordered zig-zag
//! scan path on the work plate, in millimeters:
//! segmentation -> scale estimation -> boundary extraction -> margin ->
//! scan line sampling -> zig-zag ordering -> plate projection.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! frames and an immutable [`CalibrationParameters`] and returns
//! structured data. Filesystem and device interaction lives in
//! `zigscan-io`.

pub mod blur;
pub mod calibration;
pub mod contour;
pub mod diagnostics;
pub mod frame;
pub mod margin;
pub mod projection;
pub mod raster;
pub mod render;
pub mod scan;
pub mod segment;
pub mod session;
pub mod synthesize;
pub mod types;

pub use calibration::{CalibrationParameters, CalibrationRecord, Distortion};
pub use diagnostics::{Clock, NoClock, PathDiagnostics};
pub use projection::{coordinate_lut, project_to_pixel, project_to_world};
pub use segment::{Segmenter, segment};
pub use session::PathSink;
pub use synthesize::synthesize;
pub use types::{
    CalibrationError, Dimensions, Frame, GrayImage, Mask, PathGenerationError, PathResult,
    PipelineError, PixelPoint, RgbImage, RunConfig, ScanAxis, SegmentationError, WorldPoint,
};

/// Compute the scan path for an object on the plate.
///
/// # Pipeline steps
///
/// 1. Validate `config`
/// 2. Segment `object` against `background` (exposure-compensated)
/// 3. Synthesize the ordered path from the mask (see [`synthesize`])
///
/// Nothing is cached between calls; changing `config` only requires
/// calling again.
///
/// # Errors
///
/// Returns [`PipelineError::Segmentation`] if the frames cannot be
/// compared and [`PipelineError::PathGeneration`] for an invalid config or
/// a region that yields no path. Both are recoverable by the caller.
pub fn path_generation(
    calib: &CalibrationParameters,
    object: &Frame,
    background: &Frame,
    config: &RunConfig,
) -> Result<PathResult, PipelineError> {
    diagnostics::path_generation_with_diagnostics(
        calib,
        object,
        background,
        config,
        &Segmenter::default(),
        &NoClock,
    )
    .map(|(result, _)| result)
}
