//! Shared types for the zigscan pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference masks and
/// intermediate rasters without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference camera frames
/// without depending on `image` directly.
pub use image::RgbImage;

/// A camera frame: fixed-size 8-bit, three channels, `R, G, B` order.
pub type Frame = RgbImage;

/// A single-channel region mask. After binarization every pixel is 0 or 255.
pub type Mask = GrayImage;

/// A 2D point in image coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Horizontal position (pixels from left edge).
    pub u: f64,
    /// Vertical position (pixels from top edge).
    pub v: f64,
}

impl PixelPoint {
    /// Create a new pixel point.
    #[must_use]
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let du = self.u - other.u;
        let dv = self.v - other.v;
        du.mul_add(du, dv * dv)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// A point on the work plate in millimeters. `Z = 0` is implicit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// Plate X coordinate (mm).
    pub x: f64,
    /// Plate Y coordinate (mm).
    pub y: f64,
}

impl WorldPoint {
    /// Create a new world point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point (mm).
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<P: image::Pixel, C: std::ops::Deref<Target = [P::Subpixel]>>(
        image: &image::ImageBuffer<P, C>,
    ) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Length of the image diagonal in pixels.
    #[must_use]
    pub fn diagonal(self) -> f64 {
        f64::from(self.width).hypot(f64::from(self.height))
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which image axis the scan lines run along.
///
/// The scan visits evenly spaced lines across the sampling axis and keeps
/// the two outermost boundary crossings on each. Which axis matches the
/// device's feed direction depends on how the camera is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanAxis {
    /// Scan lines are image rows (constant `v`); spacing is measured down
    /// the image.
    #[default]
    Rows,
    /// Scan lines are image columns (constant `u`); spacing is measured
    /// across the image.
    Columns,
}

/// Per-run parameters chosen by the operator.
///
/// Changing any of these only requires re-running
/// [`path_generation`](crate::path_generation); nothing is cached between
/// runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Foreground threshold on the smoothed per-channel difference.
    pub threshold: u8,

    /// Distance between neighbouring scan lines in millimeters. Must be
    /// positive.
    pub spacing_mm: f64,

    /// Safety margin added around the region boundary in millimeters.
    /// Must be non-negative.
    pub dilation_mm: f64,

    /// Which image axis the scan lines follow.
    pub scan_axis: ScanAxis,
}

impl RunConfig {
    /// Default foreground threshold.
    pub const DEFAULT_THRESHOLD: u8 = 50;
    /// Default scan line spacing (mm).
    pub const DEFAULT_SPACING_MM: f64 = 20.0;
    /// Default boundary margin (mm).
    pub const DEFAULT_DILATION_MM: f64 = 10.0;

    /// Check the numeric invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PathGenerationError::InvalidConfig`] if `spacing_mm` is
    /// not a positive finite number or `dilation_mm` is negative or not
    /// finite.
    pub fn validate(&self) -> Result<(), PathGenerationError> {
        if !self.spacing_mm.is_finite() || self.spacing_mm <= 0.0 {
            return Err(PathGenerationError::InvalidConfig(format!(
                "spacing_mm must be positive, got {}",
                self.spacing_mm
            )));
        }
        if !self.dilation_mm.is_finite() || self.dilation_mm < 0.0 {
            return Err(PathGenerationError::InvalidConfig(format!(
                "dilation_mm must be non-negative, got {}",
                self.dilation_mm
            )));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            spacing_mm: Self::DEFAULT_SPACING_MM,
            dilation_mm: Self::DEFAULT_DILATION_MM,
            scan_axis: ScanAxis::default(),
        }
    }
}

/// Result of a full path generation run.
#[derive(Debug, Clone)]
pub struct PathResult {
    /// Source frame with the scan path overlaid.
    pub visualization: Frame,
    /// Ordered scan path in plate coordinates (mm). Must not be re-sorted.
    pub world_path: Vec<WorldPoint>,
    /// The same path in pixel coordinates, point for point.
    pub pixel_path: Vec<PixelPoint>,
    /// Foreground mask the path was computed from.
    pub mask: Mask,
    /// Estimated millimeters per pixel.
    pub pixmm: f64,
}

/// The calibration record is malformed or describes an unusable camera.
///
/// Fatal: no path can be computed without a valid calibration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    /// A required field is absent from the persisted record.
    #[error("calibration field `{0}` is missing")]
    MissingField(&'static str),

    /// A field has the wrong number of rows/columns.
    #[error("calibration field `{field}` has shape {found}, expected {expected}")]
    Shape {
        /// Field name as persisted.
        field: &'static str,
        /// Human-readable accepted shapes.
        expected: &'static str,
        /// Shape actually found, e.g. `2x3`.
        found: String,
    },

    /// A field contains NaN or an infinity.
    #[error("calibration field `{0}` contains a non-finite value")]
    NonFinite(&'static str),

    /// The camera matrix has a zero focal length.
    #[error("camera matrix has a zero focal length")]
    ZeroFocalLength,

    /// `K * [r1 r2 | t]` cannot be inverted.
    #[error("plane homography is singular (det = {0:e})")]
    SingularHomography(f64),

    /// The pixel's viewing ray is parallel to the work plane.
    #[error("pixel ({u}, {v}) does not hit the work plane")]
    PointAtInfinity {
        /// Pixel column.
        u: f64,
        /// Pixel row.
        v: f64,
    },

    /// Inverting the lens distortion produced non-finite values.
    #[error("lens undistortion diverged at pixel ({u}, {v})")]
    Undistortion {
        /// Pixel column.
        u: f64,
        /// Pixel row.
        v: f64,
    },
}

/// Background and object frames cannot be compared.
///
/// Recoverable: the operator can recapture either frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentationError {
    /// The two frames differ in size.
    #[error("background is {background} but object frame is {object}")]
    SizeMismatch {
        /// Background frame size.
        background: Dimensions,
        /// Object frame size.
        object: Dimensions,
    },

    /// The frame leaves no room for a border band of the configured width.
    #[error("frame {dimensions} is too small for a {border_px}px border band")]
    FrameTooSmall {
        /// Frame size.
        dimensions: Dimensions,
        /// Border band width in pixels.
        border_px: u32,
    },
}

/// The scan path could not be synthesized.
///
/// Recoverable: retry with a different threshold, spacing or dilation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathGenerationError {
    /// The run configuration violates an invariant.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// Mask and frame differ in size.
    #[error("mask is {mask} but frame is {frame}")]
    DimensionMismatch {
        /// Mask size.
        mask: Dimensions,
        /// Frame size.
        frame: Dimensions,
    },

    /// The frame has no pixels.
    #[error("frame is empty")]
    EmptyFrame,

    /// The projected frame corners give no usable pixel scale.
    #[error("degenerate pixel scale: {0} mm/px")]
    DegenerateScale(f64),

    /// The binarized mask contains no foreground.
    #[error("mask contains no foreground region")]
    EmptyRegion,

    /// Boundary extraction produced no contours.
    #[error("no region boundary found")]
    NoContours,

    /// No scan line crossed the region.
    #[error("no scan line crosses the region")]
    NoCrossings,

    /// Projecting the path to the plate failed.
    #[error("projecting the path failed: {0}")]
    Projection(#[source] CalibrationError),
}

/// Any failure surfaced by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode an input frame.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Calibration is unusable.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Segmentation failed.
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    /// Path synthesis failed.
    #[error(transparent)]
    PathGeneration(#[from] PathGenerationError),
}

impl PipelineError {
    /// Whether the operator can retry with new frames or a new
    /// [`RunConfig`] without restarting.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Calibration(_))
    }
}
