//! Pixel <-> plate coordinate mapping.
//!
//! Every function here is pure: it reads the immutable
//! [`CalibrationParameters`] and the input slice and returns fresh output.

use nalgebra::Vector3;

use crate::calibration::CalibrationParameters;
use crate::types::{CalibrationError, Dimensions, PixelPoint, WorldPoint};

/// Homogeneous weights below this are treated as points at infinity.
const MIN_HOMOGENEOUS_WEIGHT: f64 = 1e-12;

/// Map pixel coordinates onto the work plate (`Z = 0`, millimeters).
///
/// With `undistort` set, each pixel is first moved to where an ideal
/// pinhole camera would have imaged it. The result is then multiplied by
/// the inverse plate homography and perspective-divided.
///
/// Output order matches input order exactly.
///
/// # Errors
///
/// Returns [`CalibrationError::Undistortion`] if the lens model cannot be
/// inverted at a point, or [`CalibrationError::PointAtInfinity`] if a
/// pixel's ray never meets the plate.
pub fn project_to_world(
    points: &[PixelPoint],
    calib: &CalibrationParameters,
    undistort: bool,
) -> Result<Vec<WorldPoint>, CalibrationError> {
    let h_inv = calib.inverse_homography();
    points
        .iter()
        .map(|&p| {
            let p = if undistort {
                undistort_pixel(p, calib)?
            } else {
                p
            };
            let w = h_inv * Vector3::new(p.u, p.v, 1.0);
            if w.z.abs() < MIN_HOMOGENEOUS_WEIGHT || !w.z.is_finite() {
                return Err(CalibrationError::PointAtInfinity { u: p.u, v: p.v });
            }
            Ok(WorldPoint::new(w.x / w.z, w.y / w.z))
        })
        .collect()
}

/// Map plate coordinates to pixels; the forward direction of
/// [`project_to_world`].
///
/// With `distort` set, lens distortion is applied so the result lands on
/// the raw camera pixel.
///
/// # Errors
///
/// Returns [`CalibrationError::PointAtInfinity`] for plate points behind or
/// level with the camera center.
pub fn project_to_pixel(
    points: &[WorldPoint],
    calib: &CalibrationParameters,
    distort: bool,
) -> Result<Vec<PixelPoint>, CalibrationError> {
    let h = calib.homography();
    points
        .iter()
        .map(|&p| {
            let w = h * Vector3::new(p.x, p.y, 1.0);
            if w.z.abs() < MIN_HOMOGENEOUS_WEIGHT || !w.z.is_finite() {
                return Err(CalibrationError::PointAtInfinity { u: p.x, v: p.y });
            }
            let ideal = PixelPoint::new(w.x / w.z, w.y / w.z);
            Ok(if distort {
                distort_pixel(ideal, calib)
            } else {
                ideal
            })
        })
        .collect()
}

/// Remove lens distortion from a raw pixel, expressing the result in pixel
/// units again.
///
/// # Errors
///
/// Returns [`CalibrationError::Undistortion`] if the iteration diverges.
pub fn undistort_pixel(
    point: PixelPoint,
    calib: &CalibrationParameters,
) -> Result<PixelPoint, CalibrationError> {
    let distortion = calib.distortion();
    if distortion.is_zero() {
        return Ok(point);
    }
    let normalized = calib.pixel_to_normalized(point.u, point.v);
    let ideal = distortion
        .undistort_normalized(normalized)
        .ok_or(CalibrationError::Undistortion {
            u: point.u,
            v: point.v,
        })?;
    let [u, v] = calib.normalized_to_pixel(ideal);
    Ok(PixelPoint::new(u, v))
}

/// Apply lens distortion to an ideal pixel.
#[must_use]
pub fn distort_pixel(point: PixelPoint, calib: &CalibrationParameters) -> PixelPoint {
    let normalized = calib.pixel_to_normalized(point.u, point.v);
    let [u, v] = calib.normalized_to_pixel(calib.distortion().distort_normalized(normalized));
    PixelPoint::new(u, v)
}

/// Undistorted plate coordinate of every pixel, row-major (`v` outer,
/// `u` inner).
///
/// # Errors
///
/// Propagates the first projection failure.
pub fn coordinate_lut(
    calib: &CalibrationParameters,
    dimensions: Dimensions,
) -> Result<Vec<WorldPoint>, CalibrationError> {
    let pixels: Vec<PixelPoint> = (0..dimensions.height)
        .flat_map(|v| {
            (0..dimensions.width).map(move |u| PixelPoint::new(f64::from(u), f64::from(v)))
        })
        .collect();
    project_to_world(&pixels, calib, true)
}
