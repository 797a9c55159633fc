//! Planar camera calibration: intrinsics, lens distortion and the pose of
//! the work plate.
//!
//! The record is produced once by an offline calibration procedure and
//! loaded at startup. [`CalibrationParameters`] validates it and
//! precomputes the plate homography `H = K * [r1 r2 | t]` together with
//! its inverse, so every later projection is a pure read of immutable
//! data. The value is `Send + Sync` and can be shared freely between
//! threads.

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::CalibrationError;

/// A persisted matrix-valued field.
///
/// The calibration tool writes every field as nested rows (`[[...], ...]`),
/// but hand-written records often use a flat list for vectors. A flat list
/// is read as a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grid {
    /// Row-major nested rows.
    Nested(Vec<Vec<f64>>),
    /// A single row.
    Flat(Vec<f64>),
}

impl Grid {
    /// `(rows, cols)`, or `None` if rows have different lengths.
    #[must_use]
    pub fn shape(&self) -> Option<(usize, usize)> {
        match self {
            Self::Flat(values) => Some((1, values.len())),
            Self::Nested(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                rows.iter()
                    .all(|r| r.len() == cols)
                    .then_some((rows.len(), cols))
            }
        }
    }

    /// All values in row-major order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        match self {
            Self::Flat(values) => values.clone(),
            Self::Nested(rows) => rows.iter().flatten().copied().collect(),
        }
    }

    fn shape_label(&self) -> String {
        match self {
            Self::Flat(values) => format!("1x{}", values.len()),
            Self::Nested(rows) => match self.shape() {
                Some((r, c)) => format!("{r}x{c}"),
                None => format!("ragged ({} rows)", rows.len()),
            },
        }
    }
}

/// The calibration record as persisted.
///
/// All fields are optional at the serde level so that a missing field is
/// reported as [`CalibrationError::MissingField`] rather than a generic
/// parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// 3x3 intrinsic matrix.
    pub camera_matrix: Option<Grid>,
    /// Distortion coefficients `k1 k2 p1 p2 [k3]`, 1x4/1x5 (or a column).
    pub dist_coeff: Option<Grid>,
    /// Plate rotation in axis-angle form, 3x1 (or 1x3).
    pub rotation_vector: Option<Grid>,
    /// Plate translation, 3x1 (or 1x3).
    pub translation_vector: Option<Grid>,
}

/// Brown-Conrady radial-tangential distortion, OpenCV coefficient order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    /// Radial coefficient k1.
    pub k1: f64,
    /// Radial coefficient k2.
    pub k2: f64,
    /// Tangential coefficient p1.
    pub p1: f64,
    /// Tangential coefficient p2.
    pub p2: f64,
    /// Radial coefficient k3.
    pub k3: f64,
}

impl Distortion {
    /// Fixed-point iteration cap when inverting the model.
    pub const UNDISTORT_MAX_ITERS: usize = 20;
    /// Convergence threshold on the normalized-coordinate update.
    pub const UNDISTORT_EPS: f64 = 1e-12;

    /// Build from 4 or 5 coefficients in OpenCV order.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Shape`] for any other count.
    pub fn from_coefficients(coefficients: &[f64]) -> Result<Self, CalibrationError> {
        match *coefficients {
            [k1, k2, p1, p2] => Ok(Self {
                k1,
                k2,
                p1,
                p2,
                k3: 0.0,
            }),
            [k1, k2, p1, p2, k3] => Ok(Self { k1, k2, p1, p2, k3 }),
            _ => Err(CalibrationError::Shape {
                field: "dist_coeff",
                expected: "1x4 or 1x5",
                found: format!("{} values", coefficients.len()),
            }),
        }
    }

    /// Coefficients in OpenCV order.
    #[must_use]
    pub const fn coefficients(self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// `true` if every coefficient is exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.coefficients().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to normalized pinhole coordinates.
    #[must_use]
    pub fn distort_normalized(self, normalized: [f64; 2]) -> [f64; 2] {
        let [x, y] = normalized;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        [x * radial + x_tan, y * radial + y_tan]
    }

    /// Recover ideal normalized coordinates from distorted ones.
    ///
    /// Returns `None` if the iteration leaves the finite domain.
    #[must_use]
    pub fn undistort_normalized(self, distorted: [f64; 2]) -> Option<[f64; 2]> {
        if self.is_zero() {
            return Some(distorted);
        }
        let [xd, yd] = distorted;
        let (mut x, mut y) = (xd, yd);

        for _ in 0..Self::UNDISTORT_MAX_ITERS {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }

            let dx_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            let x_next = (xd - dx_tan) / radial;
            let y_next = (yd - dy_tan) / radial;
            if !x_next.is_finite() || !y_next.is_finite() {
                return None;
            }

            let step = (x_next - x).hypot(y_next - y);
            x = x_next;
            y = y_next;
            if step <= Self::UNDISTORT_EPS {
                break;
            }
        }
        Some([x, y])
    }
}

/// Validated, immutable planar calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParameters {
    camera_matrix: Matrix3<f64>,
    distortion: Distortion,
    rotation_vector: Vector3<f64>,
    translation: Vector3<f64>,
    homography: Matrix3<f64>,
    inverse_homography: Matrix3<f64>,
}

impl CalibrationParameters {
    /// Validate the parts and precompute the plate homography.
    ///
    /// # Errors
    ///
    /// - [`CalibrationError::NonFinite`] if any value is NaN or infinite.
    /// - [`CalibrationError::ZeroFocalLength`] if `fx` or `fy` is zero.
    /// - [`CalibrationError::SingularHomography`] if `K * [r1 r2 | t]`
    ///   is (near-)singular, e.g. the plate is seen edge-on.
    pub fn new(
        camera_matrix: Matrix3<f64>,
        distortion: Distortion,
        rotation_vector: Vector3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self, CalibrationError> {
        if camera_matrix.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("camera_matrix"));
        }
        if distortion.coefficients().iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("dist_coeff"));
        }
        if rotation_vector.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("rotation_vector"));
        }
        if translation.iter().any(|v| !v.is_finite()) {
            return Err(CalibrationError::NonFinite("translation_vector"));
        }
        if camera_matrix[(0, 0)].abs() < 1e-12 || camera_matrix[(1, 1)].abs() < 1e-12 {
            return Err(CalibrationError::ZeroFocalLength);
        }

        let rotation = Rotation3::from_scaled_axis(rotation_vector);
        let r = rotation.matrix();
        // The plate is Z = 0, so the third rotation column drops out.
        let extrinsic = Matrix3::from_columns(&[
            r.column(0).into_owned(),
            r.column(1).into_owned(),
            translation,
        ]);
        let homography = camera_matrix * extrinsic;

        let det = homography.determinant();
        let scale = homography.norm().powi(3);
        if !det.is_finite() || det.abs() <= f64::EPSILON * scale {
            return Err(CalibrationError::SingularHomography(det));
        }
        let inverse_homography = homography
            .try_inverse()
            .ok_or(CalibrationError::SingularHomography(det))?;

        Ok(Self {
            camera_matrix,
            distortion,
            rotation_vector,
            translation,
            homography,
            inverse_homography,
        })
    }

    /// Validate a persisted record.
    ///
    /// # Errors
    ///
    /// [`CalibrationError::MissingField`] / [`CalibrationError::Shape`] for
    /// structural problems, plus everything [`Self::new`] reports.
    pub fn from_record(record: &CalibrationRecord) -> Result<Self, CalibrationError> {
        let camera_matrix = field(record.camera_matrix.as_ref(), "camera_matrix")?;
        match camera_matrix.shape() {
            Some((3, 3)) => {}
            _ => {
                return Err(CalibrationError::Shape {
                    field: "camera_matrix",
                    expected: "3x3",
                    found: camera_matrix.shape_label(),
                });
            }
        }
        let k = Matrix3::from_row_slice(&camera_matrix.values());

        let dist = field(record.dist_coeff.as_ref(), "dist_coeff")?;
        let coefficients = vector_values(dist, "dist_coeff", &[4, 5], "1x4 or 1x5")?;
        let distortion = Distortion::from_coefficients(&coefficients)?;

        let rvec = field(record.rotation_vector.as_ref(), "rotation_vector")?;
        let rvec = vector_values(rvec, "rotation_vector", &[3], "3x1")?;

        let tvec = field(record.translation_vector.as_ref(), "translation_vector")?;
        let tvec = vector_values(tvec, "translation_vector", &[3], "3x1")?;

        Self::new(
            k,
            distortion,
            Vector3::from_column_slice(&rvec),
            Vector3::from_column_slice(&tvec),
        )
    }

    /// Convert back to the persisted layout.
    #[must_use]
    pub fn to_record(&self) -> CalibrationRecord {
        let k = self.camera_matrix;
        CalibrationRecord {
            camera_matrix: Some(Grid::Nested(
                (0..3)
                    .map(|r| (0..3).map(|c| k[(r, c)]).collect())
                    .collect(),
            )),
            dist_coeff: Some(Grid::Nested(vec![
                self.distortion.coefficients().to_vec(),
            ])),
            rotation_vector: Some(column(self.rotation_vector)),
            translation_vector: Some(column(self.translation)),
        }
    }

    /// Intrinsic matrix `K`.
    #[must_use]
    pub const fn camera_matrix(&self) -> &Matrix3<f64> {
        &self.camera_matrix
    }

    /// Lens distortion coefficients.
    #[must_use]
    pub const fn distortion(&self) -> Distortion {
        self.distortion
    }

    /// Plate rotation in axis-angle form.
    #[must_use]
    pub const fn rotation_vector(&self) -> &Vector3<f64> {
        &self.rotation_vector
    }

    /// Plate rotation as a 3x3 matrix.
    #[must_use]
    pub fn rotation(&self) -> Matrix3<f64> {
        Rotation3::from_scaled_axis(self.rotation_vector).into_inner()
    }

    /// Plate translation.
    #[must_use]
    pub const fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Plate-to-pixel homography `K * [r1 r2 | t]`.
    #[must_use]
    pub const fn homography(&self) -> &Matrix3<f64> {
        &self.homography
    }

    /// Pixel-to-plate homography.
    #[must_use]
    pub const fn inverse_homography(&self) -> &Matrix3<f64> {
        &self.inverse_homography
    }

    /// Pixel to normalized pinhole coordinates.
    pub(crate) fn pixel_to_normalized(&self, u: f64, v: f64) -> [f64; 2] {
        let k = &self.camera_matrix;
        let y = (v - k[(1, 2)]) / k[(1, 1)];
        let x = (u - k[(0, 2)] - k[(0, 1)] * y) / k[(0, 0)];
        [x, y]
    }

    /// Normalized pinhole coordinates to pixel.
    pub(crate) fn normalized_to_pixel(&self, normalized: [f64; 2]) -> [f64; 2] {
        let k = &self.camera_matrix;
        let [x, y] = normalized;
        [
            k[(0, 0)] * x + k[(0, 1)] * y + k[(0, 2)],
            k[(1, 1)] * y + k[(1, 2)],
        ]
    }
}

fn field<'a>(grid: Option<&'a Grid>, name: &'static str) -> Result<&'a Grid, CalibrationError> {
    grid.ok_or(CalibrationError::MissingField(name))
}

/// Read a row or column vector whose length is one of `lengths`.
fn vector_values(
    grid: &Grid,
    name: &'static str,
    lengths: &[usize],
    expected: &'static str,
) -> Result<Vec<f64>, CalibrationError> {
    let shape_error = || CalibrationError::Shape {
        field: name,
        expected,
        found: grid.shape_label(),
    };
    let (rows, cols) = grid.shape().ok_or_else(shape_error)?;
    let is_vector = (rows == 1 && lengths.contains(&cols)) || (cols == 1 && lengths.contains(&rows));
    if !is_vector {
        return Err(shape_error());
    }
    Ok(grid.values())
}

fn column(v: Vector3<f64>) -> Grid {
    Grid::Nested(v.iter().map(|x| vec![*x]).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn record() -> CalibrationRecord {
        CalibrationRecord {
            camera_matrix: Some(Grid::Nested(vec![
                vec![1000.0, 0.0, 320.0],
                vec![0.0, 1010.0, 240.0],
                vec![0.0, 0.0, 1.0],
            ])),
            dist_coeff: Some(Grid::Nested(vec![vec![-0.1, 0.02, 0.001, -0.001, 0.0]])),
            rotation_vector: Some(Grid::Nested(vec![vec![0.01], vec![-0.02], vec![0.03]])),
            translation_vector: Some(Grid::Nested(vec![vec![-50.0], vec![-40.0], vec![900.0]])),
        }
    }

    #[test]
    fn valid_record_loads() {
        let calib = CalibrationParameters::from_record(&record()).unwrap();
        assert!((calib.camera_matrix()[(0, 0)] - 1000.0).abs() < f64::EPSILON);
        assert!((calib.distortion().k1 + 0.1).abs() < f64::EPSILON);
        assert!((calib.translation().z - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn four_coefficient_distortion_sets_k3_to_zero() {
        let mut rec = record();
        rec.dist_coeff = Some(Grid::Flat(vec![0.1, 0.2, 0.3, 0.4]));
        let calib = CalibrationParameters::from_record(&rec).unwrap();
        assert_eq!(calib.distortion().coefficients(), [0.1, 0.2, 0.3, 0.4, 0.0]);
    }

    #[test]
    fn vectors_accept_row_and_column_layouts() {
        let mut rec = record();
        rec.rotation_vector = Some(Grid::Flat(vec![0.01, -0.02, 0.03]));
        rec.translation_vector = Some(Grid::Nested(vec![vec![-50.0, -40.0, 900.0]]));
        let a = CalibrationParameters::from_record(&rec).unwrap();
        let b = CalibrationParameters::from_record(&record()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let mut rec = record();
        rec.translation_vector = None;
        assert_eq!(
            CalibrationParameters::from_record(&rec),
            Err(CalibrationError::MissingField("translation_vector")),
        );
    }

    #[test]
    fn wrong_camera_matrix_shape_is_rejected() {
        let mut rec = record();
        rec.camera_matrix = Some(Grid::Nested(vec![
            vec![1000.0, 0.0, 320.0],
            vec![0.0, 1010.0, 240.0],
        ]));
        let err = CalibrationParameters::from_record(&rec).unwrap_err();
        assert!(
            matches!(err, CalibrationError::Shape { field: "camera_matrix", ref found, .. } if found == "2x3"),
            "unexpected error: {err:?}",
        );
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        let mut rec = record();
        rec.camera_matrix = Some(Grid::Nested(vec![
            vec![1000.0, 0.0, 320.0],
            vec![0.0, 1010.0],
            vec![0.0, 0.0, 1.0],
        ]));
        assert!(matches!(
            CalibrationParameters::from_record(&rec),
            Err(CalibrationError::Shape { .. })
        ));
    }

    #[test]
    fn wrong_distortion_length_is_rejected() {
        let mut rec = record();
        rec.dist_coeff = Some(Grid::Flat(vec![0.1, 0.2, 0.3]));
        assert!(matches!(
            CalibrationParameters::from_record(&rec),
            Err(CalibrationError::Shape {
                field: "dist_coeff",
                ..
            })
        ));
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let mut rec = record();
        rec.rotation_vector = Some(Grid::Flat(vec![f64::NAN, 0.0, 0.0]));
        assert_eq!(
            CalibrationParameters::from_record(&rec),
            Err(CalibrationError::NonFinite("rotation_vector")),
        );
    }

    #[test]
    fn zero_focal_length_is_rejected() {
        let result = CalibrationParameters::new(
            Matrix3::new(0.0, 0.0, 320.0, 0.0, 1000.0, 240.0, 0.0, 0.0, 1.0),
            Distortion::default(),
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, 500.0),
        );
        assert_eq!(result, Err(CalibrationError::ZeroFocalLength));
    }

    #[test]
    fn plate_through_camera_center_is_singular() {
        // t = 0 puts the camera on the plate: the third homography column vanishes.
        let result = CalibrationParameters::new(
            Matrix3::new(1000.0, 0.0, 320.0, 0.0, 1000.0, 240.0, 0.0, 0.0, 1.0),
            Distortion::default(),
            Vector3::zeros(),
            Vector3::zeros(),
        );
        assert!(matches!(
            result,
            Err(CalibrationError::SingularHomography(_))
        ));
    }

    #[test]
    fn rotation_vector_converts_to_matrix() {
        let calib = CalibrationParameters::new(
            Matrix3::identity(),
            Distortion::default(),
            Vector3::new(0.0, 0.0, FRAC_PI_2),
            Vector3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        // A quarter turn about Z maps +X to +Y.
        let x = calib.rotation() * Vector3::x();
        assert!((x - Vector3::y()).norm() < 1e-12, "got {x:?}");
    }

    #[test]
    fn homography_times_inverse_is_identity() {
        let calib = CalibrationParameters::from_record(&record()).unwrap();
        let product = calib.homography() * calib.inverse_homography();
        assert!((product - Matrix3::identity()).norm() < 1e-9);
    }

    #[test]
    fn record_round_trips() {
        let calib = CalibrationParameters::from_record(&record()).unwrap();
        let again = CalibrationParameters::from_record(&calib.to_record()).unwrap();
        assert_eq!(calib, again);
    }

    #[test]
    fn record_parses_from_json_with_flat_and_nested_fields() {
        let json = r#"{
            "camera_matrix": [[800, 0, 400], [0, 800, 300], [0, 0, 1]],
            "dist_coeff": [0.0, 0.0, 0.0, 0.0],
            "rotation_vector": [[0.0], [0.0], [0.0]],
            "translation_vector": [0.0, 0.0, 600.0]
        }"#;
        let rec: CalibrationRecord = serde_json::from_str(json).unwrap();
        let calib = CalibrationParameters::from_record(&rec).unwrap();
        assert!(calib.distortion().is_zero());
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = Distortion {
            k1: -0.12,
            k2: 0.03,
            p1: 0.001,
            p2: -0.0008,
            k3: 0.0,
        };
        let ideal = [0.21, -0.17];
        let distorted = d.distort_normalized(ideal);
        let back = d.undistort_normalized(distorted).unwrap();
        assert!((back[0] - ideal[0]).abs() < 1e-9, "x={}", back[0]);
        assert!((back[1] - ideal[1]).abs() < 1e-9, "y={}", back[1]);
    }

    #[test]
    fn calibration_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CalibrationParameters>();
    }
}
