//! Calibration record loading.
//!
//! The offline calibration procedure writes a YAML mapping with four
//! matrix-valued keys, each a list of rows:
//!
//! ```yaml
//! camera_matrix:
//! - - 1000.0
//!   - 0.0
//!   - 960.0
//! ...
//! dist_coeff:
//! - - -0.1
//!   - 0.01
//!   - 0.0
//!   - 0.0
//!   - 0.0
//! rotation_vector:
//! - - 0.0
//! ...
//! ```
//!
//! JSON records with the same keys are accepted too (chosen by the
//! `.json` extension). Validation of shapes and values is left to
//! [`CalibrationParameters::from_record`].

use std::path::{Path, PathBuf};

use yaml_rust::{Yaml, YamlLoader};
use zigscan_pipeline::calibration::Grid;
use zigscan_pipeline::{CalibrationError, CalibrationParameters, CalibrationRecord};

/// Errors from loading a calibration file.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationFileError {
    /// The file could not be read.
    #[error("cannot read calibration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The YAML text is malformed.
    #[error("calibration YAML is malformed: {0}")]
    Yaml(#[from] yaml_rust::ScanError),

    /// The JSON text is malformed or has the wrong structure.
    #[error("calibration JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// The YAML stream holds no document, or the document is not a mapping.
    #[error("calibration YAML holds no mapping")]
    NotAMapping,

    /// A field holds something other than a number matrix.
    #[error("calibration field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    /// The record parsed but describes an unusable camera.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

const FIELDS: [&str; 4] = [
    "camera_matrix",
    "dist_coeff",
    "rotation_vector",
    "translation_vector",
];

/// Load and validate the calibration stored at `path`.
///
/// Files ending in `.json` are read as JSON, everything else as YAML.
///
/// # Errors
///
/// Returns [`CalibrationFileError`] if the file cannot be read or parsed,
/// or if the record fails validation.
pub fn load_calibration(path: &Path) -> Result<CalibrationParameters, CalibrationFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| CalibrationFileError::Io {
        path: path.to_owned(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let record = if is_json {
        serde_json::from_str::<CalibrationRecord>(&text)?
    } else {
        parse_calibration_yaml(&text)?
    };

    let calib = CalibrationParameters::from_record(&record)?;
    tracing::info!(
        path = %path.display(),
        fx = calib.camera_matrix()[(0, 0)],
        fy = calib.camera_matrix()[(1, 1)],
        "loaded calibration"
    );
    Ok(calib)
}

/// Parse a YAML calibration record.
///
/// Unknown keys are ignored and missing keys are left empty, to be
/// reported by [`CalibrationParameters::from_record`]. Integers are
/// accepted wherever reals are expected.
///
/// # Errors
///
/// Returns [`CalibrationFileError::Yaml`] for malformed YAML,
/// [`CalibrationFileError::NotAMapping`] if the first document is not a
/// mapping, and [`CalibrationFileError::InvalidField`] if a field is not
/// a list of numbers or a list of number rows.
pub fn parse_calibration_yaml(text: &str) -> Result<CalibrationRecord, CalibrationFileError> {
    let docs = YamlLoader::load_from_str(text)?;
    let doc = docs.first().ok_or(CalibrationFileError::NotAMapping)?;
    if doc.as_hash().is_none() {
        return Err(CalibrationFileError::NotAMapping);
    }

    let [camera_matrix, dist_coeff, rotation_vector, translation_vector] = FIELDS;
    Ok(CalibrationRecord {
        camera_matrix: grid(&doc[camera_matrix], camera_matrix)?,
        dist_coeff: grid(&doc[dist_coeff], dist_coeff)?,
        rotation_vector: grid(&doc[rotation_vector], rotation_vector)?,
        translation_vector: grid(&doc[translation_vector], translation_vector)?,
    })
}

fn grid(node: &Yaml, field: &'static str) -> Result<Option<Grid>, CalibrationFileError> {
    let invalid = |reason| CalibrationFileError::InvalidField { field, reason };
    match node {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Array(items) if items.iter().all(|i| matches!(i, Yaml::Array(_))) => {
            let rows = items
                .iter()
                .map(|row| {
                    row.as_vec()
                        .into_iter()
                        .flatten()
                        .map(|v| number(v).ok_or_else(|| invalid("row entry is not a number")))
                        .collect::<Result<Vec<f64>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Grid::Nested(rows)))
        }
        Yaml::Array(items) => items
            .iter()
            .map(|v| number(v).ok_or_else(|| invalid("entry is not a number")))
            .collect::<Result<Vec<f64>, _>>()
            .map(|values| Some(Grid::Flat(values))),
        _ => Err(invalid("expected a list")),
    }
}

#[allow(clippy::cast_precision_loss)]
fn number(node: &Yaml) -> Option<f64> {
    match node {
        Yaml::Integer(i) => Some(*i as f64),
        Yaml::Real(_) => node.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Shape of the file written by the calibration procedure.
    const DUMPED: &str = "\
camera_matrix:
- - 1000.0
  - 0.0
  - 960.0
- - 0.0
  - 1000.0
  - 540.0
- - 0.0
  - 0.0
  - 1.0
dist_coeff:
- - -0.1
  - 0.01
  - 0.0
  - 0.0
  - 0.0
rotation_vector:
- - 0.0
- - 0.0
- - 0.0
translation_vector:
- - -100.0
- - -50.0
- - 1000.0
";

    #[test]
    fn dumped_record_parses_into_nested_grids() {
        let record = parse_calibration_yaml(DUMPED).unwrap();
        let k = record.camera_matrix.unwrap();
        assert_eq!(k.shape(), Some((3, 3)));
        assert!((k.values()[2] - 960.0).abs() < f64::EPSILON);
        assert_eq!(record.dist_coeff.unwrap().shape(), Some((1, 5)));
        assert_eq!(record.translation_vector.unwrap().shape(), Some((3, 1)));
    }

    #[test]
    fn dumped_record_validates() {
        let record = parse_calibration_yaml(DUMPED).unwrap();
        let calib = CalibrationParameters::from_record(&record).unwrap();
        assert!((calib.distortion().k1 + 0.1).abs() < 1e-12);
    }

    #[test]
    fn flow_style_and_integers_are_accepted() {
        let record = parse_calibration_yaml(
            "camera_matrix: [[800, 0, 320], [0, 800, 240], [0, 0, 1]]\n\
             dist_coeff: [0, 0, 0, 0]\n\
             rotation_vector: [0, 0, 0]\n\
             translation_vector: [0, 0, 500]\n\
             comment: ignored\n",
        )
        .unwrap();
        assert_eq!(record.dist_coeff.as_ref().unwrap().shape(), Some((1, 4)));
        assert!(CalibrationParameters::from_record(&record).is_ok());
    }

    #[test]
    fn missing_field_is_left_for_validation() {
        let record = parse_calibration_yaml("camera_matrix: [[1, 0, 0], [0, 1, 0], [0, 0, 1]]\n")
            .unwrap();
        assert!(record.dist_coeff.is_none());
        assert!(matches!(
            CalibrationParameters::from_record(&record),
            Err(CalibrationError::MissingField("dist_coeff"))
        ));
    }

    #[test]
    fn non_numeric_entries_are_rejected() {
        let err = parse_calibration_yaml("dist_coeff: [0, zero, 0, 0]\n").unwrap_err();
        assert!(matches!(
            err,
            CalibrationFileError::InvalidField {
                field: "dist_coeff",
                ..
            }
        ));
        let err = parse_calibration_yaml("rotation_vector: 3\n").unwrap_err();
        assert!(matches!(err, CalibrationFileError::InvalidField { .. }));
    }

    #[test]
    fn non_mapping_documents_are_rejected() {
        assert!(matches!(
            parse_calibration_yaml("- 1\n- 2\n"),
            Err(CalibrationFileError::NotAMapping)
        ));
        assert!(matches!(
            parse_calibration_yaml(""),
            Err(CalibrationFileError::NotAMapping)
        ));
    }

    #[test]
    fn malformed_yaml_is_a_scan_error() {
        assert!(matches!(
            parse_calibration_yaml("camera_matrix: [[1, 2\n"),
            Err(CalibrationFileError::Yaml(_))
        ));
    }
}
