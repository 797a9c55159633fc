//! Coordinate text file serializer.
//!
//! One world point per line, `X` and `Y` in millimeters, each right
//! aligned in a 10 character field with 5 decimal places and separated by
//! a single space:
//!
//! ```text
//!  -40.00000  -30.00000
//!   40.00000  -30.00000
//! ```
//!
//! The file is archived next to the frames of each sample and can be
//! replayed to the device later.

use std::fmt::Write;

use zigscan_pipeline::WorldPoint;

/// Errors from [`parse_coordinate_text`].
#[derive(Debug, thiserror::Error)]
pub enum CoordinateParseError {
    /// A non-empty line did not hold exactly two fields.
    #[error("line {line}: expected 2 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    /// A field was not a finite number.
    #[error("line {line}: {field:?} is not a finite number")]
    InvalidNumber { line: usize, field: String },
}

/// Serialize a world path into coordinate text.
///
/// Points are written in path order. An empty path yields an empty string.
///
/// # Examples
///
/// ```
/// use zigscan_pipeline::WorldPoint;
/// use zigscan_export::to_coordinate_text;
///
/// let text = to_coordinate_text(&[WorldPoint::new(1.5, -2.25)]);
/// assert_eq!(text, "   1.50000   -2.25000\n");
/// ```
#[must_use]
pub fn to_coordinate_text(path: &[WorldPoint]) -> String {
    let mut out = String::with_capacity(path.len() * 22);
    for p in path {
        let _ = writeln!(out, "{:10.5} {:10.5}", p.x, p.y);
    }
    out
}

/// Parse coordinate text back into a world path.
///
/// Fields may be separated by any run of whitespace. Blank lines and lines
/// starting with `#` are skipped.
///
/// # Errors
///
/// Returns [`CoordinateParseError`] naming the first offending line
/// (1-based).
pub fn parse_coordinate_text(text: &str) -> Result<Vec<WorldPoint>, CoordinateParseError> {
    let mut path = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let [x, y] = fields.as_slice() else {
            return Err(CoordinateParseError::FieldCount {
                line,
                found: fields.len(),
            });
        };
        path.push(WorldPoint::new(
            parse_field(x, line)?,
            parse_field(y, line)?,
        ));
    }
    Ok(path)
}

fn parse_field(field: &str, line: usize) -> Result<f64, CoordinateParseError> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoordinateParseError::InvalidNumber {
            line,
            field: field.to_owned(),
        })
}
