//! Device wire frame.
//!
//! A path is sent to the treatment device as one frame of big-endian
//! `i32` words:
//!
//! ```text
//! [sample_id, count, X0*100, Y0*100, X1*100, Y1*100, ...]
//! ```
//!
//! Coordinates are plate millimeters scaled to hundredths and rounded
//! half away from zero. The frame carries no trailer; the device reads
//! `count` point pairs after the header.

use zigscan_pipeline::WorldPoint;

/// Hundredths of a millimeter per millimeter.
pub const UNITS_PER_MM: f64 = 100.0;

/// Bytes per wire word.
const WORD: usize = 4;

/// Errors from encoding or decoding a path frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The path has more points than the `count` word can hold.
    #[error("path has {0} points; a frame holds at most {max}", max = i32::MAX)]
    TooManyPoints(usize),

    /// A scaled coordinate is NaN, infinite, or outside the `i32` range.
    #[error("point {index}: coordinate {value} mm does not fit a wire word")]
    OutOfRange { index: usize, value: f64 },

    /// The frame is shorter than its header says.
    #[error("frame is {len} bytes; expected {expected}")]
    Truncated { len: usize, expected: usize },

    /// The header carries a negative point count.
    #[error("frame declares {0} points")]
    NegativeCount(i32),
}

/// Encode `path` for `sample_id` into a wire frame.
///
/// # Errors
///
/// Returns [`WireError::OutOfRange`] for the first coordinate that cannot
/// be represented and [`WireError::TooManyPoints`] if the point count
/// overflows the header word. Nothing is partially encoded.
///
/// # Examples
///
/// ```
/// use zigscan_pipeline::WorldPoint;
/// use zigscan_export::encode_path_frame;
///
/// let frame = encode_path_frame(7, &[WorldPoint::new(1.25, -2.5)]).unwrap();
/// assert_eq!(frame.len(), 16);
/// assert_eq!(&frame[8..12], &125_i32.to_be_bytes());
/// assert_eq!(&frame[12..16], &(-250_i32).to_be_bytes());
/// ```
pub fn encode_path_frame(sample_id: i32, path: &[WorldPoint]) -> Result<Vec<u8>, WireError> {
    let count = i32::try_from(path.len()).map_err(|_| WireError::TooManyPoints(path.len()))?;

    let mut frame = Vec::with_capacity((2 + 2 * path.len()) * WORD);
    frame.extend_from_slice(&sample_id.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    for (index, p) in path.iter().enumerate() {
        for value in [p.x, p.y] {
            let word = to_word(value).ok_or(WireError::OutOfRange { index, value })?;
            frame.extend_from_slice(&word.to_be_bytes());
        }
    }
    Ok(frame)
}

/// Decode a wire frame into its sample id and path.
///
/// Coordinates come back in millimeters at the wire resolution of
/// 0.01 mm. Bytes past the declared points are ignored.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] if the frame ends early and
/// [`WireError::NegativeCount`] for a corrupt header.
pub fn decode_path_frame(frame: &[u8]) -> Result<(i32, Vec<WorldPoint>), WireError> {
    let truncated = |expected| WireError::Truncated {
        len: frame.len(),
        expected,
    };
    let words: Vec<i32> = frame
        .chunks_exact(WORD)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let [sample_id, count, body @ ..] = words.as_slice() else {
        return Err(truncated(2 * WORD));
    };
    let points = usize::try_from(*count).map_err(|_| WireError::NegativeCount(*count))?;
    let expected = (2 + 2 * points) * WORD;
    if body.len() < 2 * points {
        return Err(truncated(expected));
    }

    let path = body[..2 * points]
        .chunks_exact(2)
        .map(|xy| {
            WorldPoint::new(
                f64::from(xy[0]) / UNITS_PER_MM,
                f64::from(xy[1]) / UNITS_PER_MM,
            )
        })
        .collect();
    Ok((*sample_id, path))
}

#[allow(clippy::cast_possible_truncation)]
fn to_word(mm: f64) -> Option<i32> {
    let scaled = (mm * UNITS_PER_MM).round();
    (scaled.is_finite() && scaled >= f64::from(i32::MIN) && scaled <= f64::from(i32::MAX))
        .then_some(scaled as i32)
}
