//! Frame loading and PNG saving.

use std::path::{Path, PathBuf};

use image::ImageEncoder;
use zigscan_pipeline::frame::decode_frame;
use zigscan_pipeline::{Frame, Mask, PipelineError};

/// Errors from reading or writing image files.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file content is not a decodable image.
    #[error("{}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: PipelineError,
    },

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(#[from] image::ImageError),
}

/// Read an image file (any format the `image` crate was built with) as an
/// RGB frame.
///
/// # Errors
///
/// Returns [`FrameError::Io`] if the file cannot be read and
/// [`FrameError::Decode`] if it is empty or not an image.
pub fn load_frame(path: &Path) -> Result<Frame, FrameError> {
    let bytes = std::fs::read(path).map_err(|source| FrameError::Io {
        path: path.to_owned(),
        source,
    })?;
    let frame = decode_frame(&bytes).map_err(|source| FrameError::Decode {
        path: path.to_owned(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        width = frame.width(),
        height = frame.height(),
        "loaded frame"
    );
    Ok(frame)
}

/// Write an RGB frame to `path` as PNG, whatever the extension.
///
/// # Errors
///
/// Returns [`FrameError::PngEncode`] if encoding fails and
/// [`FrameError::Io`] if the file cannot be written.
pub fn save_frame(path: &Path, frame: &Frame) -> Result<(), FrameError> {
    let png = encode_png(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    write(path, &png)
}

/// Write a single-channel mask to `path` as grayscale PNG.
///
/// # Errors
///
/// Same as [`save_frame`].
pub fn save_mask(path: &Path, mask: &Mask) -> Result<(), FrameError> {
    let png = encode_png(
        mask.as_raw(),
        mask.width(),
        mask.height(),
        image::ExtendedColorType::L8,
    )?;
    write(path, &png)
}

fn encode_png(
    raw: &[u8],
    width: u32,
    height: u32,
    color: image::ExtendedColorType,
) -> Result<Vec<u8>, image::ImageError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(raw, width, height, color)?;
    Ok(png_bytes)
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), FrameError> {
    std::fs::write(path, bytes).map_err(|source| FrameError::Io {
        path: path.to_owned(),
        source,
    })
}
