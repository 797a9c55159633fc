//! Foreground segmentation against a background reference frame.
//!
//! Background and object frames are taken at different times and the
//! camera's exposure can drift between them, so a plain difference would
//! light up the whole plate. The frame border is assumed object-free by
//! acquisition convention: the per-channel mean over that band measures
//! the exposure drift, which is subtracted out before differencing.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Frame, Mask, RgbImage, SegmentationError};

/// Segmentation constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segmenter {
    /// Width of the object-free band along every frame edge (pixels).
    pub border_px: u32,
    /// Sigma of the Gaussian applied to the difference image.
    pub blur_sigma: f32,
}

impl Segmenter {
    /// Default border band width.
    pub const DEFAULT_BORDER_PX: u32 = 200;
    /// Default difference-image smoothing.
    pub const DEFAULT_BLUR_SIGMA: f32 = 6.0;

    /// Produce a binary foreground mask.
    ///
    /// A pixel is foreground (255) when any channel of the smoothed,
    /// exposure-corrected difference exceeds `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::SizeMismatch`] if the frames differ in
    /// size and [`SegmentationError::FrameTooSmall`] if the border band
    /// would cover the whole frame.
    pub fn segment(
        &self,
        background: &Frame,
        object: &Frame,
        threshold: u8,
    ) -> Result<Mask, SegmentationError> {
        let dims = Dimensions::of(background);
        let object_dims = Dimensions::of(object);
        if dims != object_dims {
            return Err(SegmentationError::SizeMismatch {
                background: dims,
                object: object_dims,
            });
        }
        let too_small = SegmentationError::FrameTooSmall {
            dimensions: dims,
            border_px: self.border_px,
        };
        if self.border_px == 0
            || dims.width <= self.border_px.saturating_mul(2)
            || dims.height <= self.border_px.saturating_mul(2)
        {
            return Err(too_small);
        }

        let bg_mean = band_means(background, self.border_px).ok_or_else(|| too_small.clone())?;
        let obj_mean = band_means(object, self.border_px).ok_or(too_small)?;
        let offset: [f64; 3] = std::array::from_fn(|c| bg_mean[c] - obj_mean[c]);
        tracing::debug!(?offset, "exposure offset from border band");

        let corrected = apply_offset(object, offset);
        let diff = abs_diff(&corrected, background);
        let smoothed = crate::blur::gaussian_blur_rgb(&diff, self.blur_sigma);

        Ok(Mask::from_fn(dims.width, dims.height, |x, y| {
            let any = smoothed.get_pixel(x, y).0.iter().any(|&d| d > threshold);
            image::Luma([if any { 255 } else { 0 }])
        }))
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            border_px: Self::DEFAULT_BORDER_PX,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
        }
    }
}

/// Segment with the default [`Segmenter`].
///
/// # Errors
///
/// See [`Segmenter::segment`].
pub fn segment(background: &Frame, object: &Frame, threshold: u8) -> Result<Mask, SegmentationError> {
    Segmenter::default().segment(background, object, threshold)
}

/// Whether `(x, y)` lies in the border band of width `border_px`.
///
/// The object-free interior is the closed rectangle
/// `[border, width - border] x [border, height - border]`.
#[must_use]
pub const fn in_border_band(x: u32, y: u32, dims: Dimensions, border_px: u32) -> bool {
    x < border_px
        || y < border_px
        || x > dims.width.saturating_sub(border_px)
        || y > dims.height.saturating_sub(border_px)
}

/// Per-channel mean over the border band, or `None` if the band is empty.
#[must_use]
pub fn band_means(frame: &RgbImage, border_px: u32) -> Option<[f64; 3]> {
    let dims = Dimensions::of(frame);
    let mut sums = [0_u64; 3];
    let mut count = 0_u64;
    for (x, y, pixel) in frame.enumerate_pixels() {
        if in_border_band(x, y, dims, border_px) {
            for (sum, &value) in sums.iter_mut().zip(&pixel.0) {
                *sum += u64::from(value);
            }
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let means = sums.map(|s| s as f64 / count as f64);
    Some(means)
}

/// Shift every channel by a constant, saturating to `0..=255`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn apply_offset(frame: &RgbImage, offset: [f64; 3]) -> RgbImage {
    let mut out = frame.clone();
    for pixel in out.pixels_mut() {
        for (value, delta) in pixel.0.iter_mut().zip(offset) {
            *value = (f64::from(*value) + delta).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn abs_diff(a: &RgbImage, b: &RgbImage) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let pa = a.get_pixel(x, y).0;
        let pb = b.get_pixel(x, y).0;
        image::Rgb(std::array::from_fn(|c| pa[c].abs_diff(pb[c])))
    })
}
