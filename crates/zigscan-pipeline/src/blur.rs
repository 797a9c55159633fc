//! Gaussian smoothing of three-channel difference images.
//!
//! `imageproc::filter::gaussian_blur_f32` is applied to each channel
//! separately and the channels are reassembled. Gaussian blur is linear
//! and per-channel, so this equals blurring in color space.

use image::GrayImage;

use crate::types::RgbImage;

/// Split an RGB image into its three channels.
#[must_use]
pub fn split_channels(image: &RgbImage) -> [GrayImage; 3] {
    let (w, h) = image.dimensions();
    std::array::from_fn(|c| GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]])))
}

/// Blur each channel of an RGB image independently.
///
/// Non-positive sigma values return the image unchanged, since `imageproc`
/// panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgb(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let channels = split_channels(image);
    let blurred: [GrayImage; 3] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}
