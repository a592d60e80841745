//! Pixel and mask buffers shared by every pipeline stage.
//!
//! Images are plain [`RgbaImage`]s (R, G, B, A per pixel, row-major) and masks
//! are [`GrayImage`]s of the same size, one byte per pixel.

use image::{GrayImage, Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Mask value for background pixels that are kept as-is.
pub const MASK_MIN: u8 = 0;
/// Mask value for watermark pixels that will be replaced.
pub const MASK_MAX: u8 = u8::MAX;

/// Build an [`RgbaImage`] from a raw RGBA byte buffer.
///
/// The buffer must be exactly `width * height * 4` bytes long and both
/// dimensions must be non-zero.
///
/// # Errors
///
/// Returns [`Error::InvalidImageShape`] when the length or dimensions are wrong.
pub fn from_raw_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<RgbaImage> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .unwrap_or(usize::MAX);
    let actual = pixels.len();

    if width == 0 || height == 0 || actual != expected {
        return Err(Error::InvalidImageShape {
            width,
            height,
            expected,
            actual,
        });
    }

    RgbaImage::from_raw(width, height, pixels).ok_or(Error::InvalidImageShape {
        width,
        height,
        expected,
        actual,
    })
}

/// Create an all-background mask matching the image size.
#[must_use]
pub fn empty_mask(image: &RgbaImage) -> GrayImage {
    GrayImage::new(image.width(), image.height())
}

/// Number of pixels flagged as watermark in a mask.
#[must_use]
pub fn count_flagged(mask: &GrayImage) -> u64 {
    mask.as_raw().iter().filter(|&&v| v != MASK_MIN).count() as u64
}

/// Check that a mask and image describe the same pixel grid.
///
/// # Errors
///
/// Returns [`Error::MaskDimensions`] on mismatch.
pub fn ensure_same_dimensions(mask: &GrayImage, image: &RgbaImage) -> Result<()> {
    if mask.dimensions() == image.dimensions() {
        Ok(())
    } else {
        Err(Error::MaskDimensions {
            mask_width: mask.width(),
            mask_height: mask.height(),
            image_width: image.width(),
            image_height: image.height(),
        })
    }
}

/// Mean of the colour channels, ignoring alpha.
#[must_use]
pub fn intensity(px: &Rgba<u8>) -> f32 {
    (f32::from(px[0]) + f32::from(px[1]) + f32::from(px[2])) / 3.0
}

/// Largest pairwise difference between the colour channels.
#[must_use]
pub fn channel_spread(px: &Rgba<u8>) -> f32 {
    let max = px[0].max(px[1]).max(px[2]);
    let min = px[0].min(px[1]).min(px[2]);
    f32::from(max - min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_accepts_exact_length() {
        let img = from_raw_rgba(3, 2, vec![7; 3 * 2 * 4]).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Rgba([7, 7, 7, 7]));
    }

    #[test]
    fn from_raw_rejects_short_and_long_buffers() {
        for len in [23, 25, 0] {
            let err = from_raw_rgba(3, 2, vec![0; len]).unwrap_err();
            match err {
                Error::InvalidImageShape {
                    expected, actual, ..
                } => {
                    assert_eq!(expected, 24);
                    assert_eq!(actual, len);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn from_raw_rejects_zero_dimensions() {
        assert!(from_raw_rgba(0, 5, Vec::new()).is_err());
        assert!(from_raw_rgba(5, 0, Vec::new()).is_err());
    }

    #[test]
    fn mask_dimension_check() {
        let img = RgbaImage::new(4, 4);
        assert!(ensure_same_dimensions(&GrayImage::new(4, 4), &img).is_ok());
        assert!(matches!(
            ensure_same_dimensions(&GrayImage::new(4, 5), &img),
            Err(Error::MaskDimensions { .. })
        ));
    }

    #[test]
    fn intensity_and_spread() {
        let px = Rgba([30, 60, 90, 10]);
        assert!((intensity(&px) - 60.0).abs() < 1e-6);
        assert!((channel_spread(&px) - 60.0).abs() < 1e-6);
        assert!(channel_spread(&Rgba([200, 200, 200, 0])).abs() < 1e-6);
    }

    #[test]
    fn count_flagged_counts_non_zero() {
        let mut mask = GrayImage::new(3, 3);
        mask.put_pixel(0, 0, image::Luma([MASK_MAX]));
        mask.put_pixel(2, 2, image::Luma([MASK_MAX]));
        assert_eq!(count_flagged(&mask), 2);
        assert_eq!(count_flagged(&empty_mask(&RgbaImage::new(3, 3))), 0);
    }
}
