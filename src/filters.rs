//! Whole-image filters used when the masked pipeline cannot run.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::filter;

use crate::error::{Error, Result};

/// Uniform box blur of the colour channels over a `(2r+1)²` window.
///
/// Each colour channel goes through `imageproc`'s separable box filter, so
/// windows that cross the border see the edge pixels repeated. Alpha is
/// copied unchanged.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `radius` is 0.
pub fn box_blur(image: &RgbaImage, radius: u32) -> Result<RgbaImage> {
    if radius == 0 {
        return Err(Error::InvalidConfig(
            "blur radius must be at least 1".to_string(),
        ));
    }

    let (width, height) = image.dimensions();
    let mut output = image.clone();
    if width == 0 || height == 0 {
        return Ok(output);
    }

    for c in 0..3 {
        let channel = GrayImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[c]]));
        let blurred = filter::box_filter(&channel, radius, radius);
        for (px, value) in output.pixels_mut().zip(blurred.pixels()) {
            px[c] = value[0];
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn uniform_image_is_unchanged() {
        let img = RgbaImage::from_pixel(9, 7, Rgba([12, 34, 56, 78]));
        assert_eq!(box_blur(&img, 2).unwrap(), img);
    }

    fn close_to(actual: u8, expected: u8) -> bool {
        actual.abs_diff(expected) <= 1
    }

    #[test]
    fn spike_is_spread_and_alpha_kept() {
        let mut img = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 99]));
        img.put_pixel(2, 2, Rgba([90, 180, 255, 7]));
        let out = box_blur(&img, 1).unwrap();
        for (x, y, alpha) in [(2, 2, 7), (1, 1, 99), (3, 2, 99)] {
            let px = out.get_pixel(x, y);
            assert!(close_to(px[0], 10), "({x},{y}) {px:?}");
            assert!(close_to(px[1], 20), "({x},{y}) {px:?}");
            assert!(close_to(px[2], 28), "({x},{y}) {px:?}");
            assert_eq!(px[3], alpha);
        }
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 99]));
    }

    #[test]
    fn border_windows_repeat_edge_pixels() {
        let mut img = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([90, 90, 90, 255]));
        let out = box_blur(&img, 1).unwrap();
        // The corner pixel fills 4 of the 9 window slots.
        assert_eq!(out.get_pixel(0, 0), &Rgba([40, 40, 40, 255]));
        assert_eq!(out.get_pixel(2, 2), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn large_radius_on_small_image() {
        let img = RgbaImage::from_fn(4, 3, |x, _| Rgba([if x < 2 { 0 } else { 200 }, 50, 50, 1]));
        let out = box_blur(&img, 300).unwrap();
        assert_eq!(out.dimensions(), (4, 3));
        assert!(out.pixels().all(|px| px[1] == 50 && px[3] == 1));
    }

    #[test]
    fn single_pixel_image_survives() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 4]));
        assert_eq!(box_blur(&img, 3).unwrap(), img);
    }

    #[test]
    fn zero_radius_is_rejected() {
        let img = RgbaImage::new(2, 2);
        assert!(matches!(box_blur(&img, 0), Err(Error::InvalidConfig(_))));
    }
}
