//! Distance-weighted neighborhood inpainting.
//!
//! Every masked pixel is replaced by a weighted average of the unmasked
//! pixels around it. Samples are always read from the untouched input and
//! results go into a separate buffer, so the output does not depend on the
//! order in which pixels (or rows, when running in parallel) are visited.

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::buffer::{self, MASK_MIN};
use crate::error::{Error, Result};

/// How a sample's contribution falls off with distance `d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Weighting {
    /// `1 / (1 + d)`
    #[default]
    InverseDistance,
    /// `1 / (1 + d²)`
    InverseSquare,
    /// Every sample counts the same.
    Uniform,
}

impl Weighting {
    fn weight(self, distance_sq: f64) -> f64 {
        match self {
            Self::InverseDistance => 1.0 / (1.0 + distance_sq.sqrt()),
            Self::InverseSquare => 1.0 / (1.0 + distance_sq),
            Self::Uniform => 1.0,
        }
    }
}

/// Progressive window growth when too few samples are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadiusGrowth {
    /// Radius increment per retry.
    pub step: u32,
    /// Largest radius tried.
    pub max_radius: u32,
}

/// Parameters for [`inpaint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InpaintConfig {
    /// Starting window radius (Chebyshev).
    pub radius: u32,
    /// Samples required before a replacement is accepted.
    pub min_samples: usize,
    /// Optional retry policy with larger windows.
    pub growth: Option<RadiusGrowth>,
    /// Distance weighting.
    pub weighting: Weighting,
}

impl Default for InpaintConfig {
    fn default() -> Self {
        Self {
            radius: 5,
            min_samples: 8,
            growth: None,
            weighting: Weighting::InverseDistance,
        }
    }
}

impl InpaintConfig {
    fn validate(&self) -> Result<()> {
        if self.radius == 0 {
            return Err(Error::InvalidConfig(
                "inpaint radius must be at least 1".to_string(),
            ));
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidConfig(
                "inpaint min_samples must be at least 1".to_string(),
            ));
        }
        if let Some(growth) = self.growth {
            if growth.step == 0 || growth.max_radius < self.radius {
                return Err(Error::InvalidConfig(format!(
                    "radius growth {growth:?} needs step >= 1 and max_radius >= {}",
                    self.radius
                )));
            }
        }
        Ok(())
    }
}

/// Counters describing one inpainting run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InpaintStats {
    /// Masked pixels that received a replacement colour.
    pub replaced: u64,
    /// Masked pixels left unmodified for lack of samples.
    pub unresolved: u64,
}

impl std::ops::Add for InpaintStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            replaced: self.replaced + rhs.replaced,
            unresolved: self.unresolved + rhs.unresolved,
        }
    }
}

/// Weighted RGB estimate at `(x, y)` from unmasked pixels within `radius`,
/// or `None` if fewer than `min_samples` exist.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn estimate(
    original: &RgbaImage,
    mask: &GrayImage,
    x: u32,
    y: u32,
    radius: u32,
    config: &InpaintConfig,
) -> Option<[u8; 3]> {
    let (width, height) = original.dimensions();
    let x0 = x.saturating_sub(radius);
    let y0 = y.saturating_sub(radius);
    let x1 = x.saturating_add(radius).min(width - 1);
    let y1 = y.saturating_add(radius).min(height - 1);

    let mut sums = [0.0_f64; 3];
    let mut total_weight = 0.0_f64;
    let mut samples = 0usize;

    for ny in y0..=y1 {
        for nx in x0..=x1 {
            if mask.get_pixel(nx, ny)[0] != MASK_MIN {
                continue;
            }
            let dx = f64::from(nx) - f64::from(x);
            let dy = f64::from(ny) - f64::from(y);
            let weight = config.weighting.weight(dx * dx + dy * dy);
            let px = original.get_pixel(nx, ny);
            for (sum, &channel) in sums.iter_mut().zip(&px.0[..3]) {
                *sum += weight * f64::from(channel);
            }
            total_weight += weight;
            samples += 1;
        }
    }

    if samples < config.min_samples || total_weight <= 0.0 {
        return None;
    }

    Some(sums.map(|s| (s / total_weight).round().clamp(0.0, 255.0) as u8))
}

/// Try the starting radius, then larger ones if growth is configured.
fn replacement(
    original: &RgbaImage,
    mask: &GrayImage,
    x: u32,
    y: u32,
    config: &InpaintConfig,
) -> Option<[u8; 3]> {
    let mut radius = config.radius;
    loop {
        if let Some(rgb) = estimate(original, mask, x, y, radius, config) {
            return Some(rgb);
        }
        match config.growth {
            Some(growth) if radius < growth.max_radius => {
                radius = radius.saturating_add(growth.step).min(growth.max_radius);
            }
            _ => return None,
        }
    }
}

/// Fill the masked pixels of one output row.
fn inpaint_row(
    original: &RgbaImage,
    mask: &GrayImage,
    y: u32,
    row: &mut [u8],
    config: &InpaintConfig,
) -> InpaintStats {
    let mut stats = InpaintStats::default();
    for (x, px) in (0..original.width()).zip(row.chunks_exact_mut(4)) {
        if mask.get_pixel(x, y)[0] == MASK_MIN {
            continue;
        }
        match replacement(original, mask, x, y, config) {
            Some(rgb) => {
                // Alpha (px[3]) keeps the original value.
                px[..3].copy_from_slice(&rgb);
                stats.replaced += 1;
            }
            None => stats.unresolved += 1,
        }
    }
    stats
}

/// Replace every masked pixel with a distance-weighted average of nearby
/// unmasked pixels.
///
/// Returns a new image plus counters. Alpha is copied unchanged, and pixels
/// without enough samples even at the largest radius keep their colour.
///
/// # Errors
///
/// Returns [`Error::MaskDimensions`] if `mask` does not match `image`, or
/// [`Error::InvalidConfig`] for a zero radius, zero `min_samples`, or a growth
/// policy that cannot advance.
pub fn inpaint(
    image: &RgbaImage,
    mask: &GrayImage,
    config: &InpaintConfig,
) -> Result<(RgbaImage, InpaintStats)> {
    buffer::ensure_same_dimensions(mask, image)?;
    config.validate()?;

    let mut output = image.clone();
    let row_len = image.width() as usize * 4;
    if row_len == 0 {
        return Ok((output, InpaintStats::default()));
    }

    #[cfg(feature = "parallel")]
    let stats = {
        use rayon::prelude::*;
        output
            .par_chunks_mut(row_len)
            .enumerate()
            .map(|(y, row)| {
                #[allow(clippy::cast_possible_truncation)]
                let y = y as u32;
                inpaint_row(image, mask, y, row, config)
            })
            .reduce(InpaintStats::default, |a, b| a + b)
    };

    #[cfg(not(feature = "parallel"))]
    let stats = output
        .chunks_mut(row_len)
        .enumerate()
        .map(|(y, row)| {
            #[allow(clippy::cast_possible_truncation)]
            let y = y as u32;
            inpaint_row(image, mask, y, row, config)
        })
        .fold(InpaintStats::default(), |a, b| a + b);

    tracing::debug!(
        replaced = stats.replaced,
        unresolved = stats.unresolved,
        "inpainting complete"
    );

    Ok((output, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MASK_MAX;
    use image::{Luma, Rgba};

    fn block_scene(size: u32, block: (u32, u32, u32), bg: [u8; 4], fg: [u8; 4]) -> (RgbaImage, GrayImage) {
        let (bx, by, k) = block;
        let inside = |x: u32, y: u32| x >= bx && x < bx + k && y >= by && y < by + k;
        let img = RgbaImage::from_fn(size, size, |x, y| {
            if inside(x, y) {
                Rgba(fg)
            } else {
                Rgba(bg)
            }
        });
        let mask = GrayImage::from_fn(size, size, |x, y| {
            Luma([if inside(x, y) { MASK_MAX } else { MASK_MIN }])
        });
        (img, mask)
    }

    #[test]
    fn solid_block_is_replaced_by_background() {
        let bg = [40, 90, 160, 255];
        let (img, mask) = block_scene(30, (12, 12, 6), bg, [250, 250, 250, 200]);
        let (out, stats) = inpaint(&img, &mask, &InpaintConfig::default()).unwrap();

        assert_eq!(stats.replaced, 36);
        assert_eq!(stats.unresolved, 0);
        for y in 12..18 {
            for x in 12..18 {
                let px = out.get_pixel(x, y);
                assert_eq!(&px.0[..3], &bg[..3], "({x},{y})");
                assert_eq!(px[3], 200, "alpha must be preserved");
            }
        }
    }

    #[test]
    fn unmasked_pixels_are_untouched() {
        let (img, mask) = block_scene(20, (5, 5, 4), [10, 20, 30, 40], [200, 200, 200, 255]);
        let (out, _) = inpaint(&img, &mask, &InpaintConfig::default()).unwrap();
        for (x, y, px) in out.enumerate_pixels() {
            if mask.get_pixel(x, y)[0] == MASK_MIN {
                assert_eq!(px, img.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn nearer_samples_weigh_more() {
        // Left half dark, right half bright; masked pixel sits one column
        // into the dark side.
        let img = RgbaImage::from_fn(11, 11, |x, _| {
            if x < 6 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([200, 200, 200, 255])
            }
        });
        let mut mask = GrayImage::new(11, 11);
        mask.put_pixel(4, 5, Luma([MASK_MAX]));
        let config = InpaintConfig {
            radius: 3,
            min_samples: 1,
            ..InpaintConfig::default()
        };
        let (out, _) = inpaint(&img, &mask, &config).unwrap();
        let value = out.get_pixel(4, 5)[0];
        assert!(value > 0 && value < 100, "expected dark-leaning blend, got {value}");
    }

    #[test]
    fn insufficient_samples_leave_pixel_unmodified() {
        let img = RgbaImage::from_pixel(6, 6, Rgba([255, 0, 0, 255]));
        let mask = GrayImage::from_pixel(6, 6, Luma([MASK_MAX]));
        let (out, stats) = inpaint(&img, &mask, &InpaintConfig::default()).unwrap();
        assert_eq!(out, img);
        assert_eq!(stats.replaced, 0);
        assert_eq!(stats.unresolved, 36);
    }

    #[test]
    fn growth_reaches_distant_background() {
        let bg = [90, 90, 90, 255];
        let (img, mask) = block_scene(40, (10, 10, 20), bg, [255, 255, 255, 255]);
        let fixed = InpaintConfig {
            radius: 3,
            ..InpaintConfig::default()
        };
        let (_, stats) = inpaint(&img, &mask, &fixed).unwrap();
        assert!(stats.unresolved > 0);

        let growing = InpaintConfig {
            radius: 3,
            growth: Some(RadiusGrowth {
                step: 2,
                max_radius: 11,
            }),
            ..InpaintConfig::default()
        };
        let (out, stats) = inpaint(&img, &mask, &growing).unwrap();
        assert_eq!(stats.unresolved, 0);
        assert_eq!(&out.get_pixel(20, 20).0[..3], &bg[..3]);
    }

    #[test]
    fn mask_touching_border_is_safe() {
        let bg = [50, 60, 70, 255];
        let (img, mask) = block_scene(16, (0, 0, 3), bg, [255, 255, 255, 255]);
        let (out, stats) = inpaint(&img, &mask, &InpaintConfig::default()).unwrap();
        assert_eq!(stats.unresolved, 0);
        assert_eq!(&out.get_pixel(0, 0).0[..3], &bg[..3]);
    }

    #[test]
    fn weightings_agree_on_uniform_background() {
        let bg = [17, 34, 51, 255];
        let (img, mask) = block_scene(20, (8, 8, 3), bg, [0, 0, 0, 255]);
        for weighting in [
            Weighting::InverseDistance,
            Weighting::InverseSquare,
            Weighting::Uniform,
        ] {
            let config = InpaintConfig {
                weighting,
                ..InpaintConfig::default()
            };
            let (out, _) = inpaint(&img, &mask, &config).unwrap();
            assert_eq!(&out.get_pixel(9, 9).0[..3], &bg[..3], "{weighting:?}");
        }
    }

    #[test]
    fn rejects_bad_config_and_mismatched_mask() {
        let img = RgbaImage::new(8, 8);
        let mask = GrayImage::new(8, 8);
        for config in [
            InpaintConfig {
                radius: 0,
                ..InpaintConfig::default()
            },
            InpaintConfig {
                min_samples: 0,
                ..InpaintConfig::default()
            },
            InpaintConfig {
                growth: Some(RadiusGrowth {
                    step: 0,
                    max_radius: 9,
                }),
                ..InpaintConfig::default()
            },
            InpaintConfig {
                growth: Some(RadiusGrowth {
                    step: 2,
                    max_radius: 1,
                }),
                ..InpaintConfig::default()
            },
        ] {
            assert!(matches!(
                inpaint(&img, &mask, &config),
                Err(Error::InvalidConfig(_))
            ));
        }

        assert!(matches!(
            inpaint(&img, &GrayImage::new(4, 8), &InpaintConfig::default()),
            Err(Error::MaskDimensions { .. })
        ));
    }

    /// Varied colours, a diagonal mask pattern and one solid block that
    /// needs window growth to resolve.
    fn textured_scene() -> (RgbaImage, GrayImage) {
        let img = RgbaImage::from_fn(32, 32, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 7 + y * 13) % 256) as u8;
            Rgba([v, v.wrapping_mul(3), 255 - v, 255])
        });
        let mask = GrayImage::from_fn(32, 32, |x, y| {
            let block = (12..20).contains(&x) && (10..18).contains(&y);
            Luma([if block || (x + y) % 5 == 0 { MASK_MAX } else { MASK_MIN }])
        });
        (img, mask)
    }

    fn growing_config() -> InpaintConfig {
        InpaintConfig {
            radius: 2,
            growth: Some(RadiusGrowth {
                step: 2,
                max_radius: 8,
            }),
            ..InpaintConfig::default()
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let (img, mask) = textured_scene();
        let config = InpaintConfig::default();
        let (a, _) = inpaint(&img, &mask, &config).unwrap();
        let (b, _) = inpaint(&img, &mask, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bottom_up_rows_give_same_output() {
        let (img, mask) = textured_scene();
        let config = growing_config();
        let (expected, expected_stats) = inpaint(&img, &mask, &config).unwrap();

        let mut out = img.clone();
        let row_len = img.width() as usize * 4;
        let mut stats = InpaintStats::default();
        for (y, row) in out.chunks_mut(row_len).enumerate().rev() {
            #[allow(clippy::cast_possible_truncation)]
            let y = y as u32;
            stats = stats + inpaint_row(&img, &mask, y, row, &config);
        }

        assert!(expected_stats.replaced > 0);
        assert_eq!(stats, expected_stats);
        assert_eq!(out, expected);
    }

    #[test]
    fn scattered_pixel_order_gives_same_output() {
        let (img, mask) = textured_scene();
        let config = growing_config();
        let (expected, _) = inpaint(&img, &mask, &config).unwrap();

        // 389 is coprime with 32 * 32, so this visits every pixel once.
        let (width, height) = img.dimensions();
        let total = width * height;
        let mut out = img.clone();
        for i in 0..total {
            let index = (i * 389) % total;
            let (x, y) = (index % width, index / width);
            if mask.get_pixel(x, y)[0] == MASK_MIN {
                continue;
            }
            if let Some(rgb) = replacement(&img, &mask, x, y, &config) {
                out.get_pixel_mut(x, y).0[..3].copy_from_slice(&rgb);
            }
        }

        assert_eq!(out, expected);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_rows_match_serial_fold() {
        let (img, mask) = textured_scene();
        let config = growing_config();
        let (parallel, parallel_stats) = inpaint(&img, &mask, &config).unwrap();

        let mut serial = img.clone();
        let row_len = img.width() as usize * 4;
        let serial_stats = serial
            .chunks_mut(row_len)
            .enumerate()
            .map(|(y, row)| {
                #[allow(clippy::cast_possible_truncation)]
                let y = y as u32;
                inpaint_row(&img, &mask, y, row, &config)
            })
            .fold(InpaintStats::default(), |a, b| a + b);

        assert_eq!(parallel_stats, serial_stats);
        assert_eq!(parallel, serial);
    }
}
