//! Heuristic watermark region detection.
//!
//! Flags pixels that look like an overlaid watermark using three permissive
//! rules combined with OR (recall over precision):
//! 1. **Bright edge**: intensity above the brightness threshold and local
//!    contrast above the contrast threshold (text strokes).
//! 2. **Solid fill**: intensity above a very high threshold on its own
//!    (anti-aliased stroke centers with little local contrast).
//! 3. **Uniform colour** (optional): moderately bright with nearly equal
//!    channels (flat grey/white overlays).

use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::buffer::{self, MASK_MAX};
use crate::error::{Error, Result};

/// Neighborhood used to measure local contrast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Neighborhood {
    /// Up, down, left, right.
    Four,
    /// The full 3x3 ring.
    Eight,
    /// Every pixel within Chebyshev distance `radius`, center excluded.
    Square(u32),
}

impl Neighborhood {
    /// Border width where the neighborhood is undefined.
    #[must_use]
    pub fn radius(self) -> u32 {
        match self {
            Self::Four | Self::Eight => 1,
            Self::Square(r) => r,
        }
    }

    fn offsets(self) -> Vec<(i64, i64)> {
        match self {
            Self::Four => vec![(0, -1), (-1, 0), (1, 0), (0, 1)],
            Self::Eight => square_offsets(1),
            Self::Square(r) => square_offsets(i64::from(r)),
        }
    }
}

fn square_offsets(r: i64) -> Vec<(i64, i64)> {
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx != 0 || dy != 0 {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Flat-colour overlay rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformityRule {
    /// Intensity a pixel must exceed.
    pub min_intensity: f32,
    /// Pairwise channel difference a pixel must stay below.
    pub max_channel_spread: f32,
}

/// Sub-rectangle of the image to search, as fractions of width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchRegion {
    /// Left edge, fraction of width.
    pub left: f32,
    /// Top edge, fraction of height.
    pub top: f32,
    /// Right edge (exclusive), fraction of width.
    pub right: f32,
    /// Bottom edge (exclusive), fraction of height.
    pub bottom: f32,
}

impl SearchRegion {
    /// Centered region leaving `margin` of each side out.
    #[must_use]
    pub fn central(margin: f32) -> Self {
        Self {
            left: margin,
            top: margin,
            right: 1.0 - margin,
            bottom: 1.0 - margin,
        }
    }

    fn validate(&self) -> Result<()> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if [self.left, self.top, self.right, self.bottom]
            .into_iter()
            .all(in_unit)
            && self.left < self.right
            && self.top < self.bottom
        {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "search region {self:?} must satisfy 0 <= left < right <= 1 and 0 <= top < bottom <= 1"
            )))
        }
    }

    /// Pixel bounds `(x0, y0, x1, y1)`, end-exclusive.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn pixel_bounds(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let (w, h) = (width as f32, height as f32);
        let x0 = (self.left * w).floor() as u32;
        let y0 = (self.top * h).floor() as u32;
        let x1 = ((self.right * w).ceil() as u32).min(width);
        let y1 = ((self.bottom * h).ceil() as u32).min(height);
        (x0, y0, x1, y1)
    }
}

/// Thresholds and geometry for [`detect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Intensity above which a pixel counts as bright.
    pub brightness_threshold: f32,
    /// Mean absolute intensity difference above which a pixel is edge-like.
    pub contrast_threshold: f32,
    /// Intensity above which a pixel is flagged regardless of contrast.
    pub solid_threshold: f32,
    /// Optional flat-colour rule.
    pub uniformity: Option<UniformityRule>,
    /// Neighborhood used for local contrast.
    pub neighborhood: Neighborhood,
    /// Optional restriction of the scanned area.
    pub search_region: Option<SearchRegion>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 200.0,
            contrast_threshold: 20.0,
            solid_threshold: 240.0,
            uniformity: None,
            neighborhood: Neighborhood::Eight,
            search_region: None,
        }
    }
}

/// Result of region detection.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Binary mask, `255` where a watermark pixel is suspected.
    pub mask: GrayImage,
    /// Number of flagged pixels.
    pub flagged_pixels: u64,
}

/// Per-pixel intensity plane, row-major.
fn intensity_plane(image: &RgbaImage) -> Vec<f32> {
    image.pixels().map(buffer::intensity).collect()
}

/// Scan `image` and flag likely watermark pixels.
///
/// Pixels closer than the neighborhood radius to the border are never
/// flagged, so images too small to hold one full neighborhood yield an
/// empty mask.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for a zero square radius or a malformed
/// search region.
pub fn detect(image: &RgbaImage, config: &DetectionConfig) -> Result<DetectionResult> {
    let radius = config.neighborhood.radius();
    if radius == 0 {
        return Err(Error::InvalidConfig(
            "contrast neighborhood radius must be at least 1".to_string(),
        ));
    }
    if let Some(region) = &config.search_region {
        region.validate()?;
    }

    let (width, height) = image.dimensions();
    let mut mask = buffer::empty_mask(image);

    if u64::from(width) <= 2 * u64::from(radius) || u64::from(height) <= 2 * u64::from(radius) {
        return Ok(DetectionResult {
            mask,
            flagged_pixels: 0,
        });
    }

    let (rx0, ry0, rx1, ry1) = config
        .search_region
        .map_or((0, 0, width, height), |r| r.pixel_bounds(width, height));
    let x0 = rx0.max(radius);
    let y0 = ry0.max(radius);
    let x1 = rx1.min(width - radius);
    let y1 = ry1.min(height - radius);

    let plane = intensity_plane(image);
    let offsets = config.neighborhood.offsets();
    #[allow(clippy::cast_precision_loss)]
    let n_neighbors = offsets.len() as f32;
    let w = width as usize;
    let mut flagged = 0u64;

    for y in y0..y1 {
        for x in x0..x1 {
            let idx = y as usize * w + x as usize;
            let center = plane[idx];

            let solid = center > config.solid_threshold;
            let uniform = config.uniformity.is_some_and(|rule| {
                center > rule.min_intensity
                    && buffer::channel_spread(image.get_pixel(x, y)) < rule.max_channel_spread
            });

            let edge = !solid
                && !uniform
                && center > config.brightness_threshold
                && {
                    // In-bounds: x, y are at least `radius` from every border.
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let total: f32 = offsets
                        .iter()
                        .map(|&(dx, dy)| {
                            let nx = (i64::from(x) + dx) as usize;
                            let ny = (i64::from(y) + dy) as usize;
                            (center - plane[ny * w + nx]).abs()
                        })
                        .sum();
                    total / n_neighbors > config.contrast_threshold
                };

            if solid || uniform || edge {
                mask.put_pixel(x, y, Luma([MASK_MAX]));
                flagged += 1;
            }
        }
    }

    tracing::debug!(flagged, width, height, "region detection complete");

    Ok(DetectionResult {
        mask,
        flagged_pixels: flagged,
    })
}
