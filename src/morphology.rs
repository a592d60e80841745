//! Binary mask morphology with a square structuring element.
//!
//! Built on `imageproc` with the L-infinity norm, so the structuring
//! element of radius `r` is the `(2r+1)²` square around each pixel.

use image::{imageops, GrayImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology as ops;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One morphological operation and its Chebyshev radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MorphStep {
    /// Grow the flagged region.
    Dilate(u32),
    /// Shrink the flagged region.
    Erode(u32),
}

/// Ordered list of operations applied by [`refine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphologyConfig {
    /// Steps, applied first to last.
    pub steps: Vec<MorphStep>,
}

impl MorphologyConfig {
    /// Dilate to close gaps, erode to drop isolated pixels, dilate again to
    /// restore coverage.
    #[must_use]
    pub fn close_and_restore(dilate: u32, erode: u32, restore: u32) -> Self {
        Self {
            steps: vec![
                MorphStep::Dilate(dilate),
                MorphStep::Erode(erode),
                MorphStep::Dilate(restore),
            ],
        }
    }
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self::close_and_restore(1, 1, 1)
    }
}

/// Split a radius into steps `imageproc` accepts (`u8`). Square
/// structuring elements compose additively, so the steps sum to `radius`.
fn radius_steps(radius: u32) -> impl Iterator<Item = u8> {
    let max = u32::from(u8::MAX);
    let full = (radius / max) as usize;
    let rest = u8::try_from(radius % max).unwrap_or(u8::MAX);
    std::iter::repeat(u8::MAX)
        .take(full)
        .chain((rest > 0).then_some(rest))
}

/// Set every pixel within Chebyshev distance `radius` of a flagged pixel.
///
/// A radius of 0 returns a copy of the input.
#[must_use]
pub fn dilate(mask: &GrayImage, radius: u32) -> GrayImage {
    let mut out = mask.clone();
    for k in radius_steps(radius) {
        out = ops::dilate(&out, Norm::LInf, k);
    }
    out
}

/// Keep a pixel only if every pixel within Chebyshev distance `radius` is
/// flagged and inside the image.
///
/// Out-of-bounds neighbors count as background, so regions touching the
/// border shrink there too. A radius of 0 returns a copy of the input.
#[must_use]
pub fn erode(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let (width, height) = mask.dimensions();
    let window = 2 * u64::from(radius) + 1;
    if u64::from(width) < window || u64::from(height) < window {
        return GrayImage::new(width, height);
    }

    // A background frame of `radius` pixels makes the border erode too;
    // `imageproc` alone never sees background past the edge.
    let mut padded = GrayImage::new(width + 2 * radius, height + 2 * radius);
    imageops::replace(&mut padded, mask, i64::from(radius), i64::from(radius));
    for k in radius_steps(radius) {
        padded = ops::erode(&padded, Norm::LInf, k);
    }
    imageops::crop_imm(&padded, radius, radius, width, height).to_image()
}

/// Apply the configured sequence of operations.
///
/// # Errors
///
/// Currently infallible; returns `Result` so the pipeline can treat every
/// stage alike.
pub fn refine(mask: &GrayImage, config: &MorphologyConfig) -> Result<GrayImage> {
    let mut current = mask.clone();
    for step in &config.steps {
        current = match *step {
            MorphStep::Dilate(r) => dilate(&current, r),
            MorphStep::Erode(r) => erode(&current, r),
        };
    }
    tracing::debug!(
        steps = config.steps.len(),
        flagged = crate::buffer::count_flagged(&current),
        "mask refinement complete"
    );
    Ok(current)
}
