//! Named threshold presets behind the algorithm selector.
//!
//! Every algorithm runs the same detect → refine → inpaint code path; they
//! differ only in the numbers below. The values are starting points for
//! tuning against real images, not calibrated constants.
//!
//! | algorithm          | bright | contrast | solid | uniform     | neighborhood | region      | morphology | inpaint radius     |
//! |--------------------|--------|----------|-------|-------------|--------------|-------------|------------|--------------------|
//! | `basic`            | 200    | 20       | 240   | -           | 8            | full        | 1/1/1      | 7, fixed           |
//! | `edge-preserving`  | 185    | 30       | 245   | -           | square r=2   | full        | 1/1/0      | 6, +2 up to 12     |
//! | `frequency-domain` | 180    | 15       | 235   | >170, <12   | 4            | central 10% | 2/1/1      | 5, +2 up to 11     |
//! | `inpainting`       | 200    | 20       | 240   | >180, <15   | 8            | full        | 1/1/1      | 3, +2 up to 7      |

use serde::{Deserialize, Serialize};

use crate::detection::{DetectionConfig, Neighborhood, SearchRegion, UniformityRule};
use crate::inpaint::{InpaintConfig, RadiusGrowth, Weighting};
use crate::morphology::MorphologyConfig;

/// Samples required before an inpainted colour is accepted.
pub const DEFAULT_MIN_SAMPLES: usize = 8;

/// Algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Bright-edge and solid-fill rules with a single fixed inpaint window.
    Basic,
    /// Stricter contrast over a wider neighborhood, growing window.
    EdgePreserving,
    /// Permissive thresholds restricted to the image center.
    FrequencyDomain,
    /// Adds the flat-colour rule and grows the window from a small start.
    #[default]
    Inpainting,
}

impl Algorithm {
    /// Detection thresholds for this preset.
    #[must_use]
    pub fn detection(self) -> DetectionConfig {
        match self {
            Self::Basic => DetectionConfig::default(),
            Self::EdgePreserving => DetectionConfig {
                brightness_threshold: 185.0,
                contrast_threshold: 30.0,
                solid_threshold: 245.0,
                uniformity: None,
                neighborhood: Neighborhood::Square(2),
                search_region: None,
            },
            Self::FrequencyDomain => DetectionConfig {
                brightness_threshold: 180.0,
                contrast_threshold: 15.0,
                solid_threshold: 235.0,
                uniformity: Some(UniformityRule {
                    min_intensity: 170.0,
                    max_channel_spread: 12.0,
                }),
                neighborhood: Neighborhood::Four,
                search_region: Some(SearchRegion::central(0.1)),
            },
            Self::Inpainting => DetectionConfig {
                uniformity: Some(UniformityRule {
                    min_intensity: 180.0,
                    max_channel_spread: 15.0,
                }),
                ..DetectionConfig::default()
            },
        }
    }

    /// Morphology sequence for this preset.
    #[must_use]
    pub fn morphology(self) -> MorphologyConfig {
        match self {
            Self::Basic | Self::Inpainting => MorphologyConfig::close_and_restore(1, 1, 1),
            Self::EdgePreserving => MorphologyConfig::close_and_restore(1, 1, 0),
            Self::FrequencyDomain => MorphologyConfig::close_and_restore(2, 1, 1),
        }
    }

    /// Inpainting parameters for this preset.
    #[must_use]
    pub fn inpaint(self) -> InpaintConfig {
        let (radius, growth) = match self {
            Self::Basic => (7, None),
            Self::EdgePreserving => (6, Some((2, 12))),
            Self::FrequencyDomain => (5, Some((2, 11))),
            Self::Inpainting => (3, Some((2, 7))),
        };
        InpaintConfig {
            radius,
            min_samples: DEFAULT_MIN_SAMPLES,
            growth: growth.map(|(step, max_radius)| RadiusGrowth { step, max_radius }),
            weighting: Weighting::InverseDistance,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Basic => "basic",
            Self::EdgePreserving => "edge-preserving",
            Self::FrequencyDomain => "frequency-domain",
            Self::Inpainting => "inpainting",
        };
        f.write_str(name)
    }
}
