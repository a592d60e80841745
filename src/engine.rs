//! Pipeline orchestration: detect → refine → inpaint, with a fallback chain.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::buffer;
use crate::detection::{self, DetectionConfig, DetectionResult, UniformityRule};
use crate::error::{Error, Result};
use crate::filters;
use crate::inpaint::{self, InpaintConfig};
use crate::morphology::{self, MorphStep, MorphologyConfig};
use crate::preset::Algorithm;

/// Default pixel budget (50 megapixels).
pub const DEFAULT_MAX_PIXELS: u64 = 50_000_000;
/// Default radius of the fallback box blur.
pub const DEFAULT_FALLBACK_BLUR_RADIUS: u32 = 1;
/// Intensity floor used when a uniformity threshold is given for a preset
/// that has no flat-colour rule of its own.
const UNIFORM_MIN_INTENSITY: f32 = 180.0;

/// User-facing options controlling watermark removal.
///
/// Every `Option` field overrides the corresponding value of the selected
/// [`Algorithm`] preset when set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProcessOptions {
    /// Preset selecting the thresholds.
    pub algorithm: Algorithm,
    /// Text of the watermark. Accepted for compatibility; the pixel
    /// heuristics do not use it.
    pub watermark_text: Option<String>,
    /// Bright-pixel intensity threshold.
    pub brightness_threshold: Option<f32>,
    /// Local contrast threshold.
    pub contrast_threshold: Option<f32>,
    /// Maximum channel spread for the flat-colour rule.
    pub uniformity_threshold: Option<f32>,
    /// Radius of the first, gap-closing dilation.
    pub dilate_radius: Option<u32>,
    /// Radius of every erosion step.
    pub erode_radius: Option<u32>,
    /// Radius of the dilations after the first one, which restore coverage
    /// lost to erosion. A preset restore radius of 0 stays 0 unless this is
    /// set.
    pub restore_radius: Option<u32>,
    /// Starting inpaint window radius.
    pub inpaint_radius: Option<u32>,
    /// Samples required per inpainted pixel.
    pub min_samples: Option<usize>,
    /// Largest image (in pixels) the masked pipeline will process.
    pub max_pixels: Option<u64>,
    /// Radius of the fallback blur.
    pub fallback_blur_radius: Option<u32>,
    /// Enable verbose logging.
    #[serde(skip)]
    pub verbose: bool,
    /// Suppress non-error output.
    #[serde(skip)]
    pub quiet: bool,
}

impl ProcessOptions {
    /// Load options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it is not valid JSON for this type.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply overrides on top of the algorithm preset.
    #[must_use]
    pub fn resolve(&self) -> PipelineConfig {
        let mut detection = self.algorithm.detection();
        if let Some(v) = self.brightness_threshold {
            detection.brightness_threshold = v;
        }
        if let Some(v) = self.contrast_threshold {
            detection.contrast_threshold = v;
        }
        if let Some(spread) = self.uniformity_threshold {
            let rule = detection.uniformity.get_or_insert(UniformityRule {
                min_intensity: UNIFORM_MIN_INTENSITY,
                max_channel_spread: spread,
            });
            rule.max_channel_spread = spread;
        }

        let mut morphology = self.algorithm.morphology();
        let mut first_dilate = true;
        for step in &mut morphology.steps {
            match step {
                MorphStep::Dilate(r) if first_dilate => {
                    first_dilate = false;
                    *r = self.dilate_radius.unwrap_or(*r);
                }
                MorphStep::Dilate(r) => *r = self.restore_radius.unwrap_or(*r),
                MorphStep::Erode(r) => *r = self.erode_radius.unwrap_or(*r),
            }
        }

        let mut inpaint = self.algorithm.inpaint();
        if let Some(radius) = self.inpaint_radius {
            inpaint.radius = radius;
            if let Some(growth) = inpaint.growth.as_mut() {
                growth.max_radius = growth.max_radius.max(radius);
            }
        }
        if let Some(n) = self.min_samples {
            inpaint.min_samples = n;
        }

        PipelineConfig {
            detection,
            morphology,
            inpaint,
            max_pixels: Some(self.max_pixels.unwrap_or(DEFAULT_MAX_PIXELS)),
            fallback_blur_radius: self
                .fallback_blur_radius
                .unwrap_or(DEFAULT_FALLBACK_BLUR_RADIUS),
        }
    }
}

/// Fully resolved parameters for every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Region detection thresholds.
    pub detection: DetectionConfig,
    /// Mask refinement sequence.
    pub morphology: MorphologyConfig,
    /// Inpainting parameters.
    pub inpaint: InpaintConfig,
    /// Pixel budget; larger images fail detection and take the fallback.
    pub max_pixels: Option<u64>,
    /// Radius of the fallback blur.
    pub fallback_blur_radius: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        ProcessOptions::default().resolve()
    }
}

/// Pipeline stage, used to report where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Building the raw mask.
    Detecting,
    /// Morphological refinement of the mask.
    Refining,
    /// Replacing masked pixels.
    Inpainting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detecting => "detecting",
            Self::Refining => "refining",
            Self::Inpainting => "inpainting",
        })
    }
}

/// A stage error caught by the pipeline.
#[derive(Debug)]
pub struct StageFailure {
    /// Stage that failed.
    pub stage: Stage,
    /// What went wrong.
    pub error: Error,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

/// Run `stages`, turning a panic into a failure of whichever stage was
/// current when it happened.
fn catch_stage_panic<T>(
    current: &Cell<Stage>,
    stages: impl FnOnce() -> std::result::Result<T, StageFailure>,
) -> std::result::Result<T, StageFailure> {
    panic::catch_unwind(AssertUnwindSafe(stages)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Err(StageFailure {
            stage: current.get(),
            error: Error::StagePanicked(message),
        })
    })
}

/// How a removal call ended.
#[derive(Debug, Default)]
pub enum Outcome {
    /// Masked pixels were inpainted.
    Inpainted,
    /// The refined mask was empty; the image is unchanged.
    #[default]
    NothingDetected,
    /// A stage failed and the fallback blur was applied instead.
    Fallback(StageFailure),
    /// A stage failed, the fallback failed too, and the image is unchanged.
    Untouched {
        /// The original stage failure.
        failure: StageFailure,
        /// Why the fallback could not run.
        fallback_error: Error,
    },
}

/// Diagnostics returned from [`WatermarkRemover::remove`].
#[derive(Debug, Default)]
pub struct RemovalReport {
    /// How the call ended.
    pub outcome: Outcome,
    /// Pixels flagged by detection.
    pub flagged_pixels: u64,
    /// Pixels in the refined mask.
    pub masked_pixels: u64,
    /// Masked pixels that were replaced.
    pub inpainted_pixels: u64,
    /// Masked pixels left as-is for lack of samples.
    pub unresolved_pixels: u64,
}

impl RemovalReport {
    /// Whether a stage failed and the result is degraded or untouched.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Fallback(_) | Outcome::Untouched { .. }
        )
    }
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether the file was read, processed, and written.
    pub success: bool,
    /// Whether the fallback chain was used.
    pub fallback: bool,
    /// Pixels in the refined mask.
    pub masked_pixels: u64,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failed(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            fallback: false,
            masked_pixels: 0,
            message,
        }
    }
}

/// Runs the removal pipeline with one resolved configuration.
///
/// Holds no per-image state, so one remover can be shared across threads.
#[derive(Debug, Clone)]
pub struct WatermarkRemover {
    config: PipelineConfig,
}

impl WatermarkRemover {
    /// Create a remover from user options.
    #[must_use]
    pub fn new(options: &ProcessOptions) -> Self {
        if let Some(text) = &options.watermark_text {
            tracing::debug!(text = %text, "watermark text hint is not used by pixel heuristics");
        }
        Self::from_config(options.resolve())
    }

    /// Create a remover from an already resolved configuration.
    #[must_use]
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the raw watermark mask for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooLarge`] above the pixel budget, or the
    /// detector's configuration errors.
    pub fn detect(&self, image: &RgbaImage) -> Result<DetectionResult> {
        let (width, height) = image.dimensions();
        if let Some(max_pixels) = self.config.max_pixels {
            if u64::from(width) * u64::from(height) > max_pixels {
                return Err(Error::ImageTooLarge {
                    width,
                    height,
                    max_pixels,
                });
            }
        }
        detection::detect(image, &self.config.detection)
    }

    /// Remove watermarks from `image` in place.
    ///
    /// Never fails: if a stage errors or panics the image is blurred
    /// instead, and if the blur fails as well the image is left untouched.
    /// Alpha is never modified.
    pub fn remove(&self, image: &mut RgbaImage) -> RemovalReport {
        let span = tracing::debug_span!(
            "remove_watermark",
            width = image.width(),
            height = image.height()
        );
        let _guard = span.enter();

        let mut report = RemovalReport::default();
        let current = Cell::new(Stage::Detecting);
        let source: &RgbaImage = image;
        let stages = catch_stage_panic(&current, || self.run_stages(source, &mut report, &current));
        match stages {
            Ok(Some(output)) => {
                *image = output;
                report.outcome = Outcome::Inpainted;
            }
            Ok(None) => report.outcome = Outcome::NothingDetected,
            Err(failure) => {
                tracing::warn!(%failure, "falling back to box blur");
                match filters::box_blur(image, self.config.fallback_blur_radius) {
                    Ok(blurred) => {
                        *image = blurred;
                        report.outcome = Outcome::Fallback(failure);
                    }
                    Err(fallback_error) => {
                        tracing::error!(%failure, %fallback_error, "fallback failed, returning input unchanged");
                        report.outcome = Outcome::Untouched {
                            failure,
                            fallback_error,
                        };
                    }
                }
            }
        }
        report
    }

    /// Run detection, refinement and inpainting, recording the running
    /// stage in `current`. `Ok(None)` means the refined mask was empty.
    fn run_stages(
        &self,
        image: &RgbaImage,
        report: &mut RemovalReport,
        current: &Cell<Stage>,
    ) -> std::result::Result<Option<RgbaImage>, StageFailure> {
        let fail = |stage| move |error| StageFailure { stage, error };

        current.set(Stage::Detecting);
        let detected = self.detect(image).map_err(fail(Stage::Detecting))?;
        report.flagged_pixels = detected.flagged_pixels;

        current.set(Stage::Refining);
        let mask = morphology::refine(&detected.mask, &self.config.morphology)
            .map_err(fail(Stage::Refining))?;
        report.masked_pixels = buffer::count_flagged(&mask);
        if report.masked_pixels == 0 {
            tracing::debug!("no watermark candidates");
            return Ok(None);
        }

        current.set(Stage::Inpainting);
        let (output, stats) = inpaint::inpaint(image, &mask, &self.config.inpaint)
            .map_err(fail(Stage::Inpainting))?;
        report.inpainted_pixels = stats.replaced;
        report.unresolved_pixels = stats.unresolved;
        Ok(Some(output))
    }

    /// Process a single image file: load, remove, save.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let mut image = match image::open(input) {
            Ok(img) => img.to_rgba8(),
            Err(e) => return ProcessResult::failed(input, format!("Failed to load: {e}")),
        };

        let report = self.remove(&mut image);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ProcessResult::failed(
                        input,
                        format!("Failed to create output directory: {e}"),
                    );
                }
            }
        }

        if let Err(e) = save_image(&image, output) {
            return ProcessResult::failed(input, format!("Failed to save: {e}"));
        }

        let message = match &report.outcome {
            Outcome::Inpainted => format!(
                "Inpainted {} of {} masked pixels",
                report.inpainted_pixels, report.masked_pixels
            ),
            Outcome::NothingDetected => "No watermark candidates found".to_string(),
            Outcome::Fallback(failure) => format!("Blurred instead ({failure})"),
            Outcome::Untouched { failure, .. } => format!("Left unchanged ({failure})"),
        };

        ProcessResult {
            path: input.to_path_buf(),
            success: true,
            fallback: report.is_degraded(),
            masked_pixels: report.masked_pixels,
            message,
        }
    }

    /// Process all supported images in a directory, writing results under
    /// `output_dir` with the same file names.
    ///
    /// Runs files in parallel when the `parallel` feature is enabled.
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let jobs: Vec<(PathBuf, PathBuf)> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .filter_map(|p| {
                    let out = output_dir.join(p.file_name()?);
                    Some((p, out))
                })
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        tracing::debug!(count = jobs.len(), dir = %input_dir.display(), "processing directory");

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            jobs.par_iter()
                .map(|(input, output)| self.process_file(input, output))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            jobs.iter()
                .map(|(input, output)| self.process_file(input, output))
                .collect()
        }
    }
}

/// Remove watermarks from a raw RGBA buffer.
///
/// Returns the processed buffer (same length as the input) and the
/// diagnostics report.
///
/// # Errors
///
/// Returns [`Error::InvalidImageShape`] if `pixels.len() != width * height * 4`
/// or a dimension is zero. Processing failures are never returned; see
/// [`WatermarkRemover::remove`].
pub fn remove_watermark(
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    options: &ProcessOptions,
) -> Result<(Vec<u8>, RemovalReport)> {
    let mut image = buffer::from_raw_rgba(width, height, pixels)?;
    let report = WatermarkRemover::new(options).remove(&mut image);
    Ok((image.into_raw(), report))
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff"
        ),
        None => false,
    }
}

/// Save an RGBA image, choosing the encoder from the file extension.
///
/// JPEG drops alpha and is written at quality 100; the other formats keep
/// all four channels. PNG is lossless and the recommended output.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = std::io::BufWriter::new(std::fs::File::create(path)?);
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Tiff => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"scan.png"` becomes `"scan_cleaned.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_cleaned.{ext}"))
}
