//! Remove text and rectangular watermarks with classical pixel heuristics.
//!
//! No machine learning is involved. The pipeline runs three stages over an
//! RGBA image:
//!
//! 1. [`detection`] flags bright, edge-like or flat-coloured pixels,
//! 2. [`morphology`] closes gaps and drops isolated pixels in that mask,
//! 3. [`inpaint`] replaces each masked pixel with a distance-weighted
//!    average of the unmasked pixels around it.
//!
//! If a stage fails, the image is blurred lightly instead; if that fails
//! too, it is returned unchanged. Results are heuristic and may leave
//! visible artifacts.
//!
//! # Quick Start
//!
//! ```no_run
//! use pixel_watermark_removal::{ProcessOptions, WatermarkRemover};
//!
//! let remover = WatermarkRemover::new(&ProcessOptions::default());
//! let mut img = image::open("scan.png").unwrap().to_rgba8();
//! let report = remover.remove(&mut img);
//! println!("replaced {} pixels", report.inpainted_pixels);
//! img.save("scan_cleaned.png").unwrap();
//! ```
//!
//! # Raw buffers
//!
//! ```
//! use pixel_watermark_removal::{remove_watermark, ProcessOptions};
//!
//! let pixels = vec![128u8; 16 * 16 * 4];
//! let (out, _report) = remove_watermark(16, 16, pixels, &ProcessOptions::default()).unwrap();
//! assert_eq!(out.len(), 16 * 16 * 4);
//! ```

#![deny(missing_docs)]

pub mod buffer;
pub mod detection;
mod engine;
pub mod error;
pub mod filters;
pub mod inpaint;
pub mod morphology;
pub mod preset;

pub use engine::{
    default_output_path, is_supported_image, remove_watermark, save_image, Outcome,
    PipelineConfig, ProcessOptions, ProcessResult, RemovalReport, Stage, StageFailure,
    WatermarkRemover, DEFAULT_FALLBACK_BLUR_RADIUS, DEFAULT_MAX_PIXELS,
};
pub use error::{Error, Result};
pub use preset::Algorithm;
