//! Error types for the pixel-watermark-removal crate.

/// Errors that can occur during watermark detection and removal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The raw pixel buffer does not match `width * height * 4`.
    #[error("invalid image shape: {width}x{height} needs {expected} RGBA bytes, got {actual}")]
    InvalidImageShape {
        /// Declared image width in pixels.
        width: u32,
        /// Declared image height in pixels.
        height: u32,
        /// Required buffer length in bytes.
        expected: usize,
        /// Actual buffer length in bytes.
        actual: usize,
    },

    /// A mask does not have the same dimensions as the image it applies to.
    #[error("mask is {mask_width}x{mask_height} but image is {image_width}x{image_height}")]
    MaskDimensions {
        /// Mask width in pixels.
        mask_width: u32,
        /// Mask height in pixels.
        mask_height: u32,
        /// Image width in pixels.
        image_width: u32,
        /// Image height in pixels.
        image_height: u32,
    },

    /// A stage was configured with values it cannot work with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The image exceeds the configured pixel budget.
    #[error("image too large ({width}x{height}), limit is {max_pixels} pixels")]
    ImageTooLarge {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Configured maximum pixel count.
        max_pixels: u64,
    },

    /// A pipeline stage panicked; the payload message is kept.
    #[error("stage panicked: {0}")]
    StagePanicked(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
