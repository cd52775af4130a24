//! Error types for the CDR pipeline.

use thiserror::Error;

/// Result type alias for CDR operations.
pub type Result<T> = std::result::Result<T, CdrError>;

/// Errors from the in-worker sanitization pipeline.
///
/// Structural CDR failure is deliberately *not* represented here as fatal:
/// the pipeline copies the pre-CDR document forward and lets the pixel pass
/// disarm it. Everything else — conversion, rasterization, re-emission,
/// validation — fails the job.
#[derive(Debug, Error)]
pub enum CdrError {
    /// PDF tree could not be parsed or written.
    #[error("pdf structure error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Image could not be decoded or encoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem failure inside the pipeline.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The input extension is outside the accepted set.
    #[error("unsupported input type: {0}")]
    UnsupportedType(String),

    /// The office-suite converter failed.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The office-suite converter exceeded its time budget.
    #[error("conversion timed out after {0} s")]
    ConversionTimeout(u64),

    /// The rasterizer could not render the disarmed document.
    #[error("rasterization failed: {0}")]
    Rasterize(String),

    /// The final artifact failed a structural safety assertion.
    #[error("output validation failed: {0}")]
    Validation(String),
}
