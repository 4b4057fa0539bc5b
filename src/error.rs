//! Error kinds surfaced by the score and play pipelines.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input image path does not exist.
    #[error("Image file not found at {0}")]
    MissingFile(PathBuf),

    /// The file exists but could not be decoded as an image.
    #[error("Could not load image at {path}: {reason}")]
    UnreadableImage { path: PathBuf, reason: String },

    /// The configured crop boundaries collapse to an empty rectangle.
    #[error("Crop region is empty or invalid: left={left} top={top} right={right} bottom={bottom}")]
    InvalidCropRegion {
        left: i64,
        top: i64,
        right: i64,
        bottom: i64,
    },

    /// OCR ran but produced no text at all.
    #[error("No text found by the recognition engine")]
    NoTextRecognized,

    /// OCR produced text, but nothing passed the candidate filters.
    #[error("No suitable score found in '{0}'")]
    NoCandidateScore(String),

    /// The recognition engine itself failed.
    #[error("Recognition failed: {0}")]
    Recognition(String),

    /// No visible canvas in any frame of the page.
    #[error("No canvas found in any frame")]
    CanvasNotFound,

    /// The located canvas has no layout box (detached or zero-sized).
    #[error("Unable to get bounding box of canvas")]
    BoundingBoxUnavailable,
}
