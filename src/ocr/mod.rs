pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{TesseractEngine, TextRecognizer};
pub use extract::{NO_SCORE_SENTINEL, extract_score};
pub use setup::ensure_tesseract;

use std::path::{Path, PathBuf};

use crate::config::{CropBounds, ScoreConfig};
use crate::error::PipelineError;
use preprocess::{crop_image, resolve_crop, to_grayscale};

/// Per-run options for the score reader.
#[derive(Debug, Clone)]
pub struct ScoreOptions {
    /// Region to read; None reads the whole image
    pub crop: Option<CropBounds>,
    pub allowlist: String,
    /// Where to save the cropped region for inspection
    pub debug_crop_path: Option<PathBuf>,
}

impl ScoreOptions {
    pub fn from_config(config: &ScoreConfig, full_image: bool, out_dir: &Path) -> Self {
        let debug_crop_path =
            (!config.debug_crop_file.is_empty()).then(|| out_dir.join(&config.debug_crop_file));
        Self {
            crop: (!full_image).then_some(config.crop),
            allowlist: config.allowlist.clone(),
            debug_crop_path,
        }
    }
}

/// High-level function: screenshot → score string.
///
/// Loads the image, crops the score region, converts to grayscale, runs the
/// recognizer restricted to the allowlist and picks the best candidate.
pub fn read_score(
    recognizer: &dyn TextRecognizer,
    image_path: &Path,
    options: &ScoreOptions,
) -> Result<String, PipelineError> {
    if !image_path.exists() {
        return Err(PipelineError::MissingFile(image_path.to_path_buf()));
    }

    let original = image::open(image_path)
        .map_err(|e| PipelineError::UnreadableImage {
            path: image_path.to_path_buf(),
            reason: e.to_string(),
        })?
        .to_rgba8();

    let (w, h) = original.dimensions();
    crate::log(&format!("Original image dimensions: Width={}, Height={}", w, h));

    let region = match &options.crop {
        Some(bounds) => {
            let rect = resolve_crop(w, h, bounds)?;
            crate::log(&format!(
                "Cropping image to region: x={} y={} width={} height={}",
                rect.x, rect.y, rect.width, rect.height
            ));
            crop_image(&original, &rect)
        }
        None => original,
    };

    if let Some(path) = &options.debug_crop_path {
        match region.save(path) {
            Ok(()) => crate::log(&format!("Saved cropped image to: {}", path.display())),
            Err(e) => crate::log(&format!(
                "Failed to save cropped image to {}: {}",
                path.display(),
                e
            )),
        }
    }

    let gray = to_grayscale(&region);
    let fragments = recognizer
        .recognize(&gray, &options.allowlist)
        .map_err(|e| PipelineError::Recognition(e.to_string()))?;

    let text = fragments
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        return Err(PipelineError::NoTextRecognized);
    }

    crate::log(&format!("OCR raw text: '{}'", text));

    extract_score(&text).ok_or(PipelineError::NoCandidateScore(text))
}
