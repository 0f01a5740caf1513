use picshare_core::AppError;
use thiserror::Error;

/// Terminal failures of a single extraction attempt.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The bytes are not in any image format we can decode.
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// The format was recognized but the pixel data is truncated or invalid.
    #[error("Corrupt image data: {0}")]
    CorruptImageData(String),
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        AppError::Extraction(err.to_string())
    }
}

impl From<image::ImageError> for ExtractionError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => ExtractionError::UnsupportedImageFormat(e.to_string()),
            other => ExtractionError::CorruptImageData(other.to_string()),
        }
    }
}
