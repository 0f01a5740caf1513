//! Image analysis
//!
//! - `extractor`: decode an image and derive its visual features
//! - `quantize`: median-cut color quantization used for palettes

pub mod extractor;
pub mod quantize;

pub use extractor::VisualFeatureExtractor;
