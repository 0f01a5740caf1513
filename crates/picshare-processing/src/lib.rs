//! Picshare Processing Library
//!
//! Pure, synchronous image analysis. Nothing here performs I/O beyond
//! reading the reader it is handed, so it can run on a blocking thread
//! long after the originating request has finished.

pub mod error;
pub mod image;

pub use error::ExtractionError;
pub use crate::image::{quantize, VisualFeatureExtractor};
