//! Document processing stages.
//!
//! The coordinator depends on the [`Rasterizer`] and [`TextExtractor`]
//! traits rather than on the concrete poppler/tesseract implementations so
//! that tests can substitute fakes.

pub mod ocr;
pub mod raster;
pub mod validator;

use std::path::Path;

use crate::error::ProcessError;

pub use ocr::TesseractExtractor;
pub use raster::{PdftoppmRasterizer, ScratchImage};
pub use validator::{validate_bytes, Verdict};

/// Renders page one of a document to a raster image.
pub trait Rasterizer: Send + Sync {
    /// Produces a fresh image owned by the returned guard.
    fn rasterize_first_page(&self, source: &Path) -> Result<ScratchImage, ProcessError>;
}

/// Runs OCR over a raster image.
///
/// Takes the image by value: the image is consumed and removed from disk
/// whether recognition succeeds or fails.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image: ScratchImage) -> Result<String, ProcessError>;
}
