use std::io::Cursor;

use crate::error::ProcessError;
use crate::processor::{ScratchImage, TextExtractor};
use crate::sanitize::redact_path;

/// Tesseract-backed text extraction. A fresh engine is created per call and
/// dropped before returning.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    languages: String,
}

impl TesseractExtractor {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self { languages }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    fn recognize(&self, image_data: &[u8]) -> Result<String, ProcessError> {
        // Normalize whatever the rasterizer produced to PNG for leptonica.
        let img = image::load_from_memory(image_data)
            .map_err(|e| ProcessError::Extraction(format!("Failed to load image: {}", e)))?;

        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ProcessError::Extraction(format!("Failed to convert image: {}", e)))?;
        drop(img);

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            ProcessError::Extraction(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::Extraction(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::Extraction(format!("OCR failed: {}", e)))
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract_text(&self, image: ScratchImage) -> Result<String, ProcessError> {
        let _span =
            tracing::info_span!("processor.ocr", image = %redact_path(image.path())).entered();

        let image_data = std::fs::read(image.path()).map_err(|e| {
            ProcessError::Extraction(format!(
                "Failed to read image '{}': {}",
                image.path().display(),
                e
            ))
        })?;

        let text = self.recognize(&image_data)?;
        log::debug!("Recognized {} characters", text.len());
        Ok(text)
    }
}
