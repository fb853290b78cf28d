//! OCR engine boundary.
//!
//! The pipeline never runs OCR itself; it renders pages and recognizes text
//! through an injected [`OcrEngine`]. Deployments wire in a real engine;
//! [`DisabledOcr`] is the default and makes image-only PDFs degrade to empty
//! extracted text with a logged warning instead of failing the upload.

use thiserror::Error;

/// A rendered page image handed to the recognizer.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixel data.
    pub data: Vec<u8>,
}

/// Errors produced by an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("no OCR engine is configured")]
    Unavailable,

    #[error("failed to load PDF document for rendering: {0}")]
    Document(String),

    #[error("failed to render page {page_index}: {reason}")]
    Render { page_index: usize, reason: String },

    #[error("text recognition failed on page {page_index}: {reason}")]
    Recognition { page_index: usize, reason: String },
}

/// Page rendering and text recognition for image-only documents.
///
/// `render_page` rasterizes one page of a PDF at the requested resolution;
/// `recognize` turns the rendered image into plain text. Implementations must
/// be safe to call concurrently from multiple workers.
pub trait OcrEngine: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, pdf: &[u8]) -> Result<usize, OcrError>;

    /// Render a single page at the given DPI.
    fn render_page(&self, pdf: &[u8], page_index: usize, dpi: u32) -> Result<PageImage, OcrError>;

    /// Recognize text in a rendered page image.
    fn recognize(&self, image: &PageImage) -> Result<String, OcrError>;
}

/// Engine used when no OCR runtime is configured. Every call reports
/// [`OcrError::Unavailable`].
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn page_count(&self, _pdf: &[u8]) -> Result<usize, OcrError> {
        Err(OcrError::Unavailable)
    }

    fn render_page(
        &self,
        _pdf: &[u8],
        _page_index: usize,
        _dpi: u32,
    ) -> Result<PageImage, OcrError> {
        Err(OcrError::Unavailable)
    }

    fn recognize(&self, _image: &PageImage) -> Result<String, OcrError> {
        Err(OcrError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_engine_reports_unavailable() {
        let engine = DisabledOcr;
        assert!(matches!(
            engine.page_count(b"%PDF-"),
            Err(OcrError::Unavailable)
        ));
        assert!(matches!(
            engine.render_page(b"%PDF-", 0, 300),
            Err(OcrError::Unavailable)
        ));
    }
}
