//! Text extraction dispatch.
//!
//! Turns raw document bytes plus a declared media type into plain UTF-8 text.
//! Dispatch is a closed match over [`SupportedMimeType`]: PDFs go through
//! embedded-text extraction with an OCR fallback for image-only files, the
//! XML family goes through a generic structured-text extractor, and text/JSON
//! types are read as UTF-8 directly.

use tracing::{debug, info, warn};

use crate::mime::SupportedMimeType;
use crate::ocr::{OcrEngine, OcrError};

/// Rendering resolution for OCR page rasterization.
const OCR_RENDER_DPI: u32 = 300;

/// A PDF whose embedded text trims to this many characters or fewer is
/// treated as image-only and sent through OCR.
const PDF_TEXT_THRESHOLD: usize = 50;

/// Extraction error. The upload pipeline wraps this into its processing
/// failure with the cause preserved.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("document is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("XML extraction failed: {0}")]
    Xml(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// Extract plain text from `data` according to its declared media type.
///
/// The caller has already validated the type against the supported set;
/// this function only sees supported variants.
pub fn extract_text(
    data: &[u8],
    mime_type: SupportedMimeType,
    ocr: &dyn OcrEngine,
) -> Result<String, ExtractError> {
    debug!(mime_type = %mime_type, size = data.len(), "extracting text");
    match mime_type {
        SupportedMimeType::Pdf => extract_pdf(data, ocr),
        SupportedMimeType::Text | SupportedMimeType::Json | SupportedMimeType::FhirJson => {
            Ok(String::from_utf8(data.to_vec())?)
        }
        SupportedMimeType::Xml | SupportedMimeType::FhirXml | SupportedMimeType::Hl7V3 => {
            extract_xml_text(data)
        }
    }
}

/// Extract embedded PDF text; fall back to per-page OCR when the document
/// appears to be image-only.
fn extract_pdf(data: &[u8], ocr: &dyn OcrEngine) -> Result<String, ExtractError> {
    let embedded =
        pdf_extract::extract_text_from_mem(data).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    if embedded.trim().chars().count() > PDF_TEXT_THRESHOLD {
        return Ok(embedded);
    }

    info!("PDF appears to be image-based, applying OCR");
    match ocr_pdf(data, ocr) {
        Ok(text) => Ok(text),
        Err(OcrError::Unavailable) => {
            warn!("no OCR engine configured, falling back to empty text");
            Ok(String::new())
        }
        Err(e) => Err(ExtractError::Ocr(e)),
    }
}

/// Run OCR over every page, concatenating page results separated by a blank
/// line.
fn ocr_pdf(data: &[u8], ocr: &dyn OcrEngine) -> Result<String, OcrError> {
    let pages = ocr.page_count(data)?;
    let mut out = String::new();
    for page_index in 0..pages {
        debug!(page = page_index + 1, total = pages, "running OCR on page");
        let image = ocr.render_page(data, page_index, OCR_RENDER_DPI)?;
        let text = ocr.recognize(&image)?;
        out.push_str(&text);
        out.push_str("\n\n");
    }
    Ok(out)
}

/// Generic structured-text extractor for the XML family: collects the text
/// content of every element, whitespace-joined.
fn extract_xml_text(data: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(data);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Text(te)) => {
                let text = te.unescape().unwrap_or_default();
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(trimmed);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
