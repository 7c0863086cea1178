// Text Extraction Service
// Converts PDF / DOCX / plain-text documents into a single text blob.
// Each format is served by an ordered list of strategies:
// - pdf: text layer first, page recognition when the text layer is sparse or unreadable
// - docx: docx-rs paragraphs, raw document.xml as a fallback
// - txt: strict UTF-8

pub mod docx;
pub mod ocr;
pub mod pdf;

use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Document, DocumentKind};
use crate::services::config_store::AnalysisConfig;

pub use docx::{DocxParagraphs, DocxRawXml};
pub use ocr::{LineRecognizer, PageRasterizer, ScanRecognition, TesseractRecognizer};
pub use pdf::{PdfExtraction, PdfTextLayer};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("{0}")]
    Failed(String),
}

/// One way of getting text out of document bytes.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the strategy's runtime dependencies are present.
    fn is_available(&self) -> bool {
        true
    }

    fn attempt(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

pub struct PlainText;

impl ExtractionStrategy for PlainText {
    fn name(&self) -> &'static str {
        "plain_text"
    }

    fn attempt(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| ExtractionError::Failed(format!("Error reading TXT: {}", e)))
    }
}

/// Try strategies in order; the first success wins. When all fail, every
/// cause is kept in the error message.
pub fn first_success(
    strategies: &[Box<dyn ExtractionStrategy>],
    bytes: &[u8],
    context: &str,
) -> Result<String, ExtractionError> {
    let mut causes: Vec<String> = Vec::new();

    for strategy in strategies.iter().filter(|s| s.is_available()) {
        match strategy.attempt(bytes) {
            Ok(text) => return Ok(text),
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "extraction.strategy_failed");
                causes.push(e.to_string());
            }
        }
    }

    if causes.is_empty() {
        causes.push("no extraction strategy available".to_string());
    }
    Err(ExtractionError::Failed(format!("{}: {}", context, causes.join(" | "))))
}

pub struct TextExtractor {
    pdf: PdfExtraction,
    docx: Vec<Box<dyn ExtractionStrategy>>,
    plain: Box<dyn ExtractionStrategy>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl TextExtractor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            pdf: PdfExtraction::new(
                Box::new(PdfTextLayer),
                Box::new(ScanRecognition::detect(config.render_scale)),
                config.sparse_text_threshold,
            ),
            docx: vec![Box::new(DocxParagraphs), Box::new(DocxRawXml)],
            plain: Box::new(PlainText),
        }
    }

    /// Replace the PDF policy, e.g. with fake strategies in tests.
    pub fn with_pdf(mut self, pdf: PdfExtraction) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn extract(&self, document: &Document) -> Result<String, ExtractionError> {
        let kind = document
            .kind()
            .ok_or_else(|| ExtractionError::UnsupportedFormat(document.declared_type.clone()))?;

        let started = Instant::now();
        let bytes = document.bytes.as_slice();
        let text = match kind {
            DocumentKind::Pdf => self.pdf.extract(bytes)?,
            DocumentKind::Docx => first_success(&self.docx, bytes, "Error reading DOCX")?,
            DocumentKind::Txt => self.plain.attempt(bytes)?,
        };

        info!(
            filename = %document.filename,
            kind = %kind,
            bytes = bytes.len(),
            chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction.done"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<&'static str, &'static str>);

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn attempt(&self, _bytes: &[u8]) -> Result<String, ExtractionError> {
            self.0
                .map(str::to_string)
                .map_err(|e| ExtractionError::Failed(e.to_string()))
        }
    }

    #[test]
    fn test_unsupported_format_before_reading() {
        let doc = Document::new("deal.rtf", "rtf", b"{\\rtf1}".to_vec());
        let err = TextExtractor::default().extract(&doc).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(ref t) if t == "rtf"));
    }

    #[test]
    fn test_plain_text_utf8() {
        let doc = Document::new("a.txt", "txt", "Clause 1 – fees".as_bytes().to_vec());
        assert_eq!(TextExtractor::default().extract(&doc).unwrap(), "Clause 1 – fees");
    }

    #[test]
    fn test_plain_text_empty_is_ok() {
        let doc = Document::new("empty.txt", "txt", Vec::new());
        assert_eq!(TextExtractor::default().extract(&doc).unwrap(), "");
    }

    #[test]
    fn test_plain_text_invalid_utf8() {
        let doc = Document::new("bad.txt", "txt", vec![0xff, 0xfe, 0x00]);
        let err = TextExtractor::default().extract(&doc).unwrap_err();
        assert!(err.to_string().starts_with("Error reading TXT"));
    }

    #[test]
    fn test_first_success_joins_causes() {
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(Fixed(Err("zip broken"))),
            Box::new(Fixed(Err("xml missing"))),
        ];
        let err = first_success(&strategies, b"", "Error reading DOCX").unwrap_err();
        assert_eq!(err.to_string(), "Error reading DOCX: zip broken | xml missing");

        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(Fixed(Err("zip broken"))),
            Box::new(Fixed(Ok("recovered"))),
        ];
        assert_eq!(first_success(&strategies, b"", "ctx").unwrap(), "recovered");
    }

    #[test]
    fn test_garbage_docx_fails_with_both_causes() {
        let doc = Document::new("x.docx", "docx", b"not a zip".to_vec());
        let err = TextExtractor::default().extract(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Error reading DOCX: "));
        assert!(msg.contains(" | "));
    }
}
