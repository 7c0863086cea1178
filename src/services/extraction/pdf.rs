// PDF Extraction
// Text layer via pdf-extract, with a page-recognition fallback for scanned files.

use tracing::{info, warn};

use super::{ExtractionError, ExtractionStrategy};

/// Direct text-layer extraction, page by page.
pub struct PdfTextLayer;

impl ExtractionStrategy for PdfTextLayer {
    fn name(&self) -> &'static str {
        "pdf_text_layer"
    }

    fn attempt(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed files; treat that as a failure.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| ExtractionError::Failed("PDF parser aborted on malformed input".to_string()))?
            .map_err(|e| ExtractionError::Failed(e.to_string()))?;

        Ok(pages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Text layer first; recognition when the text layer is sparse (likely a
/// scan) or unreadable. The longer result wins.
pub struct PdfExtraction {
    direct: Box<dyn ExtractionStrategy>,
    fallback: Box<dyn ExtractionStrategy>,
    sparse_threshold: usize,
}

impl PdfExtraction {
    pub fn new(
        direct: Box<dyn ExtractionStrategy>,
        fallback: Box<dyn ExtractionStrategy>,
        sparse_threshold: usize,
    ) -> Self {
        Self {
            direct,
            fallback,
            sparse_threshold,
        }
    }

    pub fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let direct_err = match self.direct.attempt(bytes) {
            Ok(text) => return Ok(self.maybe_recognize(bytes, text)),
            Err(e) => e,
        };

        if !self.fallback.is_available() {
            return Err(ExtractionError::Failed(format!("Error reading PDF: {}", direct_err)));
        }

        warn!(error = %direct_err, fallback = self.fallback.name(), "pdf.text_layer_failed");
        self.fallback.attempt(bytes).map_err(|fallback_err| {
            ExtractionError::Failed(format!(
                "Error reading PDF (OCR failed too): {} | {}",
                direct_err, fallback_err
            ))
        })
    }

    fn maybe_recognize(&self, bytes: &[u8], text: String) -> String {
        let direct_chars = text.trim().chars().count();
        if direct_chars >= self.sparse_threshold {
            return text;
        }
        if !self.fallback.is_available() {
            info!(chars = direct_chars, "pdf.sparse_text_no_recognizer");
            return text;
        }

        info!(chars = direct_chars, fallback = self.fallback.name(), "pdf.sparse_text_recognizing");
        match self.fallback.attempt(bytes) {
            Ok(recognized) if recognized.chars().count() > text.chars().count() => recognized,
            Ok(_) => text,
            Err(e) => {
                warn!(error = %e, "pdf.recognition_failed_keeping_text_layer");
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeStrategy {
        result: Result<String, String>,
        available: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeStrategy {
        fn ok(text: String) -> Self {
            Self {
                result: Ok(text),
                available: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn err(msg: &str) -> Self {
            Self {
                result: Err(msg.to_string()),
                available: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }
    }

    impl ExtractionStrategy for FakeStrategy {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn attempt(&self, _bytes: &[u8]) -> Result<String, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(ExtractionError::Failed)
        }
    }

    #[test]
    fn test_sparse_text_uses_longer_recognition() {
        let direct = "x".repeat(40);
        let scanned = "y".repeat(200);
        let fallback = FakeStrategy::ok(scanned.clone());
        let calls = fallback.calls.clone();
        let pdf = PdfExtraction::new(Box::new(FakeStrategy::ok(direct)), Box::new(fallback), 100);

        assert_eq!(pdf.extract(b"%PDF").unwrap(), scanned);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dense_text_skips_recognition() {
        let direct = "word ".repeat(40);
        let fallback = FakeStrategy::ok("z".repeat(500));
        let calls = fallback.calls.clone();
        let pdf = PdfExtraction::new(Box::new(FakeStrategy::ok(direct.clone())), Box::new(fallback), 100);

        assert_eq!(pdf.extract(b"%PDF").unwrap(), direct);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sparse_text_keeps_direct_when_recognition_shorter() {
        let pdf = PdfExtraction::new(
            Box::new(FakeStrategy::ok("a".repeat(40))),
            Box::new(FakeStrategy::ok("b".repeat(10))),
            100,
        );
        assert_eq!(pdf.extract(b"%PDF").unwrap(), "a".repeat(40));
    }

    #[test]
    fn test_sparse_text_without_recognizer_returns_direct() {
        let pdf = PdfExtraction::new(
            Box::new(FakeStrategy::ok("tiny".to_string())),
            Box::new(FakeStrategy::ok("c".repeat(300)).unavailable()),
            100,
        );
        assert_eq!(pdf.extract(b"%PDF").unwrap(), "tiny");
    }

    #[test]
    fn test_sparse_text_recognition_error_keeps_direct() {
        let pdf = PdfExtraction::new(
            Box::new(FakeStrategy::ok("tiny".to_string())),
            Box::new(FakeStrategy::err("engine crashed")),
            100,
        );
        assert_eq!(pdf.extract(b"%PDF").unwrap(), "tiny");
    }

    #[test]
    fn test_direct_failure_falls_back() {
        let pdf = PdfExtraction::new(
            Box::new(FakeStrategy::err("xref broken")),
            Box::new(FakeStrategy::ok("recognized page".to_string())),
            100,
        );
        assert_eq!(pdf.extract(b"%PDF").unwrap(), "recognized page");
    }

    #[test]
    fn test_both_failures_are_reported() {
        let pdf = PdfExtraction::new(
            Box::new(FakeStrategy::err("xref broken")),
            Box::new(FakeStrategy::err("OCR Extraction Failed: no pages")),
            100,
        );
        let msg = pdf.extract(b"%PDF").unwrap_err().to_string();
        assert!(msg.contains("xref broken"));
        assert!(msg.contains("OCR Extraction Failed: no pages"));
    }

    #[test]
    fn test_direct_failure_without_recognizer() {
        let pdf = PdfExtraction::new(
            Box::new(FakeStrategy::err("xref broken")),
            Box::new(FakeStrategy::ok(String::new()).unavailable()),
            100,
        );
        assert_eq!(pdf.extract(b"%PDF").unwrap_err().to_string(), "Error reading PDF: xref broken");
    }

    #[test]
    fn test_text_layer_rejects_garbage() {
        assert!(PdfTextLayer.attempt(b"definitely not a pdf").is_err());
    }
}
