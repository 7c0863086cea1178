// Page Recognition
// Fallback for scanned PDFs: rasterize each page, then run line recognition.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::debug;

use super::{ExtractionError, ExtractionStrategy};

/// Renders PDF pages to PNG images.
pub trait PageRasterizer: Send + Sync {
    fn is_available(&self) -> bool;
    fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>, ExtractionError>;
}

/// Recognizes text lines in a PNG image, top to bottom.
pub trait LineRecognizer: Send + Sync {
    fn is_available(&self) -> bool;
    fn recognize(&self, png: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Stand-in used when the crate is built without a rendering backend.
pub struct NoRasterizer;

impl PageRasterizer for NoRasterizer {
    fn is_available(&self) -> bool {
        false
    }

    fn render_pages(&self, _pdf: &[u8], _scale: f32) -> Result<Vec<Vec<u8>>, ExtractionError> {
        Err(ExtractionError::Failed(
            "no page rasterizer compiled in (enable the `pdfium` feature)".to_string(),
        ))
    }
}

#[cfg(feature = "pdfium")]
pub use pdfium_backend::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium_backend {
    use super::{ExtractionError, PageRasterizer};
    use pdfium_render::prelude::*;
    use std::io::Cursor;

    /// Renders pages with a system pdfium library bound at runtime.
    pub struct PdfiumRasterizer;

    fn failed(context: &str, e: impl std::fmt::Display) -> ExtractionError {
        ExtractionError::Failed(format!("{}: {}", context, e))
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn is_available(&self) -> bool {
            Pdfium::bind_to_system_library().is_ok()
        }

        fn render_pages(&self, pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>, ExtractionError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|e| failed("pdfium unavailable", e))?;
            let pdfium = Pdfium::new(bindings);
            let document = pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(|e| failed("pdfium could not open document", e))?;
            let config = PdfRenderConfig::new().scale_page_by_factor(scale);

            let mut pages = Vec::new();
            for (index, page) in document.pages().iter().enumerate() {
                let image = page
                    .render_with_config(&config)
                    .map_err(|e| failed(&format!("render page {}", index + 1), e))?
                    .as_image();
                let mut png = Vec::new();
                image
                    .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                    .map_err(|e| failed(&format!("encode page {}", index + 1), e))?;
                pages.push(png);
            }
            Ok(pages)
        }
    }
}

pub fn default_rasterizer() -> Box<dyn PageRasterizer> {
    #[cfg(feature = "pdfium")]
    {
        Box::new(PdfiumRasterizer)
    }

    #[cfg(not(feature = "pdfium"))]
    {
        Box::new(NoRasterizer)
    }
}

/// Runs the `tesseract` binary over stdin/stdout.
pub struct TesseractRecognizer {
    binary: String,
    language: Option<String>,
    available: OnceLock<bool>,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract", None)
    }
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<String>, language: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            language,
            available: OnceLock::new(),
        }
    }
}

impl LineRecognizer for TesseractRecognizer {
    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            Command::new(&self.binary)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }

    fn recognize(&self, png: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stdin").arg("stdout");
        if let Some(lang) = &self.language {
            cmd.arg("-l").arg(lang);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractionError::Failed(format!("failed to start {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(png)
                .map_err(|e| ExtractionError::Failed(format!("failed to send page image: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ExtractionError::Failed(format!("{} did not finish: {}", self.binary, e)))?;
        if !output.status.success() {
            return Err(ExtractionError::Failed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Recognition-based extraction: one rasterized page at a time.
pub struct ScanRecognition {
    rasterizer: Box<dyn PageRasterizer>,
    recognizer: Box<dyn LineRecognizer>,
    scale: f32,
}

impl ScanRecognition {
    pub fn new(rasterizer: Box<dyn PageRasterizer>, recognizer: Box<dyn LineRecognizer>, scale: f32) -> Self {
        Self {
            rasterizer,
            recognizer,
            scale,
        }
    }

    /// Default backends; unavailable ones make the strategy report itself unavailable.
    pub fn detect(scale: f32) -> Self {
        Self::new(default_rasterizer(), Box::new(TesseractRecognizer::default()), scale)
    }

    fn recognize_pages(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let pages = self.rasterizer.render_pages(bytes, self.scale)?;
        let mut texts = Vec::with_capacity(pages.len());
        for (index, png) in pages.iter().enumerate() {
            let lines = self.recognizer.recognize(png)?;
            debug!(page = index + 1, lines = lines.len(), "ocr.page");
            if !lines.is_empty() {
                texts.push(lines.join("\n"));
            }
        }
        Ok(texts.join("\n"))
    }
}

impl ExtractionStrategy for ScanRecognition {
    fn name(&self) -> &'static str {
        "scan_recognition"
    }

    fn is_available(&self) -> bool {
        self.rasterizer.is_available() && self.recognizer.is_available()
    }

    fn attempt(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        self.recognize_pages(bytes)
            .map_err(|e| ExtractionError::Failed(format!("OCR Extraction Failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRasterizer {
        pages: usize,
    }

    impl PageRasterizer for FakeRasterizer {
        fn is_available(&self) -> bool {
            true
        }

        fn render_pages(&self, _pdf: &[u8], scale: f32) -> Result<Vec<Vec<u8>>, ExtractionError> {
            assert_eq!(scale, 2.0);
            Ok((0..self.pages).map(|i| vec![i as u8]).collect())
        }
    }

    /// Page 0 has two lines, page 1 is blank, later pages one line each.
    struct FakeRecognizer;

    impl LineRecognizer for FakeRecognizer {
        fn is_available(&self) -> bool {
            true
        }

        fn recognize(&self, png: &[u8]) -> Result<Vec<String>, ExtractionError> {
            match png[0] {
                0 => Ok(vec!["AGREEMENT".to_string(), "1. Fees".to_string()]),
                1 => Ok(Vec::new()),
                n => Ok(vec![format!("page {}", n + 1)]),
            }
        }
    }

    struct BrokenRecognizer;

    impl LineRecognizer for BrokenRecognizer {
        fn is_available(&self) -> bool {
            true
        }

        fn recognize(&self, _png: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Err(ExtractionError::Failed("model missing".to_string()))
        }
    }

    #[test]
    fn test_pages_and_lines_joined_with_newlines() {
        let rasterizer = FakeRasterizer { pages: 3 };
        let scan = ScanRecognition::new(Box::new(rasterizer), Box::new(FakeRecognizer), 2.0);
        assert!(scan.is_available());
        assert_eq!(scan.attempt(b"%PDF").unwrap(), "AGREEMENT\n1. Fees\npage 3");
    }

    #[test]
    fn test_recognizer_failure_is_wrapped() {
        let rasterizer = FakeRasterizer { pages: 1 };
        let scan = ScanRecognition::new(Box::new(rasterizer), Box::new(BrokenRecognizer), 2.0);
        let msg = scan.attempt(b"%PDF").unwrap_err().to_string();
        assert_eq!(msg, "OCR Extraction Failed: model missing");
    }

    #[test]
    fn test_unavailable_rasterizer_disables_strategy() {
        let scan = ScanRecognition::new(Box::new(NoRasterizer), Box::new(FakeRecognizer), 2.0);
        assert!(!scan.is_available());
    }

    #[test]
    fn test_missing_tesseract_binary_is_unavailable() {
        let recognizer = TesseractRecognizer::new("definitely-not-a-real-ocr-binary", None);
        assert!(!recognizer.is_available());
    }
}
