use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextSourceError {
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("Document is not valid UTF-8 text")]
    Encoding,
    #[error("Text extraction failed: {0}")]
    Backend(String),
}

/// Abstraction over a text-extraction backend.
/// Implementations return the concatenated page text of a document.
pub trait TextSource: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, TextSourceError>;

    /// Text for the core: a failing backend degrades to the empty string.
    fn text_or_empty(&self, path: &Path) -> String {
        match self.extract_text(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Text extraction failed for {}: {e}", path.display());
                String::new()
            }
        }
    }
}

impl<T: TextSource + ?Sized> TextSource for Box<T> {
    fn extract_text(&self, path: &Path) -> Result<String, TextSourceError> {
        (**self).extract_text(path)
    }
}

// ── Static backend (always available, used for tests) ─────────────────────────

/// Returns a pre-set string for every document.
pub struct StaticText {
    pub text: String,
}

impl StaticText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextSource for StaticText {
    fn extract_text(&self, _path: &Path) -> Result<String, TextSourceError> {
        Ok(self.text.clone())
    }
}

// ── Plain-text backend ────────────────────────────────────────────────────────

/// Reads text that an external tool has already extracted. A document
/// `foo.pdf` with a sidecar `foo.pdf.txt` or `foo.txt` yields the sidecar;
/// a `.txt` document is read directly.
pub struct PlainTextSource;

impl PlainTextSource {
    fn text_path(path: &Path) -> Option<PathBuf> {
        if is_text_document(path) {
            return Some(path.to_path_buf());
        }
        [sidecar_path(path), path.with_extension("txt")]
            .into_iter()
            .find(|p| p.is_file())
    }
}

impl TextSource for PlainTextSource {
    fn extract_text(&self, path: &Path) -> Result<String, TextSourceError> {
        let Some(text_path) = Self::text_path(path) else {
            return Ok(String::new());
        };
        let bytes = std::fs::read(text_path)?;
        String::from_utf8(bytes).map_err(|_| TextSourceError::Encoding)
    }
}

// ── PDF backend (optional, gated behind `pdf` feature) ───────────────────────

#[cfg(feature = "pdf")]
pub mod pdf_backend {
    use super::{join_pages, TextSource, TextSourceError};
    use std::path::Path;

    /// Reads the embedded text layer of a PDF, pages separated by a blank line.
    pub struct PdfTextSource;

    impl TextSource for PdfTextSource {
        fn extract_text(&self, path: &Path) -> Result<String, TextSourceError> {
            let bytes = std::fs::read(path)?;
            let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
                .map_err(|e| TextSourceError::Backend(e.to_string()))?;
            Ok(join_pages(&pages))
        }
    }
}

/// Page texts as one string, pages separated by a blank line.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n\n")
}

/// Where extracted text for `document` is kept alongside it: `foo.pdf.txt`.
pub fn sidecar_path(document: &Path) -> PathBuf {
    let mut appended = document.as_os_str().to_owned();
    appended.push(".txt");
    PathBuf::from(appended)
}

/// Whether `document` is itself a text file and needs no sidecar.
pub fn is_text_document(document: &Path) -> bool {
    document.extension().is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

/// The default backend for a document: PDF text layer when compiled in,
/// plain-text sidecars otherwise.
pub fn default_source() -> Box<dyn TextSource> {
    #[cfg(feature = "pdf")]
    {
        Box::new(pdf_backend::PdfTextSource)
    }
    #[cfg(not(feature = "pdf"))]
    {
        Box::new(PlainTextSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl TextSource for Failing {
        fn extract_text(&self, _path: &Path) -> Result<String, TextSourceError> {
            Err(TextSourceError::Backend("corrupt xref table".into()))
        }
    }

    #[test]
    fn static_returns_preset_text() {
        let s = StaticText::new("滴滴 电子发票");
        assert_eq!(s.extract_text(Path::new("a.pdf")).unwrap(), "滴滴 电子发票");
    }

    #[test]
    fn failure_degrades_to_empty() {
        assert_eq!(Failing.text_or_empty(Path::new("broken.pdf")), "");
    }

    #[test]
    fn plain_text_reads_txt_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.txt");
        std::fs::write(&path, "订单号：ABC123").unwrap();
        assert_eq!(PlainTextSource.extract_text(&path).unwrap(), "订单号：ABC123");
    }

    #[test]
    fn plain_text_finds_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("invoice.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("invoice.pdf.txt"), "价税合计：¥10.00").unwrap();
        assert_eq!(PlainTextSource.extract_text(&pdf).unwrap(), "价税合计：¥10.00");
    }

    #[test]
    fn plain_text_without_sidecar_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("scan.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        assert_eq!(PlainTextSource.text_or_empty(&pdf), "");
    }

    #[test]
    fn pages_are_separated_by_blank_line() {
        let pages = vec!["第一页".to_string(), "第二页".to_string()];
        assert_eq!(join_pages(&pages), "第一页\n\n第二页");
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn sidecar_appends_txt() {
        assert_eq!(
            sidecar_path(Path::new("invoices/未报销/a.pdf")),
            PathBuf::from("invoices/未报销/a.pdf.txt")
        );
        assert!(is_text_document(Path::new("a.TXT")));
        assert!(!is_text_document(Path::new("a.pdf")));
    }

    #[test]
    fn invalid_utf8_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            PlainTextSource.extract_text(&path),
            Err(TextSourceError::Encoding)
        ));
        assert_eq!(PlainTextSource.text_or_empty(&path), "");
    }
}
