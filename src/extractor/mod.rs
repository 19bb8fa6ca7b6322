// Extractor module
// Turns uploaded document bytes into plain text


use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use crate::{QaError, Result};

/// An uploaded document: a display name and its raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    #[inline]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a document from disk, named after its file name
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }

    fn is_pdf(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            || self.bytes.starts_with(b"%PDF-")
    }
}

/// Produces the text of a single document
pub trait TextExtractor: Send + Sync {
    fn extract(&self, document: &SourceDocument) -> Result<String>;
}

/// Extracts PDFs through `pdf-extract` and treats everything else as UTF-8
/// text
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, document: &SourceDocument) -> Result<String> {
        let text = if document.is_pdf() {
            extract_pdf_text(document)?
        } else {
            extract_plain_text(document)?
        };

        if text.trim().is_empty() {
            warn!(
                "No text extracted from {}, it may contain only images",
                document.name
            );
        }

        debug!("Extracted {} chars from {}", text.chars().count(), document.name);
        Ok(text)
    }
}

fn extract_pdf_text(document: &SourceDocument) -> Result<String> {
    // pdf-extract can panic on malformed input rather than returning an error
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(&document.bytes)
    }));

    match outcome {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(QaError::Extraction {
            name: document.name.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Err(QaError::Extraction {
            name: document.name.clone(),
            reason: "PDF parser aborted on malformed input".to_string(),
        }),
    }
}

fn extract_plain_text(document: &SourceDocument) -> Result<String> {
    String::from_utf8(document.bytes.clone()).map_err(|e| QaError::Extraction {
        name: document.name.clone(),
        reason: format!("not valid UTF-8 text: {}", e),
    })
}

/// Extract every document and concatenate the texts in input order, with no
/// separator between documents
#[inline]
pub fn extract_all(extractor: &dyn TextExtractor, documents: &[SourceDocument]) -> Result<String> {
    let mut text = String::new();
    for document in documents {
        text.push_str(&extractor.extract(document)?);
    }
    Ok(text)
}
