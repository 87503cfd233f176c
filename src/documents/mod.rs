//! Document decoding for the parser agent: format detection from the file
//! extension, text decoding, HTML text extraction and the zipped Office
//! formats.

pub mod html;
pub mod office;
pub mod text;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::{Result, ShowcaseError};

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_HTML: &str = "text/html";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const SUPPORTED_MIME_TYPES: &[&str] = &[MIME_TEXT, MIME_HTML, MIME_DOCX, MIME_PPTX, MIME_XLSX];

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentFormat {
    Text,
    Html,
    Docx,
    Pptx,
    Xlsx,
    Unsupported(String),
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "txt" | "md" | "markdown" | "csv" | "log" => DocumentFormat::Text,
            "html" | "htm" => DocumentFormat::Html,
            "docx" => DocumentFormat::Docx,
            "pptx" => DocumentFormat::Pptx,
            "xlsx" => DocumentFormat::Xlsx,
            "pdf" => DocumentFormat::Unsupported("application/pdf".to_string()),
            "png" => DocumentFormat::Unsupported("image/png".to_string()),
            "jpg" | "jpeg" => DocumentFormat::Unsupported("image/jpeg".to_string()),
            "json" => DocumentFormat::Unsupported("application/json".to_string()),
            _ => DocumentFormat::Unsupported("application/octet-stream".to_string()),
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            DocumentFormat::Text => MIME_TEXT,
            DocumentFormat::Html => MIME_HTML,
            DocumentFormat::Docx => MIME_DOCX,
            DocumentFormat::Pptx => MIME_PPTX,
            DocumentFormat::Xlsx => MIME_XLSX,
            DocumentFormat::Unsupported(mime) => mime,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DocumentFormat::Unsupported(_))
    }
}

/// Text and structure recovered from one document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document_type: &'static str,
    pub full_text: String,
    /// Format specific fields such as `lines`, `paragraphs`, `slides` or `sheets`.
    pub structure: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

impl ParsedDocument {
    pub fn word_count(&self) -> usize {
        self.full_text.split_whitespace().count()
    }

    pub fn char_count(&self) -> usize {
        self.full_text.chars().count()
    }

    pub fn into_map(self) -> Map<String, Value> {
        let word_count = self.word_count();
        let char_count = self.char_count();

        let mut out = Map::new();
        out.insert("document_type".into(), json!(self.document_type));
        out.insert("full_text".into(), json!(self.full_text));
        out.extend(self.structure);
        out.insert("metadata".into(), Value::Object(self.metadata));
        out.insert("word_count".into(), json!(word_count));
        out.insert("char_count".into(), json!(char_count));
        out
    }
}

pub fn parse_bytes(format: &DocumentFormat, bytes: &[u8]) -> Result<ParsedDocument> {
    match format {
        DocumentFormat::Text => Ok(text::parse(bytes)),
        DocumentFormat::Html => html::parse(bytes),
        DocumentFormat::Docx => office::parse_docx(bytes),
        DocumentFormat::Pptx => office::parse_pptx(bytes),
        DocumentFormat::Xlsx => office::parse_xlsx(bytes),
        DocumentFormat::Unsupported(mime) => {
            Err(ShowcaseError::DocumentError(format!("Unsupported file format: {}", mime)).into())
        }
    }
}

/// Lowercase hex SHA-256 of the raw file bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/report.TXT")), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_path(Path::new("notes.md")), DocumentFormat::Text);
        assert_eq!(DocumentFormat::from_path(Path::new("page.htm")), DocumentFormat::Html);
        assert_eq!(DocumentFormat::from_path(Path::new("deck.pptx")).mime_type(), MIME_PPTX);

        let pdf = DocumentFormat::from_path(Path::new("scan.pdf"));
        assert!(!pdf.is_supported());
        assert_eq!(pdf.mime_type(), "application/pdf");
        assert_eq!(DocumentFormat::from_path(Path::new("noext")).mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_unsupported_format_errors() {
        let err = parse_bytes(&DocumentFormat::Unsupported("image/png".into()), b"").unwrap_err();
        assert!(err.to_string().contains("Unsupported file format: image/png"));
    }

    #[test]
    fn test_into_map_counts() {
        let parsed = text::parse(b"one two\nthree");
        let map = parsed.into_map();
        assert_eq!(map["document_type"], "text");
        assert_eq!(map["word_count"], 3);
        assert_eq!(map["char_count"], 13);
        assert_eq!(map["line_count"], 2);
    }
}
