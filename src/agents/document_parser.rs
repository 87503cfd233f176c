use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::agents::agent::{finish, Agent, AgentDescriptor};
use crate::documents::{fingerprint, parse_bytes, DocumentFormat, SUPPORTED_MIME_TYPES};
use crate::error::{Result, ShowcaseError};

pub const NAME: &str = "document_parser";

/// Reads a document from disk and returns its text, structure and metadata.
pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file(&self, path: &Path) -> Result<Value> {
        let format = DocumentFormat::from_path(path);
        if !format.is_supported() {
            warn!("Unsupported format {} for {}", format.mime_type(), path.display());
            return Ok(json!({
                "status": "error",
                "error": format!("Unsupported file format: {}", format.mime_type()),
                "supported_formats": SUPPORTED_MIME_TYPES,
                "agent": NAME,
            }));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ShowcaseError::DocumentError(format!("Cannot read {}: {}", path.display(), e)))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut body = parse_bytes(&format, &bytes)?.into_map();
        body.insert("filename".into(), json!(filename));
        body.insert("mime_type".into(), json!(format.mime_type()));
        body.insert("file_size".into(), json!(bytes.len()));
        body.insert("sha256".into(), json!(fingerprint(&bytes)));

        info!("Successfully parsed {} ({})", filename, format.mime_type());
        Ok(finish(body, NAME, "parsed_at"))
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for DocumentParser {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor::new(
            NAME,
            "Parses documents and extracts text content, metadata, and structure",
            &["text", "html", "docx", "pptx", "xlsx"],
        )
    }

    async fn process(&self, request: Value) -> Result<Value> {
        match request.get("file_path").and_then(Value::as_str) {
            Some(path) if !path.is_empty() => self.parse_file(Path::new(path)).await,
            _ if request.get("file_id").is_some() => Err(ShowcaseError::AgentError(
                "file_id cannot be resolved locally; provide file_path".to_string(),
            )
            .into()),
            _ => Err(ShowcaseError::AgentError("No file_id or file_path provided".to_string()).into()),
        }
    }
}
