//! Built-in business documents for demos and uploads.

use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::backend::FlowBackend;
use crate::error::{Result, ShowcaseError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleDocument {
    pub filename: &'static str,
    pub kind: &'static str,
    pub title: &'static str,
    pub content: &'static str,
}

pub const SAMPLES: &[SampleDocument] = &[
    SampleDocument {
        filename: "sample_proposal.txt",
        kind: "business_proposal",
        title: "Digital Transformation Initiative Proposal",
        content: include_str!("docs/sample_proposal.txt"),
    },
    SampleDocument {
        filename: "market_analysis.txt",
        kind: "market_report",
        title: "Q4 2024 Market Analysis Report",
        content: include_str!("docs/market_analysis.txt"),
    },
    SampleDocument {
        filename: "contract_review.txt",
        kind: "legal_document",
        title: "Software License Agreement Review",
        content: include_str!("docs/contract_review.txt"),
    },
    SampleDocument {
        filename: "financial_summary.txt",
        kind: "financial_report",
        title: "Annual Financial Performance Summary",
        content: include_str!("docs/financial_summary.txt"),
    },
];

/// Outcome of uploading one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub filename: String,
    pub file_id: Option<String>,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn succeeded(&self) -> bool {
        self.file_id.is_some()
    }
}

/// Writes every sample into `dir`. Files that already hold the same content
/// are left alone; returns the paths of all samples.
pub fn generate(dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .map_err(|e| ShowcaseError::StorageError(format!("Failed to create {}: {}", dir.display(), e)))?;

    let mut paths = Vec::with_capacity(SAMPLES.len());
    for sample in SAMPLES {
        let path = dir.join(sample.filename);
        let current = std::fs::read_to_string(&path).ok();
        if current.as_deref() != Some(sample.content) {
            std::fs::write(&path, sample.content)
                .map_err(|e| ShowcaseError::StorageError(format!("Failed to write {}: {}", path.display(), e)))?;
            info!("Generated sample: {}", sample.filename);
        }
        paths.push(path);
    }
    Ok(paths)
}

/// Logs in once, then uploads each sample and reports every outcome; one
/// failed upload does not stop the rest.
pub async fn upload_all<B: FlowBackend + ?Sized>(
    backend: &B,
    username: &str,
    password: &str,
    dir: &Path,
) -> Result<Vec<UploadOutcome>> {
    let paths = generate(dir)?;
    backend.login(username, password).await?;

    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let outcome = match backend.upload_file(&path).await {
            Ok(file_id) => {
                info!("Uploaded {} (ID: {})", filename, file_id);
                UploadOutcome { filename, file_id: Some(file_id), error: None }
            }
            Err(e) => {
                error!("Upload of {} failed: {}", filename, e);
                UploadOutcome { filename, file_id: None, error: Some(e.to_string()) }
            }
        };
        outcomes.push(outcome);
    }

    let uploaded = outcomes.iter().filter(|o| o.succeeded()).count();
    info!("Uploaded {}/{} sample documents", uploaded, outcomes.len());
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::text_extractor::TextExtractor;
    use crate::backend::MockFlowBackend;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_generate_is_idempotent() {
        let dir = tempdir().unwrap();
        let first = generate(dir.path()).unwrap();
        assert_eq!(first.len(), 4);

        let modified = std::fs::metadata(&first[0]).unwrap().modified().unwrap();
        let second = generate(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::metadata(&second[0]).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn test_generate_repairs_changed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market_analysis.txt");
        std::fs::write(&path, "stale").unwrap();

        generate(dir.path()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Q4 2024 MARKET ANALYSIS REPORT"));
    }

    #[test]
    fn test_samples_carry_business_entities() {
        let extractor = TextExtractor::new().unwrap();
        let proposal = extractor.extract(SAMPLES[0].content, "business_proposal", json!({}));
        assert!(proposal["entities"]["currency"].as_array().unwrap().contains(&json!("$5.8M")));
        assert!(proposal["entities"]["email"].as_array().is_some());
    }

    #[tokio::test]
    async fn test_upload_all_reports_each_file() {
        let dir = tempdir().unwrap();
        let mut backend = MockFlowBackend::new();
        backend.expect_login().times(1).returning(|_, _| Ok("tok".to_string()));
        backend.expect_upload_file().times(4).returning(|path| {
            if path.ends_with("contract_review.txt") {
                Err(crate::error::ShowcaseError::BackendError { status: 413, body: "too large".into() }.into())
            } else {
                Ok(format!("id-{}", path.file_stem().unwrap().to_string_lossy()))
            }
        });

        let outcomes = upload_all(&backend, "demo", "demo123", dir.path()).await.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes.iter().filter(|o| o.succeeded()).count(), 3);
        assert_eq!(outcomes[0].file_id.as_deref(), Some("id-sample_proposal"));
        assert_eq!(outcomes[2].error.as_deref(), Some("Backend returned 413: too large"));
    }

    #[tokio::test]
    async fn test_login_failure_stops_upload() {
        let dir = tempdir().unwrap();
        let mut backend = MockFlowBackend::new();
        backend
            .expect_login()
            .returning(|_, _| Err(ShowcaseError::BackendError { status: 401, body: "denied".into() }.into()));
        backend.expect_upload_file().never();

        assert!(upload_all(&backend, "demo", "bad", dir.path()).await.is_err());
    }
}
