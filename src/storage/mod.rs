use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, ShowcaseError};
use crate::pipeline::report_of;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub results_saved: u64,
    pub files_written: u32,
    pub bytes_written: u64,
    pub last_saved: Option<DateTime<Utc>>,
}

/// Paths written for one result; absent artifacts stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedArtifacts {
    pub json: PathBuf,
    pub executive_summary: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub pdf: Option<PathBuf>,
}

impl SavedArtifacts {
    pub fn paths(&self) -> Vec<&PathBuf> {
        std::iter::once(&self.json)
            .chain(self.executive_summary.iter())
            .chain(self.html.iter())
            .chain(self.pdf.iter())
            .collect()
    }
}

#[async_trait]
pub trait StorageManager {
    async fn store_result(&self, stem: &str, result: &Value) -> Result<SavedArtifacts>;
    async fn get_storage_stats(&self) -> Result<StorageStats>;
}

/// Writes pipeline results and the report files they carry into one
/// output directory.
pub struct ResultStore {
    output_dir: PathBuf,
    stats: Arc<Mutex<StorageStats>>,
}

impl ResultStore {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            stats: Arc::new(Mutex::new(StorageStats::default())),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn ensure_directory_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| ShowcaseError::StorageError(format!("Failed to create directory: {}", e)))?;
        Ok(())
    }

    async fn write_to_file(&self, file_name: String, content: &[u8]) -> Result<PathBuf> {
        let path = self.output_dir.join(file_name);
        fs::write(&path, content)
            .map_err(|e| ShowcaseError::StorageError(format!("Failed to write {}: {}", path.display(), e)))?;

        let mut stats = self.stats.lock().await;
        stats.files_written += 1;
        stats.bytes_written += content.len() as u64;
        debug!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }
}

#[async_trait]
impl StorageManager for ResultStore {
    async fn store_result(&self, stem: &str, result: &Value) -> Result<SavedArtifacts> {
        self.ensure_directory_exists()?;

        let json = serde_json::to_vec_pretty(result)?;
        let mut saved = SavedArtifacts {
            json: self.write_to_file(format!("{}.json", stem), &json).await?,
            ..Default::default()
        };

        let report = report_of(result);
        if let Some(summary) = report["executive_summary"].as_str() {
            saved.executive_summary = Some(
                self.write_to_file(format!("{}_executive_summary.md", stem), summary.as_bytes())
                    .await?,
            );
        }

        let formatted = &report["formatted_reports"];
        if let Some(html) = formatted["html"].as_str() {
            saved.html = Some(self.write_to_file(format!("{}_report.html", stem), html.as_bytes()).await?);
        }
        if let Some(encoded) = formatted["pdf_data"].as_str() {
            match STANDARD.decode(encoded) {
                Ok(pdf) => saved.pdf = Some(self.write_to_file(format!("{}_report.pdf", stem), &pdf).await?),
                Err(e) => warn!("Skipping PDF for {}: invalid base64 ({})", stem, e),
            }
        }

        {
            let mut stats = self.stats.lock().await;
            stats.results_saved += 1;
            stats.last_saved = Some(Utc::now());
        }
        info!("Saved {} artifacts for {} in {}", saved.paths().len(), stem, self.output_dir.display());
        Ok(saved)
    }

    async fn get_storage_stats(&self) -> Result<StorageStats> {
        Ok(self.stats.lock().await.clone())
    }
}
