pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::Result;

pub use client::BackendClient;

/// What `/flows/{id}/status` reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowStatus {
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

impl FlowStatus {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

/// The backend calls a remote pipeline run needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlowBackend: Send + Sync {
    /// Logs in and returns the access token.
    async fn login(&self, username: &str, password: &str) -> Result<String>;

    /// Uploads a document and returns its `file_id`.
    async fn upload_file(&self, path: &Path) -> Result<String>;

    /// Starts a flow and returns its `flow_id`.
    async fn execute_flow(&self, definition: &Value) -> Result<String>;

    async fn flow_status(&self, flow_id: &str) -> Result<FlowStatus>;

    async fn flow_results(&self, flow_id: &str) -> Result<Value>;
}
