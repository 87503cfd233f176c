use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::backend::FlowBackend;
use crate::config::{BackendConfig, FlowConfig};
use crate::error::{RecoveryStrategy, Result, ShowcaseError};

/// The five stage flow the backend executes, wired through input and output
/// mappings.
pub fn flow_definition(file_id: &str, output_format: &str) -> Value {
    json!({
        "name": "Document Analysis Showcase",
        "description": "Complete document analysis pipeline showcase",
        "input": {"file_id": file_id},
        "config": {
            "detailed_analysis": true,
            "include_visualizations": true,
            "output_format": output_format,
        },
        "agents_flow": [
            {
                "agent_name": "document_parser",
                "input_mapping": {"file_id": "file_id"},
                "output_mapping": {"parsed_content": "content", "metadata": "metadata"},
            },
            {
                "agent_name": "text_extractor",
                "input_mapping": {"content": "parsed_content"},
                "output_mapping": {"structured_text": "text", "entities": "extracted_entities"},
            },
            {
                "agent_name": "analytics_agent",
                "input_mapping": {"text": "structured_text", "entities": "extracted_entities"},
                "output_mapping": {"analysis": "content_analysis", "topics": "topic_analysis"},
            },
            {
                "agent_name": "sentiment_analyzer",
                "input_mapping": {"text": "structured_text"},
                "output_mapping": {"sentiment": "sentiment_analysis", "emotions": "emotion_analysis"},
            },
            {
                "agent_name": "report_generator",
                "input_mapping": {
                    "content_analysis": "analysis",
                    "sentiment_analysis": "sentiment",
                    "emotion_analysis": "emotions",
                    "topic_analysis": "topics",
                    "entities": "extracted_entities",
                    "metadata": "metadata",
                },
                "output_mapping": {"final_report": "report"},
            },
        ],
    })
}

/// Runs the pipeline as a backend flow and waits for its results.
pub struct RemotePipeline<B: FlowBackend> {
    backend: B,
    username: String,
    password: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl<B: FlowBackend> RemotePipeline<B> {
    pub fn new(backend: B, credentials: &BackendConfig, flow: &FlowConfig) -> Self {
        Self {
            backend,
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            poll_interval: flow.poll_interval,
            max_polls: flow.max_polls,
        }
    }

    pub async fn run(&self, document: &Path, output_format: &str) -> Result<Value> {
        if !document.exists() {
            return Err(ShowcaseError::DocumentError(format!("File not found: {}", document.display())).into());
        }

        self.backend.login(&self.username, &self.password).await?;
        let file_id = self.backend.upload_file(document).await?;
        let flow_id = self.backend.execute_flow(&flow_definition(&file_id, output_format)).await?;
        self.wait_for(&flow_id).await
    }

    /// Polls until the flow completes or fails. Transient status errors are
    /// retried; anything else ends the wait.
    pub async fn wait_for(&self, flow_id: &str) -> Result<Value> {
        info!("Monitoring flow execution: {}", flow_id);

        for attempt in 1..=self.max_polls {
            match self.backend.flow_status(flow_id).await {
                Ok(status) if status.is_completed() => {
                    info!("Flow {} completed", flow_id);
                    return self.backend.flow_results(flow_id).await;
                }
                Ok(status) if status.is_failed() => {
                    let reason = status.error.unwrap_or_else(|| "Unknown error".to_string());
                    error!("Flow {} failed: {}", flow_id, reason);
                    return Err(ShowcaseError::AgentError(format!("Flow {} failed: {}", flow_id, reason)).into());
                }
                Ok(status) => {
                    info!(
                        "Flow {} {} (poll {}/{}), current stage: {}",
                        flow_id,
                        status.status,
                        attempt,
                        self.max_polls,
                        status.current_stage.as_deref().unwrap_or("unknown")
                    );
                }
                Err(e) => {
                    let transient = matches!(
                        e.downcast_ref::<ShowcaseError>().map(ShowcaseError::recovery_strategy),
                        Some(RecoveryStrategy::RetryWithBackoff)
                    );
                    if !transient {
                        error!("Status check for {} failed: {}", flow_id, e);
                        return Err(e);
                    }
                    warn!("Status check for {} failed, retrying: {}", flow_id, e);
                }
            }

            if attempt < self.max_polls {
                sleep(self.poll_interval).await;
            }
        }

        Err(ShowcaseError::AgentError(format!(
            "Flow {} did not finish after {} status checks",
            flow_id, self.max_polls
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FlowStatus, MockFlowBackend};
    use crate::config::Config;
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn status(value: &str) -> FlowStatus {
        FlowStatus {
            status: value.to_string(),
            current_stage: Some("text_extractor".to_string()),
            error: None,
        }
    }

    fn pipeline(backend: MockFlowBackend, max_polls: u32) -> RemotePipeline<MockFlowBackend> {
        let mut config = Config::default();
        config.flow.poll_interval = Duration::from_millis(1);
        config.flow.max_polls = max_polls;
        RemotePipeline::new(backend, &config.backend, &config.flow)
    }

    #[test]
    fn test_flow_definition_wires_five_agents() {
        let flow = flow_definition("file-9", "detailed");
        let agents: Vec<&str> = flow["agents_flow"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["agent_name"].as_str().unwrap())
            .collect();
        assert_eq!(
            agents,
            ["document_parser", "text_extractor", "analytics_agent", "sentiment_analyzer", "report_generator"]
        );
        assert_eq!(flow["input"]["file_id"], "file-9");
        assert_eq!(flow["config"]["output_format"], "detailed");
        assert_eq!(flow["agents_flow"][4]["output_mapping"]["final_report"], "report");
    }

    #[tokio::test]
    async fn test_run_polls_until_completed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        std::fs::write(&path, "memo").unwrap();

        let mut backend = MockFlowBackend::new();
        backend
            .expect_login()
            .times(1)
            .returning(|_, _| Ok("tok".to_string()));
        backend
            .expect_upload_file()
            .times(1)
            .returning(|_| Ok("file-1".to_string()));
        backend
            .expect_execute_flow()
            .withf(|flow| flow["input"]["file_id"] == "file-1")
            .times(1)
            .returning(|_| Ok("flow-1".to_string()));

        let mut polls = 0;
        backend.expect_flow_status().with(eq("flow-1")).times(3).returning(move |_| {
            polls += 1;
            Ok(status(if polls < 3 { "running" } else { "completed" }))
        });
        backend
            .expect_flow_results()
            .times(1)
            .returning(|_| Ok(json!({"final_report": {"key_findings": ["ok"]}})));

        let result = pipeline(backend, 30).run(&path, "detailed").await.unwrap();
        assert_eq!(result["final_report"]["key_findings"][0], "ok");
    }

    #[tokio::test]
    async fn test_failed_flow_reports_reason() {
        let mut backend = MockFlowBackend::new();
        backend.expect_flow_status().returning(|_| {
            Ok(FlowStatus {
                status: "failed".to_string(),
                current_stage: None,
                error: Some("agent timeout".to_string()),
            })
        });
        backend.expect_flow_results().never();

        let err = pipeline(backend, 30).wait_for("flow-2").await.unwrap_err();
        assert_eq!(err.to_string(), "Agent error: Flow flow-2 failed: agent timeout");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_polls() {
        let mut backend = MockFlowBackend::new();
        backend.expect_flow_status().times(4).returning(|_| Ok(status("queued")));

        let err = pipeline(backend, 4).wait_for("flow-3").await.unwrap_err();
        assert!(err.to_string().contains("did not finish after 4 status checks"));
    }

    #[tokio::test]
    async fn test_transient_status_errors_are_retried() {
        let mut backend = MockFlowBackend::new();
        let mut polls = 0;
        backend.expect_flow_status().times(2).returning(move |_| {
            polls += 1;
            if polls == 1 {
                Err(ShowcaseError::BackendError { status: 503, body: "busy".into() }.into())
            } else {
                Ok(status("completed"))
            }
        });
        backend.expect_flow_results().returning(|_| Ok(json!({"status": "done"})));

        let result = pipeline(backend, 5).wait_for("flow-4").await.unwrap();
        assert_eq!(result["status"], "done");
    }

    #[tokio::test]
    async fn test_rejected_status_check_aborts() {
        let mut backend = MockFlowBackend::new();
        backend
            .expect_flow_status()
            .times(1)
            .returning(|_| Err(ShowcaseError::BackendError { status: 404, body: "no such flow".into() }.into()));

        let err = pipeline(backend, 5).wait_for("flow-5").await.unwrap_err();
        assert_eq!(err.to_string(), "Backend returned 404: no such flow");
    }

    #[tokio::test]
    async fn test_missing_document_skips_backend() {
        let mut backend = MockFlowBackend::new();
        backend.expect_login().never();

        let err = pipeline(backend, 5).run(Path::new("/no/such/file.txt"), "detailed").await.unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
