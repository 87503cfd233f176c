use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info};

use super::{PipelineResult, StageRecord, STAGES};
use crate::agents::agent::{is_error, object_field, run_agent, Agent};
use crate::agents::registry::AgentRegistry;
use crate::agents::report_generator::ReportOptions;
use crate::error::Result;

/// Fields that describe a stage run rather than its findings.
const BOOKKEEPING: &[&str] = &["status", "agent", "parsed_at", "processed_at", "analyzed_at", "generated_at"];

/// Runs every stage in process, feeding each agent from the earlier outputs.
pub struct LocalPipeline {
    agents: HashMap<&'static str, Arc<dyn Agent>>,
    options: ReportOptions,
}

fn fields(source: &Value, names: &[&str]) -> Map<String, Value> {
    names
        .iter()
        .filter_map(|name| source.get(*name).map(|v| (name.to_string(), v.clone())))
        .collect()
}

impl LocalPipeline {
    pub fn new(options: ReportOptions) -> Result<Self> {
        let mut agents = HashMap::new();
        for (name, _) in STAGES {
            agents.insert(*name, AgentRegistry::build(name)?);
        }
        Ok(Self { agents, options })
    }

    /// Swaps the agent that runs `stage`.
    pub fn with_agent(mut self, stage: &'static str, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(stage, agent);
        self
    }

    fn stage_input(&self, agent: &str, document: &Path, outputs: &HashMap<&str, Value>, merged: &Map<String, Value>) -> Value {
        let empty = Value::Null;
        let parsed = outputs.get("document_parser").unwrap_or(&empty);
        let extracted = outputs.get("text_extractor").unwrap_or(&empty);
        let analyzed = outputs.get("analytics_agent").unwrap_or(&empty);

        match agent {
            "document_parser" => json!({"file_path": document.to_string_lossy()}),
            "text_extractor" => Value::Object(fields(parsed, &["full_text", "document_type", "metadata"])),
            "analytics_agent" => extracted.clone(),
            "sentiment_analyzer" => {
                let mut input = extracted.as_object().cloned().unwrap_or_default();
                input.insert("risk_analysis".into(), object_field(analyzed, "risk_analysis"));
                Value::Object(input)
            }
            _ => {
                let mut input = merged.clone();
                input.insert("filename".into(), parsed.get("filename").cloned().unwrap_or(Value::Null));
                input.insert(
                    "options".into(),
                    json!({"include_html": self.options.include_html, "include_pdf": self.options.include_pdf}),
                );
                Value::Object(input)
            }
        }
    }

    /// Runs the stages in order and stops at the first one that reports an
    /// error.
    pub async fn run(&self, document: &Path) -> PipelineResult {
        info!("Starting local pipeline for {}", document.display());
        let mut outputs: HashMap<&str, Value> = HashMap::new();
        let mut merged = Map::new();
        let mut stages = Vec::new();
        let mut final_report = None;

        for (name, label) in STAGES {
            let Some(agent) = self.agents.get(name) else {
                continue;
            };
            let input = self.stage_input(name, document, &outputs, &merged);

            info!("Stage: {}", label);
            let started = Instant::now();
            let output = run_agent(agent.as_ref(), input).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            if is_error(&output) {
                let message = output["error"].as_str().unwrap_or("unknown error").to_string();
                error!("{} failed after {}ms: {}", label, duration_ms, message);
                stages.push(StageRecord {
                    agent: name.to_string(),
                    stage: label.to_string(),
                    status: "error".to_string(),
                    duration_ms,
                    error: Some(message),
                });
                break;
            }

            info!("{} completed in {}ms", label, duration_ms);
            stages.push(StageRecord {
                agent: name.to_string(),
                stage: label.to_string(),
                status: "success".to_string(),
                duration_ms,
                error: None,
            });

            if *name == "report_generator" {
                final_report = Some(output);
                continue;
            }
            if let Value::Object(map) = &output {
                for (key, value) in map {
                    if BOOKKEEPING.contains(&key.as_str()) {
                        continue;
                    }
                    // analytics owns `insights`; the sentiment view is kept beside it
                    let key = if *name == "sentiment_analyzer" && key == "insights" {
                        "sentiment_insights".to_string()
                    } else {
                        key.clone()
                    };
                    merged.insert(key, value.clone());
                }
            }
            outputs.insert(name, output);
        }

        PipelineResult {
            document: document.to_string_lossy().into_owned(),
            stages,
            final_report,
            merged: Value::Object(merged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::agent::AgentDescriptor;
    use crate::error::ShowcaseError;
    use async_trait::async_trait;
    use tempfile::tempdir;

    const PROPOSAL: &str = "Executive Summary\n\
        Acme Corp proposes a cloud migration with a budget of $2,500,000 over 18 months. \
        We expect excellent growth and an ROI of 150% by March 15, 2026.\n\n\
        Risk Assessment\n\
        A delay in vendor onboarding or a cost overrun could affect the timeline.\n";

    struct Broken;

    #[async_trait]
    impl Agent for Broken {
        fn descriptor(&self) -> AgentDescriptor {
            AgentDescriptor::new("analytics_agent", "always fails", &[])
        }

        async fn process(&self, _request: Value) -> Result<Value> {
            Err(ShowcaseError::AgentError("model unavailable".to_string()).into())
        }
    }

    #[tokio::test]
    async fn test_full_run_produces_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proposal.txt");
        std::fs::write(&path, PROPOSAL).unwrap();

        let pipeline = LocalPipeline::new(ReportOptions::default()).unwrap();
        let result = pipeline.run(&path).await;

        assert!(result.is_success(), "stages: {:?}", result.stages);
        assert_eq!(result.stages.len(), 5);
        assert_eq!(result.stages[2].stage, "Content Analysis");

        let report = result.final_report.unwrap();
        assert_eq!(report["agent"], "report_generator");
        assert_eq!(report["formatted_reports"]["json"]["document_summary"]["filename"], "proposal.txt");
        assert!(report["executive_summary"].as_str().unwrap().contains("proposal.txt"));

        assert!(result.merged.get("risk_analysis").is_some());
        assert!(result.merged.get("sentiment_summary").is_some());
        assert!(result.merged.get("sentiment_insights").is_some());
        assert!(result.merged.get("status").is_none());
    }

    #[tokio::test]
    async fn test_stops_at_first_failing_stage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proposal.txt");
        std::fs::write(&path, PROPOSAL).unwrap();

        let pipeline = LocalPipeline::new(ReportOptions::default())
            .unwrap()
            .with_agent("analytics_agent", Arc::new(Broken));
        let result = pipeline.run(&path).await;

        assert!(!result.is_success());
        assert_eq!(result.stages.len(), 3);
        let failed = result.failed_stage().unwrap();
        assert_eq!(failed.agent, "analytics_agent");
        assert_eq!(failed.error.as_deref(), Some("Agent error: model unavailable"));
        assert!(result.final_report.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_document_fails_first_stage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let result = LocalPipeline::new(ReportOptions::default()).unwrap().run(&path).await;
        assert_eq!(result.stages.len(), 1);
        assert_eq!(result.stages[0].status, "error");
    }
}
