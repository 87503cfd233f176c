//! Runs documents through the five analysis agents, either in process or as
//! a flow on the platform backend.

pub mod local;
pub mod remote;

use serde::Serialize;
use serde_json::{json, Value};

use crate::report::{list, text_or};

pub use local::LocalPipeline;
pub use remote::{flow_definition, RemotePipeline};

/// Pipeline order with the label shown for each stage.
pub const STAGES: &[(&str, &str)] = &[
    ("document_parser", "Document Parsing"),
    ("text_extractor", "Text Extraction"),
    ("analytics_agent", "Content Analysis"),
    ("sentiment_analyzer", "Sentiment Analysis"),
    ("report_generator", "Report Generation"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub agent: String,
    pub stage: String,
    pub status: String,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    pub fn succeeded(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub document: String,
    pub stages: Vec<StageRecord>,
    pub final_report: Option<Value>,
    pub merged: Value,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.stages.len() == STAGES.len() && self.stages.iter().all(StageRecord::succeeded)
    }

    pub fn failed_stage(&self) -> Option<&StageRecord> {
        self.stages.iter().find(|s| !s.succeeded())
    }

    pub fn to_json(&self) -> Value {
        json!({
            "document": self.document,
            "success": self.is_success(),
            "stages": self.stages,
            "final_report": self.final_report,
            "merged": self.merged,
        })
    }
}

/// The report object inside a result, whether the result is the report
/// itself or wraps it under `final_report`.
pub fn report_of(result: &Value) -> &Value {
    match result.get("final_report") {
        Some(report) if report.is_object() => report,
        _ => result,
    }
}

/// Human readable digest of a finished run.
pub fn summary_lines(result: &Value) -> Vec<String> {
    let report = report_of(result);
    let mut lines = vec!["Analysis summary".to_string()];

    let findings = list(&report["key_findings"]);
    if findings.is_empty() {
        lines.push("  No key findings".to_string());
    } else {
        lines.push("Key findings:".to_string());
        lines.extend(findings.iter().map(|f| format!("  - {}", f)));
    }

    let recommendations = list(&report["recommendations"]);
    if !recommendations.is_empty() {
        lines.push("Recommendations:".to_string());
        lines.extend(recommendations.iter().map(|r| format!("  - {}", r)));
    }

    let metadata = &report["report_metadata"];
    if metadata.is_object() {
        lines.push(format!(
            "Sections: {}, charts: {}, confidence: {}",
            text_or(&metadata["total_sections"], "0"),
            text_or(&metadata["chart_count"], "0"),
            text_or(&metadata["analysis_confidence"], "unknown"),
        ));
    }
    lines
}

pub fn print_summary(result: &Value) {
    for line in summary_lines(result) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(agent: &str, status: &str) -> StageRecord {
        StageRecord {
            agent: agent.to_string(),
            stage: agent.to_string(),
            status: status.to_string(),
            duration_ms: 3,
            error: None,
        }
    }

    #[test]
    fn test_result_success_needs_every_stage() {
        let mut result = PipelineResult {
            document: "memo.txt".to_string(),
            stages: STAGES.iter().map(|(agent, _)| record(agent, "success")).collect(),
            final_report: None,
            merged: json!({}),
        };
        assert!(result.is_success());

        result.stages.truncate(2);
        result.stages[1].status = "error".to_string();
        assert!(!result.is_success());
        assert_eq!(result.failed_stage().unwrap().agent, "text_extractor");
        assert_eq!(result.to_json()["success"], false);
    }

    #[test]
    fn test_summary_reads_wrapped_report() {
        let result = json!({"final_report": {
            "key_findings": ["Strong positive sentiment detected throughout document"],
            "recommendations": ["Develop comprehensive risk mitigation strategy"],
            "report_metadata": {"total_sections": 8, "chart_count": 3, "analysis_confidence": "high"},
        }});
        let lines = summary_lines(&result);
        assert!(lines.contains(&"  - Strong positive sentiment detected throughout document".to_string()));
        assert_eq!(lines.last().unwrap(), "Sections: 8, charts: 3, confidence: high");
    }

    #[test]
    fn test_summary_without_findings() {
        assert_eq!(summary_lines(&json!({}))[1], "  No key findings");
    }
}
