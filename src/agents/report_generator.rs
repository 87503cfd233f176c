use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Local, Utc};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::agents::agent::{finish, Agent, AgentDescriptor, AGENT_VERSION};
use crate::error::Result;
use crate::report::{charts, html, markdown, pdf, ReportData};

pub const NAME: &str = "report_generator";

/// Report format switches; both default to on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub include_html: bool,
    pub include_pdf: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_html: true,
            include_pdf: true,
        }
    }
}

impl ReportOptions {
    pub fn from_request(request: &Value) -> Self {
        let options = &request["options"];
        Self {
            include_html: options["include_html"].as_bool().unwrap_or(true),
            include_pdf: options["include_pdf"].as_bool().unwrap_or(true),
        }
    }
}

/// Turns merged analysis results into summaries, charts and formatted reports.
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, data: &ReportData, options: ReportOptions) -> Map<String, Value> {
        let generated_at = Local::now().format("%B %d, %Y at %I:%M %p").to_string();

        let executive_summary = markdown::executive_summary(data, &generated_at);
        let detailed_report = markdown::detailed_report(data, &generated_at, AGENT_VERSION);
        let visualizations = charts::render_all(data);

        let mut formatted = Map::new();
        if options.include_html {
            formatted.insert("html".into(), json!(html::render(&detailed_report, &visualizations, &generated_at)));
        }
        if options.include_pdf {
            let bytes = pdf::render(&pdf::report_lines(data));
            formatted.insert("pdf_data".into(), json!(STANDARD.encode(bytes)));
        }
        formatted.insert("json".into(), data.json_report(&Utc::now().to_rfc3339(), AGENT_VERSION));

        let metadata = json!({
            "total_sections": markdown::section_count(&detailed_report),
            "chart_count": visualizations.len(),
            "report_formats": formatted.keys().cloned().collect::<Vec<_>>(),
            "analysis_confidence": data.analysis_confidence(),
        });

        let mut body = Map::new();
        body.insert("executive_summary".into(), json!(executive_summary));
        body.insert("detailed_report".into(), json!(detailed_report));
        body.insert("key_findings".into(), json!(data.key_findings()));
        body.insert("recommendations".into(), json!(data.recommendations()));
        body.insert("visualizations".into(), Value::Object(visualizations));
        body.insert("formatted_reports".into(), Value::Object(formatted));
        body.insert("report_metadata".into(), metadata);
        body
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ReportGenerator {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor::new(
            NAME,
            "Generates formatted reports, visualizations, and executive summaries",
            &["executive_summary", "charts", "html_report", "pdf_report", "json_report"],
        )
    }

    async fn process(&self, request: Value) -> Result<Value> {
        let data = ReportData::from_request(&request);
        let body = self.generate(&data, ReportOptions::from_request(&request));
        info!(
            "Generated report for {} with {} charts",
            data.document.filename,
            body["report_metadata"]["chart_count"]
        );
        Ok(finish(body, NAME, "generated_at"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_request;

    #[tokio::test]
    async fn test_full_report() {
        let result = ReportGenerator::new().process(sample_request()).await.unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["report_metadata"]["chart_count"], 4);
        assert_eq!(result["report_metadata"]["report_formats"], json!(["html", "pdf_data", "json"]));
        assert_eq!(result["report_metadata"]["analysis_confidence"], "high");
        assert_eq!(result["report_metadata"]["total_sections"], 8);
        assert!(result["key_findings"].as_array().unwrap().len() <= 5);
        assert!(result["recommendations"].as_array().unwrap().len() <= 4);

        let pdf = STANDARD.decode(result["formatted_reports"]["pdf_data"].as_str().unwrap()).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(result["formatted_reports"]["html"].as_str().unwrap().contains("data:image/svg+xml;base64,"));
        assert_eq!(result["formatted_reports"]["json"]["document_summary"]["filename"], "proposal.txt");
    }

    #[tokio::test]
    async fn test_formats_can_be_disabled() {
        let mut request = sample_request();
        request["options"] = json!({"include_html": false, "include_pdf": false});
        let result = ReportGenerator::new().process(request).await.unwrap();
        assert_eq!(result["report_metadata"]["report_formats"], json!(["json"]));
    }

    #[tokio::test]
    async fn test_empty_request_still_reports() {
        let result = ReportGenerator::new().process(json!({})).await.unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["report_metadata"]["chart_count"], 1);
        assert_eq!(result["report_metadata"]["analysis_confidence"], "medium");
    }

    #[test]
    fn test_options_default_on() {
        assert_eq!(ReportOptions::from_request(&json!({})), ReportOptions::default());
    }
}
