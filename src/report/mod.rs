//! Rendering of the final analysis report: markdown summaries, SVG charts,
//! an HTML page and a one page PDF.

pub mod charts;
pub mod html;
pub mod markdown;
pub mod pdf;

use serde::Serialize;
use serde_json::{json, Value};

use crate::agents::agent::object_field;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentInfo {
    pub document_type: String,
    pub filename: String,
    pub word_count: u64,
    pub language: String,
    pub quality_score: u64,
}

/// The merged analysis results a report is rendered from.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub document: DocumentInfo,
    pub entities: Value,
    pub topics: Value,
    pub sentiment: Value,
    pub emotions: Value,
    pub business_sentiment: Value,
    pub risk: Value,
    pub metrics: Value,
    pub compliance: Value,
    pub quality: Value,
    pub insights: Value,
    pub analysis_summary: Value,
}

impl ReportData {
    pub fn from_request(request: &Value) -> Self {
        let quality = object_field(request, "quality_assessment");
        Self {
            document: DocumentInfo {
                document_type: text_or(&request["document_type"], "unknown"),
                filename: text_or(&request["filename"], "Unknown Document"),
                word_count: request["statistics"]["word_count"].as_u64().unwrap_or(0),
                language: text_or(&request["language"]["name"], "Unknown"),
                quality_score: quality["quality_score"].as_u64().unwrap_or(0),
            },
            entities: object_field(request, "entities"),
            topics: object_field(request, "topics"),
            sentiment: object_field(request, "sentiment_summary"),
            emotions: object_field(request, "emotions"),
            business_sentiment: object_field(request, "business_sentiment"),
            risk: object_field(request, "risk_analysis"),
            metrics: object_field(request, "business_metrics"),
            compliance: object_field(request, "compliance"),
            quality,
            insights: object_field(request, "insights"),
            analysis_summary: object_field(request, "analysis_summary"),
        }
    }

    pub fn analysis_confidence(&self) -> String {
        text_or(&self.analysis_summary["analysis_confidence"], "medium")
    }

    /// Findings for the summary, strongest signals first, at most five.
    pub fn key_findings(&self) -> Vec<String> {
        let mut findings = Vec::new();

        let sentiment = text_or(&self.sentiment["overall_sentiment"], "neutral");
        if sentiment != "neutral" {
            findings.push(format!("Strong {} sentiment detected throughout document", sentiment));
        }
        let risk_score = self.risk["risk_score"].as_u64().unwrap_or(0);
        if risk_score > 5 {
            findings.push(format!("Multiple risk factors identified (score: {}/20)", risk_score));
        }
        if self.metrics["has_financial_data"].as_bool().unwrap_or(false) {
            findings.push("Significant financial data and metrics present".to_string());
        }
        let focus = text_or(&self.topics["primary_focus"], "");
        if !focus.is_empty() && focus != "general" {
            findings.push(format!("Primary focus area identified as {}", focus));
        }
        let quality = text_or(&self.quality["quality_level"], "");
        if quality == "excellent" || quality == "good" {
            findings.push(format!("Content quality assessed as {}", quality));
        }

        findings.truncate(5);
        findings
    }

    /// Executive recommendations, at most four.
    pub fn recommendations(&self) -> Vec<String> {
        let mut recs = Vec::new();

        if self.sentiment["overall_sentiment"] == "negative" {
            recs.push("Address negative sentiment factors to improve stakeholder perception");
        }
        if matches!(self.risk["overall_risk_level"].as_str(), Some("high" | "medium")) {
            recs.push("Develop comprehensive risk mitigation strategy");
        }
        if !list(&self.compliance["frameworks_identified"]).is_empty() {
            recs.push("Ensure compliance with identified regulatory frameworks");
        }
        if matches!(self.quality["quality_level"].as_str(), Some("fair" | "needs improvement")) {
            recs.push("Improve content structure and clarity");
        }
        if self.metrics["has_performance_data"].as_bool().unwrap_or(false) {
            recs.push("Leverage performance data for strategic decision making");
        }

        recs.truncate(4);
        recs.into_iter().map(str::to_string).collect()
    }

    pub fn json_report(&self, generated_at: &str, version: &str) -> Value {
        json!({
            "report_metadata": {
                "generated_at": generated_at,
                "agent": "report_generator",
                "version": version,
                "report_type": "comprehensive_analysis",
            },
            "document_summary": {
                "filename": self.document.filename,
                "document_type": self.document.document_type,
                "word_count": self.document.word_count,
                "language": self.document.language,
                "quality_score": self.quality["quality_score"],
            },
            "analysis_results": {
                "sentiment_analysis": self.sentiment,
                "emotion_analysis": self.emotions,
                "risk_assessment": self.risk,
                "business_intelligence": self.metrics,
                "compliance_analysis": self.compliance,
                "topic_analysis": self.topics,
            },
            "insights_and_recommendations": self.insights,
            "quality_assessment": self.quality,
        })
    }
}

pub fn text_or(value: &Value, default: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Array items rendered as strings; anything else is empty.
pub fn list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().map(|v| text_or(v, "")).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// "market_share" -> "Market Share".
pub fn title_case(text: &str) -> String {
    text.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_request() -> Value {
        json!({
            "filename": "proposal.txt",
            "document_type": "text",
            "statistics": {"word_count": 1250},
            "language": {"code": "en", "name": "English"},
            "sentiment_summary": {"overall_sentiment": "positive", "sentiment_score": 72.5, "confidence": 0.81, "dominant_emotion": "trust"},
            "emotions": {"emotions_detected": ["trust", "joy"], "emotion_percentages": {"trust": 60.0, "joy": 40.0}},
            "business_sentiment": {"business_tone": "optimistic", "financial_sentiment": {"sentiment": "positive"}, "performance_sentiment": {"sentiment": "neutral"}},
            "risk_analysis": {
                "overall_risk_level": "medium",
                "risk_score": 7,
                "detected_risks": {
                    "financial": {"keywords": ["budget", "cost"], "count": 4, "severity": "medium"},
                    "operational": {"keywords": ["delay"], "count": 1, "severity": "low"}
                },
                "recommendations": ["Consider detailed financial risk assessment and mitigation strategies"]
            },
            "business_metrics": {"has_financial_data": true, "has_performance_data": true, "roi_indicators": ["180"], "performance_indicators": ["25%"], "growth_indicators": ["25%"]},
            "compliance": {"frameworks_identified": ["gdpr"], "compliance_focus": "medium"},
            "topics": {"primary_focus": "financial", "categorized_topics": {"financial": ["revenue growth"], "market": ["market share", "customer base"]}},
            "quality_assessment": {"quality_score": 75, "quality_level": "good", "quality_factors": ["Appropriate length"]},
            "insights": {"key_findings": ["Primary document focus: financial"], "recommendations": ["Review budget"], "opportunities": [], "concerns": []},
            "analysis_summary": {"analysis_confidence": "high"},
            "entities": {"currency": ["$2,000,000"], "percentage": ["25%"]}
        })
    }

    #[test]
    fn test_from_request_defaults() {
        let data = ReportData::from_request(&json!({}));
        assert_eq!(data.document.filename, "Unknown Document");
        assert_eq!(data.document.language, "Unknown");
        assert_eq!(data.analysis_confidence(), "medium");
        assert!(data.key_findings().is_empty());
        assert!(data.recommendations().is_empty());
    }

    #[test]
    fn test_findings_and_recommendations() {
        let data = ReportData::from_request(&sample_request());
        assert_eq!(data.document.word_count, 1250);
        assert_eq!(data.document.quality_score, 75);

        let findings = data.key_findings();
        assert_eq!(findings.len(), 5);
        assert_eq!(findings[0], "Strong positive sentiment detected throughout document");

        assert_eq!(
            data.recommendations(),
            vec![
                "Develop comprehensive risk mitigation strategy",
                "Ensure compliance with identified regulatory frameworks",
                "Leverage performance data for strategic decision making",
            ]
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("market_share"), "Market Share");
        assert_eq!(title_case("needs improvement"), "Needs Improvement");
        assert_eq!(title_case("GDPR"), "Gdpr");
        assert_eq!(title_case(""), "");
    }
}
