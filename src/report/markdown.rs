use serde_json::Value;
use std::fmt::Write;

use super::{list, text_or, title_case, ReportData};

fn bullet(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "- **{}**: {}", label, value);
}

fn numbered(out: &mut String, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
}

fn bullets(out: &mut String, items: &[String]) {
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

fn overview(data: &ReportData) -> String {
    let confidence = data.sentiment["confidence"].as_f64().unwrap_or(0.0) * 100.0;
    format!(
        "Analysis of {} containing {} words. Overall sentiment is {} with {:.0}% confidence. Risk assessment indicates {} risk level.",
        data.document.document_type,
        data.document.word_count,
        text_or(&data.sentiment["overall_sentiment"], "neutral"),
        confidence,
        text_or(&data.risk["overall_risk_level"], "unknown"),
    )
}

fn object_keys(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|m| m.keys().map(|k| title_case(k)).collect())
        .unwrap_or_default()
}

pub fn executive_summary(data: &ReportData, generated_at: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Executive Summary: {}\n", data.document.filename);

    out.push_str("## Overview\n");
    let _ = writeln!(out, "{}\n", overview(data));

    out.push_str("## Key Findings\n");
    bullets(&mut out, &data.key_findings());
    out.push('\n');

    let sentiment = &data.sentiment;
    out.push_str("## Sentiment Analysis\n");
    bullet(
        &mut out,
        "Overall Sentiment",
        format!(
            "{} ({}/100)",
            title_case(&text_or(&sentiment["overall_sentiment"], "neutral")),
            text_or(&sentiment["sentiment_score"], "50")
        ),
    );
    bullet(
        &mut out,
        "Confidence Level",
        format!("{:.0}%", sentiment["confidence"].as_f64().unwrap_or(0.0) * 100.0),
    );
    bullet(&mut out, "Dominant Emotion", title_case(&text_or(&sentiment["dominant_emotion"], "neutral")));
    out.push('\n');

    out.push_str("## Risk Assessment\n");
    bullet(&mut out, "Risk Level", title_case(&text_or(&data.risk["overall_risk_level"], "unknown")));
    bullet(&mut out, "Risk Score", format!("{}/20", text_or(&data.risk["risk_score"], "0")));
    let areas = object_keys(&data.risk["detected_risks"]);
    if !areas.is_empty() {
        bullet(&mut out, "Key Risk Areas", areas.join(", "));
    }
    out.push('\n');

    out.push_str("## Business Metrics\n");
    if data.metrics["has_financial_data"].as_bool().unwrap_or(false) {
        bullet(&mut out, "Financial Data", "Present");
    }
    let roi = list(&data.metrics["roi_indicators"]);
    if !roi.is_empty() {
        bullet(&mut out, "ROI Indicators", roi.join(", "));
    }
    out.push('\n');

    out.push_str("## Recommendations\n");
    numbered(&mut out, &data.recommendations());

    let _ = write!(out, "\n---\n*Report generated on {}*\n", generated_at);
    out
}

pub fn detailed_report(data: &ReportData, generated_at: &str, agent_version: &str) -> String {
    let mut out = String::new();
    let doc = &data.document;

    out.push_str("# Comprehensive Analysis Report\n\n");
    let _ = writeln!(out, "**Document**: {}  ", doc.filename);
    let _ = writeln!(out, "**Analysis Date**: {}  \n", generated_at);

    out.push_str("## Document Information\n");
    bullet(&mut out, "Document Type", title_case(&doc.document_type));
    bullet(&mut out, "Word Count", doc.word_count);
    bullet(&mut out, "Language", &doc.language);
    bullet(&mut out, "Quality Score", format!("{}/100", doc.quality_score));
    out.push('\n');

    out.push_str("## Content Analysis\n\n### Topics and Themes\n");
    let _ = writeln!(
        out,
        "**Primary Focus**: {}",
        title_case(&text_or(&data.topics["primary_focus"], "general"))
    );
    if let Some(categories) = data.topics["categorized_topics"].as_object() {
        for (category, phrases) in categories {
            bullet(&mut out, &title_case(category), list(phrases).join(", "));
        }
    }

    out.push_str("\n### Extracted Entities\n");
    if let Some(entities) = data.entities.as_object() {
        for (kind, values) in entities {
            let values = list(values);
            if !values.is_empty() {
                bullet(&mut out, &title_case(kind), values.join(", "));
            }
        }
    }

    out.push_str("\n## Sentiment & Emotional Analysis\n\n### Overall Sentiment\n");
    let sentiment = &data.sentiment;
    bullet(&mut out, "Sentiment", title_case(&text_or(&sentiment["overall_sentiment"], "neutral")));
    bullet(&mut out, "Sentiment Score", format!("{}/100", text_or(&sentiment["sentiment_score"], "50")));
    bullet(&mut out, "Dominant Emotion", title_case(&text_or(&sentiment["dominant_emotion"], "neutral")));

    let detected = list(&data.emotions["emotions_detected"]);
    if !detected.is_empty() {
        out.push_str("\n### Emotional Profile\n");
        for emotion in &detected {
            let share = text_or(&data.emotions["emotion_percentages"][emotion.as_str()], "0");
            bullet(&mut out, &title_case(emotion), format!("{}%", share));
        }
    }

    out.push_str("\n### Business Sentiment\n");
    let business = &data.business_sentiment;
    bullet(&mut out, "Business Tone", title_case(&text_or(&business["business_tone"], "neutral")));
    bullet(
        &mut out,
        "Financial Sentiment",
        title_case(&text_or(&business["financial_sentiment"]["sentiment"], "neutral")),
    );
    bullet(
        &mut out,
        "Performance Sentiment",
        title_case(&text_or(&business["performance_sentiment"]["sentiment"], "neutral")),
    );

    out.push_str("\n## Risk Analysis\n\n### Risk Assessment\n");
    bullet(&mut out, "Overall Risk Level", title_case(&text_or(&data.risk["overall_risk_level"], "unknown")));
    bullet(&mut out, "Risk Score", format!("{}/20", text_or(&data.risk["risk_score"], "0")));
    if let Some(risks) = data.risk["detected_risks"].as_object().filter(|r| !r.is_empty()) {
        out.push_str("\n### Identified Risk Categories\n");
        for (kind, details) in risks {
            bullet(
                &mut out,
                &title_case(kind),
                format!(
                    "{} severity ({} indicators)",
                    title_case(&text_or(&details["severity"], "low")),
                    text_or(&details["count"], "0")
                ),
            );
        }
    }
    out.push_str("\n### Risk Recommendations\n");
    bullets(&mut out, &list(&data.risk["recommendations"]));

    out.push_str("\n## Business Intelligence\n\n### Performance Metrics\n");
    let performance = list(&data.metrics["performance_indicators"]);
    if !performance.is_empty() {
        bullet(&mut out, "Performance Indicators", performance.join(", "));
    }
    let growth = list(&data.metrics["growth_indicators"]);
    if !growth.is_empty() {
        bullet(&mut out, "Growth Indicators", growth.join(", "));
    }

    out.push_str("\n### Compliance Analysis\n");
    let frameworks = list(&data.compliance["frameworks_identified"]);
    if !frameworks.is_empty() {
        bullet(&mut out, "Compliance Frameworks", frameworks.join(", ").to_uppercase());
        bullet(&mut out, "Compliance Focus", title_case(&text_or(&data.compliance["compliance_focus"], "low")));
    }

    out.push_str("\n## Quality Assessment\n");
    bullet(&mut out, "Content Quality", title_case(&text_or(&data.quality["quality_level"], "unknown")));
    let factors = list(&data.quality["quality_factors"]);
    if !factors.is_empty() {
        bullet(&mut out, "Quality Factors", factors.join(", "));
    }

    out.push_str("\n## Insights and Recommendations\n\n### Key Insights\n");
    bullets(&mut out, &list(&data.insights["key_findings"]));
    out.push_str("\n### Recommended Actions\n");
    numbered(&mut out, &list(&data.insights["recommendations"]));

    let opportunities = list(&data.insights["opportunities"]);
    if !opportunities.is_empty() {
        out.push_str("\n### Opportunities\n");
        bullets(&mut out, &opportunities);
    }
    let concerns = list(&data.insights["concerns"]);
    if !concerns.is_empty() {
        out.push_str("\n### Areas of Concern\n");
        bullets(&mut out, &concerns);
    }

    out.push_str("\n---\n");
    let _ = writeln!(out, "**Analysis Confidence**: {}  ", title_case(&data.analysis_confidence()));
    let _ = writeln!(out, "**Report Generated**: {}  ", generated_at);
    let _ = writeln!(out, "**Agent**: report_generator v{}", agent_version);
    out
}

/// Number of `## ` sections in a rendered report, counting the preamble.
pub fn section_count(report: &str) -> usize {
    report.split("\n## ").count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_request;

    #[test]
    fn test_executive_summary_content() {
        let data = ReportData::from_request(&sample_request());
        let summary = executive_summary(&data, "January 02, 2025 at 09:30 AM");

        assert!(summary.starts_with("# Executive Summary: proposal.txt\n"));
        assert!(summary.contains("Analysis of text containing 1250 words. Overall sentiment is positive with 81% confidence."));
        assert!(summary.contains("- **Overall Sentiment**: Positive (72.5/100)"));
        assert!(summary.contains("- **Key Risk Areas**: Financial, Operational"));
        assert!(summary.contains("- **ROI Indicators**: 180"));
        assert!(summary.contains("1. Develop comprehensive risk mitigation strategy\n2. Ensure compliance"));
        assert!(summary.ends_with("*Report generated on January 02, 2025 at 09:30 AM*\n"));
    }

    #[test]
    fn test_detailed_report_sections() {
        let data = ReportData::from_request(&sample_request());
        let report = detailed_report(&data, "today", "1.0.0");

        assert!(report.contains("- **Market**: market share, customer base"));
        assert!(report.contains("- **Financial**: Medium severity (4 indicators)"));
        assert!(report.contains("- **Trust**: 60.0%"));
        assert!(report.contains("- **Compliance Frameworks**: GDPR"));
        assert!(report.contains("**Agent**: report_generator v1.0.0"));
        assert!(!report.contains("### Opportunities"));
        assert_eq!(section_count(&report), 8);
    }

    #[test]
    fn test_empty_data_still_renders() {
        let data = ReportData::from_request(&serde_json::json!({}));
        let summary = executive_summary(&data, "now");
        assert!(summary.contains("Risk assessment indicates unknown risk level."));
        assert!(!summary.contains("Key Risk Areas"));
        let report = detailed_report(&data, "now", "1.0.0");
        assert!(report.contains("**Primary Focus**: General"));
    }
}
