use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Instant;
use tracing::info;

use crate::agents::agent::{finish, log_received, require_text, Agent, AgentDescriptor};
use crate::agents::analytics::AnalyticsAgent;
use crate::agents::sentiment::SentimentAnalyzer;
use crate::agents::text_extractor::TextExtractor;
use crate::analysis::quick_sentiment;
use crate::error::Result;
use crate::report::list;

pub const NAME: &str = "document_analyzer";

/// Single-hop agent: extraction, analytics and quick sentiment over raw
/// `content`, condensed into one summary.
pub struct DocumentAnalyzer {
    extractor: TextExtractor,
    analytics: AnalyticsAgent,
    sentiment: SentimentAnalyzer,
}

fn entity_list(entities: &Value, kinds: &[&str]) -> Vec<String> {
    kinds.iter().flat_map(|k| list(&entities[*k])).collect()
}

impl DocumentAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            extractor: TextExtractor::new()?,
            analytics: AnalyticsAgent::new()?,
            sentiment: SentimentAnalyzer::new()?,
        })
    }

    pub fn analyze(&self, content: &str) -> Map<String, Value> {
        let started = Instant::now();

        let extracted = self.extractor.extract(content, "business_document", json!({}));
        let cleaned = extracted["cleaned_text"].as_str().unwrap_or(content);
        let entities = &extracted["entities"];
        let sections = extracted["sections"].as_array().cloned().unwrap_or_default();

        let analysis = self.analytics.analyze(
            cleaned,
            entities,
            &sections,
            &extracted["key_phrases"],
            &extracted["statistics"],
        );
        let quick = self.sentiment.analyze_quick(content);

        let entity_count: usize = entities
            .as_object()
            .map(|m| m.values().map(|v| v.as_array().map_or(0, Vec::len)).sum())
            .unwrap_or(0);
        let topic_count = analysis["topics"]["categorized_topics"]
            .as_object()
            .map_or(0, |m| m.values().map(|v| v.as_array().map_or(0, Vec::len)).sum::<usize>());
        let hits = quick_sentiment(content);
        let sentiment_indicators = hits.positive_hits + hits.negative_hits;

        let mut key_topics = list(&extracted["key_phrases"]["noun_phrases"]);
        key_topics.truncate(5);

        let mut body = Map::new();
        body.insert(
            "document_info".into(),
            json!({
                "word_count": content.split_whitespace().count(),
                "document_type": "business_document",
                "language": extracted["language"]["name"],
                "quality_score": analysis["quality_assessment"]["quality_score"],
            }),
        );
        body.insert(
            "key_metrics".into(),
            json!({
                "entities_found": entity_count,
                "topics_identified": topic_count,
                "sentiment_indicators": sentiment_indicators,
                "risk_level": analysis["risk_analysis"]["overall_risk_level"],
            }),
        );
        body.insert(
            "extracted_data".into(),
            json!({
                "organizations": entity_list(entities, &["company"]),
                "financial_figures": entity_list(entities, &["currency", "roi"]),
                "dates": entity_list(entities, &["date", "timelines"]),
                "key_topics": key_topics,
            }),
        );
        body.extend(quick);
        body.insert(
            "processing_time".into(),
            json!(format!("{:.2} seconds", started.elapsed().as_secs_f64())),
        );
        body
    }
}

#[async_trait]
impl Agent for DocumentAnalyzer {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor::new(
            NAME,
            "Analyzes documents and extracts key information, sentiment, and business metrics",
            &["document_analysis", "entity_extraction", "sentiment_analysis", "business_metrics"],
        )
    }

    async fn process(&self, request: Value) -> Result<Value> {
        let content = require_text(&request, "content", "No content provided")?;
        log_received(NAME, content);

        let body = self.analyze(content);
        info!("Document analysis completed in {}", body["processing_time"]);
        Ok(finish(body, NAME, "timestamp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMO: &str = "Executive Summary\nAcme Corp will deliver excellent growth. \
        The budget is $5,800,000 over 18 months with an ROI of 180% by December 15, 2025.\n\n\
        Risks\nA delay or cost overrun is possible.";

    #[tokio::test]
    async fn test_summary_shape() {
        let result = DocumentAnalyzer::new().unwrap().process(json!({"content": MEMO})).await.unwrap();

        assert_eq!(result["status"], "success");
        assert_eq!(result["agent"], NAME);
        assert_eq!(result["document_info"]["document_type"], "business_document");
        assert_eq!(result["document_info"]["language"], "English");
        assert_eq!(result["extracted_data"]["organizations"], json!(["Acme Corp"]));
        assert!(result["extracted_data"]["financial_figures"]
            .as_array()
            .unwrap()
            .contains(&json!("$5,800,000")));
        assert!(result["extracted_data"]["dates"].as_array().unwrap().contains(&json!("18 months")));
        assert_eq!(result["sentiment_analysis"]["overall_sentiment"], "positive");
        assert_eq!(result["emotional_analysis"]["dominant_emotion"], "optimistic");
        assert_eq!(result["key_metrics"]["sentiment_indicators"], 3);
        assert!(result["processing_time"].as_str().unwrap().ends_with(" seconds"));
    }

    #[tokio::test]
    async fn test_requires_content() {
        let err = DocumentAnalyzer::new().unwrap().process(json!({"text": "x"})).await.unwrap_err();
        assert!(err.to_string().contains("No content provided"));
    }
}
