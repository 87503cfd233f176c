use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::info;

use crate::agents::agent::{array_field, finish, log_received, object_field, require_text, Agent, AgentDescriptor};
use crate::analysis::{count_all, level, polarity_label, round_to, top_counts, word_frequencies, Lexicon};
use crate::error::{Result, ShowcaseError};

pub const NAME: &str = "analytics_agent";

const RISK_KEYWORDS: &[(&str, &[&str])] = &[
    ("financial", &["budget", "cost", "expensive", "overrun", "deficit", "loss", "debt", "liability"]),
    ("operational", &["delay", "bottleneck", "failure", "breakdown", "issue", "problem", "challenge"]),
    ("compliance", &["violation", "breach", "non-compliant", "audit", "regulatory", "legal"]),
    ("security", &["breach", "vulnerability", "threat", "attack", "unauthorized", "hack"]),
    ("reputation", &["negative", "criticism", "complaint", "dissatisfied", "poor", "bad"]),
    ("market", &["competition", "disruption", "decline", "recession", "volatility", "uncertainty"]),
];

const COMPLIANCE_FRAMEWORKS: &[(&str, &[&str])] = &[
    ("gdpr", &["personal data", "privacy", "consent", "data protection", "gdpr"]),
    ("sox", &["financial reporting", "internal controls", "sarbanes-oxley", "sox"]),
    ("hipaa", &["patient data", "health information", "medical records", "hipaa"]),
    ("pci", &["payment card", "credit card", "cardholder data", "pci-dss"]),
    ("iso27001", &["information security", "security management", "iso 27001"]),
    ("iso9001", &["quality management", "quality standards", "iso 9001"]),
];

const COMPLIANCE_TERMS: &[&str] = &["compliant", "compliance", "regulation", "standard", "audit", "certification"];

const TOPIC_CATEGORIES: &[(&str, &[&str])] = &[
    ("business", &["business", "company", "organization", "corporate", "enterprise"]),
    ("financial", &["financial", "money", "cost", "budget", "revenue", "profit"]),
    ("technology", &["technology", "digital", "software", "system", "platform"]),
    ("operational", &["operation", "process", "workflow", "procedure", "management"]),
    ("strategy", &["strategy", "plan", "objective", "goal", "vision", "mission"]),
    ("market", &["market", "customer", "client", "competition", "industry"]),
    ("project", &["project", "initiative", "implementation", "development", "deployment"]),
];

const TONE_INDICATORS: &[(&str, &[&str])] = &[
    ("professional", &["professional", "business", "formal", "official", "corporate"]),
    ("confident", &["confident", "certain", "assured", "definite", "strong"]),
    ("cautious", &["careful", "cautious", "conservative", "prudent"]),
    ("urgent", &["urgent", "immediate", "critical", "important", "asap"]),
    ("optimistic", &["optimistic", "positive", "hopeful", "promising", "bright"]),
    ("analytical", &["analysis", "data", "research", "study", "examination"]),
];

const HIGH_CONFIDENCE: &[&str] = &["will", "definitely", "certainly", "guaranteed", "ensure", "confirm"];
const MEDIUM_CONFIDENCE: &[&str] = &["likely", "probably", "expected", "anticipated", "should"];
const LOW_CONFIDENCE: &[&str] = &["might", "maybe", "possibly", "perhaps", "could", "may"];

const GROWTH_WORDS: &[&str] = &["increase", "growth", "rise", "expand", "improve", "enhance"];
const DECLINE_WORDS: &[&str] = &["decrease", "decline", "fall", "reduce", "drop", "shrink"];
const FUTURE_WORDS: &[&str] = &["will", "future", "next", "upcoming", "planned", "expected"];
const PROFESSIONAL_TERMS: &[&str] = &["analysis", "methodology", "results", "recommendations", "objective"];

/// Topic, risk, metric, compliance, tone and quality analysis over cleaned
/// text and the extractor's structures.
pub struct AnalyticsAgent {
    metric_patterns: Vec<(&'static str, Regex)>,
    performance_patterns: Vec<Regex>,
    growth_patterns: Vec<Regex>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ShowcaseError::AgentError(format!("Invalid pattern {}: {}", pattern, e)).into())
}

/// Group 1 of every match, or the whole match when there is no group.
fn first_groups(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1).or_else(|| c.get(0)).map(|m| m.as_str().to_string()))
        .collect()
}

/// Numeric part of an entity string, "$1,500,000" -> 1500000.0, "50.5%" -> 50.5.
fn numeric_value(raw: &str) -> f64 {
    let number: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    number.trim_matches('.').parse().unwrap_or(0.0)
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

impl AnalyticsAgent {
    pub fn new() -> Result<Self> {
        Ok(Self {
            metric_patterns: vec![
                ("percentage", compile(r"(\d+(?:\.\d+)?)\s*%")?),
                ("currency", compile(r"(?i)\$(\d+(?:,\d{3})*(?:\.\d{2})?)\s*(?:million|billion|M\b|B\b)?")?),
                ("timeline", compile(r"(?i)(\d+\s*(?:month|year|week|day|quarter))s?")?),
                ("roi", compile(r"(?i)\b(?:ROI|return)\s*(?:of|:)?\s*(\d+(?:\.\d+)?)\s*%?")?),
                ("efficiency", compile(r"(?i)(?:efficiency|productivity|performance)\s*(?:increase|improvement|boost)\s*(?:of|by)?\s*(\d+(?:\.\d+)?)\s*%?")?),
            ],
            performance_patterns: vec![
                compile(r"(?i)(\d+(?:\.\d+)?%)\s*(?:increase|improvement|growth)")?,
                compile(r"(?i)(?:efficiency|productivity|performance)\s*(?:up|increased)\s*(?:by\s*)?(\d+(?:\.\d+)?%?)")?,
                compile(r"(?i)(?:reduced|decreased)\s*(?:by\s*)?(\d+(?:\.\d+)?%?)")?,
                compile(r"(?i)(?:achieved|reached|exceeded)\s*(\d+(?:\.\d+)?%?)")?,
            ],
            growth_patterns: vec![
                compile(r"(?i)(\d+(?:\.\d+)?%)\s*growth")?,
                compile(r"(?i)revenue\s*(?:increased|grew)\s*(?:by\s*)?(\$[\d,]+(?:\.\d+)?[MBmb]?)")?,
                compile(r"(?i)market\s*share\s*(?:increased|grew)\s*(?:by\s*)?(\d+(?:\.\d+)?%?)")?,
                compile(r"(?i)customer\s*base\s*(?:grew|increased)\s*(?:by\s*)?(\d+(?:\.\d+)?%?)")?,
            ],
        })
    }

    pub fn analyze_topics(&self, text: &str, key_phrases: &Value) -> Value {
        let phrases = string_list(&key_phrases["noun_phrases"]);

        let mut categorized = Map::new();
        let mut primary: Option<(&str, usize)> = None;
        for (category, keywords) in TOPIC_CATEGORIES {
            let matching: Vec<&String> = phrases
                .iter()
                .filter(|p| {
                    let lower = p.to_lowercase();
                    keywords.iter().any(|k| lower.contains(k))
                })
                .take(5)
                .collect();
            if matching.is_empty() {
                continue;
            }
            if primary.map_or(true, |(_, n)| matching.len() > n) {
                primary = Some((*category, matching.len()));
            }
            categorized.insert(category.to_string(), json!(matching));
        }

        // the twenty most frequent raw tokens, keeping long alphabetic ones
        let lower = text.to_lowercase();
        let tokens: Vec<String> = lower.split_whitespace().map(str::to_string).collect();
        let freq = word_frequencies(&tokens);
        let themes: Vec<String> = top_counts(&freq, 20)
            .into_iter()
            .map(|(w, _)| w)
            .filter(|w| w.chars().count() > 3 && w.chars().all(char::is_alphabetic))
            .take(10)
            .collect();

        json!({
            "categorized_topics": categorized,
            "top_phrases": phrases.iter().take(10).collect::<Vec<_>>(),
            "common_themes": themes,
            "topic_diversity": categorized.len(),
            "primary_focus": primary.map(|(c, _)| c).unwrap_or("general"),
        })
    }

    pub fn analyze_risks(&self, text: &str, entities: &Value) -> Value {
        let lower = text.to_lowercase();
        let mut detected = Map::new();
        let mut risk_score = 0usize;

        for (category, keywords) in RISK_KEYWORDS {
            let found: Vec<&str> = keywords.iter().copied().filter(|k| lower.contains(k)).collect();
            if found.is_empty() {
                continue;
            }
            let severity = if found.len() > 3 {
                "high"
            } else if found.len() > 1 {
                "medium"
            } else {
                "low"
            };
            detected.insert(
                category.to_string(),
                json!({
                    "keywords": found,
                    "count": count_all(&lower, &found),
                    "severity": severity,
                }),
            );
            risk_score += found.len();
        }

        let mut financial_risks = Vec::new();
        if string_list(&entities["currency"]).iter().any(|a| numeric_value(a) > 1_000_000.0) {
            financial_risks.push("Large financial commitments identified");
        }
        if string_list(&entities["percentage"]).iter().any(|p| numeric_value(p) > 50.0) {
            financial_risks.push("High percentage changes noted");
        }

        let mut timeline_risks = Vec::new();
        if string_list(&entities["timelines"]).iter().any(|t| t.to_lowercase().contains("year")) {
            timeline_risks.push("Long-term commitments identified");
        }

        let overall = level(risk_score as f64, 10.0, 5.0);

        json!({
            "recommendations": risk_recommendations(&detected, risk_score),
            "detected_risks": detected,
            "financial_risks": financial_risks,
            "timeline_risks": timeline_risks,
            "risk_score": risk_score,
            "overall_risk_level": overall,
            "risk_factors_count": detected.len(),
        })
    }

    pub fn extract_business_metrics(&self, text: &str, entities: &Value) -> Value {
        let mut metrics = Map::new();

        for (kind, pattern) in &self.metric_patterns {
            let matches = first_groups(pattern, text);
            if matches.is_empty() {
                continue;
            }
            if *kind == "currency" {
                let values: Vec<f64> = matches
                    .iter()
                    .filter_map(|m| m.replace(',', "").parse::<f64>().ok())
                    .collect();
                if values.is_empty() {
                    continue;
                }
                let total: f64 = values.iter().sum();
                metrics.insert(
                    kind.to_string(),
                    json!({
                        "values": values,
                        "total": total,
                        "average": total / values.len() as f64,
                        "max": values.iter().cloned().fold(f64::MIN, f64::max),
                        "min": values.iter().cloned().fold(f64::MAX, f64::min),
                    }),
                );
            } else {
                metrics.insert(kind.to_string(), json!(matches));
            }
        }

        let mut roi: BTreeSet<String> = string_list(&entities["roi"]).into_iter().collect();
        if let Some(found) = metrics.get("roi") {
            roi.extend(string_list(found));
        }

        let performance: Vec<String> = self.performance_patterns.iter().flat_map(|p| first_groups(p, text)).take(10).collect();
        let growth: Vec<String> = self.growth_patterns.iter().flat_map(|p| first_groups(p, text)).take(10).collect();

        let has_financial = metrics.contains_key("currency") || entities.get("currency").is_some();
        let confidence = if metrics.len() > 2 {
            "high"
        } else if !metrics.is_empty() {
            "medium"
        } else {
            "low"
        };

        json!({
            "extracted_metrics": metrics,
            "roi_indicators": roi,
            "has_performance_data": !performance.is_empty(),
            "performance_indicators": performance,
            "growth_indicators": growth,
            "has_financial_data": has_financial,
            "metrics_confidence": confidence,
        })
    }

    pub fn analyze_compliance(&self, text: &str) -> Value {
        let lower = text.to_lowercase();
        let mut matches = Map::new();

        for (framework, keywords) in COMPLIANCE_FRAMEWORKS {
            let found: Vec<&str> = keywords.iter().copied().filter(|k| lower.contains(k)).collect();
            if found.is_empty() {
                continue;
            }
            matches.insert(
                framework.to_string(),
                json!({
                    "keywords": found,
                    "mentions": count_all(&lower, &found),
                    "relevance": if found.len() > 2 { "high" } else { "medium" },
                }),
            );
        }

        let mentions = count_all(&lower, COMPLIANCE_TERMS);
        let frameworks: Vec<String> = matches.keys().cloned().collect();

        let mut recommendations: Vec<&str> = frameworks
            .iter()
            .filter_map(|f| match f.as_str() {
                "gdpr" => Some("Ensure GDPR compliance for data handling and privacy"),
                "sox" => Some("Review financial reporting controls per SOX requirements"),
                "hipaa" => Some("Verify HIPAA compliance for health information handling"),
                "pci" => Some("Confirm PCI-DSS scope for any cardholder data flows"),
                _ => None,
            })
            .collect();
        if recommendations.is_empty() {
            recommendations.push("No specific compliance frameworks identified");
        }

        json!({
            "framework_matches": matches,
            "compliance_mentions": mentions,
            "frameworks_identified": frameworks,
            "compliance_focus": level(mentions as f64, 5.0, 2.0),
            "recommendations": recommendations,
        })
    }

    pub fn analyze_sentiment_and_tone(&self, text: &str) -> Value {
        let score = Lexicon::shared().score(text);
        let lower = text.to_lowercase();

        let mut tones = Map::new();
        let mut primary: Option<(&str, usize)> = None;
        for (tone, keywords) in TONE_INDICATORS {
            let count = count_all(&lower, keywords);
            if count == 0 {
                continue;
            }
            if primary.map_or(true, |(_, n)| count > n) {
                primary = Some((*tone, count));
            }
            tones.insert(tone.to_string(), json!(count));
        }

        let high = count_all(&lower, HIGH_CONFIDENCE);
        let medium = count_all(&lower, MEDIUM_CONFIDENCE);
        let low = count_all(&lower, LOW_CONFIDENCE);
        let total = high + medium + low;
        let overall_confidence = if total == 0 {
            "neutral"
        } else if high > medium && high > low {
            "high"
        } else if low > high && low > medium {
            "low"
        } else {
            "medium"
        };
        let confidence_score = (high as f64 * 2.0 + medium as f64 - low as f64) / total.max(1) as f64;

        json!({
            "polarity": round_to(score.polarity, 3),
            "subjectivity": round_to(score.subjectivity, 3),
            "sentiment_label": polarity_label(score.polarity, 0.3),
            "tone": {
                "detected_tones": tones,
                "primary_tone": primary.map(|(t, _)| t).unwrap_or("neutral"),
                "tone_strength": primary.map(|(_, n)| n).unwrap_or(0),
            },
            "confidence_indicators": {
                "high_confidence_indicators": high,
                "medium_confidence_indicators": medium,
                "low_confidence_indicators": low,
                "overall_confidence": overall_confidence,
                "confidence_score": round_to(confidence_score, 3),
            },
            "emotional_intensity": level(score.polarity.abs(), 0.5, 0.2),
        })
    }

    pub fn assess_quality(&self, text: &str, sections: &[Value], statistics: &Value) -> Value {
        let mut score = 0u32;
        let mut factors = Vec::new();

        if sections.len() > 1 {
            score += 20;
            factors.push("Well-structured with multiple sections");
        }

        let word_count = statistics["word_count"].as_u64().unwrap_or(0);
        if (500..=5000).contains(&word_count) {
            score += 15;
            factors.push("Appropriate length");
        } else if word_count > 5000 {
            score += 10;
            factors.push("Comprehensive content");
        }

        let diversity = statistics["lexical_diversity"].as_f64().unwrap_or(0.0);
        if diversity > 0.5 {
            score += 15;
            factors.push("Good vocabulary diversity");
        } else if diversity > 0.3 {
            score += 10;
            factors.push("Adequate vocabulary diversity");
        }

        let avg_sentence = statistics["average_words_per_sentence"].as_f64().unwrap_or(0.0);
        if (10.0..=20.0).contains(&avg_sentence) {
            score += 15;
            factors.push("Good sentence length");
        } else if avg_sentence > 0.0 {
            score += 5;
            factors.push("Acceptable sentence structure");
        }

        let has_title = |needle: &str| {
            sections
                .iter()
                .filter_map(|s| s["title"].as_str())
                .any(|t| t.to_lowercase().contains(needle))
        };
        if has_title("summary") {
            score += 10;
            factors.push("Contains summary section");
        }
        if has_title("conclusion") {
            score += 10;
            factors.push("Contains conclusion");
        }

        if count_all(&text.to_lowercase(), PROFESSIONAL_TERMS) > 5 {
            score += 15;
            factors.push("Professional terminology");
        }

        let score = score.min(100);
        let quality_level = match score {
            80.. => "excellent",
            60..=79 => "good",
            40..=59 => "fair",
            _ => "needs improvement",
        };

        let mut improvements = Vec::new();
        if score < 60 {
            improvements.push("Overall content structure and organization");
        }
        if diversity < 0.3 {
            improvements.push("Vocabulary diversity and word choice");
        }
        if avg_sentence > 25.0 {
            improvements.push("Sentence length and readability");
        } else if avg_sentence < 8.0 {
            improvements.push("Sentence structure and complexity");
        }
        if improvements.is_empty() {
            improvements.push("Content quality is satisfactory");
        }

        json!({
            "quality_score": score,
            "quality_level": quality_level,
            "quality_factors": factors,
            "improvement_areas": improvements,
        })
    }

    pub fn analyze_trends(&self, text: &str, entities: &Value) -> Value {
        let lower = text.to_lowercase();
        let growth = count_all(&lower, GROWTH_WORDS);
        let decline = count_all(&lower, DECLINE_WORDS);
        let future = count_all(&lower, FUTURE_WORDS);

        let direction = match growth.cmp(&decline) {
            std::cmp::Ordering::Greater => "positive",
            std::cmp::Ordering::Less => "negative",
            std::cmp::Ordering::Equal => "stable",
        };
        let temporal = string_list(&entities["date"]).len() + string_list(&entities["time"]).len();

        json!({
            "trend_direction": direction,
            "growth_indicators": growth,
            "decline_indicators": decline,
            "future_orientation": level(future as f64, 10.0, 5.0),
            "temporal_references": temporal,
            "trend_strength": growth.abs_diff(decline),
        })
    }

    pub fn generate_insights(&self, topics: &Value, risks: &Value, metrics: &Value, compliance: &Value, sentiment: &Value) -> Value {
        let mut key_findings = Vec::new();
        let mut recommendations = Vec::new();
        let mut opportunities = Vec::new();
        let mut concerns = Vec::new();

        let focus = topics["primary_focus"].as_str().unwrap_or("general");
        key_findings.push(format!("Primary document focus: {}", focus));
        if metrics["has_financial_data"].as_bool().unwrap_or(false) {
            key_findings.push("Contains significant financial information".to_string());
        }
        let risk_level = risks["overall_risk_level"].as_str().unwrap_or("low");
        if risk_level != "low" {
            key_findings.push(format!("Risk level assessed as: {}", risk_level));
        }

        if sentiment["sentiment_label"] == "negative" {
            recommendations.push("Review negative sentiment indicators and address concerns");
        }
        if compliance["compliance_focus"] == "high" {
            recommendations.push("Ensure compliance requirements are properly addressed");
        }
        if let Some(recs) = risks["recommendations"].as_array() {
            recommendations.extend(recs.iter().filter_map(Value::as_str).take(2));
        }

        if !metrics["growth_indicators"].as_array().map_or(true, Vec::is_empty) {
            opportunities.push("Growth opportunities identified in content");
        }
        if metrics["has_performance_data"].as_bool().unwrap_or(false) {
            opportunities.push("Performance metrics available for further analysis");
        }

        if risks["risk_score"].as_u64().unwrap_or(0) > 8 {
            concerns.push("Multiple risk factors identified requiring attention");
        }
        if !compliance["frameworks_identified"].as_array().map_or(true, Vec::is_empty) {
            concerns.push("Compliance frameworks mentioned - ensure adherence");
        }

        json!({
            "key_findings": key_findings,
            "recommendations": recommendations,
            "opportunities": opportunities,
            "concerns": concerns,
        })
    }

    pub fn analyze(&self, text: &str, entities: &Value, sections: &[Value], key_phrases: &Value, statistics: &Value) -> Map<String, Value> {
        let topics = self.analyze_topics(text, key_phrases);
        let risks = self.analyze_risks(text, entities);
        let metrics = self.extract_business_metrics(text, entities);
        let compliance = self.analyze_compliance(text);
        let sentiment = self.analyze_sentiment_and_tone(text);
        let quality = self.assess_quality(text, sections, statistics);
        let trends = self.analyze_trends(text, entities);
        let insights = self.generate_insights(&topics, &risks, &metrics, &compliance, &sentiment);

        let summary = json!({
            "document_focus": topics["primary_focus"],
            "risk_level": risks["overall_risk_level"],
            "has_metrics": metrics["has_financial_data"],
            "key_insights_count": insights["key_findings"].as_array().map_or(0, Vec::len),
            "recommendations_count": insights["recommendations"].as_array().map_or(0, Vec::len),
            "analysis_confidence": if metrics["metrics_confidence"] == "high" { "high" } else { "medium" },
        });

        let mut body = Map::new();
        body.insert("topics".into(), topics);
        body.insert("risk_analysis".into(), risks);
        body.insert("business_metrics".into(), metrics);
        body.insert("compliance".into(), compliance);
        body.insert("sentiment_tone".into(), sentiment);
        body.insert("quality_assessment".into(), quality);
        body.insert("trends".into(), trends);
        body.insert("insights".into(), insights);
        body.insert("analysis_summary".into(), summary);
        body
    }
}

fn risk_recommendations(detected: &Map<String, Value>, score: usize) -> Vec<&'static str> {
    let mut recs = Vec::new();
    if detected.contains_key("financial") {
        recs.push("Consider detailed financial risk assessment and mitigation strategies");
    }
    if detected.contains_key("operational") {
        recs.push("Implement operational risk monitoring and contingency planning");
    }
    if detected.contains_key("compliance") {
        recs.push("Ensure compliance review with legal team");
    }
    if detected.contains_key("security") {
        recs.push("Schedule a security review of the affected systems");
    }
    if score > 10 {
        recs.push("High risk factors detected - recommend comprehensive risk analysis");
    }
    if recs.is_empty() {
        recs.push("Risk levels appear manageable based on current analysis");
    }
    recs
}

#[async_trait]
impl Agent for AnalyticsAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor::new(
            NAME,
            "Performs deep content analysis, risk assessment, and business intelligence",
            &["topic_analysis", "risk_assessment", "business_metrics", "compliance_checking", "trend_analysis"],
        )
    }

    async fn process(&self, request: Value) -> Result<Value> {
        let text = require_text(&request, "cleaned_text", "No cleaned text provided")?;
        log_received(NAME, text);

        let entities = object_field(&request, "entities");
        let sections = array_field(&request, "sections");
        let key_phrases = object_field(&request, "key_phrases");
        let statistics = object_field(&request, "statistics");

        let body = self.analyze(text, &entities, &sections, &key_phrases, &statistics);
        info!("Successfully analyzed content ({} chars)", text.len());
        Ok(finish(body, NAME, "analyzed_at"))
    }
}
