use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::agents::agent::{array_field, finish, log_received, object_field, require_text, Agent, AgentDescriptor};
use crate::analysis::{count_all, extract_contexts, level, polarity_label, quick_sentiment, round_to, sentences, Lexicon};
use crate::error::{Result, ShowcaseError};

pub const NAME: &str = "sentiment_analyzer";

const EMOTIONS: &[(&str, &[&str])] = &[
    ("joy", &["happy", "joyful", "pleased", "delighted", "excited", "cheerful", "satisfied", "glad"]),
    ("trust", &["confident", "reliable", "trustworthy", "dependable", "secure", "assured", "certain"]),
    ("fear", &["afraid", "worried", "concerned", "anxious", "nervous", "uncertain", "risk", "threat"]),
    ("surprise", &["surprised", "unexpected", "amazed", "astonished", "shocking", "remarkable", "stunning"]),
    ("sadness", &["sad", "disappointed", "unfortunate", "regret", "sorry", "upset", "discouraged"]),
    ("disgust", &["disgusted", "revolted", "appalled", "outraged", "horrified", "repulsed"]),
    ("anger", &["angry", "furious", "annoyed", "frustrated", "irritated", "outraged", "mad"]),
    ("anticipation", &["expecting", "hopeful", "looking forward", "anticipating", "eager", "ready"]),
];

const POSITIVE_PATTERNS: &[&str] = &[
    r"\b(?:excellent|outstanding|exceptional|superior|impressive)\s+(?:performance|results|outcome)",
    r"\b(?:significant|substantial|major)\s+(?:improvement|growth|increase)",
    r"\b(?:successful|effective|efficient|optimal)\s+(?:implementation|execution|operation)",
    r"\b(?:exceeded|surpassed|outperformed)\s+(?:expectations|targets|goals)",
    r"\b(?:strong|robust|solid|healthy)\s+(?:financial|business|market)\s+(?:performance|position)",
];

const NEGATIVE_PATTERNS: &[&str] = &[
    r"\b(?:poor|weak|disappointing|unsatisfactory)\s+(?:performance|results|outcome)",
    r"\b(?:significant|substantial|major)\s+(?:decline|decrease|reduction|loss)",
    r"\b(?:failed|unsuccessful|ineffective)\s+(?:implementation|execution|operation)",
    r"\b(?:missed|fell short of|underperformed)\s+(?:expectations|targets|goals)",
    r"\b(?:weak|poor|declining)\s+(?:financial|business|market)\s+(?:performance|position)",
];

// (level, pattern, weight)
const CONFIDENCE_PATTERNS: &[(&str, &str, f64)] = &[
    ("high", r"\b(?:definitely|certainly|absolutely|guaranteed|ensure|confirm)\b", 1.0),
    ("medium", r"\b(?:likely|probably|expected|anticipated|should|would)\b", 0.6),
    ("low", r"\b(?:might|maybe|possibly|perhaps|could|may|uncertain)\b", 0.2),
];

const FINANCIAL_POSITIVE: &[&str] = &["profit", "revenue", "growth", "savings", "return", "gain", "increase"];
const FINANCIAL_NEGATIVE: &[&str] = &["loss", "debt", "deficit", "cost", "expense", "decline", "decrease"];
const PERFORMANCE_POSITIVE: &[&str] = &["excellent", "outstanding", "improved", "successful", "effective", "efficient"];
const PERFORMANCE_NEGATIVE: &[&str] = &["poor", "failed", "disappointing", "ineffective", "unsuccessful", "inadequate"];

const PSYCHOLOGICAL: &[(&str, &[&str])] = &[
    ("stress", &["stress", "pressure", "overwhelmed", "burden", "strain", "exhausted"]),
    ("optimism", &["optimistic", "hopeful", "positive", "bright", "promising", "encouraging"]),
    ("uncertainty", &["uncertain", "unclear", "confused", "doubt", "unsure", "ambiguous"]),
    ("authority", &["must", "should", "required", "mandatory", "essential", "critical"]),
];

/// Polarity, emotion, confidence and tone analysis.
///
/// Requests carrying `cleaned_text` get the full analysis; requests carrying
/// only raw `content` get the lightweight membership count.
pub struct SentimentAnalyzer {
    positive: Vec<Regex>,
    negative: Vec<Regex>,
    confidence: Vec<(&'static str, Regex, f64)>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ShowcaseError::AgentError(format!("Invalid pattern {}: {}", pattern, e)).into())
}

fn positive_negative_label(positive: usize, negative: usize) -> &'static str {
    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => "positive",
        std::cmp::Ordering::Less => "negative",
        std::cmp::Ordering::Equal => "neutral",
    }
}

fn business_tone(positive: usize, negative: usize) -> &'static str {
    let (p, n) = (positive as f64, negative as f64);
    if p > n * 1.5 {
        "optimistic"
    } else if n > p * 1.5 {
        "pessimistic"
    } else if positive > 0 || negative > 0 {
        "balanced"
    } else {
        "neutral"
    }
}

/// Population standard deviation, zero below two samples.
fn variability(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn psychological_balance(scores: &[(&str, usize)]) -> &'static str {
    let total: usize = scores.iter().map(|(_, s)| s).sum();
    if total == 0 {
        return "neutral";
    }
    let max = scores.iter().map(|(_, s)| *s).max().unwrap_or(0) as f64;
    if max > total as f64 * 0.6 {
        "imbalanced"
    } else if max > total as f64 * 0.4 {
        "slightly_imbalanced"
    } else {
        "balanced"
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            positive: POSITIVE_PATTERNS.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            negative: NEGATIVE_PATTERNS.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            confidence: CONFIDENCE_PATTERNS
                .iter()
                .map(|(name, p, w)| Ok((*name, compile(p)?, *w)))
                .collect::<Result<_>>()?,
        })
    }

    pub fn overall_sentiment(&self, text: &str) -> Value {
        let score = Lexicon::shared().score(text);
        let polarity = score.polarity;
        let subjectivity = score.subjectivity;
        let intensity = match polarity.abs() {
            i if i > 0.6 => "strong",
            i if i > 0.3 => "moderate",
            _ => "weak",
        };
        let confidence = (0.5 + (text.chars().count() as f64 / 2000.0) * 0.3 + subjectivity * 0.2).min(0.95);

        json!({
            "polarity": round_to(polarity, 3),
            "subjectivity": round_to(subjectivity, 3),
            "sentiment_label": polarity_label(polarity, 0.1),
            "intensity": intensity,
            "confidence": round_to(confidence, 3),
            "sentiment_score": round_to((polarity + 1.0) * 50.0, 1),
            "objectivity": round_to(1.0 - subjectivity, 3),
        })
    }

    pub fn emotions(&self, text: &str) -> Value {
        let lower = text.to_lowercase();
        let mut scores = Map::new();
        let mut contexts = Map::new();
        let mut dominant: Option<(&str, usize)> = None;
        let mut total = 0usize;

        for (emotion, keywords) in EMOTIONS {
            let mut score = 0;
            let mut found = Vec::new();
            for keyword in keywords.iter() {
                let count = lower.matches(keyword).count();
                if count > 0 {
                    score += count;
                    found.extend(extract_contexts(text, keyword, 50));
                }
            }
            if score == 0 {
                continue;
            }
            found.truncate(3);
            if dominant.map_or(true, |(_, s)| score > s) {
                dominant = Some((*emotion, score));
            }
            total += score;
            scores.insert(emotion.to_string(), json!(score));
            contexts.insert(emotion.to_string(), json!(found));
        }

        let percentages: Map<String, Value> = scores
            .iter()
            .map(|(k, v)| {
                let share = v.as_u64().unwrap_or(0) as f64 / total as f64 * 100.0;
                (k.clone(), json!(round_to(share, 1)))
            })
            .collect();
        let detected: Vec<String> = scores.keys().cloned().collect();

        json!({
            "emotional_complexity": level(scores.len() as f64, 4.0, 2.0),
            "emotion_scores": scores,
            "emotion_percentages": percentages,
            "emotion_contexts": contexts,
            "dominant_emotion": dominant.map(|(e, _)| e).unwrap_or("neutral"),
            "total_emotional_indicators": total,
            "emotions_detected": detected,
        })
    }

    pub fn section_sentiment(&self, sections: &[Value]) -> Vec<Value> {
        sections
            .iter()
            .filter_map(|section| {
                let content = section["content"].as_str().filter(|c| !c.is_empty())?;
                let polarity = Lexicon::shared().score(content).polarity;
                Some(json!({
                    "section_title": section["title"].as_str().unwrap_or("Unknown"),
                    "polarity": round_to(polarity, 3),
                    "sentiment_label": polarity_label(polarity, 0.1),
                    "word_count": section["word_count"].as_u64().unwrap_or(0),
                    "sentiment_strength": round_to(polarity.abs(), 3),
                }))
            })
            .collect()
    }

    pub fn business_sentiment(&self, text: &str) -> Value {
        let lower = text.to_lowercase();
        let matches = |patterns: &[Regex]| -> Vec<String> {
            patterns
                .iter()
                .flat_map(|p| p.find_iter(&lower).map(|m| m.as_str().to_string()))
                .collect()
        };
        let positive = matches(self.positive.as_slice());
        let negative = matches(self.negative.as_slice());
        let (p, n) = (positive.len(), negative.len());

        let label = positive_negative_label(p, n);
        let confidence = match label {
            "positive" => p as f64 / (p + n + 1) as f64,
            "negative" => n as f64 / (p + n + 1) as f64,
            _ => 0.5,
        };

        let indicator = |pos: &[&str], neg: &[&str], strength_key: &str| {
            let pc = count_all(&lower, pos);
            let nc = count_all(&lower, neg);
            let mut out = Map::new();
            out.insert("sentiment".into(), json!(positive_negative_label(pc, nc)));
            out.insert("positive_indicators".into(), json!(pc));
            out.insert("negative_indicators".into(), json!(nc));
            out.insert(strength_key.into(), json!(pc.abs_diff(nc)));
            Value::Object(out)
        };

        json!({
            "business_sentiment": label,
            "confidence": round_to(confidence, 3),
            "positive_indicators": positive,
            "negative_indicators": negative,
            "financial_sentiment": indicator(FINANCIAL_POSITIVE, FINANCIAL_NEGATIVE, "financial_tone_strength"),
            "performance_sentiment": indicator(PERFORMANCE_POSITIVE, PERFORMANCE_NEGATIVE, "performance_tone_strength"),
            "business_tone": business_tone(p, n),
        })
    }

    pub fn confidence_levels(&self, text: &str) -> Value {
        let lower = text.to_lowercase();
        let mut counts = Map::new();
        let mut phrases = Map::new();
        let mut total = 0usize;
        let mut weighted = 0.0;

        for (name, pattern, weight) in &self.confidence {
            let found: Vec<&str> = pattern.find_iter(&lower).map(|m| m.as_str()).collect();
            total += found.len();
            weighted += found.len() as f64 * weight;
            counts.insert(name.to_string(), json!(found.len()));
            phrases.insert(name.to_string(), json!(found.iter().take(5).collect::<Vec<_>>()));
        }

        let (overall, score) = if total == 0 {
            ("neutral", 0.5)
        } else {
            let score = weighted / total as f64;
            (level(score, 0.7, 0.4), score)
        };

        json!({
            "confidence_counts": counts,
            "confidence_phrases": phrases,
            "overall_confidence": overall,
            "confidence_score": round_to(score, 3),
            "total_confidence_indicators": total,
        })
    }

    pub fn sentiment_patterns(&self, text: &str) -> Value {
        let lexicon = Lexicon::shared();
        let scored: Vec<(String, f64)> = sentences(text)
            .into_iter()
            .take(20)
            .map(|s| {
                let polarity = round_to(lexicon.score(&s).polarity, 3);
                let shown = if s.chars().count() > 100 {
                    format!("{}...", s.chars().take(100).collect::<String>())
                } else {
                    s
                };
                (shown, polarity)
            })
            .collect();

        let polarities: Vec<f64> = scored.iter().map(|(_, p)| *p).collect();
        let mut flow = "stable";
        if polarities.len() > 5 {
            let (first, second) = polarities.split_at(polarities.len() / 2);
            let avg_first = first.iter().sum::<f64>() / first.len() as f64;
            let avg_second = second.iter().sum::<f64>() / second.len() as f64;
            if avg_second > avg_first + 0.2 {
                flow = "improving";
            } else if avg_second < avg_first - 0.2 {
                flow = "declining";
            }
        }

        let entries: Vec<Value> = scored
            .iter()
            .map(|(sentence, polarity)| {
                json!({
                    "sentence": sentence,
                    "polarity": polarity,
                    "sentiment": polarity_label(*polarity, 0.1),
                })
            })
            .collect();

        // first occurrence wins ties
        let pick = |better: fn(f64, f64) -> bool| {
            let mut best: Option<usize> = None;
            for (i, p) in polarities.iter().enumerate() {
                if best.map_or(true, |b| better(*p, polarities[b])) {
                    best = Some(i);
                }
            }
            best.map(|i| entries[i].clone()).unwrap_or(Value::Null)
        };

        json!({
            "most_positive_sentence": pick(|a, b| a > b),
            "most_negative_sentence": pick(|a, b| a < b),
            "sentiment_flow": flow,
            "sentiment_variability": round_to(variability(&polarities), 3),
            "sentence_sentiments": entries,
        })
    }

    pub fn psychological_indicators(&self, text: &str) -> Value {
        let lower = text.to_lowercase();
        let scores: Vec<(&str, usize)> = PSYCHOLOGICAL.iter().map(|(name, words)| (*name, count_all(&lower, words))).collect();

        let mut dominant: Option<(&str, usize)> = None;
        for (name, score) in &scores {
            if *score > 0 && dominant.map_or(true, |(_, s)| *score > s) {
                dominant = Some((*name, *score));
            }
        }

        let score_map: Map<String, Value> = scores.iter().map(|(k, v)| (k.to_string(), json!(v))).collect();
        json!({
            "psychological_scores": score_map,
            "dominant_psychological_tone": dominant.map(|(n, _)| n).unwrap_or("neutral"),
            "psychological_intensity": scores.iter().map(|(_, s)| *s).max().unwrap_or(0),
            "psychological_balance": psychological_balance(&scores),
        })
    }

    pub fn entity_sentiment(&self, text: &str, entities: &Value) -> Value {
        let lexicon = Lexicon::shared();
        let mut out = Map::new();

        for (kind, limit, window) in [("company", 5, 200), ("person", 3, 150)] {
            let Some(names) = entities[kind].as_array() else {
                continue;
            };
            for name in names.iter().filter_map(Value::as_str).take(limit) {
                let contexts = extract_contexts(text, name, window);
                if contexts.is_empty() {
                    continue;
                }
                let avg = contexts.iter().map(|c| lexicon.score(c).polarity).sum::<f64>() / contexts.len() as f64;
                out.insert(
                    name.to_string(),
                    json!({
                        "sentiment": round_to(avg, 3),
                        "label": polarity_label(avg, 0.1),
                        "contexts": contexts.iter().take(2).collect::<Vec<_>>(),
                    }),
                );
            }
        }
        Value::Object(out)
    }

    pub fn insights(&self, overall: &Value, emotions: &Value, business: &Value, confidence: &Value, psychological: &Value, risk: &Value) -> Value {
        let label = overall["sentiment_label"].as_str().unwrap_or("neutral");
        let intensity = overall["intensity"].as_str().unwrap_or("weak");

        let mut key_findings = vec![format!("Overall sentiment: {} ({} intensity)", label, intensity)];
        let dominant = emotions["dominant_emotion"].as_str().unwrap_or("neutral");
        if dominant != "neutral" {
            key_findings.push(format!("Dominant emotion: {}", dominant));
        }
        let business_label = business["business_sentiment"].as_str().unwrap_or("neutral");
        if business_label != "neutral" {
            key_findings.push(format!("Business sentiment: {}", business_label));
        }

        let mut recommendations = Vec::new();
        if label == "negative" {
            recommendations.push("Consider addressing negative sentiment indicators");
        }
        if confidence["overall_confidence"] == "low" {
            recommendations.push("Increase certainty and confidence in statements");
        }
        if psychological["dominant_psychological_tone"] == "stress" {
            recommendations.push("Address stress indicators and improve tone");
        }

        let mut concerns = Vec::new();
        if overall["polarity"].as_f64().unwrap_or(0.0) < -0.5 {
            concerns.push("Strong negative sentiment detected");
        }
        if emotions["emotional_complexity"] == "high" && label == "negative" {
            concerns.push("Complex negative emotions present");
        }
        if risk["overall_risk_level"] == "high" && label != "negative" {
            concerns.push("Tone is not negative despite a high assessed risk level");
        }

        let mut strengths = Vec::new();
        if label == "positive" && matches!(intensity, "moderate" | "strong") {
            strengths.push("Strong positive sentiment throughout content");
        }
        if confidence["overall_confidence"] == "high" {
            strengths.push("High confidence and certainty in statements");
        }

        json!({
            "key_findings": key_findings,
            "recommendations": recommendations,
            "concerns": concerns,
            "strengths": strengths,
        })
    }

    pub fn analyze(&self, text: &str, sections: &[Value], entities: &Value, risk: &Value) -> Map<String, Value> {
        let overall = self.overall_sentiment(text);
        let emotions = self.emotions(text);
        let business = self.business_sentiment(text);
        let confidence = self.confidence_levels(text);
        let psychological = self.psychological_indicators(text);
        let insights = self.insights(&overall, &emotions, &business, &confidence, &psychological, risk);

        let summary = json!({
            "overall_sentiment": overall["sentiment_label"],
            "sentiment_score": overall["sentiment_score"],
            "confidence": overall["confidence"],
            "dominant_emotion": emotions["dominant_emotion"],
            "business_tone": business["business_tone"],
            "emotional_complexity": emotions["emotional_complexity"],
            "analysis_quality": if overall["confidence"].as_f64().unwrap_or(0.0) > 0.7 { "high" } else { "medium" },
        });

        let mut body = Map::new();
        body.insert("overall_sentiment".into(), overall);
        body.insert("emotions".into(), emotions);
        body.insert("section_sentiment".into(), json!(self.section_sentiment(sections)));
        body.insert("business_sentiment".into(), business);
        body.insert("confidence_levels".into(), confidence);
        body.insert("sentiment_patterns".into(), self.sentiment_patterns(text));
        body.insert("psychological_indicators".into(), psychological);
        body.insert("entity_sentiment".into(), self.entity_sentiment(text, entities));
        body.insert("insights".into(), insights);
        body.insert("sentiment_summary".into(), summary);
        body
    }

    /// Membership-count sentiment over raw content.
    pub fn analyze_quick(&self, content: &str) -> Map<String, Value> {
        let quick = quick_sentiment(content);
        let label = quick.overall_sentiment;

        let mut body = Map::new();
        body.insert("sentiment_analysis".into(), json!(quick));
        body.insert(
            "emotional_analysis".into(),
            json!({
                "dominant_emotion": match label {
                    "positive" => "optimistic",
                    "negative" => "cautious",
                    _ => "neutral",
                },
                "emotions_detected": if label == "neutral" {
                    vec!["professional", "neutral"]
                } else {
                    vec!["professional", "confident", label]
                },
            }),
        );
        body
    }
}

#[async_trait]
impl Agent for SentimentAnalyzer {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor::new(
            NAME,
            "Analyzes sentiment, emotions, and psychological tone of content",
            &["sentiment_analysis", "emotion_detection", "confidence_analysis", "business_tone"],
        )
    }

    async fn process(&self, request: Value) -> Result<Value> {
        if request.get("cleaned_text").is_none() {
            if let Some(content) = request.get("content").and_then(Value::as_str) {
                log_received(NAME, content);
                return Ok(finish(self.analyze_quick(content), NAME, "analyzed_at"));
            }
        }

        let text = require_text(&request, "cleaned_text", "No cleaned text provided")?;
        log_received(NAME, text);

        let sections = array_field(&request, "sections");
        let entities = object_field(&request, "entities");
        let risk = object_field(&request, "risk_analysis");

        let body = self.analyze(text, &sections, &entities, &risk);
        info!(
            "Sentiment analysis completed: {}",
            body["sentiment_summary"]["overall_sentiment"].as_str().unwrap_or("neutral")
        );
        Ok(finish(body, NAME, "analyzed_at"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SentimentAnalyzer {
        SentimentAnalyzer::new().unwrap()
    }

    #[test]
    fn test_overall_sentiment_bounds() {
        let a = analyzer();
        for text in ["", "excellent excellent outstanding", "terrible worst failure", "plain words only"] {
            let overall = a.overall_sentiment(text);
            let score = overall["sentiment_score"].as_f64().unwrap();
            assert!((0.0..=100.0).contains(&score), "{} out of range", score);
            assert!(overall["confidence"].as_f64().unwrap() <= 0.95);
        }
        assert_eq!(a.overall_sentiment("plain words only")["sentiment_score"], 50.0);
        assert_eq!(a.overall_sentiment("excellent results")["sentiment_label"], "positive");
        assert_eq!(a.overall_sentiment("excellent results")["intensity"], "strong");
    }

    #[test]
    fn test_emotions_dominant_and_percentages() {
        let emotions = analyzer().emotions("We are confident and certain. A small risk remains, but we are pleased.");
        assert_eq!(emotions["dominant_emotion"], "trust");
        assert_eq!(emotions["emotion_scores"]["trust"], 2);
        assert_eq!(emotions["emotion_percentages"]["trust"], 50.0);
        assert_eq!(emotions["emotional_complexity"], "medium");
        assert_eq!(emotions["total_emotional_indicators"], 4);
    }

    #[test]
    fn test_no_emotions_is_neutral() {
        let emotions = analyzer().emotions("The table has four legs.");
        assert_eq!(emotions["dominant_emotion"], "neutral");
        assert_eq!(emotions["emotional_complexity"], "low");
    }

    #[test]
    fn test_business_patterns_and_tone() {
        let business = analyzer().business_sentiment(
            "The team exceeded expectations with outstanding results and a significant improvement in margin.",
        );
        assert_eq!(business["business_sentiment"], "positive");
        assert_eq!(business["positive_indicators"].as_array().unwrap().len(), 3);
        assert_eq!(business["confidence"], 0.75);
        assert_eq!(business["business_tone"], "optimistic");

        let neutral = analyzer().business_sentiment("nothing to report");
        assert_eq!(neutral["confidence"], 0.5);
        assert_eq!(neutral["business_tone"], "neutral");
    }

    #[test]
    fn test_confidence_levels_weighting() {
        let levels = analyzer().confidence_levels("We will definitely deliver. Costs might rise.");
        // (1.0 + 0.2) / 2
        assert_eq!(levels["confidence_score"], 0.6);
        assert_eq!(levels["overall_confidence"], "medium");
        assert_eq!(levels["confidence_counts"]["high"], 1);

        let none = analyzer().confidence_levels("no hedging here");
        assert_eq!(none["overall_confidence"], "neutral");
        assert_eq!(none["confidence_score"], 0.5);
    }

    #[test]
    fn test_sentence_flow_improving() {
        let text = "Terrible start. Poor results. Bad quarter. Excellent recovery. Great momentum. Outstanding close.";
        let patterns = analyzer().sentiment_patterns(text);
        assert_eq!(patterns["sentiment_flow"], "improving");
        assert_eq!(patterns["sentence_sentiments"].as_array().unwrap().len(), 6);
        assert_eq!(patterns["most_negative_sentence"]["sentence"], "Terrible start");
    }

    #[test]
    fn test_long_sentences_are_truncated() {
        let long = "word ".repeat(40);
        let patterns = analyzer().sentiment_patterns(&long);
        let shown = patterns["sentence_sentiments"][0]["sentence"].as_str().unwrap();
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 103);
    }

    #[test]
    fn test_psychological_balance() {
        let psych = analyzer().psychological_indicators("We must act. It is required and essential. Outlook is promising.");
        assert_eq!(psych["dominant_psychological_tone"], "authority");
        assert_eq!(psych["psychological_balance"], "imbalanced");
        assert_eq!(analyzer().psychological_indicators("calm")["psychological_balance"], "neutral");
    }

    #[test]
    fn test_entity_sentiment_uses_contexts() {
        let text = "Acme Corp delivered excellent results this year.";
        let entities = json!({"company": ["Acme Corp"], "person": ["Nobody Here"]});
        let result = analyzer().entity_sentiment(text, &entities);
        assert_eq!(result["Acme Corp"]["label"], "positive");
        assert!(result.get("Nobody Here").is_none());
    }

    #[tokio::test]
    async fn test_quick_mode_on_raw_content() {
        let result = analyzer()
            .process(json!({"content": "Great growth and excellent progress"}))
            .await
            .unwrap();
        assert_eq!(result["sentiment_analysis"]["overall_sentiment"], "positive");
        assert_eq!(result["sentiment_analysis"]["sentiment_score"], 80);
        assert_eq!(result["emotional_analysis"]["dominant_emotion"], "optimistic");
        assert_eq!(result["emotional_analysis"]["emotions_detected"][2], "positive");
    }

    #[tokio::test]
    async fn test_full_mode_summary() {
        let result = analyzer()
            .process(json!({
                "cleaned_text": "The project was successful and the team is confident.",
                "sections": [{"title": "Overview", "content": "A successful project.", "word_count": 3}],
            }))
            .await
            .unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["sentiment_summary"]["overall_sentiment"], "positive");
        assert_eq!(result["section_sentiment"][0]["section_title"], "Overview");
    }

    #[tokio::test]
    async fn test_missing_text_is_error() {
        let err = analyzer().process(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("No cleaned text provided"));
    }
}
