use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::agents::agent::{finish, log_received, object_field, require_text, Agent, AgentDescriptor};
use crate::analysis::text::{is_stop_word, round_to, sentences, top_counts, word_frequencies};
use crate::error::{Result, ShowcaseError};

pub const NAME: &str = "text_extractor";

const SECTION_HEADERS: &[&str] = &[
    "executive summary",
    "summary",
    "introduction",
    "overview",
    "background",
    "context",
    "objectives?",
    "goals?",
    "methodology",
    "approach",
    "methods?",
    "results?",
    "findings?",
    "discussion",
    "analysis",
    "conclusions?",
    "recommendations?",
    "next steps",
    "references?",
    "bibliography",
    "appendix",
    "appendices",
];

// (code, name, stop words)
const LANGUAGES: &[(&str, &str, &[&str])] = &[
    ("en", "English", &["the", "and", "of", "to", "is", "in", "that", "for", "with", "this", "are", "will"]),
    ("es", "Spanish", &["el", "la", "de", "que", "y", "en", "los", "las", "por", "para", "una", "con"]),
    ("fr", "French", &["le", "la", "les", "des", "et", "est", "une", "dans", "pour", "que", "sur", "avec"]),
    ("de", "German", &["der", "die", "das", "und", "ist", "nicht", "mit", "ein", "eine", "auf", "für", "den"]),
];

/// Cleans raw document text and pulls out entities, sections, phrases and
/// statistics.
pub struct TextExtractor {
    strip_chars: Regex,
    horizontal_space: Regex,
    blank_runs: Regex,
    entity_patterns: Vec<(&'static str, Regex)>,
    roi: Regex,
    timeline: Regex,
    metric: Regex,
    section_header: Regex,
    list_item: Regex,
    numbered_item: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ShowcaseError::AgentError(format!("Invalid pattern {}: {}", pattern, e)).into())
}

fn push_section(sections: &mut Vec<Value>, title: &str, start: usize, end: usize, content: &mut Vec<&str>) {
    if !content.is_empty() {
        let body = content.join("\n");
        sections.push(json!({
            "title": title,
            "word_count": body.split_whitespace().count(),
            "content": body,
            "start_line": start,
            "end_line": end,
        }));
    }
    content.clear();
}

impl TextExtractor {
    pub fn new() -> Result<Self> {
        let entity_patterns = vec![
            ("email", compile(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")?),
            ("phone", compile(r"(?:\+\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")?),
            ("date", compile(r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b|\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b")?),
            ("currency", compile(r"\$[\d,]+(?:\.\d+)?(?:\s*(?:million|billion|[MBK])\b)?|\b\d+\.\d{2}\s*(?:USD|EUR|GBP|CAD|AUD)\b")?),
            ("percentage", compile(r"\b\d+(?:\.\d+)?%")?),
            ("url", compile(r"https?://[-\w.]+(?::\d+)?(?:/[\w/_.\-]*)?(?:\?[\w&=%.\-]*)?(?:#\w*)?")?),
            ("company", compile(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)* +(?:Inc|LLC|Corp|Ltd|Co|Company|Industries|Group|Solutions|Systems|Technologies)\b\.?")?),
            ("person", compile(r"\b[A-Z][a-z]+ [A-Z][a-z]+\b")?),
            ("time", compile(r"\b\d{1,2}:\d{2}(?::\d{2})?(?:\s*(?:AM|PM|am|pm))?\b")?),
            ("address", compile(r"\b\d+\s+[A-Za-z ]+?\s(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr)\b\.?")?),
        ];

        let section_header = format!(
            r"(?i)^(?:#+\s*)?(?:\d+(?:\.\d+)*\.?\s+)?({})\s*[:.]?\s*$",
            SECTION_HEADERS.join("|")
        );

        Ok(Self {
            strip_chars: compile(r#"[^\w\s.,!?;:()\-"'$%@#]"#)?,
            horizontal_space: compile(r"[^\S\n]+")?,
            blank_runs: compile(r"\n{3,}")?,
            entity_patterns,
            roi: compile(r"(?i)\b(?:ROI|return on investment)\s*(?:of\s*)?[:=]?\s*(\d+(?:\.\d+)?%?)")?,
            timeline: compile(r"(?i)\b(\d+)\s*(?:month|year|week|day)s?\b")?,
            metric: compile(r"(?i)\b(?:increase|decrease|improve|reduce)[sd]?\s+(?:by\s+)?(\d+(?:\.\d+)?%)")?,
            section_header: compile(&section_header)?,
            list_item: compile(r"^\s*[-*•]\s+")?,
            numbered_item: compile(r"^\s*\d+[.)]?\s+")?,
        })
    }

    /// Strips unsupported characters and collapses whitespace, keeping line
    /// breaks so section headers survive.
    pub fn clean_text(&self, text: &str) -> String {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let stripped = self.strip_chars.replace_all(&normalized, " ");
        let collapsed = self.horizontal_space.replace_all(&stripped, " ");
        let lines: Vec<&str> = collapsed.lines().map(str::trim).collect();
        let joined = lines.join("\n");
        self.blank_runs.replace_all(&joined, "\n\n").trim().to_string()
    }

    pub fn detect_language(&self, text: &str) -> Value {
        let sample: String = text.chars().take(1000).collect();
        let tokens: Vec<String> = crate::analysis::words(&sample);

        let best = LANGUAGES
            .iter()
            .map(|(code, name, stops)| {
                let hits = tokens.iter().filter(|t| stops.contains(&t.as_str())).count();
                (code, name, hits)
            })
            .max_by_key(|(_, _, hits)| *hits);

        match best {
            Some((code, name, hits)) if hits > 0 => json!({
                "code": code,
                "name": name,
                "confidence": if text.len() > 100 { "high" } else { "low" },
            }),
            _ => json!({"code": "en", "name": "English", "confidence": "assumed"}),
        }
    }

    pub fn extract_entities(&self, text: &str) -> Map<String, Value> {
        let mut entities = Map::new();

        for (kind, pattern) in &self.entity_patterns {
            let found: BTreeSet<String> = pattern
                .find_iter(text)
                .map(|m| m.as_str().trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if !found.is_empty() {
                entities.insert(kind.to_string(), json!(found));
            }
        }

        let roi: BTreeSet<String> = self.roi.captures_iter(text).map(|c| c[1].to_string()).collect();
        if !roi.is_empty() {
            entities.insert("roi".to_string(), json!(roi));
        }

        // timelines keep every mention, the risk pass looks at their units
        let timelines: Vec<String> = self
            .timeline
            .captures_iter(text)
            .map(|c| {
                let unit = c[0].trim_start_matches(|ch: char| ch.is_ascii_digit()).trim().to_lowercase();
                format!("{} {}", &c[1], unit)
            })
            .collect();
        if !timelines.is_empty() {
            entities.insert("timelines".to_string(), json!(timelines));
        }

        let metrics: BTreeSet<String> = self.metric.captures_iter(text).map(|c| c[1].to_string()).collect();
        if !metrics.is_empty() {
            entities.insert("metrics".to_string(), json!(metrics));
        }

        entities
    }

    pub fn identify_sections(&self, text: &str) -> Vec<Value> {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut sections = Vec::new();
        let mut current: Option<(String, usize)> = None;
        let mut content: Vec<&str> = Vec::new();

        for (line_num, raw) in lines.iter().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(caps) = self.section_header.captures(line) {
                if let Some((title, start)) = current.take() {
                    push_section(&mut sections, &title, start, line_num, &mut content);
                }
                current = Some((caps[1].to_string(), line_num + 1));
            } else if current.is_some() {
                content.push(line);
            }
        }
        if let Some((title, start)) = current.take() {
            push_section(&mut sections, &title, start, lines.len(), &mut content);
        }

        if sections.is_empty() {
            sections.push(json!({
                "title": "Main Content",
                "content": text,
                "word_count": text.split_whitespace().count(),
                "start_line": 0,
                "end_line": lines.len(),
            }));
        }
        sections
    }

    /// Runs of two or three content words, ranked by how often they occur.
    pub fn extract_key_phrases(&self, text: &str) -> Value {
        let lower = text.to_lowercase();
        let mut candidates: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        let mut singles: Vec<String> = Vec::new();

        for clause in lower.split(|c: char| ".,;:!?()\"\n".contains(c)) {
            let mut run: Vec<&str> = Vec::new();
            let tokens = clause.split_whitespace().map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()));
            for token in tokens.chain(std::iter::once("")) {
                let content_word = token.len() > 2
                    && token.chars().all(|c| c.is_alphabetic() || c == '-')
                    && !is_stop_word(token);
                if content_word {
                    run.push(token);
                    continue;
                }
                match run.len() {
                    0 => {}
                    1 => {
                        if run[0].len() > 3 {
                            singles.push(run[0].to_string());
                        }
                    }
                    2 | 3 => {
                        let phrase = run.join(" ");
                        if seen.insert(phrase.clone()) {
                            candidates.push(phrase);
                        }
                    }
                    _ => {
                        for pair in run.windows(2) {
                            let phrase = pair.join(" ");
                            if seen.insert(phrase.clone()) {
                                candidates.push(phrase);
                            }
                        }
                    }
                }
                run.clear();
            }
        }

        if candidates.is_empty() {
            for single in singles {
                if seen.insert(single.clone()) {
                    candidates.push(single);
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = candidates
            .iter()
            .map(|p| (p.clone(), lower.matches(p.as_str()).count()))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(10);

        let mut frequencies = Map::new();
        for (phrase, count) in &ranked {
            frequencies.insert(phrase.clone(), json!(count));
        }

        json!({
            "noun_phrases": ranked.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>(),
            "phrase_frequencies": frequencies,
            "total_phrases": candidates.len(),
        })
    }

    pub fn analyze_structure(&self, text: &str) -> Value {
        let lines: Vec<&str> = text.lines().collect();
        let sentence_list = sentences(text);
        let paragraphs: Vec<&str> = text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()).collect();

        let avg = |lengths: Vec<usize>| {
            if lengths.is_empty() {
                0.0
            } else {
                lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
            }
        };
        let avg_sentence = avg(sentence_list.iter().map(|s| s.split_whitespace().count()).collect());
        let avg_paragraph = avg(paragraphs.iter().map(|p| p.split_whitespace().count()).collect());

        let list_items = lines.iter().filter(|l| self.list_item.is_match(l)).count();
        let numbered_items = lines.iter().filter(|l| self.numbered_item.is_match(l)).count();

        json!({
            "line_count": lines.len(),
            "sentence_count": sentence_list.len(),
            "paragraph_count": paragraphs.len(),
            "average_sentence_length": round_to(avg_sentence, 2),
            "average_paragraph_length": round_to(avg_paragraph, 2),
            "list_items": list_items,
            "numbered_items": numbered_items,
            "has_lists": list_items > 0 || numbered_items > 0,
            "structure_complexity": crate::analysis::level(paragraphs.len() as f64, 10.0, 3.0),
        })
    }

    pub fn generate_statistics(&self, text: &str) -> Value {
        let words: Vec<&str> = text.split_whitespace().collect();
        let character_count = text.chars().count();
        let no_spaces = text.chars().filter(|c| *c != ' ').count();

        let cleaned: Vec<String> = words
            .iter()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect::<String>().to_lowercase())
            .filter(|w| w.chars().count() > 2)
            .collect();
        let freq = word_frequencies(&cleaned);

        let mut top_words = Map::new();
        for (word, count) in top_counts(&freq, 10) {
            top_words.insert(word, json!(count));
        }

        let sentence_count = sentences(text).len();
        let avg_words = if sentence_count > 0 { words.len() as f64 / sentence_count as f64 } else { 0.0 };
        let diversity = if words.is_empty() { 0.0 } else { freq.len() as f64 / words.len() as f64 };

        json!({
            "word_count": words.len(),
            "character_count": character_count,
            "character_count_no_spaces": no_spaces,
            "sentence_count": sentence_count,
            "average_words_per_sentence": round_to(avg_words, 2),
            "top_words": top_words,
            "unique_words": freq.len(),
            "lexical_diversity": round_to(diversity, 3),
            "estimated_reading_time_minutes": round_to(words.len() as f64 / 200.0, 1),
        })
    }

    pub fn extract(&self, text: &str, document_type: &str, options: Value) -> Map<String, Value> {
        let cleaned = self.clean_text(text);
        debug!("Cleaned text from {} to {} chars", text.len(), cleaned.len());

        let mut body = Map::new();
        body.insert("original_text".into(), json!(text));
        body.insert("language".into(), self.detect_language(&cleaned));
        // raw text keeps urls and bullets that cleaning strips
        body.insert("entities".into(), Value::Object(self.extract_entities(text)));
        body.insert("sections".into(), Value::Array(self.identify_sections(&cleaned)));
        body.insert("key_phrases".into(), self.extract_key_phrases(&cleaned));
        body.insert("structure".into(), self.analyze_structure(text));
        body.insert("statistics".into(), self.generate_statistics(&cleaned));
        body.insert("cleaned_text".into(), json!(cleaned));
        body.insert("document_type".into(), json!(document_type));
        body.insert("processing_options".into(), options);
        body
    }
}

#[async_trait]
impl Agent for TextExtractor {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor::new(
            NAME,
            "Cleans and structures text content, performs entity extraction",
            &["text_cleaning", "language_detection", "entity_extraction", "section_identification"],
        )
    }

    async fn process(&self, request: Value) -> Result<Value> {
        let text = require_text(&request, "full_text", "No text content provided")?;
        log_received(NAME, text);

        let document_type = request.get("document_type").and_then(Value::as_str).unwrap_or("unknown");
        let mut body = self.extract(text, document_type, object_field(&request, "options"));
        body.insert("metadata".into(), object_field(&request, "metadata"));

        info!("Successfully processed text content ({} chars)", text.len());
        Ok(finish(body, NAME, "processed_at"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Executive Summary\n\
        Acme Corp revenue will increase by 25% over 18 months.\n\
        Contact jane.doe@acme.com or call 555-123-4567.\n\n\
        Risks:\n\
        - Budget overrun risk of $1,500,000\n\
        - Delay in vendor delivery\n\n\
        Conclusions\n\
        The digital transformation program has a projected ROI of 180% by March 15, 2025.";

    fn extractor() -> TextExtractor {
        TextExtractor::new().unwrap()
    }

    #[test]
    fn test_clean_text_keeps_lines() {
        let cleaned = extractor().clean_text("Hello   world™\r\n\n\n\nNext\tline *");
        assert_eq!(cleaned, "Hello world\n\nNext line");
    }

    #[test]
    fn test_entities() {
        let entities = extractor().extract_entities(SAMPLE);
        assert_eq!(entities["email"], json!(["jane.doe@acme.com"]));
        assert_eq!(entities["percentage"], json!(["180%", "25%"]));
        assert_eq!(entities["currency"], json!(["$1,500,000"]));
        assert_eq!(entities["company"], json!(["Acme Corp"]));
        assert_eq!(entities["date"], json!(["March 15, 2025"]));
        assert_eq!(entities["roi"], json!(["180%"]));
        assert_eq!(entities["timelines"], json!(["18 months"]));
        assert_eq!(entities["metrics"], json!(["25%"]));
        assert!(entities["phone"].as_array().unwrap()[0].as_str().unwrap().contains("555-123-4567"));
    }

    #[test]
    fn test_sections_split_on_headers() {
        let ex = extractor();
        let sections = ex.identify_sections(&ex.clean_text(SAMPLE));
        let titles: Vec<&str> = sections.iter().map(|s| s["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["Executive Summary", "Conclusions"]);
        assert!(sections[0]["content"].as_str().unwrap().contains("Budget overrun"));
    }

    #[test]
    fn test_header_must_be_whole_line() {
        let sections = extractor().identify_sections("Results show strong growth this year.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0]["title"], "Main Content");
    }

    #[test]
    fn test_numbered_headers_are_recognised() {
        let sections = extractor().identify_sections("1. Introduction\nWe start here.\n2. Recommendations:\nAct now.");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1]["title"], "Recommendations");
        assert_eq!(sections[1]["content"], "Act now.");
    }

    #[test]
    fn test_key_phrases_rank_by_frequency() {
        let text = "Digital transformation drives value. The digital transformation budget is large. Customer experience matters.";
        let phrases = extractor().extract_key_phrases(text);
        assert_eq!(phrases["noun_phrases"][0], "digital transformation");
        assert_eq!(phrases["phrase_frequencies"]["digital transformation"], 2);
    }

    #[test]
    fn test_statistics_and_structure() {
        let ex = extractor();
        let stats = ex.generate_statistics("Alpha beta gamma. Alpha beta delta.");
        assert_eq!(stats["word_count"], 6);
        assert_eq!(stats["sentence_count"], 2);
        assert_eq!(stats["unique_words"], 4);
        assert_eq!(stats["top_words"]["alpha"], 2);

        let structure = ex.analyze_structure(SAMPLE);
        assert_eq!(structure["list_items"], 2);
        assert_eq!(structure["has_lists"], true);
    }

    #[test]
    fn test_language_detection() {
        let ex = extractor();
        assert_eq!(ex.detect_language("The plan is in place and the team will deliver")["code"], "en");
        assert_eq!(ex.detect_language("12345")["confidence"], "assumed");
    }

    #[tokio::test]
    async fn test_process_requires_text() {
        let err = extractor().process(json!({"document_type": "text"})).await.unwrap_err();
        assert_eq!(err.to_string(), "Agent error: No text content provided");
    }

    #[tokio::test]
    async fn test_process_output_shape() {
        let result = extractor().process(json!({"full_text": SAMPLE, "document_type": "text"})).await.unwrap();
        assert_eq!(result["status"], "success");
        assert_eq!(result["agent"], NAME);
        assert!(result["processed_at"].is_string());
        assert_eq!(result["language"]["name"], "English");
        assert!(result["cleaned_text"].as_str().unwrap().contains("Acme Corp"));
    }
}
