use std::collections::HashMap;

/// Common English function words ignored by phrase and theme extraction.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
    "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may", "me",
    "more", "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Lowercased alphanumeric tokens.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|w| w.trim_matches(|c| c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Sentences split on periods, trimmed, empties dropped.
pub fn sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Total non-overlapping substring occurrences of every needle.
pub fn count_all(haystack_lower: &str, needles: &[&str]) -> usize {
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .map(|n| haystack_lower.matches(n).count())
        .sum()
}

pub fn word_frequencies<'a, I>(tokens: I) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut freq = HashMap::new();
    for token in tokens {
        *freq.entry(token.clone()).or_insert(0) += 1;
    }
    freq
}

/// Highest counts first, ties broken alphabetically so output is stable.
pub fn top_counts(freq: &HashMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = freq.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}

/// Up to three distinct snippets of roughly `window` characters around each
/// case-insensitive hit of `keyword`.
pub fn extract_contexts(text: &str, keyword: &str, window: usize) -> Vec<String> {
    let needle = keyword.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    // lowercasing can change byte lengths outside ascii, fall back to the
    // lowered text so offsets stay valid
    let lower = text.to_lowercase();
    let source: &str = if lower.len() == text.len() { text } else { &lower };

    let half = window / 2;
    let mut contexts: Vec<String> = Vec::new();
    let mut start = 0;
    while let Some(offset) = lower[start..].find(&needle) {
        let pos = start + offset;
        let from = floor_boundary(source, pos.saturating_sub(half));
        let to = ceil_boundary(source, (pos + needle.len() + half).min(source.len()));
        let snippet = source[from..to].trim().to_string();
        if !snippet.is_empty() && !contexts.contains(&snippet) {
            contexts.push(snippet);
        }
        if contexts.len() >= 3 {
            break;
        }
        start = pos + needle.len();
    }
    contexts
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// "high" above `high`, "medium" above `medium`, otherwise "low".
pub fn level(value: f64, high: f64, medium: f64) -> &'static str {
    if value > high {
        "high"
    } else if value > medium {
        "medium"
    } else {
        "low"
    }
}
