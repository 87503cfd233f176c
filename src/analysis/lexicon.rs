use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use super::text::{round_to, words};

/// Polarity in [-1, 1] and subjectivity in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub polarity: f64,
    pub subjectivity: f64,
}

impl SentimentScore {
    pub const NEUTRAL: SentimentScore = SentimentScore { polarity: 0.0, subjectivity: 0.0 };
}

// (word, polarity, subjectivity)
const ENTRIES: &[(&str, f64, f64)] = &[
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("excellent", 1.0, 1.0),
    ("outstanding", 0.9, 0.9),
    ("exceptional", 0.8, 0.8),
    ("impressive", 0.8, 0.9),
    ("positive", 0.23, 0.55),
    ("success", 0.5, 0.6),
    ("successful", 0.75, 0.95),
    ("effective", 0.6, 0.7),
    ("efficient", 0.5, 0.6),
    ("strong", 0.43, 0.73),
    ("robust", 0.5, 0.6),
    ("solid", 0.3, 0.5),
    ("healthy", 0.5, 0.5),
    ("growth", 0.3, 0.4),
    ("improvement", 0.4, 0.5),
    ("improved", 0.4, 0.5),
    ("innovative", 0.5, 0.7),
    ("promising", 0.6, 0.8),
    ("optimistic", 0.5, 0.8),
    ("confident", 0.5, 0.8),
    ("reliable", 0.4, 0.6),
    ("secure", 0.4, 0.6),
    ("profitable", 0.5, 0.5),
    ("benefit", 0.4, 0.5),
    ("beneficial", 0.5, 0.6),
    ("significant", 0.375, 0.875),
    ("substantial", 0.3, 0.6),
    ("exceeded", 0.5, 0.5),
    ("achieved", 0.4, 0.4),
    ("pleased", 0.5, 0.8),
    ("happy", 0.8, 1.0),
    ("satisfied", 0.5, 0.8),
    ("valuable", 0.5, 0.7),
    ("best", 1.0, 0.3),
    ("better", 0.5, 0.5),
    ("clear", 0.1, 0.4),
    ("bad", -0.7, 0.67),
    ("poor", -0.4, 0.6),
    ("weak", -0.375, 0.625),
    ("negative", -0.3, 0.4),
    ("problem", -0.4, 0.5),
    ("issue", -0.2, 0.4),
    ("risk", -0.3, 0.5),
    ("risky", -0.5, 0.7),
    ("concern", -0.3, 0.5),
    ("concerned", -0.4, 0.6),
    ("failure", -0.6, 0.6),
    ("failed", -0.5, 0.5),
    ("loss", -0.4, 0.4),
    ("losses", -0.4, 0.4),
    ("decline", -0.3, 0.4),
    ("declining", -0.3, 0.4),
    ("disappointing", -0.6, 0.7),
    ("unsatisfactory", -0.5, 0.7),
    ("ineffective", -0.5, 0.6),
    ("inadequate", -0.5, 0.6),
    ("difficult", -0.5, 1.0),
    ("expensive", -0.5, 0.7),
    ("delay", -0.2, 0.3),
    ("delays", -0.2, 0.3),
    ("threat", -0.4, 0.5),
    ("uncertain", -0.2, 0.7),
    ("uncertainty", -0.2, 0.6),
    ("worried", -0.5, 0.8),
    ("unfortunate", -0.5, 0.9),
    ("critical", -0.1, 0.6),
    ("worse", -0.4, 0.6),
    ("worst", -1.0, 1.0),
    ("terrible", -1.0, 1.0),
    ("breach", -0.4, 0.4),
    ("violation", -0.5, 0.5),
];

const INTENSIFIERS: &[&str] = &["very", "extremely", "highly", "incredibly", "absolutely", "completely", "totally"];
const DIMINISHERS: &[&str] = &["somewhat", "rather", "quite", "fairly", "slightly", "moderately", "relatively"];
const NEGATIONS: &[&str] = &["not", "no", "never", "nothing", "nobody", "none", "neither", "nowhere", "without"];

/// Word-level polarity lexicon with negation and intensity modifiers.
pub struct Lexicon {
    entries: HashMap<&'static str, (f64, f64)>,
}

impl Lexicon {
    pub fn shared() -> &'static Lexicon {
        static LEXICON: OnceLock<Lexicon> = OnceLock::new();
        LEXICON.get_or_init(Lexicon::new)
    }

    pub fn new() -> Self {
        Self {
            entries: ENTRIES.iter().map(|(w, p, s)| (*w, (*p, *s))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mean polarity and subjectivity of the opinion words in `text`.
    pub fn score(&self, text: &str) -> SentimentScore {
        let tokens = words(text);
        let mut polarities = Vec::new();
        let mut subjectivities = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let Some(&(mut polarity, mut subjectivity)) = self.entries.get(token.as_str()) else {
                continue;
            };

            if let Some(prev) = i.checked_sub(1).map(|j| tokens[j].as_str()) {
                if INTENSIFIERS.contains(&prev) {
                    polarity *= 1.3;
                    subjectivity *= 1.3;
                } else if DIMINISHERS.contains(&prev) {
                    polarity *= 0.7;
                    subjectivity *= 0.7;
                }
            }

            // negation within the two preceding tokens flips and dampens
            let negated = tokens[i.saturating_sub(2)..i]
                .iter()
                .any(|t| NEGATIONS.contains(&t.as_str()));
            if negated {
                polarity *= -0.5;
            }

            polarities.push(polarity.clamp(-1.0, 1.0));
            subjectivities.push(subjectivity.clamp(0.0, 1.0));
        }

        if polarities.is_empty() {
            return SentimentScore::NEUTRAL;
        }

        let n = polarities.len() as f64;
        SentimentScore {
            polarity: (polarities.iter().sum::<f64>() / n).clamp(-1.0, 1.0),
            subjectivity: (subjectivities.iter().sum::<f64>() / n).clamp(0.0, 1.0),
        }
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

/// "positive" above `threshold`, "negative" below `-threshold`.
pub fn polarity_label(polarity: f64, threshold: f64) -> &'static str {
    if polarity > threshold {
        "positive"
    } else if polarity < -threshold {
        "negative"
    } else {
        "neutral"
    }
}

const QUICK_POSITIVE: &[&str] = &["good", "great", "excellent", "positive", "success", "growth", "improvement"];
const QUICK_NEGATIVE: &[&str] = &["bad", "poor", "negative", "problem", "issue", "risk", "concern"];

/// Result of the word-membership sentiment used by the lightweight agents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickSentiment {
    pub overall_sentiment: &'static str,
    pub sentiment_score: u32,
    pub polarity: f64,
    pub confidence: f64,
    pub intensity: &'static str,
    #[serde(skip)]
    pub positive_hits: usize,
    #[serde(skip)]
    pub negative_hits: usize,
}

/// Counts which of the fixed positive and negative words occur and maps the
/// difference linearly onto a 10..=90 score.
pub fn quick_sentiment(text: &str) -> QuickSentiment {
    let lower = text.to_lowercase();
    let positive = QUICK_POSITIVE.iter().filter(|w| lower.contains(*w)).count();
    let negative = QUICK_NEGATIVE.iter().filter(|w| lower.contains(*w)).count();
    let diff = positive as f64 - negative as f64;

    let (label, score) = if positive > negative {
        ("positive", (0.5 + diff * 0.1).min(0.9))
    } else if negative > positive {
        ("negative", (0.5 + diff * 0.1).max(0.1))
    } else {
        ("neutral", 0.5)
    };

    QuickSentiment {
        overall_sentiment: label,
        sentiment_score: (score * 100.0).floor() as u32,
        polarity: round_to(score * 2.0 - 1.0, 2),
        confidence: 0.85,
        intensity: if diff.abs() > 2.0 { "strong" } else { "moderate" },
        positive_hits: positive,
        negative_hits: negative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_neutral() {
        assert_eq!(Lexicon::shared().score(""), SentimentScore::NEUTRAL);
        assert_eq!(Lexicon::shared().score("the board met on tuesday"), SentimentScore::NEUTRAL);
    }

    #[test]
    fn test_positive_and_negative_text() {
        let lex = Lexicon::new();
        assert!(lex.score("Excellent results and strong growth").polarity > 0.3);
        assert!(lex.score("Poor results, a serious problem and heavy losses").polarity < -0.3);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let lex = Lexicon::new();
        let plain = lex.score("the outcome was good");
        let negated = lex.score("the outcome was not good");
        assert!(plain.polarity > 0.0);
        assert!(negated.polarity < 0.0);
    }

    #[test]
    fn test_intensifier_is_clamped() {
        let score = Lexicon::new().score("extremely excellent");
        assert_eq!(score.polarity, 1.0);
        assert!(score.subjectivity <= 1.0);
    }

    #[test]
    fn test_quick_sentiment_formula() {
        let neutral = quick_sentiment("a memo");
        assert_eq!(neutral.sentiment_score, 50);
        assert_eq!(neutral.polarity, 0.0);

        let positive = quick_sentiment("good great excellent growth");
        assert_eq!(positive.overall_sentiment, "positive");
        assert_eq!(positive.sentiment_score, 90);
        assert_eq!(positive.intensity, "strong");

        let negative = quick_sentiment("a problem with risk");
        assert_eq!(negative.overall_sentiment, "negative");
        assert_eq!(negative.sentiment_score, 30);
        assert_eq!(negative.polarity, -0.4);
        assert_eq!(negative.intensity, "moderate");

        // 0.5 - 0.3 lands just under 0.2 in binary
        let three_down = quick_sentiment("bad poor problem");
        assert_eq!(three_down.sentiment_score, 19);
        assert_eq!(three_down.polarity, -0.6);
        assert_eq!(three_down.intensity, "strong");
    }

    #[test]
    fn test_quick_sentiment_is_bounded() {
        let every_negative = QUICK_NEGATIVE.join(" ");
        let result = quick_sentiment(&every_negative);
        assert_eq!(result.sentiment_score, 10);
        assert!(result.polarity >= -1.0);
    }
}
