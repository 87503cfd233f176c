//! Text helpers shared by the analysis agents: tokenising, keyword counting,
//! context windows and the polarity lexicon.

pub mod lexicon;
pub mod text;

pub use lexicon::{polarity_label, quick_sentiment, Lexicon, QuickSentiment, SentimentScore};
pub use text::{
    count_all, extract_contexts, level, round_to, sentences, top_counts, word_frequencies, words,
    STOP_WORDS,
};
