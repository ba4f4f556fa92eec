//! # Text Processing Module
//!
//! Text utilities shared by the AI clients and the reply formatter:
//!
//! - Candidate vocabulary detection for the offline keyword extractor
//! - Removal of Markdown code fences that language models wrap around JSON
//! - Truncation of replies to the messaging platform's text limit

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Maximum characters in one LINE text message
pub const MAX_TEXT_LENGTH: usize = 5000;
/// Characters kept when a reply has to be cut
pub const TRUNCATED_LENGTH: usize = 4990;
pub const TRUNCATION_SUFFIX: &str = "\n... (truncated)";

/// Words shorter than this are never vocabulary candidates
const MIN_CANDIDATE_LENGTH: usize = 4;

lazy_static! {
    // ASCII word characters only, so accented letters split words
    static ref NON_WORD: Regex = Regex::new(r"[^A-Za-z0-9_\s]").expect("valid punctuation pattern");
    static ref CODE_FENCE: Regex = Regex::new(r"```(?:json)?").expect("valid code fence pattern");
    static ref STOP_WORDS: HashSet<&'static str> = [
        "with", "this", "that", "they", "have", "been", "from", "will", "your", "said", "each",
        "which", "their", "time", "would", "there", "could", "other", "after", "first", "well",
        "also", "want", "because", "these", "give", "many", "some", "very", "when", "much",
        "then", "them", "only", "think", "over", "back", "where", "before", "move", "right",
        "same", "word", "about", "make", "like", "into", "more", "than", "water", "call",
        "find", "long", "down", "come", "made", "part",
    ]
    .into_iter()
    .collect();
}

/// Lowercased candidate vocabulary words in first-seen order
///
/// Anything but ASCII letters, digits and underscores is treated as a
/// separator, short words and stop words are dropped, and duplicates are
/// removed. At most `limit` words are returned.
pub fn extract_candidate_words(text: &str, limit: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, " ");
    let mut seen = HashSet::new();

    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_CANDIDATE_LENGTH)
        .filter(|word| !STOP_WORDS.contains(word))
        .filter(|word| seen.insert(word.to_string()))
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// Remove ```json / ``` fences and surrounding whitespace
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Cut a reply to fit into one text message
pub fn truncate_for_line(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_LENGTH {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(TRUNCATED_LENGTH).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}
