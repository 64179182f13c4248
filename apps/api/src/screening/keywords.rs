//! Keyword extraction: splits free text into short skill/keyword phrases.
//!
//! Two flavours:
//! - `extract_phrases`: every phrase within the word-count window, in order.
//!   This is what `JobPosting.parsed_keywords` stores.
//! - `extract_top_keywords`: drops stop-word-only phrases and ranks the rest
//!   by frequency (ties keep first-seen order). Used for the keyword boost.

use std::collections::HashMap;

pub const DEFAULT_MIN_WORDS: usize = 1;
pub const DEFAULT_MAX_WORDS: usize = 4;
pub const DEFAULT_TOP_N: usize = 20;

/// English stop words (NLTK list).
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

fn is_separator(c: char) -> bool {
    matches!(c, '\n' | ',' | ';' | '•' | '-' | '|')
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Splits `text` into lowercase, trimmed phrases whose word count lies in
/// `[min_words, max_words]`. Order follows the text; duplicates are kept.
pub fn extract_phrases(text: &str, min_words: usize, max_words: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    lower
        .split(is_separator)
        .map(str::trim)
        .filter(|phrase| {
            let words = phrase.split_whitespace().count();
            words > 0 && (min_words..=max_words).contains(&words)
        })
        .map(String::from)
        .collect()
}

/// Job-description skills with the default 1–4 word window.
pub fn job_skills(text: &str) -> Vec<String> {
    extract_phrases(text, DEFAULT_MIN_WORDS, DEFAULT_MAX_WORDS)
}

/// Ranks non-stop-word phrases by descending frequency and returns the top `top_n`.
pub fn extract_top_keywords(
    text: &str,
    min_words: usize,
    max_words: usize,
    top_n: usize,
) -> Vec<String> {
    let phrases = extract_phrases(text, min_words, max_words);

    // phrase -> (count, first index)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, phrase) in phrases.iter().enumerate() {
        if phrase.split_whitespace().all(is_stop_word) {
            continue;
        }
        counts.entry(phrase.as_str()).or_insert((0, idx)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(phrase, (count, first))| (phrase, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(phrase, _, _)| phrase.to_string())
        .collect()
}
