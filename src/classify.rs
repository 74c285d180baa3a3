// src/classify.rs
//! Message classifier: decides which fetched messages answer a keyword set.
//!
//! A message is matched when its source is *mentioned* (its identifier appears,
//! case-insensitively, inside any keyword) or when any keyword hits its body under
//! the configured [`MatchMode`]. Matching is a boolean OR over keywords; there is
//! no scoring and no cross-source deduplication.

use std::collections::HashSet;

use crate::ingest::types::NormalizedMessage;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// How a keyword is compared against a message body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MatchMode {
    /// Plain case-insensitive containment. An empty keyword matches everything.
    #[default]
    Substring,
    /// Containment restricted to word boundaries on both sides.
    Token,
    /// Containment, or a same-length run of body words within edit-similarity
    /// `threshold` (0.0..=1.0) of the keyword.
    Fuzzy { threshold: f64 },
}

impl MatchMode {
    /// Parses the config spelling (`substring` | `token` | `fuzzy`).
    pub fn parse(name: &str, fuzzy_threshold: f64) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "substring" => Some(MatchMode::Substring),
            "token" | "word" => Some(MatchMode::Token),
            "fuzzy" => Some(MatchMode::Fuzzy {
                threshold: fuzzy_threshold.clamp(0.0, 1.0),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    mode: MatchMode,
}

impl Classifier {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Sources whose identifier is a case-insensitive substring of some keyword.
    /// Always substring semantics, whatever the body match mode is.
    pub fn mentioned_sources(sources: &[String], keywords: &[String]) -> Vec<String> {
        let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        sources
            .iter()
            .filter(|s| {
                let needle = s.to_lowercase();
                lowered.iter().any(|kw| kw.contains(&needle))
            })
            .cloned()
            .collect()
    }

    /// Returns the matched subset, preserving input order.
    pub fn classify(
        &self,
        sources: &[String],
        messages: &[NormalizedMessage],
        keywords: &[String],
    ) -> Vec<NormalizedMessage> {
        let mentioned: HashSet<String> = Self::mentioned_sources(sources, keywords)
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        if !mentioned.is_empty() {
            tracing::debug!(mentioned = ?mentioned, "explicit source override");
        }

        let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        messages
            .iter()
            .filter(|m| self.is_match(m, &mentioned, &lowered))
            .cloned()
            .collect()
    }

    /// `mentioned` holds lowercased source ids, `keywords` lowercased keywords.
    pub fn is_match(
        &self,
        msg: &NormalizedMessage,
        mentioned: &HashSet<String>,
        keywords: &[String],
    ) -> bool {
        if mentioned.contains(&msg.source.to_lowercase()) {
            return true;
        }
        let body = msg.body.to_lowercase();
        keywords.iter().any(|kw| self.keyword_hits(&body, kw))
    }

    fn keyword_hits(&self, body: &str, kw: &str) -> bool {
        match self.mode {
            MatchMode::Substring => body.contains(kw),
            MatchMode::Token => !kw.is_empty() && contains_on_word_boundary(body, kw),
            MatchMode::Fuzzy { threshold } => {
                !kw.is_empty() && (body.contains(kw) || fuzzy_window_hit(body, kw, threshold))
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn contains_on_word_boundary(haystack: &str, needle: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_word_char(c));
        let after_ok = haystack[end..].chars().next().is_none_or(|c| !is_word_char(c));
        if before_ok && after_ok {
            return true;
        }
        // advance by one char to allow overlapping candidates
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

fn words(s: &str) -> Vec<&str> {
    s.split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
        .collect()
}

fn fuzzy_window_hit(body: &str, kw: &str, threshold: f64) -> bool {
    let kw_words = words(kw);
    if kw_words.is_empty() {
        return false;
    }
    let target = kw_words.join(" ");
    let body_words = words(body);
    body_words
        .windows(kw_words.len())
        .any(|w| strsim::normalized_levenshtein(&w.join(" "), &target) >= threshold)
}
