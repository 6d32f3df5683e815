//! Text helpers shared by segmentation and highlight matching.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_FRAGMENT_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{P}\s]+").unwrap());

/// Collapse every whitespace run (line breaks included) into one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Comparison key used by click matching: NFKC, collapsed whitespace, lowercase.
pub fn normalize_for_compare(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    collapse_whitespace(&composed).to_lowercase()
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Longest run of characters that are neither punctuation nor whitespace.
/// Ties keep the earliest run.
pub fn longest_fragment(text: &str) -> Option<&str> {
    let mut best: Option<&str> = None;
    for fragment in RE_FRAGMENT_BREAK.split(text) {
        if fragment.is_empty() {
            continue;
        }
        let longer = best
            .map(|current| char_len(fragment) > char_len(current))
            .unwrap_or(true);
        if longer {
            best = Some(fragment);
        }
    }
    best
}

pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whitespace-collapsed copy of a text that remembers where every byte came
/// from, so a match found in the copy can be reported against the original.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    text: String,
    origin: Vec<(usize, usize)>,
}

impl NormalizedText {
    pub fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut origin: Vec<(usize, usize)> = Vec::with_capacity(source.len());
        let mut in_whitespace = false;

        for (start, ch) in source.char_indices() {
            let end = start + ch.len_utf8();
            if ch.is_whitespace() {
                if in_whitespace {
                    // Extend the run so the mapped range covers all of it.
                    if let Some(last) = origin.last_mut() {
                        last.1 = end;
                    }
                    continue;
                }
                in_whitespace = true;
                text.push(' ');
                origin.push((start, end));
                continue;
            }
            in_whitespace = false;
            text.push(ch);
            for _ in 0..ch.len_utf8() {
                origin.push((start, end));
            }
        }

        Self { text, origin }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Map a byte range of the normalized text back onto the source text.
    pub fn source_range(&self, start: usize, end: usize) -> Option<std::ops::Range<usize>> {
        if start >= end || end > self.origin.len() {
            return None;
        }
        Some(self.origin[start].0..self.origin[end - 1].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_line_breaks_and_tabs() {
        assert_eq!(collapse_whitespace("  a\n\tb   c \n"), "a b c");
    }

    #[test]
    fn compare_key_folds_width_and_case() {
        assert_eq!(normalize_for_compare("Ｈello\n World"), "hello world");
    }

    #[test]
    fn longest_fragment_skips_punctuation_and_spaces() {
        assert_eq!(
            longest_fragment("再见，这是一个非常长的句子片段。好"),
            Some("这是一个非常长的句子片段")
        );
        assert_eq!(longest_fragment("...  !!"), None);
    }

    #[test]
    fn normalized_text_maps_back_to_source() {
        let source = "Hello\n\n   world. Next";
        let normalized = NormalizedText::new(source);
        assert_eq!(normalized.as_str(), "Hello world. Next");

        let start = normalized.as_str().find("world").unwrap();
        let range = normalized.source_range(start, start + "world".len()).unwrap();
        assert_eq!(&source[range], "world");

        let range = normalized.source_range(0, "Hello world".len()).unwrap();
        assert_eq!(&source[range], "Hello\n\n   world");
    }
}
