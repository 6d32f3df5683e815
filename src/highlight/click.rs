//! Pointer or selection on rendered content back to a sentence index.

use crate::segmenter::SentenceList;
use crate::text_utils::{char_len, normalize_for_compare};
use serde::Deserialize;
use std::collections::HashSet;
use ts_rs::TS;

const CONTAINED_BY_CLICK_WEIGHT: f64 = 0.9;
const NGRAM_WEIGHT: f64 = 0.5;
const NGRAM: usize = 3;

/// What the host knows about a click.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClickTarget {
    /// Active text selection; wins over the pointer when non-empty.
    #[ts(optional)]
    pub selection: Option<String>,
    /// Text of the node under the pointer.
    #[ts(optional)]
    pub pointer_text: Option<String>,
    /// Byte offset of the pointer within the rendered text.
    #[ts(optional)]
    pub pointer_offset: Option<usize>,
}

impl ClickTarget {
    pub fn selection(text: impl Into<String>) -> Self {
        Self {
            selection: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn pointer_text(text: impl Into<String>) -> Self {
        Self {
            pointer_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn pointer_offset(offset: usize) -> Self {
        Self {
            pointer_offset: Some(offset),
            ..Self::default()
        }
    }

    /// The text to match: selection first, then the pointer's node text, then
    /// the rendered line around the pointer offset.
    pub fn resolve_text(&self, rendered: &str) -> Option<String> {
        let non_empty = |text: &Option<String>| {
            text.as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };
        non_empty(&self.selection)
            .or_else(|| non_empty(&self.pointer_text))
            .or_else(|| {
                self.pointer_offset
                    .and_then(|offset| line_around(rendered, offset))
                    .map(str::to_string)
            })
    }
}

/// The non-empty line of `rendered` containing byte `offset`.
fn line_around(rendered: &str, offset: usize) -> Option<&str> {
    if rendered.is_empty() {
        return None;
    }
    let mut offset = offset.min(rendered.len());
    while !rendered.is_char_boundary(offset) {
        offset -= 1;
    }
    let start = rendered[..offset].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let end = rendered[offset..]
        .find('\n')
        .map(|idx| offset + idx)
        .unwrap_or(rendered.len());
    let line = rendered[start..end].trim();
    (!line.is_empty()).then_some(line)
}

/// Best-matching sentence for `clicked`; the earliest sentence wins ties and
/// index 0 is the answer when nothing matches at all.
pub fn best_sentence_for_text(sentences: &SentenceList, clicked: &str) -> usize {
    let clicked = normalize_for_compare(clicked);
    if clicked.is_empty() {
        return 0;
    }

    let mut best_index = 0;
    let mut best_score = 0.0;
    for sentence in sentences.iter() {
        let score = match_score(&normalize_for_compare(&sentence.text), &clicked);
        if score >= 1.0 {
            return sentence.index;
        }
        if score > best_score {
            best_score = score;
            best_index = sentence.index;
        }
    }
    best_index
}

/// Both inputs already normalized.
pub fn match_score(sentence: &str, clicked: &str) -> f64 {
    if sentence.is_empty() || clicked.is_empty() {
        return 0.0;
    }
    if sentence == clicked {
        return 1.0;
    }
    let sentence_len = char_len(sentence) as f64;
    let clicked_len = char_len(clicked) as f64;
    if sentence.contains(clicked) {
        return clicked_len / sentence_len;
    }
    if clicked.contains(sentence) {
        return CONTAINED_BY_CLICK_WEIGHT * sentence_len / clicked_len;
    }
    NGRAM_WEIGHT * ngram_overlap(sentence, clicked)
}

/// Share of the clicked text's character trigrams that also occur in the
/// sentence.
fn ngram_overlap(sentence: &str, clicked: &str) -> f64 {
    let clicked_grams = ngrams(clicked);
    if clicked_grams.is_empty() {
        return 0.0;
    }
    let sentence_grams = ngrams(sentence);
    let shared = clicked_grams.intersection(&sentence_grams).count();
    shared as f64 / clicked_grams.len() as f64
}

fn ngrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .windows(NGRAM)
        .map(|window| window.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences() -> SentenceList {
        SentenceList::from_texts([
            "The quick brown fox jumps.",
            "A lazy dog sleeps all day.",
            "The quick brown fox returns.",
        ])
    }

    #[test]
    fn exact_normalized_match_wins_outright() {
        assert_eq!(
            best_sentence_for_text(&sentences(), "  a LAZY\n dog sleeps all day. "),
            1
        );
    }

    #[test]
    fn substring_ties_favor_earliest_sentence() {
        assert_eq!(best_sentence_for_text(&sentences(), "quick brown fox"), 0);
        assert_eq!(best_sentence_for_text(&sentences(), "fox returns"), 2);
    }

    #[test]
    fn click_spanning_a_sentence_scores_below_containment() {
        let long_click = "before. a lazy dog sleeps all day. after";
        assert_eq!(best_sentence_for_text(&sentences(), long_click), 1);
        let contained = match_score("abcdef", "abc");
        let spanning = match_score("abc", "abcdef");
        assert!((contained - 0.5).abs() < 1e-9);
        assert!((spanning - 0.45).abs() < 1e-9);
    }

    #[test]
    fn trigram_overlap_catches_near_misses() {
        assert_eq!(best_sentence_for_text(&sentences(), "lazy dogs sleeping"), 1);
        let score = match_score("a lazy dog", "lazy cat");
        assert!(score > 0.0 && score < 0.5);
    }

    #[test]
    fn no_match_defaults_to_first_sentence() {
        assert_eq!(best_sentence_for_text(&sentences(), "zzzz"), 0);
        assert_eq!(best_sentence_for_text(&sentences(), ""), 0);
        assert_eq!(best_sentence_for_text(&SentenceList::default(), "fox"), 0);
    }

    #[test]
    fn selection_takes_priority_over_pointer() {
        let target = ClickTarget {
            selection: Some("dog sleeps".to_string()),
            pointer_text: Some("fox returns".to_string()),
            pointer_offset: None,
        };
        assert_eq!(target.resolve_text("").as_deref(), Some("dog sleeps"));

        let blank_selection = ClickTarget {
            selection: Some("   ".to_string()),
            ..ClickTarget::pointer_text("fox returns")
        };
        assert_eq!(blank_selection.resolve_text("").as_deref(), Some("fox returns"));
    }

    #[test]
    fn pointer_offset_resolves_to_surrounding_line() {
        let rendered = "First line here\nSecond line — über\nThird";
        let offset = rendered.find("über").unwrap() + 1;
        assert_eq!(
            ClickTarget::pointer_offset(offset).resolve_text(rendered).as_deref(),
            Some("Second line — über")
        );
        assert_eq!(ClickTarget::default().resolve_text(rendered), None);
    }
}
