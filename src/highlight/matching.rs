//! Locating a sentence inside rendered text.
//!
//! Three strategies, first hit wins: verbatim substring, whitespace-normalized
//! substring (mapped back onto the rendered text), then the sentence's longest
//! punctuation-free fragment when it is long enough to be distinctive.
//!
//! A sentence that repeats earlier in the list is matched at its own
//! occurrence, or at the last one present when the rendered text has fewer.

use crate::text_utils::{NormalizedText, char_len, collapse_whitespace, longest_fragment};
use serde::Serialize;
use std::ops::Range;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MatchStrategy {
    Exact,
    Normalized,
    Fragment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightMatch {
    /// Byte range within the rendered text.
    pub range: Range<usize>,
    pub strategy: MatchStrategy,
}

pub fn locate_sentence(
    rendered: &str,
    sentence: &str,
    min_fragment_chars: usize,
) -> Option<HighlightMatch> {
    locate_occurrence(rendered, sentence, 0, min_fragment_chars)
}

/// Like [`locate_sentence`], but for the `occurrence`-th (zero-based) copy of
/// the sentence.
pub fn locate_occurrence(
    rendered: &str,
    sentence: &str,
    occurrence: usize,
    min_fragment_chars: usize,
) -> Option<HighlightMatch> {
    let needle = sentence.trim();
    if needle.is_empty() || rendered.is_empty() {
        return None;
    }

    if let Some(start) = find_nth(rendered, needle, occurrence) {
        return Some(HighlightMatch {
            range: start..start + needle.len(),
            strategy: MatchStrategy::Exact,
        });
    }

    let normalized = NormalizedText::new(rendered);
    let collapsed = collapse_whitespace(needle);
    if let Some(range) = find_nth(normalized.as_str(), &collapsed, occurrence)
        .and_then(|start| normalized.source_range(start, start + collapsed.len()))
    {
        return Some(HighlightMatch {
            range,
            strategy: MatchStrategy::Normalized,
        });
    }

    let fragment = longest_fragment(needle)?;
    if char_len(fragment) < min_fragment_chars {
        return None;
    }
    find_nth(rendered, fragment, occurrence).map(|start| HighlightMatch {
        range: start..start + fragment.len(),
        strategy: MatchStrategy::Fragment,
    })
}

/// Start of the `n`-th match, or of the last one when there are fewer.
fn find_nth(haystack: &str, needle: &str, n: usize) -> Option<usize> {
    haystack
        .match_indices(needle)
        .take(n + 1)
        .last()
        .map(|(start, _)| start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbatim_match_wins() {
        let rendered = "Intro. Hello world. Outro.";
        let found = locate_sentence(rendered, "Hello world.", 10).unwrap();
        assert_eq!(found.strategy, MatchStrategy::Exact);
        assert_eq!(&rendered[found.range], "Hello world.");
    }

    #[test]
    fn line_breaks_in_markup_fall_back_to_normalized_match() {
        let rendered = "Intro.\nHello\n    world. Outro.";
        let found = locate_sentence(rendered, "Hello world.", 10).unwrap();
        assert_eq!(found.strategy, MatchStrategy::Normalized);
        assert_eq!(&rendered[found.range], "Hello\n    world.");
    }

    #[test]
    fn long_fragment_rescues_reworded_punctuation() {
        let rendered = "He said: extraordinarily — then left";
        let found = locate_sentence(rendered, "He said, \"extraordinarily\"!", 10).unwrap();
        assert_eq!(found.strategy, MatchStrategy::Fragment);
        assert_eq!(&rendered[found.range], "extraordinarily");
    }

    #[test]
    fn repeated_sentence_matches_its_own_copy() {
        let rendered = "Yes. No. Maybe. Yes. Done.";
        let first = locate_occurrence(rendered, "Yes.", 0, 10).unwrap();
        assert_eq!(first.range, 0..4);
        let second = locate_occurrence(rendered, "Yes.", 1, 10).unwrap();
        assert_eq!(second.range, 16..20);
        let beyond = locate_occurrence(rendered, "Yes.", 4, 10).unwrap();
        assert_eq!(beyond.range, 16..20);
    }

    #[test]
    fn short_fragments_are_not_trusted() {
        assert_eq!(locate_sentence("a-b-c", "a, b; c!", 10), None);
        assert_eq!(locate_sentence("anything", "   ", 10), None);
        assert_eq!(locate_sentence("", "Hello.", 10), None);
    }
}
