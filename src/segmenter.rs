//! Rich content → ordered sentence list.
//!
//! Markup is reduced to plain text first (block elements and `<br>` become
//! line breaks), whitespace is collapsed, and the text is cut right after
//! sentence-final punctuation so the mark stays with its sentence. Loosely
//! punctuated content (fewer than three sentences) is re-split on line
//! breaks when that yields more pieces.

use crate::text_utils::{collapse_whitespace, content_hash};
use scraper::{ElementRef, Html, Node};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Below this many punctuation-delimited sentences the newline split is tried.
const MIN_PUNCTUATED_SENTENCES: usize = 3;
const DEFAULT_CACHE_CAPACITY: usize = 8;

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "template", "noscript"];
const BLOCK_ELEMENTS: [&str; 24] = [
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "tr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub index: usize,
    pub text: String,
}

/// Immutable, shareable sentence list derived from one content snapshot.
#[derive(Debug, Clone, Default)]
pub struct SentenceList {
    sentences: Arc<Vec<Sentence>>,
    content_hash: String,
}

impl SentenceList {
    pub fn new(texts: Vec<String>, content_hash: String) -> Self {
        let sentences = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Sentence { index, text })
            .collect();
        Self {
            sentences: Arc::new(sentences),
            content_hash,
        }
    }

    pub fn from_texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        let texts: Vec<String> = texts.into_iter().map(Into::into).collect();
        let hash = content_hash(&texts.join("\n"));
        Self::new(texts, hash)
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sentence> {
        self.sentences.get(index)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.sentences.get(index).map(|sentence| sentence.text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sentence> {
        self.sentences.iter()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.sentences.len().checked_sub(1)
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// True when both lists are the same shared allocation.
    pub fn shares_storage(&self, other: &SentenceList) -> bool {
        Arc::ptr_eq(&self.sentences, &other.sentences)
    }
}

/// Split rich content into sentences. Empty or whitespace-only content yields
/// an empty list; anything else yields at least one sentence.
pub fn segment(content: &str) -> SentenceList {
    SentenceList::new(segment_texts(content), content_hash(content))
}

pub fn segment_texts(content: &str) -> Vec<String> {
    let raw = extract_text(content);
    let collapsed = collapse_whitespace(&raw);
    if collapsed.is_empty() {
        return Vec::new();
    }

    let mut sentences = split_on_punctuation(&collapsed);
    if sentences.len() < MIN_PUNCTUATED_SENTENCES {
        let lines = split_on_newlines(&raw);
        if lines.len() > sentences.len() {
            debug!(
                punctuated = sentences.len(),
                lines = lines.len(),
                "Using line-based segmentation"
            );
            sentences = lines;
        }
    }

    if sentences.is_empty() {
        sentences.push(collapsed);
    }
    sentences
}

/// Plain text of rich content with line structure preserved.
pub fn extract_text(content: &str) -> String {
    if !content.contains('<') && !content.contains('&') {
        return content.to_string();
    }
    let fragment = Html::parse_fragment(content);
    let mut out = String::with_capacity(content.len());
    collect_text(fragment.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_text(child_element, out);
            if block {
                out.push('\n');
            }
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

fn is_terminator(ch: char) -> bool {
    matches!(
        ch,
        '.' | '!' | '?' | ';' | ':' | '。' | '！' | '？' | '；' | '：' | '…'
    )
}

fn is_closer(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | ')' | ']' | '”' | '’' | '」' | '』' | '）' | '»'
    )
}

/// Cut after each run of sentence-final punctuation; trailing closing quotes
/// and brackets stay attached. A `.` between two digits is not a boundary.
pub fn split_on_punctuation(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        current.push(ch);
        i += 1;
        if !is_terminator(ch) {
            continue;
        }
        let decimal_point = ch == '.'
            && i >= 2
            && chars[i - 2].is_ascii_digit()
            && chars.get(i).is_some_and(|next| next.is_ascii_digit());
        if decimal_point {
            continue;
        }
        while let Some(&next) = chars.get(i) {
            if is_terminator(next) || is_closer(next) {
                current.push(next);
                i += 1;
            } else {
                break;
            }
        }
        push_trimmed(&mut sentences, &current);
        current.clear();
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

pub fn split_on_newlines(text: &str) -> Vec<String> {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

fn push_trimmed(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

/// Memoizes segmentation by content hash; identical content returns the same
/// shared list.
#[derive(Debug)]
pub struct SegmentCache {
    entries: HashMap<String, SentenceList>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SegmentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_segment(&mut self, content: &str) -> SentenceList {
        let hash = content_hash(content);
        if let Some(list) = self.entries.get(&hash) {
            debug!(hash = %hash, "Reusing cached sentence list");
            return list.clone();
        }

        let list = SentenceList::new(segment_texts(content), hash.clone());
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.order.push_back(hash.clone());
        self.entries.insert(hash, list.clone());
        list
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SegmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
