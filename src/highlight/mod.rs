//! Keeps the rendered surface in step with playback: one marked sentence at a
//! time, scroll targets for playback-driven moves, and the inverse mapping
//! from a click back to a sentence index.
//!
//! Highlighting is best-effort. A sentence that cannot be located simply gets
//! no mark; nothing here can stall playback.

mod click;
mod matching;
mod scroll;

pub use click::{ClickTarget, best_sentence_for_text, match_score};
pub use matching::{HighlightMatch, MatchStrategy, locate_occurrence, locate_sentence};
pub use scroll::{Viewport, scroll_offset_for_sentence};

use crate::controller::IndexChangeCause;
use crate::segmenter::SentenceList;
use serde::Serialize;
use tracing::debug;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightSettings {
    /// Shortest fragment trusted by the last-resort match.
    pub min_fragment_chars: usize,
    pub auto_scroll: bool,
    pub center_spoken_sentence: bool,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            min_fragment_chars: 10,
            auto_scroll: true,
            center_spoken_sentence: true,
        }
    }
}

/// What the renderer should do, in order.
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum RenderInstruction {
    Clear,
    Mark {
        index: usize,
        /// Byte offsets into the rendered text.
        start: usize,
        end: usize,
        strategy: MatchStrategy,
    },
    ScrollIntoView {
        index: usize,
        #[ts(optional)]
        offset: Option<f32>,
    },
}

#[derive(Debug, Default)]
pub struct HighlightSync {
    settings: HighlightSettings,
    rendered: String,
    viewport: Viewport,
    marked: Option<usize>,
}

impl HighlightSync {
    pub fn new(settings: HighlightSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn marked(&self) -> Option<usize> {
        self.marked
    }

    pub fn rendered_text(&self) -> &str {
        &self.rendered
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// New rendered text invalidates any mark made against the old one.
    pub fn set_rendered_text(&mut self, rendered: impl Into<String>) -> Vec<RenderInstruction> {
        self.rendered = rendered.into();
        self.clear()
    }

    pub fn clear(&mut self) -> Vec<RenderInstruction> {
        match self.marked.take() {
            Some(_) => vec![RenderInstruction::Clear],
            None => Vec::new(),
        }
    }

    /// Move the mark to `index` (or remove it) and, for moves the reader did not
    /// make by clicking, scroll the sentence into view.
    pub fn on_index_change(
        &mut self,
        sentences: &SentenceList,
        index: Option<usize>,
        cause: IndexChangeCause,
    ) -> Vec<RenderInstruction> {
        let mut instructions = self.refresh(sentences, index);
        let Some(index) = index.filter(|idx| *idx < sentences.len()) else {
            return instructions;
        };
        if self.settings.auto_scroll && cause.wants_scroll() {
            let offset = scroll_offset_for_sentence(
                sentences,
                index,
                &self.viewport,
                self.settings.center_spoken_sentence,
            );
            instructions.push(RenderInstruction::ScrollIntoView { index, offset });
        }
        instructions
    }

    /// Re-mark `index` against the current rendered text without scrolling.
    pub fn refresh(
        &mut self,
        sentences: &SentenceList,
        index: Option<usize>,
    ) -> Vec<RenderInstruction> {
        let mut instructions = self.clear();
        let Some(index) = index else {
            return instructions;
        };
        let Some(sentence) = sentences.text(index) else {
            debug!(index, "Highlight target out of range");
            return instructions;
        };

        let needle = sentence.trim();
        let occurrence = sentences
            .iter()
            .take(index)
            .filter(|earlier| earlier.text.trim() == needle)
            .count();
        match locate_occurrence(
            &self.rendered,
            sentence,
            occurrence,
            self.settings.min_fragment_chars,
        ) {
            Some(found) => {
                debug!(index, strategy = ?found.strategy, "Marked sentence");
                self.marked = Some(index);
                instructions.push(RenderInstruction::Mark {
                    index,
                    start: found.range.start,
                    end: found.range.end,
                    strategy: found.strategy,
                });
            }
            None => debug!(index, "Sentence not found in rendered text; no highlight"),
        }
        instructions
    }

    /// Sentence index for a click or selection on the rendered content.
    pub fn sentence_at(&self, sentences: &SentenceList, target: &ClickTarget) -> usize {
        match target.resolve_text(&self.rendered) {
            Some(text) => best_sentence_for_text(sentences, &text),
            None => {
                debug!("Click carried no text; defaulting to first sentence");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences() -> SentenceList {
        SentenceList::from_texts(["Hello world.", "How are you?", "Fine!"])
    }

    #[test]
    fn exactly_one_mark_at_a_time() {
        let mut sync = HighlightSync::new(HighlightSettings::default());
        sync.set_rendered_text("Hello world. How are you? Fine!");

        let first = sync.on_index_change(&sentences(), Some(0), IndexChangeCause::Click);
        assert_eq!(first.len(), 1);
        assert!(matches!(first[0], RenderInstruction::Mark { index: 0, start: 0, end: 12, .. }));

        let second = sync.on_index_change(&sentences(), Some(1), IndexChangeCause::Click);
        assert_eq!(second[0], RenderInstruction::Clear);
        assert!(matches!(second[1], RenderInstruction::Mark { index: 1, .. }));
        assert_eq!(sync.marked(), Some(1));

        let reset = sync.on_index_change(&sentences(), None, IndexChangeCause::Reset);
        assert_eq!(reset, vec![RenderInstruction::Clear]);
        assert_eq!(sync.marked(), None);
    }

    #[test]
    fn playback_moves_scroll_but_clicks_do_not() {
        let mut sync = HighlightSync::new(HighlightSettings::default());
        sync.set_rendered_text("Hello world. How are you? Fine!");

        let clicked = sync.on_index_change(&sentences(), Some(2), IndexChangeCause::Click);
        assert!(
            !clicked
                .iter()
                .any(|step| matches!(step, RenderInstruction::ScrollIntoView { .. }))
        );

        let played = sync.on_index_change(&sentences(), Some(2), IndexChangeCause::Playback);
        assert!(matches!(
            played.last(),
            Some(RenderInstruction::ScrollIntoView { index: 2, .. })
        ));
    }

    #[test]
    fn missing_sentence_leaves_no_mark() {
        let mut sync = HighlightSync::new(HighlightSettings {
            auto_scroll: false,
            ..HighlightSettings::default()
        });
        sync.set_rendered_text("Completely different text");
        let steps = sync.on_index_change(&sentences(), Some(0), IndexChangeCause::Playback);
        assert!(steps.is_empty());
        assert_eq!(sync.marked(), None);
    }

    #[test]
    fn refresh_marks_without_scrolling() {
        let mut sync = HighlightSync::default();
        sync.set_rendered_text("Hello world. How are you? Fine!");
        let steps = sync.refresh(&sentences(), Some(1));
        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0], RenderInstruction::Mark { index: 1, .. }));
    }

    #[test]
    fn repeated_sentence_is_marked_at_its_own_position() {
        let list = SentenceList::from_texts(["Yes.", "Was it raining?", "Yes."]);
        let mut sync = HighlightSync::default();
        sync.set_rendered_text("Yes. Was it raining? Yes.");
        let steps = sync.on_index_change(&list, Some(2), IndexChangeCause::Playback);
        assert!(matches!(
            steps[0],
            RenderInstruction::Mark { index: 2, start: 21, end: 25, .. }
        ));
        let steps = sync.on_index_change(&list, Some(0), IndexChangeCause::Click);
        assert!(matches!(
            steps[1],
            RenderInstruction::Mark { index: 0, start: 0, end: 4, .. }
        ));
    }

    #[test]
    fn new_rendered_text_clears_mark() {
        let mut sync = HighlightSync::new(HighlightSettings::default());
        sync.set_rendered_text("Hello world.");
        sync.on_index_change(&sentences(), Some(0), IndexChangeCause::Click);
        assert_eq!(sync.set_rendered_text("Fine!"), vec![RenderInstruction::Clear]);
        assert_eq!(sync.rendered_text(), "Fine!");
    }

    #[test]
    fn click_resolves_through_rendered_line() {
        let mut sync = HighlightSync::default();
        sync.set_rendered_text("Hello world.\nHow are you?\nFine!");
        let offset = sync.rendered_text().find("are").unwrap();
        assert_eq!(
            sync.sentence_at(&sentences(), &ClickTarget::pointer_offset(offset)),
            1
        );
        assert_eq!(sync.sentence_at(&sentences(), &ClickTarget::default()), 0);
    }

    #[test]
    fn instructions_serialize_with_kind_tag() {
        let json = serde_json::to_string(&RenderInstruction::ScrollIntoView {
            index: 3,
            offset: Some(0.5),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"scroll_into_view","index":3,"offset":0.5}"#);
    }
}
