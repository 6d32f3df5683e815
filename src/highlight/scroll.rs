use crate::segmenter::SentenceList;

/// Rough layout of the rendering surface, enough to estimate where a sentence
/// sits vertically without asking the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width_px: f32,
    pub height_px: f32,
    /// Total scrollable height; `0.0` when unknown.
    pub content_height_px: f32,
    pub font_size_px: f32,
    pub line_spacing: f32,
    pub margin_horizontal_px: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width_px: 800.0,
            height_px: 600.0,
            content_height_px: 0.0,
            font_size_px: 16.0,
            line_spacing: 1.2,
            margin_horizontal_px: 24.0,
        }
    }
}

struct SentenceProgress {
    start: f32,
    middle: f32,
}

/// Relative vertical offset (0.0 top, 1.0 bottom of the scrollable range) that
/// brings sentence `index` into view, either centered or a quarter down.
pub fn scroll_offset_for_sentence(
    sentences: &SentenceList,
    index: usize,
    viewport: &Viewport,
    centered: bool,
) -> Option<f32> {
    if sentences.is_empty() {
        return None;
    }
    let weights = estimate_sentence_line_weights(sentences, viewport);
    let progress = sentence_progress(&weights, index)?;

    let line_height_px = viewport.font_size_px.max(1.0) * viewport.line_spacing.max(0.8);
    let content_height = if viewport.content_height_px > 0.0 {
        viewport.content_height_px
    } else {
        weights.iter().sum::<f32>() * viewport.font_size_px.max(1.0)
    };
    let viewport_height = viewport.height_px.max(line_height_px);
    if viewport_height >= content_height * 0.999 {
        return Some(0.0);
    }

    let sentence_start_px = progress.start * content_height;
    let sentence_middle_px = progress.middle * content_height;
    let desired_top_px = if centered {
        sentence_middle_px - 0.50 * viewport_height
    } else {
        sentence_start_px - 0.25 * viewport_height
    };

    let scrollable_px = (content_height - viewport_height).max(1.0);
    Some(sanitize_offset(desired_top_px / scrollable_px))
}

fn sanitize_offset(offset: f32) -> f32 {
    if offset.is_finite() {
        offset.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn sentence_progress(weights: &[f32], index: usize) -> Option<SentenceProgress> {
    let idx = index.min(weights.len().checked_sub(1)?);
    let total_weight: f32 = weights.iter().sum();
    if total_weight <= f32::EPSILON {
        return None;
    }

    let before_weight: f32 = weights.iter().take(idx).sum();
    let sentence_weight = weights[idx].max(f32::EPSILON);
    let start = (before_weight / total_weight).clamp(0.0, 1.0);
    let middle = ((before_weight + sentence_weight * 0.5) / total_weight).clamp(0.0, 1.0);
    Some(SentenceProgress { start, middle })
}

/// Estimated rendered height of each sentence, in font-size units. Sentences
/// are assumed to flow inline, so each starts on the line the previous ended.
fn estimate_sentence_line_weights(sentences: &SentenceList, viewport: &Viewport) -> Vec<f32> {
    let glyph_width = (viewport.font_size_px * 0.55).max(1.0);
    let available_width = (viewport.width_px - viewport.margin_horizontal_px * 2.0).max(1.0);
    let max_units_per_line = (available_width / glyph_width).max(8.0);
    let line_height_weight = viewport.line_spacing.max(0.8);

    sentences
        .iter()
        .map(|sentence| {
            let mut units = 0.0f32;
            for ch in sentence.text.chars() {
                units += if ch.is_whitespace() {
                    0.45
                } else if ch.is_ascii_punctuation() {
                    0.55
                } else if ch.is_ascii() {
                    1.0
                } else {
                    1.8
                };
            }
            // Trailing inter-sentence space.
            units += 0.45;
            (units / max_units_per_line) * line_height_weight
        })
        .collect()
}
