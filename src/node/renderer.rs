//! Drawing primitives for a single node: execution highlight, progress bar,
//! wrapped content text and the error banner.
//!
//! The renderer reads node state and never changes it, except for clearing an
//! expired highlight timestamp.

use crate::constants::*;
use crate::theme::Theme;
use crate::transform::scaled_font;
use crate::types::NodeState;
use eframe::egui::{self, Color32, Pos2, Rect, Stroke};
use eframe::epaint::StrokeKind;
use std::f64::consts::TAU;

/// Current stage of the execution highlight animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HighlightPhase {
    /// Continuous sine pulse while the node executes
    Pulse(f32),
    /// One-shot fade after execution
    Decay(f32),
    /// Nothing to draw
    Off,
}

impl HighlightPhase {
    /// Glow intensity in `[0, 1]`.
    pub fn intensity(&self) -> f32 {
        match self {
            HighlightPhase::Pulse(i) | HighlightPhase::Decay(i) => *i,
            HighlightPhase::Off => 0.0,
        }
    }

    /// Whether the animation needs further frames.
    pub fn is_animating(&self) -> bool {
        !matches!(self, HighlightPhase::Off)
    }
}

/// Cubic ease-out on `[0, 1]`.
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Advances the highlight state machine for `now` (seconds).
///
/// Clears `highlight_started_at` once a one-shot decay has run its course.
pub fn highlight_phase(state: &mut NodeState, now: f64) -> HighlightPhase {
    if state.is_executing {
        let phase = (now / PULSE_PERIOD) * TAU;
        return HighlightPhase::Pulse((0.5 + 0.5 * phase.sin()) as f32);
    }
    let Some(started) = state.highlight_started_at else {
        return HighlightPhase::Off;
    };
    let elapsed = (now - started).max(0.0);
    if elapsed >= HIGHLIGHT_DECAY {
        state.highlight_started_at = None;
        return HighlightPhase::Off;
    }
    let fade = 1.0 - ease_out_cubic(elapsed / HIGHLIGHT_DECAY);
    HighlightPhase::Decay(fade as f32)
}

/// Greedy word wrap. Explicit newlines are kept; words wider than `max_width` are
/// broken between characters.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }
            // Over-long word: break it between characters.
            for ch in word.chars() {
                let mut attempt = current.clone();
                attempt.push(ch);
                if !current.is_empty() && measure(&attempt) > max_width {
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                } else {
                    current = attempt;
                }
            }
        }
        lines.push(current);
    }
    // A trailing empty paragraph from a final newline adds no information.
    while lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

#[derive(Debug, Clone)]
struct WrapCache {
    text: String,
    width: f32,
    lines: Vec<String>,
}

/// Per-node drawing helper. Holds only a wrap cache.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    text_cache: Option<WrapCache>,
    error_cache: Option<WrapCache>,
}

impl Renderer {
    /// Creates a renderer with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `text` to `width` world units, measuring with the body font.
    pub fn wrapped_lines(&mut self, painter: &egui::Painter, text: &str, width: f32) -> Vec<String> {
        Self::cached_wrap(&mut self.text_cache, painter, text, width)
    }

    /// Wraps error text, cached separately from content text.
    pub fn wrapped_error(&mut self, painter: &egui::Painter, text: &str, width: f32) -> Vec<String> {
        Self::cached_wrap(&mut self.error_cache, painter, text, width)
    }

    fn cached_wrap(
        cache: &mut Option<WrapCache>,
        painter: &egui::Painter,
        text: &str,
        width: f32,
    ) -> Vec<String> {
        if let Some(c) = cache {
            if c.text == text && (c.width - width).abs() < 0.5 {
                return c.lines.clone();
            }
        }
        let font = egui::FontId::proportional(BODY_FONT_SIZE);
        let lines = wrap_text(text, width, |s| {
            painter
                .layout_no_wrap(s.to_string(), font.clone(), Color32::WHITE)
                .size()
                .x
        });
        *cache = Some(WrapCache {
            text: text.to_string(),
            width,
            lines: lines.clone(),
        });
        lines
    }

    /// Drops cached layouts, e.g. after the node is removed.
    pub fn clear_cache(&mut self) {
        self.text_cache = None;
        self.error_cache = None;
    }

    /// Draws the glow around the node border.
    pub fn draw_highlight(
        &self,
        painter: &egui::Painter,
        screen_rect: Rect,
        phase: HighlightPhase,
        theme: &Theme,
        zoom: f32,
    ) {
        let intensity = phase.intensity();
        if intensity <= 0.01 {
            return;
        }
        let base = theme.highlight();
        for ring in 1..=3 {
            let alpha = (intensity * 160.0 / ring as f32) as u8;
            let color = Color32::from_rgba_unmultiplied(base.r(), base.g(), base.b(), alpha);
            painter.rect_stroke(
                screen_rect.expand(ring as f32 * 2.0 * zoom),
                6.0 * zoom,
                Stroke::new(2.0 * zoom, color),
                StrokeKind::Outside,
            );
        }
    }

    /// Draws the progress bar when `state.progress >= 0`.
    pub fn draw_progress_bar(
        &self,
        painter: &egui::Painter,
        bar_rect: Rect,
        state: &NodeState,
        theme: &Theme,
        zoom: f32,
    ) {
        if state.progress < 0.0 {
            return;
        }
        let fraction = state.progress.clamp(0.0, 100.0) / 100.0;
        painter.rect_filled(bar_rect, 3.0 * zoom, theme.progress_track());
        let mut fill = bar_rect;
        fill.set_width(bar_rect.width() * fraction);
        painter.rect_filled(fill, 3.0 * zoom, theme.progress_fill());

        let label = if state.progress_text.is_empty() {
            format!("{:.0}%", state.progress.clamp(0.0, 100.0))
        } else {
            format!("{} {:.0}%", state.progress_text, state.progress.clamp(0.0, 100.0))
        };
        let font = scaled_font(BODY_FONT_SIZE - 1.0, zoom);
        let anchor = Pos2::new(bar_rect.right() - 4.0 * zoom, bar_rect.center().y);
        // Drop shadow keeps the label legible over the fill.
        painter.text(
            anchor + egui::vec2(1.0, 1.0),
            egui::Align2::RIGHT_CENTER,
            &label,
            font.clone(),
            Color32::from_black_alpha(200),
        );
        painter.text(anchor, egui::Align2::RIGHT_CENTER, &label, font, Color32::WHITE);
    }

    /// Draws pre-wrapped lines starting at `top_left` (screen space).
    pub fn draw_lines(
        &self,
        painter: &egui::Painter,
        lines: &[String],
        top_left: Pos2,
        zoom: f32,
        color: Color32,
        clip: Rect,
    ) {
        let font = scaled_font(BODY_FONT_SIZE, zoom);
        let painter = painter.with_clip_rect(clip.intersect(painter.clip_rect()));
        for (i, line) in lines.iter().enumerate() {
            let pos = top_left + egui::vec2(0.0, i as f32 * LINE_HEIGHT * zoom);
            if pos.y > clip.bottom() {
                break;
            }
            painter.text(pos, egui::Align2::LEFT_TOP, line, font.clone(), color);
        }
    }

    /// Draws the error banner lines in bold red.
    pub fn draw_error(
        &self,
        painter: &egui::Painter,
        lines: &[String],
        top_left: Pos2,
        zoom: f32,
        theme: &Theme,
    ) {
        let font = scaled_font(BODY_FONT_SIZE, zoom);
        for (i, line) in lines.iter().enumerate() {
            let pos = top_left + egui::vec2(0.0, i as f32 * LINE_HEIGHT * zoom);
            // Double draw with a 1px shift as a cheap bold.
            painter.text(pos, egui::Align2::LEFT_TOP, line, font.clone(), theme.error());
            painter.text(
                pos + egui::vec2(0.6, 0.0),
                egui::Align2::LEFT_TOP,
                line,
                font.clone(),
                theme.error(),
            );
        }
    }
}

/// Height a node needs for its content, given the offset where content begins.
pub fn required_height(content_top: f32, text_lines: usize, has_progress: bool, error_lines: usize) -> f32 {
    let mut height = content_top + CONTENT_PADDING;
    height += text_lines as f32 * LINE_HEIGHT;
    if has_progress {
        height += PROGRESS_BAR_HEIGHT + CONTENT_PADDING / 2.0;
    }
    if error_lines > 0 {
        height += CONTENT_PADDING / 2.0 + error_lines as f32 * LINE_HEIGHT;
    }
    height + CONTENT_PADDING
}
