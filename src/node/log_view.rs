//! Scrolling text log shown inside logging nodes.

use super::image_gallery::{WheelHandler, WheelInput};
use crate::constants::*;
use crate::transform::scaled_font;
use eframe::egui::{self, Color32, Pos2, Rect};
use serde_json::Value;
use std::collections::VecDeque;

/// Bounded line buffer with follow-the-tail scrolling.
#[derive(Debug, Clone)]
pub struct LogView {
    lines: VecDeque<String>,
    partial: String,
    max_lines: usize,
    /// Offset of the first visible pixel from the top of the log
    scroll: f32,
    auto_scroll: bool,
}

impl Default for LogView {
    fn default() -> Self {
        Self::new(LOG_MAX_LINES)
    }
}

impl LogView {
    /// Creates an empty log keeping at most `max_lines` lines.
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            partial: String::new(),
            max_lines: max_lines.max(1),
            scroll: 0.0,
            auto_scroll: true,
        }
    }

    /// Complete lines followed by the unterminated tail, if any.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
            .chain((!self.partial.is_empty()).then_some(self.partial.as_str()))
    }

    /// Number of lines including the unterminated tail.
    pub fn line_count(&self) -> usize {
        self.lines.len() + usize::from(!self.partial.is_empty())
    }

    /// Whether the view follows new output.
    pub fn is_following(&self) -> bool {
        self.auto_scroll
    }

    /// Current scroll offset in world units.
    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    /// Appends one complete line.
    pub fn push_line(&mut self, line: impl Into<String>) {
        if !self.partial.is_empty() {
            let tail = std::mem::take(&mut self.partial);
            self.push_complete(tail);
        }
        self.push_complete(line.into());
    }

    fn push_complete(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
            if !self.auto_scroll {
                // Keep the reader's position stable while old lines drop off.
                self.scroll = (self.scroll - LINE_HEIGHT).max(0.0);
            }
        }
    }

    /// Appends streamed text. Text after the last newline stays pending until more
    /// arrives.
    pub fn push_chunk(&mut self, chunk: &str) {
        let mut parts = chunk.split('\n');
        if let Some(first) = parts.next() {
            self.partial.push_str(first);
        }
        for part in parts {
            self.break_long_partial();
            let done = std::mem::replace(&mut self.partial, part.to_string());
            self.push_complete(done);
        }
        self.break_long_partial();
    }

    fn break_long_partial(&mut self) {
        while self.partial.len() > LOG_MAX_PARTIAL_BYTES {
            let mut cut = LOG_MAX_PARTIAL_BYTES;
            while !self.partial.is_char_boundary(cut) {
                cut -= 1;
            }
            let rest = self.partial.split_off(cut);
            let head = std::mem::replace(&mut self.partial, rest);
            self.push_complete(head);
        }
    }

    /// Appends an execution result. A `messages` array adds one line per message;
    /// other values are appended as text.
    pub fn append_result(&mut self, result: &Value) {
        match result.get("messages").and_then(Value::as_array) {
            Some(messages) => {
                for message in messages {
                    self.push_line(message_line(message));
                }
            }
            None => match result {
                Value::String(s) => {
                    for line in s.lines() {
                        self.push_line(line);
                    }
                }
                other => self.push_line(other.to_string()),
            },
        }
    }

    /// Removes all content and re-enables following.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
        self.scroll = 0.0;
        self.auto_scroll = true;
    }

    fn content_height(&self) -> f32 {
        self.line_count() as f32 * LINE_HEIGHT
    }

    fn max_scroll(&self, viewport_height: f32) -> f32 {
        (self.content_height() - viewport_height).max(0.0)
    }

    /// Updates the scroll offset for the current viewport. Call once per frame
    /// before drawing.
    pub fn follow(&mut self, viewport_height: f32) {
        let max = self.max_scroll(viewport_height);
        if self.auto_scroll {
            self.scroll = max;
        } else {
            self.scroll = self.scroll.clamp(0.0, max);
        }
    }

    /// Scrolls by `delta` world units (positive moves towards older lines).
    pub fn scroll_by(&mut self, delta: f32, viewport_height: f32) {
        let max = self.max_scroll(viewport_height);
        self.scroll = (self.scroll - delta).clamp(0.0, max);
        self.auto_scroll = self.scroll >= max - 1.0;
    }

    /// Draws the visible lines. `top_left` and `clip` are in screen space.
    pub fn draw(&self, painter: &egui::Painter, clip: Rect, top_left: Pos2, zoom: f32, color: Color32) {
        let painter = painter.with_clip_rect(clip.intersect(painter.clip_rect()));
        let font = scaled_font(BODY_FONT_SIZE, zoom);
        let first = (self.scroll / LINE_HEIGHT).floor().max(0.0) as usize;
        let offset = self.scroll - first as f32 * LINE_HEIGHT;
        for (i, line) in self.lines().skip(first).enumerate() {
            let y = top_left.y + (i as f32 * LINE_HEIGHT - offset) * zoom;
            if y > clip.bottom() {
                break;
            }
            painter.text(
                Pos2::new(top_left.x, y),
                egui::Align2::LEFT_TOP,
                line,
                font.clone(),
                color,
            );
        }
    }
}

fn message_line(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Object(map) => match (map.get("level").and_then(Value::as_str), map.get("message")) {
            (Some(level), Some(Value::String(text))) => format!("[{level}] {text}"),
            (None, Some(Value::String(text))) => text.clone(),
            _ => message.to_string(),
        },
        other => other.to_string(),
    }
}

impl WheelHandler for LogView {
    fn on_mouse_wheel(&mut self, input: &WheelInput, _node_rect: Rect, content_rect: Rect) -> bool {
        if input.shift || !content_rect.contains(input.pointer) {
            return false;
        }
        if self.content_height() <= content_rect.height() {
            return false;
        }
        let (amount, horizontal) = input.dominant(content_rect.size());
        if horizontal {
            return false;
        }
        self.scroll_by(amount, content_rect.height());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::image_gallery::WheelDeltaMode;
    use eframe::egui::{pos2, vec2};
    use serde_json::json;

    fn filled(n: usize) -> LogView {
        let mut log = LogView::new(100);
        for i in 0..n {
            log.push_line(format!("line {i}"));
        }
        log
    }

    #[test]
    fn messages_become_lines() {
        let mut log = LogView::default();
        log.append_result(&json!({"messages": ["a", {"level": "warn", "message": "b"}, 3]}));
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines, vec!["a", "[warn] b", "3"]);
    }

    #[test]
    fn chunks_are_joined_until_newline() {
        let mut log = LogView::default();
        log.push_chunk("hel");
        log.push_chunk("lo\nwor");
        assert_eq!(log.lines().collect::<Vec<_>>(), vec!["hello", "wor"]);
        log.push_chunk("ld\n");
        assert_eq!(log.lines().collect::<Vec<_>>(), vec!["hello", "world"]);
        assert_eq!(log.line_count(), 2);
    }

    #[test]
    fn buffer_is_bounded() {
        let mut log = LogView::new(5);
        for i in 0..20 {
            log.push_line(i.to_string());
        }
        assert_eq!(log.line_count(), 5);
        assert_eq!(log.lines().next(), Some("15"));
    }

    #[test]
    fn unterminated_stream_is_broken_into_bounded_lines() {
        let mut log = LogView::new(3);
        let chunk = "é".repeat(1000);
        for _ in 0..20 {
            log.push_chunk(&chunk);
        }
        assert!(log.line_count() <= 4);
        assert!(log.lines().all(|line| line.len() <= LOG_MAX_PARTIAL_BYTES));
        log.push_chunk("\ndone");
        assert_eq!(log.lines().last(), Some("done"));
    }

    #[test]
    fn scrolling_up_stops_following_and_bottom_resumes() {
        let mut log = filled(50);
        let viewport = 10.0 * LINE_HEIGHT;
        log.follow(viewport);
        let bottom = log.scroll();
        assert_eq!(bottom, 40.0 * LINE_HEIGHT);

        log.scroll_by(3.0 * LINE_HEIGHT, viewport);
        assert!(!log.is_following());
        log.push_line("new");
        log.follow(viewport);
        assert_eq!(log.scroll(), bottom - 3.0 * LINE_HEIGHT);

        log.scroll_by(-1000.0, viewport);
        assert!(log.is_following());
        log.push_line("newer");
        log.follow(viewport);
        assert_eq!(log.scroll(), (log.line_count() as f32 - 10.0) * LINE_HEIGHT);
    }

    #[test]
    fn wheel_is_ignored_when_everything_fits() {
        let mut log = filled(2);
        let rect = Rect::from_min_size(pos2(0.0, 0.0), vec2(200.0, 200.0));
        let input = WheelInput {
            delta: vec2(0.0, 3.0),
            mode: WheelDeltaMode::Line,
            shift: false,
            pointer: rect.center(),
        };
        assert!(!log.on_mouse_wheel(&input, rect, rect));

        let mut long = filled(80);
        long.follow(rect.height());
        assert!(long.on_mouse_wheel(&input, rect, rect));
        assert!(!long.is_following());
    }
}
