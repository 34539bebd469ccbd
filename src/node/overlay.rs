//! Text editors floating above the canvas, pinned to a node's content area.
//!
//! The editor is an `egui::Area` rather than painted text, so its screen rect has
//! to be recomputed from the canvas transform whenever the node or the view moves.

use crate::transform::CanvasTransform;
use crate::types::NodeId;
use eframe::egui::{self, Pos2, Rect, Vec2};
use serde_json::{Map, Value};

/// Which node family owns the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    /// Free text that becomes the node's output
    TextInput,
    /// Message template sent to a Discord channel
    DiscordOutput,
}

impl OverlayKind {
    /// Hint shown while the editor is empty.
    pub fn hint(&self) -> &'static str {
        match self {
            OverlayKind::TextInput => "Type text to send downstream…",
            OverlayKind::DiscordOutput => "Message prefix for Discord…",
        }
    }
}

/// Whether an overlay at `rect` may be shown: it must intersect the viewport and
/// must not sit under the footer strip at the bottom of the canvas.
pub fn is_visible(rect: Rect, viewport: Rect, footer_height: f32) -> bool {
    let usable = Rect::from_min_max(
        viewport.min,
        Pos2::new(viewport.max.x, viewport.max.y - footer_height),
    );
    rect.width() > 0.0 && rect.height() > 0.0 && rect.intersects(usable) && rect.bottom() <= usable.bottom()
}

/// Floating editor bound to one string property of its node.
#[derive(Debug, Clone)]
pub struct TextOverlay {
    /// Owning node family
    pub kind: OverlayKind,
    /// Property the text is written to
    pub property: String,
    text: String,
    dirty: bool,
    focused: bool,
    host: Option<(egui::Id, egui::Id)>,
    pending_frame: Option<u64>,
    screen_rect: Option<Rect>,
    visible: bool,
    removed: bool,
}

impl TextOverlay {
    /// Creates an overlay for `property`. The host area is created lazily.
    pub fn new(kind: OverlayKind, property: &str) -> Self {
        Self {
            kind,
            property: property.to_string(),
            text: String::new(),
            dirty: false,
            focused: false,
            host: None,
            pending_frame: None,
            screen_rect: None,
            visible: false,
            removed: false,
        }
    }

    /// Current editor text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text from the property bag unless the user is typing.
    pub fn sync_from(&mut self, properties: &Map<String, Value>) {
        if self.focused || self.dirty {
            return;
        }
        self.text = properties
            .get(&self.property)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
    }

    /// Returns the area id, creating it on first use and re-parenting it when the
    /// canvas changed.
    pub fn ensure_host(&mut self, canvas_id: egui::Id, node_id: NodeId) -> Option<egui::Id> {
        if self.removed {
            return None;
        }
        match self.host {
            Some((parent, id)) if parent == canvas_id => Some(id),
            _ => {
                let id = canvas_id.with(("overlay", node_id));
                if self.host.is_some() {
                    log::debug!("Re-parenting overlay of node {node_id}");
                }
                self.host = Some((canvas_id, id));
                Some(id)
            }
        }
    }

    /// Requests a reposition during `frame`. Returns `false` when one is already
    /// pending or the overlay was removed.
    pub fn schedule_reposition(&mut self, frame: u64) -> bool {
        if self.removed || self.pending_frame.is_some() {
            return false;
        }
        self.pending_frame = Some(frame);
        true
    }

    /// Whether a reposition is waiting.
    pub fn has_pending_reposition(&self) -> bool {
        self.pending_frame.is_some()
    }

    /// Runs the pending reposition: projects the node-local content rect to screen
    /// space and updates visibility. `transform` maps world to absolute screen
    /// coordinates.
    pub fn reposition(
        &mut self,
        node_pos: Pos2,
        local_offset: Vec2,
        local_size: Vec2,
        transform: &CanvasTransform,
        viewport: Rect,
        footer_height: f32,
    ) {
        if self.pending_frame.take().is_none() {
            return;
        }
        let min = transform.project_local(node_pos, local_offset);
        let rect = Rect::from_min_size(min, local_size * transform.zoom);
        self.visible = is_visible(rect, viewport, footer_height);
        self.screen_rect = Some(rect);
    }

    /// Last projected screen rect.
    pub fn screen_rect(&self) -> Option<Rect> {
        self.screen_rect
    }

    /// Whether the overlay is currently shown.
    pub fn is_visible(&self) -> bool {
        self.visible && !self.removed
    }

    /// Records a user edit.
    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.dirty = true;
    }

    /// Writes pending edits to the bound property. Returns `true` if it wrote.
    pub fn write_back(&mut self, properties: &mut Map<String, Value>) -> bool {
        if !self.dirty {
            return false;
        }
        properties.insert(self.property.clone(), Value::String(self.text.clone()));
        self.dirty = false;
        true
    }

    /// Shows the editor. Edits are written to `properties` on change and on focus loss.
    ///
    /// Returns `true` if the property bag changed this frame.
    pub fn show(&mut self, ctx: &egui::Context, properties: &mut Map<String, Value>) -> bool {
        let (Some((_, id)), Some(rect)) = (self.host, self.screen_rect) else {
            return false;
        };
        if !self.is_visible() {
            if self.focused {
                // Hidden while typing: keep the text, drop focus.
                self.focused = false;
                return self.write_back(properties);
            }
            return false;
        }

        let hint = self.kind.hint();
        let mut text = self.text.clone();
        let inner = egui::Area::new(id)
            .fixed_pos(rect.min)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                ui.set_clip_rect(rect);
                ui.add_sized(
                    rect.size(),
                    egui::TextEdit::multiline(&mut text)
                        .hint_text(hint)
                        .font(egui::TextStyle::Small),
                )
            });
        let response = inner.inner;
        let mut changed = false;
        if response.changed() {
            self.edit(text);
            changed |= self.write_back(properties);
        }
        if response.lost_focus() {
            changed |= self.write_back(properties);
        }
        self.focused = response.has_focus();
        changed
    }

    /// Cancels pending work and detaches the host area.
    pub fn on_removed(&mut self) {
        self.pending_frame = None;
        self.host = None;
        self.screen_rect = None;
        self.visible = false;
        self.focused = false;
        self.removed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};
    use serde_json::json;

    fn viewport() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0))
    }

    #[test]
    fn visibility_respects_viewport_and_footer() {
        let footer = 24.0;
        let inside = Rect::from_min_size(pos2(100.0, 100.0), vec2(100.0, 50.0));
        assert!(is_visible(inside, viewport(), footer));
        let outside = inside.translate(vec2(2000.0, 0.0));
        assert!(!is_visible(outside, viewport(), footer));
        let under_footer = Rect::from_min_size(pos2(100.0, 560.0), vec2(100.0, 30.0));
        assert!(!is_visible(under_footer, viewport(), footer));
    }

    #[test]
    fn only_one_reposition_is_pending() {
        let mut overlay = TextOverlay::new(OverlayKind::TextInput, "value");
        assert!(overlay.schedule_reposition(1));
        assert!(!overlay.schedule_reposition(1));
        assert!(!overlay.schedule_reposition(2));

        let transform = CanvasTransform::default();
        overlay.reposition(pos2(10.0, 20.0), vec2(8.0, 40.0), vec2(100.0, 50.0), &transform, viewport(), 24.0);
        assert!(!overlay.has_pending_reposition());
        assert_eq!(overlay.screen_rect().map(|r| r.min), Some(pos2(18.0, 60.0)));
        assert!(overlay.is_visible());
        assert!(overlay.schedule_reposition(2));
    }

    #[test]
    fn projection_applies_pan_then_zoom() {
        let mut overlay = TextOverlay::new(OverlayKind::DiscordOutput, "message");
        let transform = CanvasTransform {
            offset: vec2(5.0, 5.0),
            zoom: 2.0,
        };
        overlay.schedule_reposition(0);
        overlay.reposition(pos2(10.0, 10.0), vec2(5.0, 5.0), vec2(10.0, 10.0), &transform, viewport(), 0.0);
        let rect = overlay.screen_rect().unwrap();
        assert_eq!(rect.min, pos2(35.0, 35.0));
        assert_eq!(rect.size(), vec2(20.0, 20.0));
    }

    #[test]
    fn removal_cancels_pending_work() {
        let mut overlay = TextOverlay::new(OverlayKind::TextInput, "value");
        let canvas = egui::Id::new("canvas");
        assert!(overlay.ensure_host(canvas, uuid::Uuid::nil()).is_some());
        overlay.schedule_reposition(3);
        overlay.on_removed();
        assert!(!overlay.has_pending_reposition());
        assert!(!overlay.schedule_reposition(4));
        assert!(overlay.ensure_host(canvas, uuid::Uuid::nil()).is_none());
    }

    #[test]
    fn host_is_reparented_when_canvas_changes() {
        let mut overlay = TextOverlay::new(OverlayKind::TextInput, "value");
        let node = uuid::Uuid::new_v4();
        let a = overlay.ensure_host(egui::Id::new("a"), node);
        assert_eq!(overlay.ensure_host(egui::Id::new("a"), node), a);
        let b = overlay.ensure_host(egui::Id::new("b"), node);
        assert_ne!(a, b);
    }

    #[test]
    fn edits_write_back_once() {
        let mut overlay = TextOverlay::new(OverlayKind::TextInput, "value");
        let mut props = Map::new();
        props.insert("value".into(), json!("old"));
        overlay.sync_from(&props);
        assert_eq!(overlay.text(), "old");
        overlay.edit("new");
        overlay.sync_from(&props);
        assert_eq!(overlay.text(), "new");
        assert!(overlay.write_back(&mut props));
        assert_eq!(props["value"], json!("new"));
        assert!(!overlay.write_back(&mut props));
    }
}
