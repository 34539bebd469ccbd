//! Conversions between world (canvas) space and screen space.

use eframe::egui::{self, Pos2, Rect, Vec2};

/// Pan/zoom state of the canvas.
///
/// `offset` is expressed in screen pixels: `screen = world * zoom + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasTransform {
    /// Screen-space translation
    pub offset: Vec2,
    /// Scale factor (1.0 = 100%)
    pub zoom: f32,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl CanvasTransform {
    /// Creates a transform from an offset and zoom.
    pub fn new(offset: Vec2, zoom: f32) -> Self {
        Self { offset, zoom }
    }

    /// Pan expressed in world units, i.e. `offset / zoom`.
    pub fn pan(&self) -> Vec2 {
        self.offset / self.zoom
    }

    /// Converts a world position to screen space.
    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        world * self.zoom + self.offset
    }

    /// Converts a screen position to world space.
    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        (screen - self.offset) / self.zoom
    }

    /// Converts a world rectangle to screen space.
    pub fn world_rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.world_to_screen(rect.min), self.world_to_screen(rect.max))
    }

    /// Projects a point given relative to a node into screen space:
    /// `(node_pos + local_offset + pan) * zoom`.
    pub fn project_local(&self, node_pos: Pos2, local_offset: Vec2) -> Pos2 {
        ((node_pos + local_offset) + self.pan()) * self.zoom
    }

    /// Zooms by `factor` around a fixed screen point, clamping to `[min, max]`.
    pub fn zoom_around(&mut self, screen_point: Pos2, factor: f32, min: f32, max: f32) {
        let world_before = self.screen_to_world(screen_point);
        let new_zoom = (self.zoom * factor).clamp(min, max);
        if (new_zoom - self.zoom).abs() <= f32::EPSILON {
            return;
        }
        self.zoom = new_zoom;
        let screen_after = self.world_to_screen(world_before);
        self.offset += screen_point - screen_after;
    }
}

/// Helper that scales a world-unit font size to the current zoom.
pub fn scaled_font(size: f32, zoom: f32) -> egui::FontId {
    egui::FontId::proportional((size * zoom).clamp(4.0, 64.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::{pos2, vec2};

    #[test]
    fn roundtrip_between_spaces() {
        let t = CanvasTransform::new(vec2(30.0, -12.0), 1.5);
        let world = pos2(100.0, 40.0);
        let back = t.screen_to_world(t.world_to_screen(world));
        assert!((back - world).length() < 1e-4);
    }

    #[test]
    fn local_projection_matches_world_to_screen() {
        let t = CanvasTransform::new(vec2(50.0, 20.0), 2.0);
        let node_pos = pos2(10.0, 10.0);
        let local = vec2(5.0, 30.0);
        let projected = t.project_local(node_pos, local);
        let expected = t.world_to_screen(node_pos + local);
        assert!((projected - expected).length() < 1e-4);
    }

    #[test]
    fn zoom_keeps_anchor_fixed_and_clamps() {
        let mut t = CanvasTransform::default();
        let anchor = pos2(200.0, 100.0);
        let world = t.screen_to_world(anchor);
        t.zoom_around(anchor, 2.0, 0.25, 5.0);
        assert!((t.world_to_screen(world) - anchor).length() < 1e-3);
        t.zoom_around(anchor, 100.0, 0.25, 5.0);
        assert_eq!(t.zoom, 5.0);
    }
}
