//! Canvas rendering functionality for the grid, links, nodes and footer.
//!
//! Elements are drawn in layers: grid first, then links and the link being
//! dragged, then nodes in draw order, and finally the footer strip.

use super::canvas::link_curve;
use super::state::FlowCanvasApp;
use crate::constants::*;
use crate::types::*;
use eframe::egui::{self, Color32, Pos2, Rect, Stroke};
use eframe::epaint::CubicBezierShape;

impl FlowCanvasApp {
    /// Renders everything inside the canvas rect.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `canvas_rect` - The screen-space rectangle of the canvas area
    /// * `now` - Current time in seconds, for animations
    pub fn render_canvas(&mut self, painter: &egui::Painter, canvas_rect: Rect, now: f64) {
        if self.canvas.show_grid {
            self.draw_grid(painter, canvas_rect);
        }

        for link in self.graph.links() {
            let selected = self.interaction.selected_link == Some(link.id);
            self.draw_link(painter, link, selected);
        }
        if let (Some(from), Some(pointer)) = (self.interaction.connecting_from, self.interaction.connection_draw_pos) {
            self.draw_link_preview(painter, from, pointer);
        }

        let transform = self.transform();
        let selected = self.interaction.selected_node;
        let Self { graph, scheduler, .. } = self;
        for id in graph.order().to_vec() {
            let Some(node) = graph.node_mut(id) else {
                continue;
            };
            // Skip nodes entirely outside the viewport.
            if !transform.world_rect_to_screen(node.rect()).intersects(canvas_rect) {
                continue;
            }
            node.draw(painter, &transform, now, selected == Some(id), scheduler);
        }

        self.draw_footer(painter, canvas_rect);
    }

    /// Draws a zoom-aware grid on the canvas for visual reference.
    ///
    /// Grid lines are drawn every [`GRID_SIZE`] world units and skipped when they
    /// would be closer than two pixels. Axis lines are emphasised when zoomed in.
    pub fn draw_grid(&self, painter: &egui::Painter, canvas_rect: Rect) {
        let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(128, 128, 128, 32));
        let screen_grid_size = GRID_SIZE * self.canvas.zoom_factor;
        if screen_grid_size < 2.0 {
            return;
        }

        let top_left = self.screen_to_world(canvas_rect.min);
        let bottom_right = self.screen_to_world(canvas_rect.max);

        let mut x = (top_left.x / GRID_SIZE).floor() * GRID_SIZE;
        while x <= bottom_right.x {
            let screen_x = self.world_to_screen(egui::pos2(x, 0.0)).x;
            painter.vline(screen_x, canvas_rect.y_range(), stroke);
            x += GRID_SIZE;
        }
        let mut y = (top_left.y / GRID_SIZE).floor() * GRID_SIZE;
        while y <= bottom_right.y {
            let screen_y = self.world_to_screen(egui::pos2(0.0, y)).y;
            painter.hline(canvas_rect.x_range(), screen_y, stroke);
            y += GRID_SIZE;
        }

        if screen_grid_size > 10.0 {
            let axis = Stroke::new(1.5, Color32::from_rgba_unmultiplied(128, 128, 128, 80));
            let origin = self.world_to_screen(Pos2::ZERO);
            if canvas_rect.y_range().contains(origin.y) {
                painter.hline(canvas_rect.x_range(), origin.y, axis);
            }
            if canvas_rect.x_range().contains(origin.x) {
                painter.vline(origin.x, canvas_rect.y_range(), axis);
            }
        }
    }

    fn curve_shape(&self, from_world: Pos2, to_world: Pos2, stroke: Stroke) -> CubicBezierShape {
        let points = link_curve(from_world, to_world).map(|p| self.world_to_screen(p));
        CubicBezierShape::from_points_stroke(points, false, Color32::TRANSPARENT, stroke)
    }

    /// Draws a link as a curve coloured after its output slot.
    pub fn draw_link(&self, painter: &egui::Painter, link: &Link, selected: bool) {
        let Some((from, to)) = self.link_endpoints(link) else {
            return;
        };
        let color = self
            .graph
            .node(link.from)
            .and_then(|n| n.outputs.get(link.from_slot))
            .map_or(self.theme().link(), |slot| slot.color);
        let width = if selected { 4.0 } else { 2.0 } * self.canvas.zoom_factor.max(0.5);
        let stroke = if selected {
            Stroke::new(width, self.theme().selected_border())
        } else {
            Stroke::new(width, color)
        };
        painter.add(self.curve_shape(from, to, stroke));
    }

    /// Draws the link being dragged from an output slot to the pointer.
    ///
    /// The preview turns red over an input that would reject the output type.
    pub fn draw_link_preview(&self, painter: &egui::Painter, from: (NodeId, usize), pointer: Pos2) {
        let Some(source) = self.graph.node(from.0) else {
            return;
        };
        let Some(slot) = source.outputs.get(from.1) else {
            return;
        };
        let start = crate::node::interactions::output_slot_pos(source.rect(), from.1);
        let end = self.screen_to_world(pointer);

        let valid = match self.hit_node(end) {
            Some((target, crate::node::interactions::HitRegion::Input(index))) => {
                target != from.0
                    && self
                        .graph
                        .node(target)
                        .is_some_and(|n| n.on_connect_input(index, &slot.slot_type).is_ok())
            }
            _ => true,
        };
        let color = if valid { slot.color } else { self.theme().error() };
        painter.add(self.curve_shape(start, end, Stroke::new(2.0, color)));
        painter.circle_filled(pointer, 4.0, color);
    }

    /// Draws the status strip along the bottom of the canvas.
    pub fn draw_footer(&self, painter: &egui::Painter, canvas_rect: Rect) {
        let theme = self.theme();
        let rect = Rect::from_min_max(
            egui::pos2(canvas_rect.min.x, canvas_rect.max.y - FOOTER_HEIGHT),
            canvas_rect.max,
        );
        painter.rect_filled(rect, 0.0, theme.title_fill());
        let font = egui::FontId::proportional(12.0);
        painter.text(
            rect.left_center() + egui::vec2(8.0, 0.0),
            egui::Align2::LEFT_CENTER,
            &self.status,
            font.clone(),
            theme.text(),
        );

        let mut summary = format!(
            "{} nodes · {} links · {:.0}%",
            self.graph.len(),
            self.graph.links().len(),
            self.canvas.zoom_factor * 100.0
        );
        if self.settings.show_fps {
            if let Some(fps) = self.perf.fps() {
                summary.push_str(&format!(" · {fps:.0} fps"));
            }
        }
        painter.text(
            rect.right_center() - egui::vec2(8.0, 0.0),
            egui::Align2::RIGHT_CENTER,
            summary,
            font,
            theme.muted_text(),
        );
    }
}
