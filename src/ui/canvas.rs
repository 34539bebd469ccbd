//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning and zooming, routing of wheel events to
//! node content, node dragging and resizing, link creation, title editing and
//! the placement of inline text overlays.

use super::state::FlowCanvasApp;
use crate::constants::*;
use crate::node::image_gallery::{WheelDeltaMode, WheelInput};
use crate::node::interactions::{hit_test, input_slot_pos, is_near_node, output_slot_pos, HitRegion};
use crate::node::NodeBody;
use crate::transform::CanvasTransform;
use crate::types::*;
use eframe::egui::{self, Pos2, Rect, Vec2};

/// A raw wheel event as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    /// Delta in `mode` units; positive y scrolls up
    pub delta: Vec2,
    /// Unit of `delta`
    pub mode: WheelDeltaMode,
    /// Whether Shift was held
    pub shift: bool,
}

/// Collects this frame's wheel events.
pub fn wheel_events(input: &egui::InputState) -> Vec<WheelEvent> {
    input
        .events
        .iter()
        .filter_map(|event| match event {
            egui::Event::MouseWheel {
                unit, delta, modifiers, ..
            } => Some(WheelEvent {
                delta: *delta,
                mode: match unit {
                    egui::MouseWheelUnit::Point => WheelDeltaMode::Pixel,
                    egui::MouseWheelUnit::Line => WheelDeltaMode::Line,
                    egui::MouseWheelUnit::Page => WheelDeltaMode::Page,
                },
                shift: modifiers.shift,
            }),
            _ => None,
        })
        .collect()
}

/// Control points of the curve drawn for a link between two world positions.
pub fn link_curve(from: Pos2, to: Pos2) -> [Pos2; 4] {
    let bend = ((to.x - from.x).abs() * 0.5).max(40.0);
    [from, from + egui::vec2(bend, 0.0), to - egui::vec2(bend, 0.0), to]
}

fn bezier_point(points: &[Pos2; 4], t: f32) -> Pos2 {
    let u = 1.0 - t;
    let [p0, p1, p2, p3] = points.map(|p| p.to_vec2());
    (p0 * u * u * u + p1 * 3.0 * u * u * t + p2 * 3.0 * u * t * t + p3 * t * t * t).to_pos2()
}

/// Smallest distance between `point` and the curve, sampled.
pub fn distance_to_curve(points: &[Pos2; 4], point: Pos2) -> f32 {
    (0..=32)
        .map(|i| bezier_point(points, i as f32 / 32.0).distance(point))
        .fold(f32::INFINITY, f32::min)
}

impl FlowCanvasApp {
    fn canvas_origin(&self) -> Pos2 {
        if self.canvas_rect.is_finite() {
            self.canvas_rect.min
        } else {
            Pos2::ZERO
        }
    }

    /// World to absolute screen transform for the current frame.
    pub fn transform(&self) -> CanvasTransform {
        self.canvas.transform(self.canvas_origin())
    }

    /// Converts screen coordinates to world coordinates accounting for zoom and pan.
    pub fn screen_to_world(&self, screen_pos: Pos2) -> Pos2 {
        self.transform().screen_to_world(screen_pos)
    }

    /// Converts world coordinates to screen coordinates accounting for zoom and pan.
    pub fn world_to_screen(&self, world_pos: Pos2) -> Pos2 {
        self.transform().world_to_screen(world_pos)
    }

    /// Snaps a position to the nearest grid point.
    pub fn snap_to_grid(&self, pos: Pos2) -> Pos2 {
        let grid = GRID_SIZE;
        egui::pos2((pos.x / grid).round() * grid, (pos.y / grid).round() * grid)
    }

    /// Topmost node part under a world position.
    pub fn hit_node(&self, world: Pos2) -> Option<(NodeId, HitRegion)> {
        self.graph.order().iter().rev().find_map(|id| {
            let node = self.graph.node(*id)?;
            hit_test(node.rect(), node.inputs.len(), node.outputs.len(), world).map(|region| (*id, region))
        })
    }

    /// World positions of the two slot ends of a link.
    pub fn link_endpoints(&self, link: &Link) -> Option<(Pos2, Pos2)> {
        let from = self.graph.node(link.from)?;
        let to = self.graph.node(link.to)?;
        Some((
            output_slot_pos(from.rect(), link.from_slot),
            input_slot_pos(to.rect(), link.to_slot),
        ))
    }

    /// Link passing within the click tolerance of a world position.
    pub fn link_at(&self, world: Pos2) -> Option<LinkId> {
        let tolerance = CLICK_THRESHOLD / self.canvas.zoom_factor.max(0.01);
        self.graph
            .links()
            .iter()
            .filter_map(|link| {
                let (from, to) = self.link_endpoints(link)?;
                let distance = distance_to_curve(&link_curve(from, to), world);
                (distance <= tolerance).then_some((link.id, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Handles middle-click, Cmd/Ctrl+drag and background-drag panning.
    pub fn handle_canvas_panning(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let (middle, command_drag, primary) = ui.input(|i| {
            (
                i.pointer.middle_down(),
                i.pointer.primary_down() && i.modifiers.command,
                i.pointer.primary_down(),
            )
        });
        let continuing = self.interaction.is_panning && (primary || middle);
        let starting = (middle || command_drag) && response.hovered();

        if continuing || starting {
            if let Some(current) = ui.input(|i| i.pointer.interact_pos()) {
                if let Some(last) = self.interaction.last_pan_pos {
                    let delta = current - last;
                    self.canvas.offset.0 += delta.x;
                    self.canvas.offset.1 += delta.y;
                }
                self.interaction.is_panning = true;
                self.interaction.last_pan_pos = Some(current);
            }
        } else {
            self.interaction.is_panning = false;
            self.interaction.last_pan_pos = None;
        }
    }

    /// Routes wheel events: node content first, then canvas zoom.
    ///
    /// After a press on empty background the canvas keeps wheel events until a
    /// node is pressed again.
    pub fn handle_wheel(&mut self, ui: &egui::Ui, response: &egui::Response, now: f64) {
        let Some(pointer) = ui.input(|i| i.pointer.hover_pos()) else {
            return;
        };
        if !response.hovered() || !response.rect.contains(pointer) {
            return;
        }
        for event in ui.input(wheel_events) {
            self.route_wheel(event, pointer, now);
        }
    }

    /// Sends one wheel event to node content under the pointer, or zooms the canvas.
    pub fn route_wheel(&mut self, event: WheelEvent, pointer: Pos2, now: f64) {
        let world = self.screen_to_world(pointer);
        if !self.interaction.canvas_owns_wheel && self.dispatch_wheel_to_node(event, world, now) {
            return;
        }
        let amount = if event.delta.y.abs() >= event.delta.x.abs() {
            event.delta.y
        } else {
            event.delta.x
        };
        self.zoom_canvas(pointer, amount);
    }

    /// Offers a wheel event to nodes under or near the pointer, topmost first.
    /// Returns `true` when a node consumed it.
    pub fn dispatch_wheel_to_node(&mut self, event: WheelEvent, world: Pos2, now: f64) -> bool {
        let zoom = self.canvas.zoom_factor.max(0.01);
        let input = WheelInput {
            delta: match event.mode {
                WheelDeltaMode::Pixel => event.delta / zoom,
                _ => event.delta,
            },
            mode: event.mode,
            shift: event.shift,
            pointer: world,
        };
        let candidates: Vec<NodeId> = self
            .graph
            .order()
            .iter()
            .rev()
            .copied()
            .filter(|id| {
                self.graph
                    .node(*id)
                    .is_some_and(|n| is_near_node(n.rect(), world, NEAR_NODE_MARGIN))
            })
            .collect();

        for id in candidates {
            let Some(node) = self.graph.node_mut(id) else {
                continue;
            };
            let node_rect = node.rect();
            let content_rect = node.content_rect();
            if let Some(handler) = node.wheel_handler() {
                if handler.on_mouse_wheel(&input, node_rect, content_rect) {
                    self.scheduler.request(now);
                    return true;
                }
            }
            // Nodes hidden below the one under the pointer never see the event.
            if node_rect.contains(world) {
                break;
            }
        }
        false
    }

    /// Zooms the canvas one step around a screen point.
    pub fn zoom_canvas(&mut self, screen_point: Pos2, amount: f32) {
        if amount == 0.0 {
            return;
        }
        let step = if amount > 0.0 { CANVAS_ZOOM_STEP } else { -CANVAS_ZOOM_STEP };
        let mut transform = self.transform();
        let factor = (transform.zoom + step) / transform.zoom;
        transform.zoom_around(screen_point, factor, CANVAS_MIN_ZOOM, CANVAS_MAX_ZOOM);
        self.canvas.store(&transform, self.canvas_origin());
    }

    /// Handles a primary press: selection, drag start, link start and resize start.
    pub fn handle_primary_press(&mut self, ui: &egui::Ui, response: &egui::Response) {
        let pressed = ui.input(|i| i.pointer.primary_pressed() && !i.modifiers.command);
        if !pressed || !response.hovered() {
            return;
        }
        let Some(pos) = ui.input(|i| i.pointer.interact_pos()) else {
            return;
        };
        let world = self.screen_to_world(pos);
        self.context_menu.show = false;

        let Some((id, region)) = self.hit_node(world) else {
            self.interaction.selected_node = None;
            self.interaction.selected_link = self.link_at(world);
            self.interaction.canvas_owns_wheel = true;
            self.interaction.is_panning = true;
            self.interaction.last_pan_pos = Some(pos);
            return;
        };

        self.interaction.canvas_owns_wheel = false;
        self.interaction.selected_link = None;
        match region {
            HitRegion::Output(slot) => {
                self.interaction.connecting_from = Some((id, slot));
                self.interaction.connection_draw_pos = Some(pos);
            }
            HitRegion::Input(slot) => {
                // Dragging away from a connected input detaches the link.
                let existing = self
                    .graph
                    .links()
                    .iter()
                    .find(|l| l.to == id && l.to_slot == slot)
                    .cloned();
                if let Some(link) = existing {
                    self.graph.disconnect(link.id);
                    self.interaction.connecting_from = Some((link.from, link.from_slot));
                    self.interaction.connection_draw_pos = Some(pos);
                    self.mark_dirty();
                }
            }
            HitRegion::ResizeHandle => {
                self.select_node(id);
                self.interaction.resizing_node = Some(id);
            }
            HitRegion::Title | HitRegion::Body => {
                self.select_node(id);
                if let Some(node) = self.graph.node_mut(id) {
                    self.interaction.node_drag_offset = world - node.pos;
                    if region == HitRegion::Body {
                        let content = node.content_rect();
                        if let NodeBody::Image(gallery) = &mut node.body {
                            if let Some(index) = gallery.image_at(content, world) {
                                gallery.selected = Some(index);
                            }
                        }
                    }
                }
                self.interaction.dragging_node = Some(id);
            }
        }
    }

    /// Selects a node and brings it to the front.
    pub fn select_node(&mut self, id: NodeId) {
        if self.interaction.selected_node != Some(id) {
            self.interaction.editing_title = None;
        }
        self.interaction.selected_node = Some(id);
        self.graph.bring_to_front(id);
    }

    /// Updates an in-progress drag, resize or link gesture and finishes it on release.
    pub fn handle_pointer_drag(&mut self, ui: &egui::Ui) {
        let (primary, pointer, shift) =
            ui.input(|i| (i.pointer.primary_down(), i.pointer.interact_pos(), i.modifiers.shift));
        let Some(pointer) = pointer else {
            return;
        };
        let world = self.screen_to_world(pointer);

        if !primary {
            if self.interaction.connecting_from.is_some() {
                self.finalize_connection(world);
            }
            self.interaction.dragging_node = None;
            self.interaction.resizing_node = None;
            return;
        }

        if let Some(id) = self.interaction.dragging_node {
            let mut target = world - self.interaction.node_drag_offset;
            if shift || self.settings.snap_to_grid {
                target = self.snap_to_grid(target);
            }
            let moved = match self.graph.node_mut(id) {
                Some(node) if node.pos != target => {
                    node.pos = target;
                    true
                }
                _ => false,
            };
            if moved {
                self.mark_dirty();
            }
        } else if let Some(id) = self.interaction.resizing_node {
            let resized = match self.graph.node_mut(id) {
                Some(node) => {
                    let size = (world - node.pos).max(egui::vec2(MIN_NODE_SIZE.0, MIN_NODE_SIZE.1));
                    let changed = size != node.size;
                    node.size = size;
                    changed
                }
                None => false,
            };
            if resized {
                self.mark_dirty();
            }
        } else if self.interaction.connecting_from.is_some() {
            self.interaction.connection_draw_pos = Some(pointer);
        }
    }

    /// Connects the dragged output to the input under `world`, if any.
    ///
    /// Dropping on a node body picks its first input that accepts the output type.
    pub fn finalize_connection(&mut self, world: Pos2) {
        let Some((from, from_slot)) = self.interaction.connecting_from.take() else {
            return;
        };
        self.interaction.connection_draw_pos = None;
        let Some((to, region)) = self.hit_node(world) else {
            return;
        };
        let to_slot = match region {
            HitRegion::Input(slot) => Some(slot),
            HitRegion::Output(_) => None,
            _ => {
                let output_type = self
                    .graph
                    .node(from)
                    .and_then(|n| n.outputs.get(from_slot))
                    .map(|s| s.slot_type.clone());
                match (output_type, self.graph.node(to)) {
                    (Some(output_type), Some(target)) => {
                        (0..target.inputs.len()).find(|i| target.on_connect_input(*i, &output_type).is_ok())
                    }
                    _ => None,
                }
            }
        };
        let Some(to_slot) = to_slot else {
            return;
        };
        match self.graph.connect(from, from_slot, to, to_slot) {
            Ok(link) => {
                log::debug!("Created link {link}");
                self.mark_dirty();
            }
            Err(err) => self.set_status(err.to_string()),
        }
    }

    /// Starts title editing on double-click and opens the catalog on right-click.
    pub fn handle_canvas_clicks(&mut self, response: &egui::Response) {
        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let world = self.screen_to_world(pos);
                if let Some((id, region)) = self.hit_node(world) {
                    if let Some(node) = self.graph.node_mut(id) {
                        let title = node.title.clone();
                        if node.interactions.on_double_click(region, &title) {
                            self.interaction.editing_title = Some(id);
                            self.interaction.title_focus_requested = false;
                            self.interaction.dragging_node = None;
                        }
                    }
                }
            }
        }

        if response.secondary_clicked() && !self.interaction.is_panning {
            if let Some(screen_pos) = response.interact_pointer_pos() {
                let world = self.screen_to_world(screen_pos);
                self.context_menu.screen_pos = (screen_pos.x, screen_pos.y);
                self.context_menu.world_pos = (world.x, world.y);
                self.context_menu.filter.clear();
                self.context_menu.show = true;
                self.context_menu.just_opened = true;
            }
        }
    }

    /// Shows the inline title editor of the node being renamed.
    pub fn draw_title_editor(&mut self, ctx: &egui::Context) {
        let Some(id) = self.interaction.editing_title else {
            return;
        };
        let transform = self.transform();
        let Some(node) = self.graph.node_mut(id) else {
            self.interaction.editing_title = None;
            return;
        };
        let title_rect = transform.world_rect_to_screen(Rect::from_min_size(
            node.pos,
            egui::vec2(node.size.x, TITLE_HEIGHT),
        ));
        let Some(buffer) = node.interactions.editing_title.as_mut() else {
            self.interaction.editing_title = None;
            return;
        };
        let response = egui::Area::new(egui::Id::new(("title_editor", id)))
            .fixed_pos(title_rect.min)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| ui.add_sized(title_rect.size(), egui::TextEdit::singleline(buffer)))
            .inner;
        if !self.interaction.title_focus_requested {
            response.request_focus();
            self.interaction.title_focus_requested = true;
        }

        let (enter, escape) = ctx.input(|i| (i.key_pressed(egui::Key::Enter), i.key_pressed(egui::Key::Escape)));
        let mut renamed = false;
        if escape {
            node.interactions.cancel_title();
        } else if enter || response.lost_focus() {
            if let Some(title) = node.interactions.commit_title() {
                renamed = title != node.title;
                node.title = title;
            }
        } else {
            return;
        }
        self.interaction.editing_title = None;
        if renamed {
            self.mark_dirty();
        }
    }

    /// Repositions and shows the inline editors of overlay nodes.
    pub fn update_overlays(&mut self, ctx: &egui::Context, canvas_id: egui::Id) {
        let transform = self.transform();
        let viewport = self.canvas_rect;
        let frame = self.frame_counter;
        let mut changed = false;
        for id in self.graph.order().to_vec() {
            let Some(node) = self.graph.node_mut(id) else {
                continue;
            };
            let content = node.content_rect();
            let pos = node.pos;
            let NodeBody::Overlay(overlay) = &mut node.body else {
                continue;
            };
            if overlay.ensure_host(canvas_id, id).is_none() {
                continue;
            }
            overlay.schedule_reposition(frame);
            overlay.reposition(pos, content.min - pos, content.size(), &transform, viewport, FOOTER_HEIGHT);
            if overlay.show(ctx, &mut node.properties) {
                node.sync_widget_values();
                changed = true;
            }
        }
        if changed {
            self.mark_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    #[test]
    fn link_curve_passes_through_endpoints() {
        let points = link_curve(pos2(0.0, 0.0), pos2(200.0, 50.0));
        assert_eq!(bezier_point(&points, 0.0), pos2(0.0, 0.0));
        assert!(bezier_point(&points, 1.0).distance(pos2(200.0, 50.0)) < 1e-3);
        assert!(distance_to_curve(&points, pos2(100.0, 25.0)) < 1.0);
        assert!(distance_to_curve(&points, pos2(100.0, 200.0)) > 100.0);
    }
}
