//! Nodes hosted on the canvas.
//!
//! [`FlowNode`] carries the shared behaviour of every node type: slots built from a
//! declarative [`NodeSpec`], a property bag with widgets, result display, progress,
//! execution highlight and error reporting. Type-specific content lives in a
//! [`NodeBody`] variant.
//!
//! # Module Organization
//!
//! - `renderer` - Highlight, progress bar, wrapped text and error drawing
//! - `widgets` - Property-bound widget descriptors
//! - `interactions` - Hit testing and title editing
//! - `image_decode` / `image_gallery` - Image and chart display
//! - `log_view` - Streaming log display
//! - `overlay` - Floating text editors
//! - `catalog` - Built-in node types

pub mod catalog;
pub mod image_decode;
pub mod image_gallery;
pub mod interactions;
pub mod log_view;
pub mod overlay;
pub mod renderer;
pub mod widgets;

use self::image_decode::{DecodeJob, DecodeOutcome};
use self::image_gallery::{ImageGallery, ImageGalleryConfig, WheelHandler};
use self::interactions::{input_slot_pos, output_slot_pos, Interactions};
use self::log_view::LogView;
use self::overlay::{OverlayKind, TextOverlay};
use self::renderer::{highlight_phase, required_height, Renderer};
use self::widgets::{default_for_param, WidgetManager};
use crate::constants::*;
use crate::display::format_display_text;
use crate::error::FlowError;
use crate::scheduler::RedrawScheduler;
use crate::services::ServiceRegistry;
use crate::transform::{scaled_font, CanvasTransform};
use crate::types::*;
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use eframe::epaint::StrokeKind;
use serde_json::{Map, Value};

/// A connection point on the left (input) or right (output) edge of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Slot name
    pub name: String,
    /// Type used for connection validation
    pub slot_type: SlotType,
    /// Human readable type, e.g. `list<number>`
    pub type_label: String,
    /// Colour of the slot circle
    pub color: Color32,
}

/// Kind of content a node type displays, chosen by the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyKind {
    /// Wrapped display text
    Text,
    /// Image gallery with the given behaviour
    Image(ImageGalleryConfig),
    /// Streaming log
    Log,
    /// Floating text editor bound to a property
    Overlay(OverlayKind, &'static str),
}

/// Type-specific content of a node.
pub enum NodeBody {
    /// Wrapped display text
    Text,
    /// Image or chart gallery
    Image(ImageGallery),
    /// Streaming log
    Log(LogView),
    /// Floating text editor
    Overlay(TextOverlay),
}

impl NodeBody {
    fn from_kind(kind: BodyKind) -> Self {
        match kind {
            BodyKind::Text => NodeBody::Text,
            BodyKind::Image(config) => NodeBody::Image(ImageGallery::new(config)),
            BodyKind::Log => NodeBody::Log(LogView::default()),
            BodyKind::Overlay(kind, property) => NodeBody::Overlay(TextOverlay::new(kind, property)),
        }
    }

    /// Smallest content height the body needs in world units.
    fn min_content_height(&self) -> f32 {
        match self {
            NodeBody::Text => 0.0,
            NodeBody::Image(_) => 80.0,
            NodeBody::Log(_) => 6.0 * LINE_HEIGHT,
            NodeBody::Overlay(_) => 3.0 * LINE_HEIGHT,
        }
    }
}

/// A node on the canvas.
pub struct FlowNode {
    /// Unique id
    pub id: NodeId,
    /// Catalog type name
    pub type_name: String,
    /// Title shown in the title bar
    pub title: String,
    /// Top-left corner in world units
    pub pos: Pos2,
    /// Size in world units
    pub size: Vec2,
    /// Input slots
    pub inputs: Vec<Slot>,
    /// Output slots
    pub outputs: Vec<Slot>,
    /// Property bag edited through widgets
    pub properties: Map<String, Value>,
    /// Semantic state
    pub state: NodeState,
    /// Widget descriptors bound to `properties`
    pub widgets: WidgetManager,
    /// Title editing gesture state
    pub interactions: Interactions,
    /// Type-specific content
    pub body: NodeBody,
    display_results: bool,
    params: Vec<ParamSpec>,
    services: ServiceRegistry,
    renderer: Renderer,
    border_override: Option<Color32>,
}

impl FlowNode {
    /// Creates a node from a declarative spec.
    ///
    /// # Arguments
    ///
    /// * `type_name` - Catalog type name, used when serializing
    /// * `title` - Initial title
    /// * `spec` - Slots, parameters and display options
    /// * `body` - Kind of content the node shows
    /// * `services` - Shared theme, type colours and dialog sink
    pub fn new(type_name: &str, title: &str, spec: &NodeSpec, body: BodyKind, services: &ServiceRegistry) -> Self {
        let build_slots = |decl: &SlotDecl| -> Vec<Slot> {
            decl.entries()
                .into_iter()
                .map(|(name, descriptor)| Slot {
                    name,
                    slot_type: descriptor.slot_type(),
                    type_label: services.type_colors.display_string(&descriptor),
                    color: services.type_colors.color_for_descriptor(&descriptor),
                })
                .collect()
        };

        let mut properties = Map::new();
        for param in &spec.params {
            properties.insert(param.name.clone(), default_for_param(param));
        }
        let mut widgets = WidgetManager::new();
        widgets.materialize(&spec.params, &properties);

        let mut body = NodeBody::from_kind(body);
        if let NodeBody::Overlay(overlay) = &mut body {
            overlay.sync_from(&properties);
        }

        Self {
            id: uuid::Uuid::new_v4(),
            type_name: type_name.to_string(),
            title: title.to_string(),
            pos: Pos2::ZERO,
            size: Vec2::new(NODE_WIDTH, NODE_HEIGHT),
            inputs: build_slots(&spec.inputs),
            outputs: build_slots(&spec.outputs),
            properties,
            state: NodeState::default(),
            widgets,
            interactions: Interactions::default(),
            body,
            display_results: spec.display_results,
            params: spec.params.clone(),
            services: services.clone(),
            renderer: Renderer::new(),
            border_override: None,
        }
    }

    /// Bounding box in world units.
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.pos, self.size)
    }

    /// Parameter declarations the widgets were built from.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Switches the palette used to paint this node.
    pub fn set_theme(&mut self, theme: crate::theme::Theme) {
        self.services.theme = theme;
        if self.border_override.is_some() {
            self.border_override = Some(theme.error());
        }
    }

    /// Stores a new result and refreshes the display text. The canvas redraw is
    /// debounced through `scheduler`.
    pub fn update_display(&mut self, result: Value, scheduler: &mut RedrawScheduler, now: f64) {
        if self.display_results {
            self.state.display_text = format_display_text(&result);
        }
        let declared = self.outputs.first().map(|slot| &slot.slot_type);
        let classified = NodeResult::classify(&result, declared);
        match (&mut self.body, classified) {
            (NodeBody::Image(gallery), NodeResult::ImageSet(images)) => gallery.set_images(images, now),
            (NodeBody::Image(_), other) => {
                log::debug!("Image node '{}' received a non-image result: {:?}", self.title, other);
            }
            (NodeBody::Log(log), _) => log.append_result(&result),
            _ => {}
        }
        self.state.result = Some(result);
        scheduler.request(now);
    }

    /// Applies an incremental result: streamed log text or a partial image set.
    pub fn on_stream_update(&mut self, chunk: Value, scheduler: &mut RedrawScheduler, now: f64) {
        match &mut self.body {
            NodeBody::Log(log) => {
                match &chunk {
                    Value::String(text) => log.push_chunk(text),
                    other => log.append_result(other),
                }
                scheduler.request(now);
            }
            NodeBody::Image(gallery) => {
                if let Some(images) = NodeResult::image_map(&chunk) {
                    gallery.set_images(images, now);
                }
                scheduler.request(now);
            }
            _ => self.update_display(chunk, scheduler, now),
        }
    }

    /// Sets the progress bar. Values are clamped to `[-1, 100]`; `-1` hides the bar.
    pub fn set_progress(&mut self, progress: f32, text: Option<&str>) {
        self.state.progress = if progress.is_nan() { -1.0 } else { progress.clamp(-1.0, 100.0) };
        if let Some(text) = text {
            self.state.progress_text = text.to_string();
        }
    }

    /// Hides the progress bar and clears its label.
    pub fn clear_progress(&mut self) {
        self.state.progress = -1.0;
        self.state.progress_text.clear();
    }

    /// Marks the node as running or finished. Finishing starts the fade-out highlight.
    pub fn set_executing(&mut self, executing: bool, now: f64) {
        let was_executing = self.state.is_executing;
        self.state.is_executing = executing;
        if executing || was_executing {
            self.state.highlight_started_at = Some(now);
        }
    }

    /// Triggers a one-shot highlight.
    pub fn pulse_highlight(&mut self, now: f64) {
        self.state.highlight_started_at = Some(now);
    }

    /// Records an error, turns the border red and notifies the dialog service.
    ///
    /// Dialog failures are logged and never propagate.
    pub fn set_error(&mut self, message: &str) {
        self.state.error = Some(message.to_string());
        self.border_override = Some(self.services.theme.error());
        if let Some(dialogs) = &self.services.dialogs {
            if let Err(err) = dialogs.show_error(&self.title, message) {
                log::warn!("Could not show error dialog for '{}': {err}", self.title);
            }
        }
    }

    /// Clears the error and the red border.
    pub fn clear_error(&mut self) {
        self.state.error = None;
        self.border_override = None;
    }

    /// Checks whether an output of type `output_type` may connect into input `input_index`.
    pub fn on_connect_input(&self, input_index: usize, output_type: &SlotType) -> Result<(), FlowError> {
        let slot = self.inputs.get(input_index).ok_or_else(|| FlowError::MissingSlot {
            node: self.title.clone(),
            index: input_index,
        })?;
        if slot.slot_type.accepts(output_type) {
            Ok(())
        } else {
            Err(FlowError::IncompatibleTypes {
                input_index,
                input_type: slot.slot_type.to_string(),
                output_type: output_type.to_string(),
            })
        }
    }

    /// Writes a property through its widget (clamping numbers) or directly when no
    /// widget is bound.
    pub fn set_property(&mut self, key: &str, value: Value) {
        if !self.widgets.apply_change(key, value.clone(), &mut self.properties) {
            self.properties.insert(key.to_string(), value);
        }
        if let NodeBody::Overlay(overlay) = &mut self.body {
            if overlay.property == key {
                overlay.sync_from(&self.properties);
            }
        }
    }

    /// Snapshot of title, geometry and properties.
    pub fn serialize(&self) -> SerializedNode {
        SerializedNode {
            id: self.id,
            node_type: self.type_name.clone(),
            title: self.title.clone(),
            pos: (self.pos.x, self.pos.y),
            size: (self.size.x, self.size.y),
            properties: self.properties.clone(),
        }
    }

    /// Restores a snapshot. Properties missing from the snapshot keep their defaults.
    /// Applying the same snapshot twice gives the same node.
    pub fn configure(&mut self, data: &SerializedNode) {
        self.id = data.id;
        self.title = data.title.clone();
        self.pos = Pos2::new(data.pos.0, data.pos.1);
        self.size = Vec2::new(data.size.0.max(1.0), data.size.1.max(1.0));
        for (key, value) in &data.properties {
            self.properties.insert(key.clone(), value.clone());
        }
        self.sync_widget_values();
        if let NodeBody::Overlay(overlay) = &mut self.body {
            overlay.sync_from(&self.properties);
        }
    }

    /// Refreshes widget display values from the property bag.
    pub fn sync_widget_values(&mut self) {
        self.widgets.sync_widget_values(&self.properties);
    }

    /// Formats a combo value for display.
    pub fn format_combo_value(value: &Value) -> String {
        widgets::format_combo_value(value)
    }

    /// Releases per-node resources when the node leaves the graph.
    pub fn on_removed(&mut self) {
        match &mut self.body {
            NodeBody::Overlay(overlay) => overlay.on_removed(),
            NodeBody::Image(gallery) => gallery.release(),
            _ => {}
        }
        self.renderer.clear_cache();
    }

    /// Vertical offset where slot rows end and widget rows begin.
    fn slots_bottom(&self) -> f32 {
        TITLE_HEIGHT + self.inputs.len().max(self.outputs.len()) as f32 * SLOT_SPACING
    }

    /// Vertical offset (node-local) where body content starts, before padding.
    pub fn content_top(&self) -> f32 {
        self.slots_bottom() + self.widgets.len() as f32 * LINE_HEIGHT
    }

    fn bottom_reserved(&self, error_lines: usize) -> f32 {
        let mut reserved = CONTENT_PADDING;
        if self.state.progress >= 0.0 {
            reserved += PROGRESS_BAR_HEIGHT + CONTENT_PADDING / 2.0;
        }
        if error_lines > 0 {
            reserved += CONTENT_PADDING / 2.0 + error_lines as f32 * LINE_HEIGHT;
        }
        reserved
    }

    /// World-space rect available to body content.
    pub fn content_rect(&self) -> Rect {
        let error_lines = usize::from(self.state.error.is_some());
        let rect = self.rect();
        let top = rect.top() + self.content_top() + CONTENT_PADDING;
        let bottom = (rect.bottom() - self.bottom_reserved(error_lines)).max(top);
        Rect::from_min_max(
            Pos2::new(rect.left() + CONTENT_PADDING, top),
            Pos2::new(rect.right() - CONTENT_PADDING, bottom),
        )
    }

    /// Body content that reacts to the mouse wheel, if any.
    pub fn wheel_handler(&mut self) -> Option<&mut dyn WheelHandler> {
        match &mut self.body {
            NodeBody::Image(gallery) => Some(gallery),
            NodeBody::Log(log) => Some(log),
            _ => None,
        }
    }

    /// Decode jobs waiting to be started.
    pub fn drain_decode_jobs(&mut self) -> Vec<DecodeJob> {
        match &mut self.body {
            NodeBody::Image(gallery) => gallery.take_jobs(),
            _ => Vec::new(),
        }
    }

    /// Hands a finished decode to the gallery.
    pub fn on_decoded(&mut self, outcome: DecodeOutcome) {
        if let NodeBody::Image(gallery) = &mut self.body {
            gallery.on_decoded(outcome.generation, &outcome.label, outcome.result);
        }
    }

    /// Resizes image nodes once their decode batch has settled.
    ///
    /// Returns `true` when the node size changed.
    pub fn settle_layout(&mut self, now: f64, scheduler: &mut RedrawScheduler) -> bool {
        let chrome = Vec2::new(
            2.0 * CONTENT_PADDING,
            self.content_top() + CONTENT_PADDING + self.bottom_reserved(usize::from(self.state.error.is_some())),
        );
        let size = self.size;
        let NodeBody::Image(gallery) = &mut self.body else {
            return false;
        };
        match gallery.poll_settled(now, size, chrome) {
            Some(new_size) if (new_size - size).length() > 1.0 => {
                log::debug!("Resizing image node '{}' to {:?}", self.title, new_size);
                self.size = new_size;
                scheduler.request(now);
                true
            }
            _ => false,
        }
    }

    /// Paints the node.
    ///
    /// Grows the node and requests one more redraw when its content does not fit.
    ///
    /// # Arguments
    ///
    /// * `painter` - Canvas painter
    /// * `transform` - World to absolute screen transform
    /// * `now` - Current time in seconds
    /// * `selected` - Whether the node is selected
    /// * `scheduler` - Redraw scheduler used for follow-up frames
    pub fn draw(
        &mut self,
        painter: &egui::Painter,
        transform: &CanvasTransform,
        now: f64,
        selected: bool,
        scheduler: &mut RedrawScheduler,
    ) {
        let theme = self.services.theme;
        let zoom = transform.zoom;
        let width = self.size.x - 2.0 * CONTENT_PADDING;

        // Measure first so the node can grow before it is painted.
        let text_lines = match (&self.body, self.display_results) {
            (NodeBody::Text, true) if !self.state.display_text.is_empty() => {
                self.renderer.wrapped_lines(painter, &self.state.display_text, width)
            }
            _ => Vec::new(),
        };
        let error_lines = match &self.state.error {
            Some(error) => self.renderer.wrapped_error(painter, error, width),
            None => Vec::new(),
        };
        let needed = required_height(self.content_top(), text_lines.len(), self.state.progress >= 0.0, error_lines.len())
            + self.body.min_content_height();
        if needed > self.size.y + 1.0 {
            self.size.y = needed;
            scheduler.request(now);
        }

        let screen_rect = transform.world_rect_to_screen(self.rect());
        let phase = highlight_phase(&mut self.state, now);
        if phase.is_animating() {
            scheduler.request(now);
        }
        self.renderer.draw_highlight(painter, screen_rect, phase, &theme, zoom);

        let rounding = 6.0 * zoom;
        painter.rect_filled(screen_rect, rounding, theme.node_fill());
        let title_rect = Rect::from_min_size(screen_rect.min, egui::vec2(screen_rect.width(), TITLE_HEIGHT * zoom));
        painter.rect_filled(title_rect, rounding, theme.title_fill());
        if !self.interactions.is_editing_title() {
            painter.with_clip_rect(title_rect).text(
                title_rect.left_center() + egui::vec2(CONTENT_PADDING * zoom, 0.0),
                egui::Align2::LEFT_CENTER,
                &self.title,
                scaled_font(BODY_FONT_SIZE + 1.0, zoom),
                theme.text(),
            );
        }

        let border = if let Some(color) = self.border_override {
            Stroke::new(2.0 * zoom, color)
        } else if selected {
            Stroke::new(2.0 * zoom, theme.selected_border())
        } else {
            Stroke::new(1.0 * zoom, theme.border())
        };
        painter.rect_stroke(screen_rect, rounding, border, StrokeKind::Outside);

        self.draw_slots(painter, transform);
        self.draw_widget_rows(painter, transform);

        let content = self.content_rect();
        let content_screen = transform.world_rect_to_screen(content);
        match &mut self.body {
            NodeBody::Text => {
                self.renderer.draw_lines(painter, &text_lines, content_screen.min, zoom, theme.text(), content_screen);
            }
            NodeBody::Image(gallery) => {
                gallery.upload_textures(painter.ctx(), &self.id.to_string());
                gallery.constrain(content.size());
                gallery.draw(painter, content, |r| transform.world_rect_to_screen(r), zoom, theme.muted_text());
            }
            NodeBody::Log(log) => {
                log.follow(content.height());
                log.draw(painter, content_screen, content_screen.min, zoom, theme.text());
            }
            NodeBody::Overlay(_) => {
                painter.rect_stroke(content_screen, 2.0 * zoom, Stroke::new(1.0, theme.border()), StrokeKind::Inside);
            }
        }

        let mut cursor = content_screen.bottom() + CONTENT_PADDING / 2.0 * zoom;
        if self.state.progress >= 0.0 {
            let bar = Rect::from_min_size(
                Pos2::new(content_screen.left(), cursor),
                egui::vec2(content_screen.width(), PROGRESS_BAR_HEIGHT * zoom),
            );
            self.renderer.draw_progress_bar(painter, bar, &self.state, &theme, zoom);
            cursor = bar.bottom() + CONTENT_PADDING / 2.0 * zoom;
        }
        if !error_lines.is_empty() {
            self.renderer.draw_error(painter, &error_lines, Pos2::new(content_screen.left(), cursor), zoom, &theme);
        }
    }

    fn draw_slots(&self, painter: &egui::Painter, transform: &CanvasTransform) {
        let zoom = transform.zoom;
        let rect = self.rect();
        let font = scaled_font(BODY_FONT_SIZE - 1.0, zoom);
        let muted = self.services.theme.muted_text();
        for (i, slot) in self.inputs.iter().enumerate() {
            let center = transform.world_to_screen(input_slot_pos(rect, i));
            painter.circle_filled(center, SLOT_RADIUS * zoom, slot.color);
            painter.text(
                center + egui::vec2((SLOT_RADIUS + 4.0) * zoom, 0.0),
                egui::Align2::LEFT_CENTER,
                &slot.name,
                font.clone(),
                muted,
            );
        }
        for (i, slot) in self.outputs.iter().enumerate() {
            let center = transform.world_to_screen(output_slot_pos(rect, i));
            painter.circle_filled(center, SLOT_RADIUS * zoom, slot.color);
            painter.text(
                center - egui::vec2((SLOT_RADIUS + 4.0) * zoom, 0.0),
                egui::Align2::RIGHT_CENTER,
                &slot.name,
                font.clone(),
                muted,
            );
        }
    }

    fn draw_widget_rows(&self, painter: &egui::Painter, transform: &CanvasTransform) {
        let zoom = transform.zoom;
        let theme = self.services.theme;
        let font = scaled_font(BODY_FONT_SIZE, zoom);
        let top = self.pos.y + self.slots_bottom();
        let clip = transform.world_rect_to_screen(self.rect());
        let painter = painter.with_clip_rect(clip.intersect(painter.clip_rect()));
        for (i, widget) in self.widgets.widgets().iter().enumerate() {
            let y = top + i as f32 * LINE_HEIGHT + LINE_HEIGHT / 2.0;
            let left = transform.world_to_screen(Pos2::new(self.pos.x + CONTENT_PADDING, y));
            let right = transform.world_to_screen(Pos2::new(self.pos.x + self.size.x - CONTENT_PADDING, y));
            painter.text(left, egui::Align2::LEFT_CENTER, &widget.label, font.clone(), theme.muted_text());
            painter.text(right, egui::Align2::RIGHT_CENTER, &widget.display_value, font.clone(), theme.text());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::catalog::NodeCatalog;
    use super::*;
    use crate::services::{DialogService, ErrorDialogQueue};
    use serde_json::json;
    use std::rc::Rc;

    struct FailingDialogs;

    impl DialogService for FailingDialogs {
        fn show_error(&self, _title: &str, _message: &str) -> Result<(), FlowError> {
            Err(FlowError::Dialog("no window".into()))
        }
    }

    fn text_node() -> FlowNode {
        let spec = NodeSpec {
            inputs: SlotDecl::Names(vec!["in".into()]),
            outputs: SlotDecl::Names(vec!["out".into()]),
            ..Default::default()
        };
        FlowNode::new("TextOutput", "Text", &spec, BodyKind::Text, &ServiceRegistry::default())
    }

    #[test]
    fn progress_is_clamped_and_cleared() {
        let mut node = text_node();
        for p in [-50.0, -1.0, 0.0, 42.5, 100.0, 250.0, f32::NAN] {
            node.set_progress(p, Some("loading"));
            assert!((-1.0..=100.0).contains(&node.state.progress), "{p} -> {}", node.state.progress);
        }
        node.set_progress(250.0, None);
        assert_eq!(node.state.progress, 100.0);
        assert_eq!(node.state.progress_text, "loading");
        node.clear_progress();
        assert_eq!(node.state.progress, -1.0);
        assert!(node.state.progress_text.is_empty());
    }

    #[test]
    fn long_string_is_truncated_with_suffix() {
        let mut node = text_node();
        let mut scheduler = RedrawScheduler::default();
        node.update_display(json!("x".repeat(1500)), &mut scheduler, 0.0);
        let text = &node.state.display_text;
        assert!(text.ends_with(TRUNCATION_SUFFIX));
        assert!(text.chars().count() <= MAX_STRING_DISPLAY + TRUNCATION_SUFFIX.chars().count());
    }

    #[test]
    fn single_output_key_is_unwrapped() {
        let mut node = text_node();
        let mut scheduler = RedrawScheduler::default();
        node.update_display(json!({"out": "hello"}), &mut scheduler, 0.0);
        assert_eq!(node.state.display_text, "hello");
        assert_eq!(node.state.result, Some(json!({"out": "hello"})));
    }

    #[test]
    fn many_updates_schedule_one_redraw() {
        let mut nodes: Vec<FlowNode> = (0..50).map(|_| text_node()).collect();
        let mut scheduler = RedrawScheduler::default();
        for (i, node) in nodes.iter_mut().enumerate() {
            node.update_display(json!(i), &mut scheduler, 1.0 + i as f64 * 0.0001);
        }
        assert!(!scheduler.poll(1.001));
        assert!(scheduler.poll(1.1));
        assert!(!scheduler.poll(1.2));
        assert_eq!(scheduler.fired_count(), 1);
    }

    #[test]
    fn display_can_be_disabled() {
        let spec = NodeSpec {
            display_results: false,
            ..Default::default()
        };
        let mut node = FlowNode::new("Quiet", "Quiet", &spec, BodyKind::Text, &ServiceRegistry::default());
        node.update_display(json!("hidden"), &mut RedrawScheduler::default(), 0.0);
        assert!(node.state.display_text.is_empty());
        assert_eq!(node.state.result, Some(json!("hidden")));
    }

    #[test]
    fn set_error_notifies_dialog_service() {
        let queue = Rc::new(ErrorDialogQueue::default());
        let services = ServiceRegistry::with_dialogs(queue.clone());
        let mut node = FlowNode::new("X", "Broken", &NodeSpec::default(), BodyKind::Text, &services);
        node.set_error("boom");
        assert_eq!(node.state.error.as_deref(), Some("boom"));
        assert_eq!(queue.drain(), vec![("Broken".to_string(), "boom".to_string())]);
        node.clear_error();
        assert!(node.state.error.is_none());
    }

    #[test]
    fn failing_dialog_service_is_swallowed() {
        let services = ServiceRegistry::with_dialogs(Rc::new(FailingDialogs));
        let mut node = FlowNode::new("X", "Broken", &NodeSpec::default(), BodyKind::Text, &services);
        node.set_error("boom");
        assert_eq!(node.state.error.as_deref(), Some("boom"));
    }

    #[test]
    fn connection_gate_checks_types() {
        let mut inputs = Map::new();
        inputs.insert("prices".into(), json!("number,series"));
        inputs.insert("anything".into(), json!("*"));
        let spec = NodeSpec {
            inputs: SlotDecl::Typed(inputs),
            ..Default::default()
        };
        let node = FlowNode::new("Indicator", "Indicator", &spec, BodyKind::Text, &ServiceRegistry::default());
        assert!(node.on_connect_input(0, &SlotType::parse("Number")).is_ok());
        assert!(node.on_connect_input(0, &SlotType::Any).is_ok());
        assert!(matches!(
            node.on_connect_input(0, &SlotType::parse("string")),
            Err(FlowError::IncompatibleTypes { .. })
        ));
        assert!(node.on_connect_input(1, &SlotType::parse("string")).is_ok());
        assert!(matches!(
            node.on_connect_input(5, &SlotType::Any),
            Err(FlowError::MissingSlot { index: 5, .. })
        ));
    }

    #[test]
    fn executing_pulses_then_decays() {
        let mut node = text_node();
        node.set_executing(true, 1.0);
        assert!(node.state.is_executing);
        node.set_executing(false, 2.0);
        assert_eq!(node.state.highlight_started_at, Some(2.0));
        node.pulse_highlight(3.0);
        assert_eq!(node.state.highlight_started_at, Some(3.0));
    }

    #[test]
    fn serialize_configure_roundtrip_is_idempotent() {
        let catalog = NodeCatalog::builtin();
        let services = ServiceRegistry::default();
        let mut original = catalog.create("LLMChat", &services).unwrap();
        original.pos = Pos2::new(120.0, 80.0);
        original.title = "Assistant".into();
        original.set_property("temperature", json!(1.2));
        let snapshot = original.serialize();

        let mut restored = catalog.create("LLMChat", &services).unwrap();
        restored.configure(&snapshot);
        let once = restored.serialize();
        restored.configure(&snapshot);
        assert_eq!(restored.serialize(), once);
        assert_eq!(once, snapshot);
        assert_eq!(
            restored.widgets.get("temperature").map(|w| w.display_value.clone()),
            original.widgets.get("temperature").map(|w| w.display_value.clone())
        );
    }

    #[test]
    fn log_node_appends_messages() {
        let catalog = NodeCatalog::builtin();
        let mut node = catalog.create("Logging", &ServiceRegistry::default()).unwrap();
        let mut scheduler = RedrawScheduler::default();
        node.update_display(json!({"messages": ["one", "two"]}), &mut scheduler, 0.0);
        node.on_stream_update(json!("three\n"), &mut scheduler, 0.1);
        let NodeBody::Log(log) = &node.body else {
            panic!("logging node has a log body");
        };
        assert_eq!(log.lines().collect::<Vec<_>>(), vec!["one", "two", "three"]);
    }

    #[test]
    fn image_node_queues_decodes() {
        let catalog = NodeCatalog::builtin();
        let mut node = catalog.create("ImageDisplay", &ServiceRegistry::default()).unwrap();
        let mut scheduler = RedrawScheduler::default();
        node.update_display(
            json!({"images": {"AAPL": "data:image/png;base64,AAAA"}}),
            &mut scheduler,
            0.0,
        );
        assert_eq!(node.drain_decode_jobs().len(), 1);
        assert!(node.drain_decode_jobs().is_empty());
    }

    #[test]
    fn removal_cancels_overlay() {
        let catalog = NodeCatalog::builtin();
        let mut node = catalog.create("TextInput", &ServiceRegistry::default()).unwrap();
        if let NodeBody::Overlay(overlay) = &mut node.body {
            assert!(overlay.schedule_reposition(0));
        }
        node.on_removed();
        let NodeBody::Overlay(overlay) = &node.body else {
            panic!("text input has an overlay body");
        };
        assert!(!overlay.has_pending_reposition());
    }
}
