//! User interface of the node canvas editor.
//!
//! This module contains the main application struct, the toolbar, the properties
//! panel, the node catalog menu and the wiring between the canvas and the
//! background workers.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main [`FlowCanvasApp`]
//! - `canvas` - Canvas navigation, wheel routing, dragging and link creation
//! - `rendering` - Drawing the grid, links, nodes and footer
//! - `file_ops` - Graph save/load for native and WASM
//! - `export` - PNG export of gallery images
//! - `highlighters` - JSON colouring for the result viewer

mod canvas;
mod export;
mod file_ops;
mod highlighters;
mod rendering;
mod state;

pub use canvas::{wheel_events, WheelEvent};
pub use state::{CanvasState, FlowCanvasApp, PersistedState};

use self::state::PendingConfirmAction;
use crate::execution::{spawn_execution, ExecutionEvent};
use crate::node::image_gallery::ImageState;
use crate::node::NodeBody;
use crate::types::*;
use crate::widgets::{show_widget, WidgetContext};
use eframe::egui;
#[cfg(target_arch = "wasm32")]
use eframe::wasm_bindgen::JsCast;
use serde_json::Value;

impl eframe::App for FlowCanvasApp {
    /// Persist graph, view and settings between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match self.to_json() {
            Ok(json) => storage.set_string("app_state", json),
            Err(err) => log::error!("Failed to serialize app state: {err}"),
        }
    }

    /// Main update function called by egui for each frame.
    ///
    /// Drains the background workers (file dialogs, execution socket, image
    /// decoding), then lays out the toolbar, properties panel and canvas.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = ctx.input(|i| i.time);
        let dt = ctx.input(|i| i.unstable_dt);
        self.perf.record_frame(dt);

        ctx.set_visuals(if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });
        self.apply_theme();

        self.handle_pending_operations(ctx);
        self.process_execution_events(now);
        self.process_image_decodes(ctx, now);
        self.open_errors.extend(self.dialogs.drain());

        self.handle_delete_key(ctx);
        self.handle_file_shortcuts(ctx);

        // Intercept native window close requests (titlebar X)
        #[cfg(not(target_arch = "wasm32"))]
        {
            if ctx.input(|i| i.viewport().close_requested()) {
                if self.needs_confirmation() && !self.file.allow_close_on_next_request {
                    ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                    if !self.file.show_unsaved_dialog {
                        self.file.show_unsaved_dialog = true;
                        self.file.pending_confirm_action = Some(PendingConfirmAction::Quit);
                    }
                } else {
                    self.file.allow_close_on_next_request = false;
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        if let Some(install) = self.file.sync_unload_guard(self.needs_confirmation()) {
            Self::update_beforeunload(install);
        }

        // Restore native window size once per session (desktop only)
        #[cfg(not(target_arch = "wasm32"))]
        {
            if !self.applied_viewport_restore {
                if let Some((w, h)) = self.window_inner_size {
                    ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(w, h)));
                }
                self.applied_viewport_restore = true;
            }
            let size = ctx.input(|i| i.screen_rect().size());
            self.window_inner_size = Some((size.x, size.y));
        }

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui, now);
        });

        let viewport_width = ctx.input(|i| i.screen_rect().width());
        let max_width = (viewport_width * 0.9).max(180.0);
        let clamped_width = self.properties_panel_width.clamp(180.0, max_width);
        egui::SidePanel::right("properties_panel")
            .resizable(true)
            .default_width(clamped_width)
            .show(ctx, |ui| {
                self.properties_panel_width = ui.available_width().clamp(180.0, max_width);
                self.draw_properties_panel(ui, now);
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.draw_canvas(ui, now);
            });

        self.draw_unsaved_dialog(ctx);
        self.draw_error_windows(ctx);

        if self.scheduler.poll(now) {
            ctx.request_repaint();
        } else if let Some(wait) = self.scheduler.time_until_due(now) {
            ctx.request_repaint_after(std::time::Duration::from_secs_f64(wait.max(0.0)));
        }
        let decoding = self
            .graph
            .nodes()
            .any(|n| matches!(&n.body, NodeBody::Image(gallery) if !gallery.is_settled()));
        if self.execution.is_some() || decoding {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
        self.frame_counter += 1;
    }
}

impl FlowCanvasApp {
    /// Pushes the current palette to every node after a dark mode toggle.
    fn apply_theme(&mut self) {
        if self.applied_dark_mode == Some(self.dark_mode) {
            return;
        }
        let theme = self.theme();
        self.services.theme = theme;
        for node in self.graph.nodes_mut() {
            node.set_theme(theme);
        }
        self.applied_dark_mode = Some(self.dark_mode);
    }

    fn needs_confirmation(&self) -> bool {
        self.file.has_unsaved_changes && self.settings.confirm_discard
    }

    /// Runs `action` right away, or asks first when there are unsaved changes.
    fn confirm_or_run(&mut self, action: PendingConfirmAction, ctx: &egui::Context) {
        if self.needs_confirmation() {
            self.file.show_unsaved_dialog = true;
            self.file.pending_confirm_action = Some(action);
        } else {
            self.run_confirmed(action, ctx);
        }
    }

    fn run_confirmed(&mut self, action: PendingConfirmAction, ctx: &egui::Context) {
        match action {
            PendingConfirmAction::New => self.new_graph(),
            PendingConfirmAction::Open => self.load_graph(),
            PendingConfirmAction::Quit => {
                self.file.allow_close_on_next_request = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    /// Applies events received from the execution socket.
    pub fn process_execution_events(&mut self, now: f64) {
        let Some(handle) = &self.execution else {
            return;
        };
        let target = handle.target;
        let events = handle.drain();
        let mut closed = false;
        for event in events {
            match event {
                ExecutionEvent::SessionStarted(session) => {
                    log::debug!("Execution session {session} started");
                }
                ExecutionEvent::Result { node, value } => {
                    let Self { graph, scheduler, .. } = self;
                    match graph.node_mut(node) {
                        Some(n) if node == target => n.update_display(value, scheduler, now),
                        Some(n) => n.on_stream_update(value, scheduler, now),
                        None => log::warn!("Result for unknown node {node}"),
                    }
                }
                ExecutionEvent::Progress { node, progress, text } => {
                    if let Some(n) = self.graph.node_mut(node) {
                        n.set_progress(progress, text.as_deref());
                        self.scheduler.request(now);
                    }
                }
                ExecutionEvent::Status(status) => self.set_status(status),
                ExecutionEvent::Error { node, message } => {
                    match node.and_then(|id| self.graph.node_mut(id)) {
                        Some(n) => n.set_error(&message),
                        None => self.open_errors.push(("Execution failed".to_string(), message.clone())),
                    }
                    self.set_status(format!("Error: {message}"));
                }
                ExecutionEvent::Closed => closed = true,
            }
        }
        if closed {
            if let Some(n) = self.graph.node_mut(target) {
                n.set_executing(false, now);
                n.clear_progress();
            }
            self.execution = None;
            self.scheduler.request(now);
        }
    }

    /// Starts decode jobs, applies finished decodes and resizes settled image nodes.
    pub fn process_image_decodes(&mut self, ctx: &egui::Context, now: f64) {
        for outcome in self.decoder.drain() {
            if let Some(node) = self.graph.node_mut(outcome.node_id) {
                node.on_decoded(outcome);
                self.scheduler.request(now);
            }
        }
        let Self {
            graph, decoder, scheduler, ..
        } = self;
        for node in graph.nodes_mut() {
            for job in node.drain_decode_jobs() {
                decoder.submit(node.id, job, Some(ctx.clone()));
            }
            node.settle_layout(now, scheduler);
        }
    }

    /// Executes the selected node and everything upstream of it.
    pub fn run_selected_node(&mut self, ctx: &egui::Context, now: f64) {
        let Some(target) = self.interaction.selected_node else {
            self.set_status("Select a node to run");
            return;
        };
        let graph = self.graph.subgraph_for(target);
        match spawn_execution(self.settings.effective_server_url(), target, graph, ctx.clone()) {
            Ok(handle) => {
                if let Some(node) = self.graph.node_mut(target) {
                    node.clear_error();
                    node.set_executing(true, now);
                }
                self.execution = Some(handle);
                self.set_status("Running…");
            }
            Err(err) => {
                log::error!("Could not start execution: {err}");
                self.open_errors.push(("Execution failed".to_string(), err.to_string()));
            }
        }
    }

    /// Stops the running execution, if any.
    pub fn stop_execution(&mut self, now: f64) {
        if let Some(handle) = self.execution.take() {
            if let Some(node) = self.graph.node_mut(handle.target) {
                node.set_executing(false, now);
                node.clear_progress();
            }
            self.set_status("Stopped");
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn update_beforeunload(has_unsaved_changes: bool) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if has_unsaved_changes {
            let closure = eframe::wasm_bindgen::closure::Closure::wrap(Box::new(move |event: web_sys::Event| {
                event.prevent_default();
                let _ = js_sys::Reflect::set(
                    event.as_ref(),
                    &eframe::wasm_bindgen::JsValue::from_str("returnValue"),
                    &eframe::wasm_bindgen::JsValue::from_str("unsaved"),
                );
            }) as Box<dyn FnMut(_)>);
            window.set_onbeforeunload(Some(closure.as_ref().unchecked_ref()));
            closure.forget();
        } else {
            window.set_onbeforeunload(None);
        }
    }

    /// Handles New, Open, Save, Save As and Quit shortcuts.
    fn handle_file_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (save_as, save, open, new, quit) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            let s = i.key_pressed(egui::Key::S) && cmd;
            (
                s && i.modifiers.shift,
                s && !i.modifiers.shift,
                i.key_pressed(egui::Key::O) && cmd,
                i.key_pressed(egui::Key::N) && cmd,
                i.key_pressed(egui::Key::Q) && cmd,
            )
        });
        if save_as {
            self.save_as_graph();
        } else if save {
            self.save_graph();
        }
        if open {
            self.confirm_or_run(PendingConfirmAction::Open, ctx);
        }
        if new {
            self.confirm_or_run(PendingConfirmAction::New, ctx);
        }
        if quit && cfg!(not(target_arch = "wasm32")) {
            self.confirm_or_run(PendingConfirmAction::Quit, ctx);
        }
    }

    /// Removes the selected node or link on Delete.
    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() || !ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            return;
        }
        if let Some(id) = self.interaction.selected_node.take() {
            self.delete_node(id);
        } else if let Some(link) = self.interaction.selected_link.take() {
            if self.graph.disconnect(link) {
                self.mark_dirty();
            }
        }
    }

    /// Removes a node, its links and its cached option lists.
    pub fn delete_node(&mut self, id: NodeId) {
        if self.graph.remove_node(id).is_some() {
            self.data_sources.forget_node(id);
            if self.execution.as_ref().is_some_and(|h| h.target == id) {
                self.execution = None;
            }
            if self.interaction.selected_node == Some(id) {
                self.interaction.selected_node = None;
            }
            self.interaction.editing_title = None;
            self.mark_dirty();
        }
    }

    fn draw_toolbar(&mut self, ui: &mut egui::Ui, now: f64) {
        ui.horizontal(|ui| {
            if ui.button("New").clicked() {
                self.confirm_or_run(PendingConfirmAction::New, ui.ctx());
            }
            if ui.button("Open").clicked() {
                self.confirm_or_run(PendingConfirmAction::Open, ui.ctx());
            }
            if ui.button("Save").clicked() {
                self.save_graph();
            }
            if ui.button("Save As").clicked() {
                self.save_as_graph();
            }

            ui.separator();

            if self.execution.is_some() {
                if ui.button("⏹ Stop").clicked() {
                    self.stop_execution(now);
                }
            } else {
                let can_run = self.interaction.selected_node.is_some();
                if ui.add_enabled(can_run, egui::Button::new("▶ Run")).clicked() {
                    self.run_selected_node(ui.ctx(), now);
                }
            }

            ui.separator();
            ui.checkbox(&mut self.canvas.show_grid, "Show Grid");
            ui.checkbox(&mut self.dark_mode, "Dark Mode");
            ui.checkbox(&mut self.settings.show_fps, "FPS");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let marker = if self.file.has_unsaved_changes { "*" } else { "" };
                let name = self.file.current_path.as_deref().unwrap_or("Untitled");
                ui.label(format!("{name}{marker}"));
                ui.label(format!("Zoom: {:.0}%", self.canvas.zoom_factor * 100.0));
            });
        });
    }

    /// Renders the properties panel for the selected node or link.
    fn draw_properties_panel(&mut self, ui: &mut egui::Ui, now: f64) {
        egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
            ui.heading("Properties");
            ui.separator();
            if let Some(id) = self.interaction.selected_node {
                self.draw_node_properties(ui, id, now);
            } else if let Some(link) = self.interaction.selected_link {
                self.draw_link_properties(ui, link);
            } else {
                ui.label("Right-click the canvas to add a node.");
                ui.label("Drag from an output to an input to connect.");
            }
            ui.separator();
            self.draw_settings(ui);
        });
    }

    fn draw_node_properties(&mut self, ui: &mut egui::Ui, id: NodeId, now: f64) {
        let dark_mode = self.dark_mode;
        let mut changed = false;
        let mut delete = false;
        let mut export = false;
        {
            let Self {
                graph, data_sources, ..
            } = self;
            let Some(node) = graph.node_mut(id) else {
                return;
            };

            ui.horizontal(|ui| {
                ui.label("Title:");
                if ui.text_edit_singleline(&mut node.title).changed() {
                    changed = true;
                }
            });
            ui.label(format!("Type: {}", node.type_name));

            if !node.inputs.is_empty() || !node.outputs.is_empty() {
                egui::CollapsingHeader::new("Slots").default_open(false).show(ui, |ui| {
                    for slot in &node.inputs {
                        ui.colored_label(slot.color, format!("→ {}: {}", slot.name, slot.type_label));
                    }
                    for slot in &node.outputs {
                        ui.colored_label(slot.color, format!("{}: {} →", slot.name, slot.type_label));
                    }
                });
            }

            if !node.widgets.is_empty() {
                ui.separator();
                let mut context = WidgetContext {
                    node_id: id,
                    data_sources,
                };
                for widget in node.widgets.widgets().to_vec() {
                    let mut value = node.properties.get(&widget.key).cloned().unwrap_or(Value::Null);
                    let edited = ui
                        .add_enabled_ui(!widget.is_read_only(), |ui| {
                            show_widget(ui, &widget, &mut value, &mut context)
                        })
                        .inner;
                    if edited {
                        node.set_property(&widget.key, value);
                        changed = true;
                    }
                    let fresh = context
                        .data_sources
                        .get_mut(id, &widget.key)
                        .and_then(|remote| remote.take_fresh());
                    if let Some(options) = fresh {
                        changed |= node.widgets.set_options(&widget.key, options, &mut node.properties);
                        node.sync_widget_values();
                    }
                }
            }

            match &mut node.body {
                NodeBody::Image(gallery) => {
                    ui.separator();
                    ui.label(format!("Images: {}", gallery.entries().len()));
                    let labels: Vec<String> = gallery
                        .entries()
                        .iter()
                        .map(|entry| match &entry.state {
                            ImageState::Failed(err) => format!("{} (failed: {err})", entry.label),
                            _ => entry.label.clone(),
                        })
                        .collect();
                    for (index, text) in labels.into_iter().enumerate() {
                        let selected = gallery.selected == Some(index);
                        if ui.selectable_label(selected, text).clicked() {
                            gallery.selected = Some(index);
                        }
                    }
                    if ui
                        .add_enabled(!gallery.entries().is_empty(), egui::Button::new("Export PNG…"))
                        .clicked()
                    {
                        export = true;
                    }
                }
                NodeBody::Log(log_view) => {
                    ui.separator();
                    ui.horizontal(|ui| {
                        ui.label(format!("Log lines: {}", log_view.line_count()));
                        if ui.button("Clear").clicked() {
                            log_view.clear();
                        }
                    });
                }
                _ => {}
            }

            if !node.state.display_text.is_empty() {
                ui.separator();
                ui.horizontal(|ui| {
                    ui.label("Output");
                    if ui.small_button("Copy").clicked() {
                        ui.ctx().copy_text(node.state.display_text.clone());
                    }
                });
                ui.label(&node.state.display_text);
            }

            if let Some(result) = &node.state.result {
                egui::CollapsingHeader::new("Result").default_open(false).show(ui, |ui| {
                    let text = highlighters::preview_text(result);
                    let job = highlighters::highlight_json(&text, egui::FontId::monospace(12.0), dark_mode);
                    ui.label(job);
                });
            }

            if let Some(error) = node.state.error.clone() {
                ui.separator();
                ui.colored_label(egui::Color32::from_rgb(230, 80, 80), format!("Error: {error}"));
                if ui.button("Clear Error").clicked() {
                    node.clear_error();
                }
            }

            ui.separator();
            if ui.button("Delete Node").clicked() {
                delete = true;
            }
        }

        if export {
            if let Err(err) = self.export_selected_image() {
                self.open_errors.push(("Export failed".to_string(), err.to_string()));
            }
        }
        if changed {
            self.scheduler.request(now);
            self.mark_dirty();
        }
        if delete {
            self.delete_node(id);
        }
    }

    fn draw_link_properties(&mut self, ui: &mut egui::Ui, id: LinkId) {
        let Some(link) = self.graph.links().iter().find(|l| l.id == id).cloned() else {
            self.interaction.selected_link = None;
            return;
        };
        let describe = |node: NodeId, slot: usize, output: bool| {
            self.graph.node(node).map_or_else(
                || "?".to_string(),
                |n| {
                    let slots = if output { &n.outputs } else { &n.inputs };
                    let name = slots.get(slot).map_or("?", |s| s.name.as_str());
                    format!("{}.{}", n.title, name)
                },
            )
        };
        ui.label("Link");
        ui.label(format!("From: {}", describe(link.from, link.from_slot, true)));
        ui.label(format!("To: {}", describe(link.to, link.to_slot, false)));
        if ui.button("Delete Link").clicked() && self.graph.disconnect(id) {
            self.interaction.selected_link = None;
            self.mark_dirty();
        }
    }

    fn draw_settings(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Settings").default_open(false).show(ui, |ui| {
            ui.label("Execution server:");
            ui.text_edit_singleline(&mut self.settings.server_url);
            ui.checkbox(&mut self.settings.snap_to_grid, "Snap to grid");
            ui.checkbox(&mut self.settings.confirm_discard, "Confirm before discarding changes");
            if self.settings.show_fps {
                ui.label(format!("Slow frames: {}", self.perf.slow_frames()));
            }
        });
    }

    /// Draws the canvas and processes its interactions.
    fn draw_canvas(&mut self, ui: &mut egui::Ui, now: f64) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        self.canvas_rect = response.rect;

        // Centre the world origin the first time the canvas is shown.
        if !self.canvas.centered {
            let centre = response.rect.size() / 2.0;
            self.canvas.offset = (centre.x, centre.y);
            self.canvas.centered = true;
        }

        let editing = self.interaction.editing_title.is_some();
        if !editing {
            self.handle_primary_press(ui, &response);
        }
        self.handle_canvas_panning(ui, &response);
        self.handle_wheel(ui, &response, now);
        self.handle_pointer_drag(ui);
        self.handle_canvas_clicks(&response);

        self.render_canvas(&painter, response.rect, now);

        self.update_overlays(ui.ctx(), response.id);
        self.draw_title_editor(ui.ctx());
        if self.context_menu.show {
            self.draw_context_menu(ui);
        }
    }

    /// Shows the node catalog at the right-click position.
    fn draw_context_menu(&mut self, ui: &mut egui::Ui) {
        let screen_pos = egui::pos2(self.context_menu.screen_pos.0, self.context_menu.screen_pos.1);
        let mut chosen = None;
        let area_response = egui::Area::new(egui::Id::new("context_menu"))
            .fixed_pos(screen_pos)
            .order(egui::Order::Foreground)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_max_width(220.0);
                    ui.label("Add node:");
                    let search = ui.text_edit_singleline(&mut self.context_menu.filter);
                    if self.context_menu.just_opened {
                        search.request_focus();
                    }
                    let filter = self.context_menu.filter.to_lowercase();
                    egui::ScrollArea::vertical().max_height(320.0).show(ui, |ui| {
                        for category in self.catalog.categories() {
                            let matches: Vec<_> = self
                                .catalog
                                .definitions()
                                .iter()
                                .filter(|d| d.category == category)
                                .filter(|d| {
                                    filter.is_empty()
                                        || d.title.to_lowercase().contains(&filter)
                                        || d.type_name.to_lowercase().contains(&filter)
                                })
                                .collect();
                            if matches.is_empty() {
                                continue;
                            }
                            ui.separator();
                            ui.weak(category);
                            for definition in matches {
                                if ui.button(definition.title).clicked() {
                                    chosen = Some(definition.type_name);
                                }
                            }
                        }
                    });
                })
            });

        if let Some(type_name) = chosen {
            self.create_node_at(type_name);
            self.context_menu.show = false;
        }
        let escape = ui.input(|i| i.key_pressed(egui::Key::Escape));
        if escape {
            self.context_menu.show = false;
        }
        if !self.context_menu.just_opened && ui.input(|i| i.pointer.primary_clicked()) {
            if let Some(click_pos) = ui.input(|i| i.pointer.interact_pos()) {
                if !area_response.response.rect.contains(click_pos) {
                    self.context_menu.show = false;
                }
            }
        }
        self.context_menu.just_opened = false;
    }

    /// Creates a node of `type_name` at the context menu position and selects it.
    pub fn create_node_at(&mut self, type_name: &str) -> Option<NodeId> {
        let mut node = match self.catalog.create(type_name, &self.services) {
            Ok(node) => node,
            Err(err) => {
                self.set_status(err.to_string());
                return None;
            }
        };
        let mut pos = egui::pos2(self.context_menu.world_pos.0, self.context_menu.world_pos.1);
        if self.settings.snap_to_grid {
            pos = self.snap_to_grid(pos);
        }
        node.pos = pos;
        node.set_theme(self.theme());
        self.node_counter += 1;
        let id = self.graph.add_node(node);
        self.interaction.selected_node = Some(id);
        self.interaction.selected_link = None;
        self.mark_dirty();
        Some(id)
    }

    fn draw_unsaved_dialog(&mut self, ctx: &egui::Context) {
        if !self.file.show_unsaved_dialog {
            return;
        }
        let (title, confirm_label) = match self.file.pending_confirm_action {
            Some(PendingConfirmAction::Quit) => ("Unsaved changes: quit?", "Discard and Quit"),
            Some(PendingConfirmAction::New) => ("Unsaved changes: create new?", "Discard and Create New"),
            Some(PendingConfirmAction::Open) => ("Unsaved changes: open file?", "Discard and Open"),
            None => ("Unsaved changes", "Discard"),
        };
        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("You have unsaved changes. Are you sure you want to continue?");
                ui.horizontal(|ui| {
                    confirmed = ui.button(confirm_label).clicked();
                    cancelled = ui.button("Cancel").clicked();
                });
            });
        if confirmed {
            if let Some(action) = self.file.pending_confirm_action {
                self.run_confirmed(action, ctx);
            }
        }
        if confirmed || cancelled {
            self.file.show_unsaved_dialog = false;
            self.file.pending_confirm_action = None;
        }
    }

    fn draw_error_windows(&mut self, ctx: &egui::Context) {
        let mut dismissed = None;
        for (index, (title, message)) in self.open_errors.iter().enumerate() {
            egui::Window::new(title.as_str())
                .id(egui::Id::new(("error_window", index)))
                .collapsible(false)
                .resizable(false)
                .default_pos(egui::pos2(80.0, 80.0 + 30.0 * index as f32))
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        dismissed = Some(index);
                    }
                });
        }
        if let Some(index) = dismissed {
            self.open_errors.remove(index);
        }
    }
}

#[cfg(test)]
mod tests;
