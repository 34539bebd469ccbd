use super::*;
use crate::constants::{CANVAS_MAX_ZOOM, CANVAS_MIN_ZOOM, CANVAS_ZOOM_STEP};
use crate::node::image_gallery::WheelDeltaMode;
use crate::node::interactions::{input_slot_pos, output_slot_pos};
use eframe::egui::{self, pos2, vec2, Pos2, Rect};

fn raw_input(events: Vec<egui::Event>) -> egui::RawInput {
    let mut raw = egui::RawInput::default();
    raw.screen_rect = Some(Rect::from_min_size(Pos2::ZERO, vec2(1200.0, 800.0)));
    raw.events = events;
    raw
}

/// App whose canvas fills the screen with screen == world coordinates.
fn test_app() -> FlowCanvasApp {
    let mut app = FlowCanvasApp::default();
    app.canvas.centered = true;
    app.canvas.offset = (0.0, 0.0);
    app.canvas.zoom_factor = 1.0;
    app
}

/// Runs one headless frame drawing only the canvas.
fn run_canvas_frame(ctx: &egui::Context, app: &mut FlowCanvasApp, events: Vec<egui::Event>) {
    let _ = ctx.run(raw_input(events), |ctx| {
        ctx.set_visuals(egui::Visuals::dark());
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| app.draw_canvas(ui, 0.0));
    });
}

fn add_node(app: &mut FlowCanvasApp, type_name: &str, pos: Pos2) -> NodeId {
    let mut node = app.catalog.create(type_name, &app.services).expect("builtin node type");
    node.pos = pos;
    app.graph.add_node(node)
}

fn button(pos: Pos2, pressed: bool) -> egui::Event {
    egui::Event::PointerButton {
        pos,
        button: egui::PointerButton::Primary,
        pressed,
        modifiers: egui::Modifiers::NONE,
    }
}

fn click(ctx: &egui::Context, app: &mut FlowCanvasApp, pos: Pos2) {
    run_canvas_frame(ctx, app, vec![egui::Event::PointerMoved(pos)]);
    run_canvas_frame(ctx, app, vec![egui::Event::PointerMoved(pos), button(pos, true)]);
    run_canvas_frame(ctx, app, vec![button(pos, false)]);
}

fn shift_wheel(amount: f32) -> WheelEvent {
    WheelEvent {
        delta: vec2(0.0, amount),
        mode: WheelDeltaMode::Pixel,
        shift: true,
    }
}

fn gallery_zoom(app: &FlowCanvasApp, id: NodeId) -> f32 {
    match &app.graph.node(id).expect("node exists").body {
        NodeBody::Image(gallery) => gallery.zoom,
        _ => panic!("not an image node"),
    }
}

#[test]
fn clicking_node_title_selects_and_raises_it() {
    let mut app = test_app();
    let a = add_node(&mut app, "TextOutput", pos2(200.0, 150.0));
    let b = add_node(&mut app, "TextOutput", pos2(600.0, 150.0));
    assert_eq!(app.graph.order().last(), Some(&b));

    let ctx = egui::Context::default();
    click(&ctx, &mut app, pos2(260.0, 160.0));

    assert_eq!(app.interaction.selected_node, Some(a));
    assert_eq!(app.graph.order().last(), Some(&a));
    assert!(!app.interaction.canvas_owns_wheel);
}

#[test]
fn click_on_empty_canvas_clears_selection() {
    let mut app = test_app();
    let a = add_node(&mut app, "TextOutput", pos2(200.0, 150.0));
    app.interaction.selected_node = Some(a);

    let ctx = egui::Context::default();
    click(&ctx, &mut app, pos2(900.0, 600.0));

    assert_eq!(app.interaction.selected_node, None);
    assert!(app.interaction.canvas_owns_wheel);
}

#[test]
fn shift_wheel_over_image_node_zooms_the_image_not_the_canvas() {
    let mut app = test_app();
    let id = add_node(&mut app, "ImageDisplay", pos2(300.0, 200.0));
    let centre = app.graph.node(id).expect("node").rect().center();

    app.route_wheel(shift_wheel(50.0), centre, 0.0);

    assert!(gallery_zoom(&app, id) > 1.0);
    assert_eq!(app.canvas.zoom_factor, 1.0);
}

#[test]
fn press_on_background_keeps_wheel_on_canvas_until_node_press() {
    let mut app = test_app();
    let id = add_node(&mut app, "ImageDisplay", pos2(300.0, 200.0));
    let centre = app.graph.node(id).expect("node").rect().center();
    let ctx = egui::Context::default();

    click(&ctx, &mut app, pos2(50.0, 700.0));
    assert!(app.interaction.canvas_owns_wheel);

    app.route_wheel(shift_wheel(50.0), centre, 0.0);
    assert_eq!(gallery_zoom(&app, id), 1.0);
    assert!((app.canvas.zoom_factor - (1.0 + CANVAS_ZOOM_STEP)).abs() < 1e-4);

    // Pressing the node hands wheel events back to its content.
    let title = app.graph.node(id).expect("node").rect().left_top() + vec2(30.0, 8.0);
    let title = app.world_to_screen(title);
    click(&ctx, &mut app, title);
    assert!(!app.interaction.canvas_owns_wheel);

    let centre = app.world_to_screen(app.graph.node(id).expect("node").rect().center());
    let canvas_zoom = app.canvas.zoom_factor;
    app.route_wheel(shift_wheel(50.0), centre, 0.0);
    assert!(gallery_zoom(&app, id) > 1.0);
    assert_eq!(app.canvas.zoom_factor, canvas_zoom);
}

#[test]
fn canvas_zoom_stays_within_bounds_and_offset_finite() {
    let mut app = test_app();
    app.interaction.canvas_owns_wheel = true;
    let pointer = pos2(400.0, 300.0);

    for _ in 0..500 {
        app.route_wheel(shift_wheel(120.0), pointer, 0.0);
    }
    assert!(app.canvas.zoom_factor <= CANVAS_MAX_ZOOM + 1e-5);

    for _ in 0..1000 {
        app.route_wheel(shift_wheel(-3.0), pointer, 0.0);
    }
    assert!(app.canvas.zoom_factor >= CANVAS_MIN_ZOOM - 1e-5);
    assert!(app.canvas.offset.0.is_finite() && app.canvas.offset.1.is_finite());
}

#[test]
fn zooming_keeps_the_point_under_the_pointer_fixed() {
    let mut app = test_app();
    app.interaction.canvas_owns_wheel = true;
    let pointer = pos2(400.0, 300.0);
    let before = app.screen_to_world(pointer);

    app.route_wheel(shift_wheel(1.0), pointer, 0.0);

    let after = app.screen_to_world(pointer);
    assert!(before.distance(after) < 1e-3);
}

#[test]
fn dragging_from_output_to_input_creates_link() {
    let mut app = test_app();
    let source = add_node(&mut app, "TextInput", pos2(100.0, 100.0));
    let target = add_node(&mut app, "TextOutput", pos2(500.0, 100.0));
    let from = output_slot_pos(app.graph.node(source).expect("source").rect(), 0);
    let to = input_slot_pos(app.graph.node(target).expect("target").rect(), 0);

    let ctx = egui::Context::default();
    run_canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(from)]);
    run_canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(from), button(from, true)]);
    assert_eq!(app.interaction.connecting_from, Some((source, 0)));

    run_canvas_frame(&ctx, &mut app, vec![egui::Event::PointerMoved(to)]);
    run_canvas_frame(&ctx, &mut app, vec![button(to, false)]);

    let links = app.graph.links();
    assert_eq!(links.len(), 1);
    assert_eq!((links[0].from, links[0].to, links[0].to_slot), (source, target, 0));
    assert!(app.interaction.connecting_from.is_none());
    assert!(app.file.has_unsaved_changes);
}

#[test]
fn dropping_link_on_node_body_uses_first_compatible_input() {
    let mut app = test_app();
    let source = add_node(&mut app, "TextInput", pos2(100.0, 100.0));
    let chat = add_node(&mut app, "LLMChat", pos2(500.0, 100.0));
    let body = app.graph.node(chat).expect("chat").rect().center();

    app.interaction.connecting_from = Some((source, 0));
    app.finalize_connection(body);

    let links = app.graph.links();
    assert_eq!(links.len(), 1);
    assert_eq!((links[0].to, links[0].to_slot), (chat, 0));
}

#[test]
fn incompatible_drop_leaves_graph_unchanged() {
    let mut app = test_app();
    let symbols = add_node(&mut app, "SymbolSource", pos2(100.0, 100.0));
    let indicator = add_node(&mut app, "Indicator", pos2(500.0, 100.0));
    let input = input_slot_pos(app.graph.node(indicator).expect("indicator").rect(), 0);

    app.interaction.connecting_from = Some((symbols, 0));
    app.finalize_connection(input);

    assert!(app.graph.links().is_empty());
    assert!(!app.status.is_empty());
}

#[test]
fn delete_key_removes_selected_node_and_its_links() {
    let mut app = test_app();
    let source = add_node(&mut app, "TextInput", pos2(100.0, 100.0));
    let target = add_node(&mut app, "TextOutput", pos2(500.0, 100.0));
    app.graph.connect(source, 0, target, 0).expect("compatible slots");
    app.interaction.selected_node = Some(target);

    let ctx = egui::Context::default();
    let delete = egui::Event::Key {
        key: egui::Key::Delete,
        physical_key: Some(egui::Key::Delete),
        pressed: true,
        repeat: false,
        modifiers: egui::Modifiers::NONE,
    };
    let _ = ctx.run(raw_input(vec![delete]), |ctx| app.handle_delete_key(ctx));

    assert!(app.graph.node(target).is_none());
    assert!(app.graph.links().is_empty());
    assert_eq!(app.interaction.selected_node, None);
}

#[test]
fn creating_node_from_menu_places_and_selects_it() {
    let mut app = test_app();
    app.settings.snap_to_grid = true;
    app.context_menu.world_pos = (103.0, 98.0);

    let id = app.create_node_at("Logging").expect("known type");

    let node = app.graph.node(id).expect("created");
    assert_eq!(node.pos, pos2(100.0, 100.0));
    assert_eq!(app.interaction.selected_node, Some(id));
    assert!(app.create_node_at("NoSuchNode").is_none());
}

#[test]
fn app_state_round_trips_through_json() {
    let mut app = test_app();
    let source = add_node(&mut app, "TextInput", pos2(100.0, 100.0));
    let target = add_node(&mut app, "TextOutput", pos2(500.0, 100.0));
    app.graph.connect(source, 0, target, 0).expect("compatible slots");
    app.canvas.zoom_factor = 1.5;
    app.dark_mode = false;
    app.settings.server_url = "ws://example.test/ws".to_string();

    let json = app.to_json().expect("serializes");
    let restored = FlowCanvasApp::from_json(&json).expect("deserializes");

    assert_eq!(restored.graph.serialize(), app.graph.serialize());
    assert_eq!(restored.canvas.zoom_factor, 1.5);
    assert!(!restored.dark_mode);
    assert_eq!(restored.settings.server_url, "ws://example.test/ws");
}

#[test]
fn loading_graph_skips_unknown_types_and_rejects_garbage() {
    let mut app = test_app();
    let known = add_node(&mut app, "TextOutput", pos2(0.0, 0.0));
    let mut data = app.graph.serialize();
    let mut unknown = data.nodes[0].clone();
    unknown.id = uuid::Uuid::new_v4();
    unknown.node_type = "Vanished".to_string();
    data.nodes.push(unknown);
    let json = data.to_json().expect("serializes");

    app.load_graph_json(&json).expect("valid document");
    assert_eq!(app.graph.len(), 1);
    assert!(app.graph.node(known).is_some());

    assert!(app.load_graph_json("{ not json").is_err());
    assert_eq!(app.graph.len(), 1);
}

#[test]
fn deleting_node_marks_graph_dirty() {
    let mut app = test_app();
    let id = add_node(&mut app, "TextOutput", pos2(0.0, 0.0));
    app.graph.node_mut(id).expect("node").set_progress(40.0, Some("working"));
    app.delete_node(id);
    assert!(app.graph.is_empty());
    assert!(app.file.has_unsaved_changes);
}

#[test]
fn drawing_canvas_with_nodes_and_links_produces_shapes() {
    let mut app = test_app();
    let source = add_node(&mut app, "TextInput", pos2(100.0, 100.0));
    let target = add_node(&mut app, "ImageDisplay", pos2(500.0, 100.0));
    let _ = app.graph.connect(source, 0, target, 0);
    let ctx = egui::Context::default();

    let output = ctx.run(raw_input(Vec::new()), |ctx| {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| app.draw_canvas(ui, 0.0));
    });

    assert!(!output.shapes.is_empty());
    assert_eq!(app.canvas_rect.min, Pos2::ZERO);
}

#[test]
fn unload_guard_changes_only_when_unsaved_state_flips() {
    let mut app = test_app();
    assert_eq!(app.file.sync_unload_guard(false), None);
    assert_eq!(app.file.sync_unload_guard(true), Some(true));
    for _ in 0..3 {
        assert_eq!(app.file.sync_unload_guard(true), None);
    }
    assert_eq!(app.file.sync_unload_guard(false), Some(false));
    assert!(!app.file.unload_guard_installed);
}
