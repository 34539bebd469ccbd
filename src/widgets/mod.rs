//! Widget renderers used by the properties panel.
//!
//! Renderers are looked up by the widget's type tag in a static registry. Unknown
//! tags fall back to a plain text field.

pub mod combo;

use self::combo::{filter_options, DataSourceCache, OptionsState};
use crate::constants::COMBO_RENDER_CAP;
use crate::node::widgets::{format_combo_value, WidgetDescriptor};
use crate::types::NodeId;
use eframe::egui;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{LazyLock, Mutex};

/// Per-frame context handed to renderers.
pub struct WidgetContext<'a> {
    /// Node owning the widget
    pub node_id: NodeId,
    /// Remote option lists
    pub data_sources: &'a mut DataSourceCache,
}

/// Draws one widget and edits `value` in place. Returns `true` if the value changed.
pub type WidgetRenderer = fn(&mut egui::Ui, &WidgetDescriptor, &mut Value, &mut WidgetContext<'_>) -> bool;

static REGISTRY: LazyLock<HashMap<&'static str, WidgetRenderer>> = LazyLock::new(|| {
    let mut registry: HashMap<&'static str, WidgetRenderer> = HashMap::new();
    registry.insert("text", render_text);
    registry.insert("textarea", render_textarea);
    registry.insert("number", render_number);
    registry.insert("integer", render_number);
    registry.insert("combo", render_combo);
    registry.insert("boolean", render_boolean);
    registry.insert("progress", render_progress);
    registry.insert("status", render_status);
    registry
});

static WARNED: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Whether a renderer is registered for `kind`.
pub fn is_registered(kind: &str) -> bool {
    REGISTRY.contains_key(kind)
}

/// Renderer for `kind`, or the text renderer when none is registered.
pub fn renderer_for(kind: &str) -> WidgetRenderer {
    match REGISTRY.get(kind) {
        Some(renderer) => *renderer,
        None => {
            if let Ok(mut warned) = WARNED.lock() {
                if warned.insert(kind.to_string()) {
                    log::warn!("No renderer for widget type '{kind}', using text");
                }
            }
            render_text
        }
    }
}

/// Draws a labelled widget row.
pub fn show_widget(
    ui: &mut egui::Ui,
    widget: &WidgetDescriptor,
    value: &mut Value,
    ctx: &mut WidgetContext<'_>,
) -> bool {
    let renderer = renderer_for(&widget.kind);
    ui.horizontal(|ui| {
        ui.label(&widget.label);
        renderer(ui, widget, value, ctx)
    })
    .inner
}

fn render_text(ui: &mut egui::Ui, _widget: &WidgetDescriptor, value: &mut Value, _ctx: &mut WidgetContext<'_>) -> bool {
    let mut text = format_combo_value(value);
    let changed = ui.text_edit_singleline(&mut text).changed();
    if changed {
        *value = Value::String(text);
    }
    changed
}

fn render_textarea(ui: &mut egui::Ui, _widget: &WidgetDescriptor, value: &mut Value, _ctx: &mut WidgetContext<'_>) -> bool {
    let mut text = format_combo_value(value);
    let changed = ui
        .add(egui::TextEdit::multiline(&mut text).desired_rows(3).desired_width(f32::INFINITY))
        .changed();
    if changed {
        *value = Value::String(text);
    }
    changed
}

fn render_number(ui: &mut egui::Ui, widget: &WidgetDescriptor, value: &mut Value, _ctx: &mut WidgetContext<'_>) -> bool {
    let options = &widget.options;
    let mut number = value.as_f64().unwrap_or(0.0);
    let mut drag = egui::DragValue::new(&mut number).speed(options.step.unwrap_or(1.0));
    if let (Some(min), Some(max)) = (options.min, options.max) {
        drag = drag.range(min..=max);
    }
    if widget.kind == "integer" {
        drag = drag.fixed_decimals(0);
    } else if let Some(precision) = options.precision {
        drag = drag.fixed_decimals(precision);
    }
    let changed = ui.add(drag).changed();
    if changed {
        *value = if widget.kind == "integer" {
            Value::from(number.round() as i64)
        } else {
            serde_json::Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
        };
    }
    changed
}

fn render_boolean(ui: &mut egui::Ui, _widget: &WidgetDescriptor, value: &mut Value, _ctx: &mut WidgetContext<'_>) -> bool {
    let mut checked = value.as_bool().unwrap_or(false);
    let changed = ui.checkbox(&mut checked, "").changed();
    if changed {
        *value = Value::Bool(checked);
    }
    changed
}

fn render_progress(ui: &mut egui::Ui, _widget: &WidgetDescriptor, value: &mut Value, _ctx: &mut WidgetContext<'_>) -> bool {
    let fraction = (value.as_f64().unwrap_or(0.0) / 100.0).clamp(0.0, 1.0) as f32;
    ui.add(egui::ProgressBar::new(fraction).show_percentage());
    false
}

fn render_status(ui: &mut egui::Ui, _widget: &WidgetDescriptor, value: &mut Value, _ctx: &mut WidgetContext<'_>) -> bool {
    ui.weak(format_combo_value(value));
    false
}

fn render_combo(ui: &mut egui::Ui, widget: &WidgetDescriptor, value: &mut Value, ctx: &mut WidgetContext<'_>) -> bool {
    let current = format_combo_value(value);
    let id = ui.make_persistent_id((ctx.node_id, &widget.key));

    let Some(source) = &widget.options.data_source else {
        let mut selected = current.clone();
        egui::ComboBox::from_id_salt(id)
            .selected_text(&selected)
            .show_ui(ui, |ui| {
                for option in &widget.options.values {
                    ui.selectable_value(&mut selected, option.clone(), option);
                }
            });
        if selected != current {
            *value = Value::String(selected);
            return true;
        }
        return false;
    };

    let remote = ctx
        .data_sources
        .get_or_start(ctx.node_id, &widget.key, source, Some(ui.ctx().clone()));
    remote.poll();
    let mut selected = current.clone();
    let loading = matches!(remote.state(), OptionsState::Loading);
    let failed = matches!(remote.state(), OptionsState::Fallback { .. });
    egui::ComboBox::from_id_salt(id)
        .selected_text(if loading && current.is_empty() { "Loading…" } else { current.as_str() })
        .show_ui(ui, |ui| {
            ui.add(egui::TextEdit::singleline(&mut remote.query).hint_text("Search…"));
            let (shown, total) = filter_options(remote.options(), &remote.query, COMBO_RENDER_CAP);
            egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
                for option in shown {
                    ui.selectable_value(&mut selected, option.clone(), option);
                }
            });
            if total > COMBO_RENDER_CAP {
                ui.weak(format!("{} more, refine the search", total - COMBO_RENDER_CAP));
            }
        });
    if failed {
        ui.weak("(offline)");
    }
    if selected != current {
        *value = Value::String(selected);
        return true;
    }
    false
}
