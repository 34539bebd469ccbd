//! Binding between a node's property bag and its editable controls.

use crate::types::{DataSource, ParamSpec};
use serde_json::{Map, Value};

/// Type-specific options of a widget.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WidgetOptions {
    /// Numeric lower bound
    pub min: Option<f64>,
    /// Numeric upper bound
    pub max: Option<f64>,
    /// Numeric step
    pub step: Option<f64>,
    /// Decimal places for numeric display
    pub precision: Option<usize>,
    /// Static combo values
    pub values: Vec<String>,
    /// Remote combo source
    pub data_source: Option<DataSource>,
}

/// One control bound to exactly one property key.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetDescriptor {
    /// Property key
    pub key: String,
    /// Widget type tag used for renderer lookup
    pub kind: String,
    /// Label shown next to the control
    pub label: String,
    /// Type-specific options
    pub options: WidgetOptions,
    /// Formatted value last synchronized from the property bag
    pub display_value: String,
}

impl WidgetDescriptor {
    /// Builds a descriptor from a parameter declaration.
    pub fn from_param(param: &ParamSpec) -> Self {
        Self {
            key: param.name.clone(),
            kind: if param.kind.is_empty() {
                "text".to_string()
            } else {
                param.kind.clone()
            },
            label: param.label.clone().unwrap_or_else(|| param.name.clone()),
            options: WidgetOptions {
                min: param.min,
                max: param.max,
                step: param.step,
                precision: param.precision,
                values: param.options.clone(),
                data_source: param.data_source.clone(),
            },
            display_value: String::new(),
        }
    }

    /// Whether the widget only displays a value (progress/status).
    pub fn is_read_only(&self) -> bool {
        matches!(self.kind.as_str(), "progress" | "status")
    }
}

/// Picks a default for a parameter: the explicit default, else a guess from its name.
pub fn default_for_param(param: &ParamSpec) -> Value {
    if let Some(value) = &param.default {
        return value.clone();
    }
    let name = param.name.to_ascii_lowercase();
    match param.kind.as_str() {
        "number" | "integer" => {
            let guess = if name.contains("period") || name.contains("window") || name.contains("length") {
                14.0
            } else if name.contains("days") {
                30.0
            } else if name.contains("limit") || name.contains("count") || name.starts_with("max") {
                10.0
            } else if name.contains("temperature") {
                0.7
            } else {
                param.min.unwrap_or(0.0)
            };
            let guess = clamp_number(guess, param.min, param.max);
            if param.kind == "integer" {
                Value::from(guess.round() as i64)
            } else {
                serde_json::Number::from_f64(guess)
                    .map(Value::Number)
                    .unwrap_or(Value::from(0))
            }
        }
        "boolean" => Value::Bool(
            name.starts_with("enable") || name.starts_with("show_") || name.starts_with("use_"),
        ),
        "combo" => param
            .options
            .first()
            .cloned()
            .or_else(|| param.data_source.as_ref().and_then(|d| d.fallback.first().cloned()))
            .map(Value::String)
            .unwrap_or(Value::String(String::new())),
        "progress" => Value::from(0),
        _ => {
            if name.contains("symbol") || name.contains("ticker") {
                Value::String("AAPL".to_string())
            } else {
                Value::String(String::new())
            }
        }
    }
}

fn clamp_number(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let mut v = value;
    if let Some(min) = min {
        v = v.max(min);
    }
    if let Some(max) = max {
        v = v.min(max);
    }
    v
}

/// Formats a combo value for display: strings verbatim, other values as JSON.
pub fn format_combo_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Formats any widget value according to its descriptor.
pub fn format_widget_value(widget: &WidgetDescriptor, value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    match widget.kind.as_str() {
        "number" | "integer" | "progress" => match value.as_f64() {
            Some(n) => match (widget.kind.as_str(), widget.options.precision) {
                ("integer", _) => format!("{}", n.round() as i64),
                (_, Some(p)) => format!("{n:.p$}"),
                _ => format!("{n}"),
            },
            None => format_combo_value(value),
        },
        "boolean" => match value.as_bool() {
            Some(true) => "on".to_string(),
            Some(false) => "off".to_string(),
            None => format_combo_value(value),
        },
        _ => format_combo_value(value),
    }
}

/// Owns the widgets of a node and keeps them in step with its properties.
#[derive(Debug, Clone, Default)]
pub struct WidgetManager {
    widgets: Vec<WidgetDescriptor>,
}

impl WidgetManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one widget per parameter and synchronizes their display values.
    pub fn materialize(&mut self, params: &[ParamSpec], properties: &Map<String, Value>) {
        self.widgets = params.iter().map(WidgetDescriptor::from_param).collect();
        self.sync_widget_values(properties);
    }

    /// All widgets in declaration order.
    pub fn widgets(&self) -> &[WidgetDescriptor] {
        &self.widgets
    }

    /// Widget bound to `key`.
    pub fn get(&self, key: &str) -> Option<&WidgetDescriptor> {
        self.widgets.iter().find(|w| w.key == key)
    }

    /// Number of widgets.
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// Whether there are no widgets.
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Refreshes every widget's display value from the property bag.
    pub fn sync_widget_values(&mut self, properties: &Map<String, Value>) {
        for widget in &mut self.widgets {
            widget.display_value = format_widget_value(widget, properties.get(&widget.key));
        }
    }

    /// Writes a new value for `key`, clamping numbers to the widget's range.
    ///
    /// Returns `false` if no widget is bound to `key`.
    pub fn apply_change(&mut self, key: &str, value: Value, properties: &mut Map<String, Value>) -> bool {
        let Some(widget) = self.widgets.iter_mut().find(|w| w.key == key) else {
            return false;
        };
        let value = match (widget.kind.as_str(), value.as_f64()) {
            ("number", Some(n)) => {
                serde_json::Number::from_f64(clamp_number(n, widget.options.min, widget.options.max))
                    .map(Value::Number)
                    .unwrap_or(value)
            }
            ("integer", Some(n)) => {
                Value::from(clamp_number(n, widget.options.min, widget.options.max).round() as i64)
            }
            _ => value,
        };
        widget.display_value = format_widget_value(widget, Some(&value));
        properties.insert(key.to_string(), value);
        true
    }

    /// Replaces the option list of a combo after an external change.
    ///
    /// The current value is kept when still offered, otherwise the first option is
    /// selected. Returns `true` if the property value changed.
    pub fn set_options(
        &mut self,
        key: &str,
        options: Vec<String>,
        properties: &mut Map<String, Value>,
    ) -> bool {
        let Some(widget) = self.widgets.iter_mut().find(|w| w.key == key) else {
            return false;
        };
        widget.options.values = options;
        let current = properties.get(key).map(format_combo_value).unwrap_or_default();
        if widget.options.values.contains(&current) {
            return false;
        }
        let replacement = widget.options.values.first().cloned().unwrap_or_default();
        widget.display_value = replacement.clone();
        properties.insert(key.to_string(), Value::String(replacement));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("period", "number").with_range(1.0, 200.0, 1.0),
            ParamSpec::new("enabled", "boolean"),
            ParamSpec::new("source", "combo").with_options(&["close", "open"]),
            ParamSpec::new("symbol", "text"),
            ParamSpec::new("note", "text").with_default(json!("hi")),
        ]
    }

    #[test]
    fn heuristic_defaults() {
        let p = params();
        assert_eq!(default_for_param(&p[0]), json!(14.0));
        assert_eq!(default_for_param(&p[1]), json!(true));
        assert_eq!(default_for_param(&p[2]), json!("close"));
        assert_eq!(default_for_param(&p[3]), json!("AAPL"));
        assert_eq!(default_for_param(&p[4]), json!("hi"));
    }

    #[test]
    fn integer_default_is_integral() {
        let p = ParamSpec::new("lookback_days", "integer");
        assert_eq!(default_for_param(&p), json!(30));
    }

    #[test]
    fn sync_formats_values() {
        let mut manager = WidgetManager::new();
        let mut props = Map::new();
        props.insert("period".into(), json!(20));
        props.insert("enabled".into(), json!(false));
        manager.materialize(&params(), &props);
        assert_eq!(manager.get("period").unwrap().display_value, "20");
        assert_eq!(manager.get("enabled").unwrap().display_value, "off");
        assert_eq!(manager.get("source").unwrap().display_value, "");
    }

    #[test]
    fn apply_change_clamps_numbers() {
        let mut manager = WidgetManager::new();
        let mut props = Map::new();
        manager.materialize(&params(), &props);
        assert!(manager.apply_change("period", json!(500.0), &mut props));
        assert_eq!(props["period"], json!(200.0));
        assert!(!manager.apply_change("missing", json!(1), &mut props));
    }

    #[test]
    fn set_options_keeps_or_replaces_value() {
        let mut manager = WidgetManager::new();
        let mut props = Map::new();
        props.insert("source".into(), json!("open"));
        manager.materialize(&params(), &props);

        assert!(!manager.set_options("source", vec!["open".into(), "high".into()], &mut props));
        assert_eq!(props["source"], json!("open"));

        assert!(manager.set_options("source", vec!["low".into()], &mut props));
        assert_eq!(props["source"], json!("low"));
        assert_eq!(manager.get("source").unwrap().display_value, "low");
    }

    #[test]
    fn format_combo_value_handles_non_strings() {
        assert_eq!(format_combo_value(&json!("x")), "x");
        assert_eq!(format_combo_value(&json!(3)), "3");
        assert_eq!(format_combo_value(&json!(null)), "");
    }

    #[test]
    fn precision_is_respected() {
        let mut p = ParamSpec::new("temperature", "number");
        p.precision = Some(2);
        let w = WidgetDescriptor::from_param(&p);
        assert_eq!(format_widget_value(&w, Some(&json!(0.7))), "0.70");
    }
}
