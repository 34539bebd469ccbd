//! Core data types and structures for the flow canvas.
//!
//! This module defines the declarative node specification (slots, params, data
//! sources), the semantic state every node carries, the tagged result payload and
//! the serializable graph snapshot used for save/load and execution requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for graph nodes.
pub type NodeId = Uuid;

/// Unique identifier for links between slots.
pub type LinkId = Uuid;

/// The data type carried by an input or output slot.
///
/// `Any` replaces the numeric `0` sentinel of loosely typed editors so that it can
/// never be mistaken for an empty type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SlotType {
    /// Accepts or produces any value
    #[default]
    Any,
    /// A named type; comma-separated names denote a union (`"number,string"`)
    Named(String),
}

impl SlotType {
    /// Parses a type name. Empty strings, `"*"`, `"0"` and `"any"` map to [`SlotType::Any`].
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed == "*"
            || trimmed == "0"
            || trimmed.eq_ignore_ascii_case("any")
        {
            SlotType::Any
        } else {
            SlotType::Named(trimmed.to_string())
        }
    }

    /// Individual lowercase type names of a (possibly union) type.
    pub fn members(&self) -> Vec<String> {
        match self {
            SlotType::Any => Vec::new(),
            SlotType::Named(name) => name
                .split(',')
                .map(|part| part.trim().to_ascii_lowercase())
                .filter(|part| !part.is_empty())
                .collect(),
        }
    }

    /// Returns true if a value of type `output` may be connected into a slot of this type.
    pub fn accepts(&self, output: &SlotType) -> bool {
        match (self, output) {
            (SlotType::Any, _) | (_, SlotType::Any) => true,
            _ => {
                let wanted = self.members();
                output.members().iter().any(|m| wanted.contains(m))
            }
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Any => write!(f, "any"),
            SlotType::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Declared type of a slot, either a bare name or a structured descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDescriptor {
    /// Plain type name such as `"number"`
    Simple(String),
    /// Structured type such as `{ "base": "list", "subtype": "number" }`
    Detailed {
        /// Base type name
        base: String,
        /// Element type for containers
        #[serde(default)]
        subtype: Option<Box<TypeDescriptor>>,
        /// Whether the slot may be left unconnected
        #[serde(default)]
        optional: bool,
    },
}

impl TypeDescriptor {
    /// Human readable form, e.g. `list<number>` or `number?`.
    pub fn display_string(&self) -> String {
        match self {
            TypeDescriptor::Simple(name) => name.clone(),
            TypeDescriptor::Detailed {
                base,
                subtype,
                optional,
            } => {
                let mut out = match subtype {
                    Some(inner) => format!("{}<{}>", base, inner.display_string()),
                    None => base.clone(),
                };
                if *optional {
                    out.push('?');
                }
                out
            }
        }
    }

    /// The slot type used for connection validation (the base name only).
    pub fn slot_type(&self) -> SlotType {
        match self {
            TypeDescriptor::Simple(name) => SlotType::parse(name),
            TypeDescriptor::Detailed { base, .. } => SlotType::parse(base),
        }
    }
}

/// Declarative list of input or output slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotDecl {
    /// Untyped slot names
    Names(Vec<String>),
    /// Slot name to type descriptor, in declaration order
    Typed(serde_json::Map<String, Value>),
}

impl Default for SlotDecl {
    fn default() -> Self {
        SlotDecl::Names(Vec::new())
    }
}

impl SlotDecl {
    /// Resolves the declaration into `(name, descriptor)` pairs, preserving order.
    ///
    /// Descriptors that fail to parse degrade to `any`.
    pub fn entries(&self) -> Vec<(String, TypeDescriptor)> {
        match self {
            SlotDecl::Names(names) => names
                .iter()
                .map(|n| (n.clone(), TypeDescriptor::Simple("any".to_string())))
                .collect(),
            SlotDecl::Typed(map) => map
                .iter()
                .map(|(name, raw)| {
                    let descriptor = serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                        log::warn!("Invalid type descriptor for slot '{name}': {err}");
                        TypeDescriptor::Simple("any".to_string())
                    });
                    (name.clone(), descriptor)
                })
                .collect(),
        }
    }
}

/// HTTP method of a remote combo data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    #[default]
    Get,
    /// POST request
    Post,
}

/// Remote option list for a combo widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DataSource {
    /// URL to fetch
    pub endpoint: String,
    /// Request method
    pub method: HttpMethod,
    /// Extra request headers
    pub headers: HashMap<String, String>,
    /// Key used to unwrap the response object before reading the list
    pub transform: Option<String>,
    /// Field projected out of each list item when items are objects
    #[serde(rename = "valueField")]
    pub value_field: Option<String>,
    /// Options shown when the fetch fails
    pub fallback: Vec<String>,
}

/// Declaration of one editable node parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParamSpec {
    /// Property key the parameter binds to
    pub name: String,
    /// Widget type tag (`text`, `number`, `integer`, `combo`, `boolean`, `textarea`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Explicit default value
    pub default: Option<Value>,
    /// Optional label; defaults to the name
    pub label: Option<String>,
    /// Numeric lower bound
    pub min: Option<f64>,
    /// Numeric upper bound
    pub max: Option<f64>,
    /// Numeric step
    pub step: Option<f64>,
    /// Decimal places shown for numbers
    pub precision: Option<usize>,
    /// Static combo options
    pub options: Vec<String>,
    /// Remote combo options
    #[serde(rename = "dataSource")]
    pub data_source: Option<DataSource>,
}

impl ParamSpec {
    /// Convenience constructor used by the node catalog.
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    /// Sets the explicit default.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets numeric bounds.
    pub fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self
    }

    /// Sets static combo options.
    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    /// Attaches a remote data source.
    pub fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_source = Some(source);
        self
    }
}

/// Declarative description of a node type: slots, parameters and display options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    /// Input slots
    pub inputs: SlotDecl,
    /// Output slots
    pub outputs: SlotDecl,
    /// Editable parameters
    pub params: Vec<ParamSpec>,
    /// Whether results are summarized on the node face
    pub display_results: bool,
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self {
            inputs: SlotDecl::default(),
            outputs: SlotDecl::default(),
            params: Vec::new(),
            display_results: true,
        }
    }
}

/// Execution result normalized into the shapes nodes know how to display.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeResult {
    /// A chat-style message
    ChatMessage {
        /// Speaker role, if present
        role: Option<String>,
        /// Message body
        content: String,
        /// Number of tool calls attached to the message
        tool_calls: usize,
    },
    /// Label to image data URL
    ImageSet(Vec<(String, String)>),
    /// Ticker symbols
    SymbolList(Vec<String>),
    /// Anything else
    Generic(Value),
}

impl NodeResult {
    /// Classifies a payload using the producer's declared output type first and the
    /// payload's shape second.
    pub fn classify(value: &Value, declared: Option<&SlotType>) -> Self {
        let declared_name = declared
            .map(|t| t.members().join(","))
            .unwrap_or_default();
        let hint_images = declared_name.contains("image");
        let hint_chat = declared_name.contains("message") || declared_name.contains("chat");
        let hint_symbols = declared_name.contains("symbol");

        if let Some(images) = Self::image_map(value) {
            if hint_images || !(hint_chat || hint_symbols) {
                return NodeResult::ImageSet(images);
            }
        }
        if let Some(obj) = value.as_object() {
            if let Some(content) = obj.get("content") {
                if hint_chat || !(hint_images || hint_symbols) {
                    let content = match content {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    return NodeResult::ChatMessage {
                        role: obj.get("role").and_then(Value::as_str).map(str::to_string),
                        content,
                        tool_calls: obj
                            .get("tool_calls")
                            .and_then(Value::as_array)
                            .map(Vec::len)
                            .unwrap_or(0),
                    };
                }
            }
            if let Some(symbols) = obj.get("symbols").and_then(Value::as_array) {
                return NodeResult::SymbolList(
                    symbols
                        .iter()
                        .map(|s| match s {
                            Value::String(s) => s.clone(),
                            Value::Object(o) => o
                                .get("ticker")
                                .or_else(|| o.get("symbol"))
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            other => other.to_string(),
                        })
                        .collect(),
                );
            }
        }
        NodeResult::Generic(value.clone())
    }

    /// Extracts an `images: { label: dataURL }` map from a payload.
    pub fn image_map(value: &Value) -> Option<Vec<(String, String)>> {
        let images = value.get("images")?.as_object()?;
        let entries: Vec<(String, String)> = images
            .iter()
            .filter_map(|(label, data)| data.as_str().map(|d| (label.clone(), d.to_string())))
            .collect();
        Some(entries)
    }
}

/// Semantic state of a node, mutated by the execution layer and read by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    /// Last received payload
    pub result: Option<Value>,
    /// Truncated summary of `result` shown on the node face
    pub display_text: String,
    /// Last reported error
    pub error: Option<String>,
    /// `-1` for "no progress", else `0..=100`
    pub progress: f32,
    /// Label drawn on the progress bar
    pub progress_text: String,
    /// Whether the execution engine is currently running this node
    pub is_executing: bool,
    /// Time (seconds) at which the last highlight was triggered
    pub highlight_started_at: Option<f64>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            result: None,
            display_text: String::new(),
            error: None,
            progress: -1.0,
            progress_text: String::new(),
            is_executing: false,
            highlight_started_at: None,
        }
    }
}

/// Serializable snapshot of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    /// Node id
    pub id: NodeId,
    /// Catalog type name
    #[serde(rename = "type")]
    pub node_type: String,
    /// Title shown in the title bar
    pub title: String,
    /// Top-left position in world units
    pub pos: (f32, f32),
    /// Width/height in world units
    pub size: (f32, f32),
    /// Property bag
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
}

/// Directed link from an output slot to an input slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Link id
    pub id: LinkId,
    /// Source node
    pub from: NodeId,
    /// Output slot index on the source node
    pub from_slot: usize,
    /// Destination node
    pub to: NodeId,
    /// Input slot index on the destination node
    pub to_slot: usize,
}

impl Link {
    /// Creates a new link with a fresh id.
    pub fn new(from: NodeId, from_slot: usize, to: NodeId, to_slot: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            from_slot,
            to,
            to_slot,
        }
    }
}

/// Serializable snapshot of a whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SerializedGraph {
    /// Nodes in draw order
    pub nodes: Vec<SerializedNode>,
    /// Links between slots
    pub links: Vec<Link>,
}

impl SerializedGraph {
    /// Serialize the graph to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a graph from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_type_parse_sentinels() {
        assert_eq!(SlotType::parse(""), SlotType::Any);
        assert_eq!(SlotType::parse("0"), SlotType::Any);
        assert_eq!(SlotType::parse("*"), SlotType::Any);
        assert_eq!(SlotType::parse("ANY"), SlotType::Any);
        assert_eq!(SlotType::parse("number"), SlotType::Named("number".into()));
    }

    #[test]
    fn test_slot_type_accepts_unions() {
        let input = SlotType::parse("number,string");
        assert!(input.accepts(&SlotType::parse("String")));
        assert!(!input.accepts(&SlotType::parse("image")));
        assert!(input.accepts(&SlotType::Any));
        assert!(SlotType::Any.accepts(&SlotType::parse("image")));
    }

    #[test]
    fn test_type_descriptor_display() {
        let d: TypeDescriptor =
            serde_json::from_value(json!({"base": "list", "subtype": "number", "optional": true}))
                .unwrap();
        assert_eq!(d.display_string(), "list<number>?");
        assert_eq!(d.slot_type(), SlotType::Named("list".into()));
    }

    #[test]
    fn test_slot_decl_forms() {
        let names: SlotDecl = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(names.entries().len(), 2);

        let typed: SlotDecl =
            serde_json::from_value(json!({"zeta": "number", "alpha": {"base": "string"}})).unwrap();
        let entries = typed.entries();
        assert_eq!(entries[0].0, "zeta");
        assert_eq!(entries[1].1.display_string(), "string");
    }

    #[test]
    fn test_param_spec_deserializes_js_style_keys() {
        let p: ParamSpec = serde_json::from_value(json!({
            "name": "model",
            "type": "combo",
            "dataSource": {"endpoint": "http://x", "valueField": "id", "fallback": ["a"]}
        }))
        .unwrap();
        let ds = p.data_source.unwrap();
        assert_eq!(ds.value_field.as_deref(), Some("id"));
        assert_eq!(ds.fallback, vec!["a".to_string()]);
        assert_eq!(ds.method, HttpMethod::Get);
    }

    #[test]
    fn test_classify_chat_message() {
        let v = json!({"role": "assistant", "content": "hi", "tool_calls": [{}, {}]});
        assert_eq!(
            NodeResult::classify(&v, None),
            NodeResult::ChatMessage {
                role: Some("assistant".into()),
                content: "hi".into(),
                tool_calls: 2
            }
        );
    }

    #[test]
    fn test_classify_uses_declared_type() {
        // Has both shapes; the declared output type decides.
        let v = json!({"images": {"a": "data:"}, "content": "x"});
        let declared = SlotType::parse("message");
        assert!(matches!(
            NodeResult::classify(&v, Some(&declared)),
            NodeResult::ChatMessage { .. }
        ));
        assert!(matches!(
            NodeResult::classify(&v, None),
            NodeResult::ImageSet(_)
        ));
    }

    #[test]
    fn test_classify_symbols_and_generic() {
        let v = json!({"symbols": ["AAPL", {"ticker": "MSFT"}]});
        assert_eq!(
            NodeResult::classify(&v, None),
            NodeResult::SymbolList(vec!["AAPL".into(), "MSFT".into()])
        );
        assert!(matches!(
            NodeResult::classify(&json!(42), None),
            NodeResult::Generic(_)
        ));
    }

    #[test]
    fn test_node_state_default_has_no_progress() {
        let state = NodeState::default();
        assert_eq!(state.progress, -1.0);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_graph_roundtrip_serialization() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let graph = SerializedGraph {
            nodes: vec![SerializedNode {
                id: a,
                node_type: "TextOutput".into(),
                title: "Out".into(),
                pos: (10.0, 20.0),
                size: (200.0, 80.0),
                properties: serde_json::Map::new(),
            }],
            links: vec![Link::new(a, 0, b, 1)],
        };
        let json = graph.to_json().unwrap();
        assert!(json.contains("\"type\": \"TextOutput\""));
        assert_eq!(SerializedGraph::from_json(&json).unwrap(), graph);
    }
}
