//! Built-in node types offered by the canvas context menu.

use super::image_gallery::{GridStrategy, ImageGalleryConfig, ScrollMode};
use super::overlay::OverlayKind;
use super::{BodyKind, FlowNode};
use crate::constants::*;
use crate::error::FlowError;
use crate::services::ServiceRegistry;
use crate::types::*;
use eframe::egui::Vec2;
use serde_json::{json, Map, Value};

/// Everything needed to instantiate one node type.
#[derive(Debug, Clone)]
pub struct NodeDefinition {
    /// Type name stored in serialized graphs
    pub type_name: &'static str,
    /// Default title
    pub title: &'static str,
    /// Context menu group
    pub category: &'static str,
    /// Slots and parameters
    pub spec: NodeSpec,
    /// Content shown in the node body
    pub body: BodyKind,
}

/// Registry of node definitions keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    definitions: Vec<NodeDefinition>,
}

fn typed(slots: &[(&str, Value)]) -> SlotDecl {
    let mut map = Map::new();
    for (name, ty) in slots {
        map.insert((*name).to_string(), ty.clone());
    }
    SlotDecl::Typed(map)
}

impl NodeCatalog {
    /// Catalog with the stock data, indicator, LLM, display and IO nodes.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();

        catalog.register(NodeDefinition {
            type_name: "SymbolSource",
            title: "Symbols",
            category: "Data",
            spec: NodeSpec {
                outputs: typed(&[("symbols", json!({"base": "list", "subtype": "symbol"}))]),
                params: vec![
                    ParamSpec::new("symbols", "text"),
                    ParamSpec::new("lookback_days", "integer").with_range(1.0, 3650.0, 1.0),
                ],
                ..Default::default()
            },
            body: BodyKind::Text,
        });

        catalog.register(NodeDefinition {
            type_name: "Indicator",
            title: "Indicator",
            category: "Indicators",
            spec: NodeSpec {
                inputs: typed(&[("prices", json!("series,number"))]),
                outputs: typed(&[("values", json!("series"))]),
                params: vec![
                    ParamSpec::new("indicator", "combo").with_options(&["RSI", "SMA", "EMA", "MACD"]),
                    ParamSpec::new("period", "integer").with_range(1.0, 500.0, 1.0),
                    ParamSpec::new("source", "combo").with_options(&["close", "open", "high", "low"]),
                ],
                ..Default::default()
            },
            body: BodyKind::Text,
        });

        let mut temperature = ParamSpec::new("temperature", "number").with_range(0.0, 2.0, 0.1);
        temperature.precision = Some(2);
        catalog.register(NodeDefinition {
            type_name: "LLMChat",
            title: "LLM Chat",
            category: "LLM",
            spec: NodeSpec {
                inputs: typed(&[("prompt", json!("string")), ("context", json!({"base": "any", "optional": true}))]),
                outputs: typed(&[("message", json!("message"))]),
                params: vec![
                    ParamSpec::new("model", "combo").with_data_source(DataSource {
                        endpoint: "http://127.0.0.1:8000/api/models".to_string(),
                        transform: Some("models".to_string()),
                        value_field: Some("id".to_string()),
                        fallback: vec!["gpt-4o-mini".to_string(), "llama3".to_string()],
                        ..Default::default()
                    }),
                    temperature,
                    ParamSpec::new("system_prompt", "textarea"),
                    ParamSpec::new("status", "status"),
                ],
                ..Default::default()
            },
            body: BodyKind::Text,
        });

        catalog.register(NodeDefinition {
            type_name: "TextOutput",
            title: "Text Output",
            category: "Display",
            spec: NodeSpec {
                inputs: SlotDecl::Names(vec!["value".to_string()]),
                ..Default::default()
            },
            body: BodyKind::Text,
        });

        catalog.register(NodeDefinition {
            type_name: "ImageDisplay",
            title: "Image",
            category: "Display",
            spec: NodeSpec {
                inputs: typed(&[("images", json!("image"))]),
                display_results: false,
                ..Default::default()
            },
            body: BodyKind::Image(ImageGalleryConfig::default()),
        });

        catalog.register(NodeDefinition {
            type_name: "ChartDisplay",
            title: "Charts",
            category: "Display",
            spec: NodeSpec {
                inputs: typed(&[("charts", json!("image"))]),
                display_results: false,
                ..Default::default()
            },
            body: BodyKind::Image(ImageGalleryConfig {
                grid: GridStrategy::TargetCell { size: GRID_TARGET_CELL },
                scroll: ScrollMode::Infinite { buffer: INFINITE_SCROLL_BUFFER },
                ..Default::default()
            }),
        });

        catalog.register(NodeDefinition {
            type_name: "HeatmapGallery",
            title: "Heatmaps",
            category: "Display",
            spec: NodeSpec {
                inputs: typed(&[("heatmaps", json!("image"))]),
                display_results: false,
                ..Default::default()
            },
            body: BodyKind::Image(ImageGalleryConfig {
                min_zoom: IMAGE_WIDE_MIN_ZOOM,
                merge_incremental: true,
                max_size: Vec2::new(1200.0, 1000.0),
                ..Default::default()
            }),
        });

        catalog.register(NodeDefinition {
            type_name: "Logging",
            title: "Log",
            category: "Display",
            spec: NodeSpec {
                inputs: SlotDecl::Names(vec!["value".to_string()]),
                display_results: false,
                ..Default::default()
            },
            body: BodyKind::Log,
        });

        catalog.register(NodeDefinition {
            type_name: "TextInput",
            title: "Text Input",
            category: "IO",
            spec: NodeSpec {
                outputs: typed(&[("text", json!("string"))]),
                params: vec![ParamSpec::new("value", "textarea")],
                display_results: false,
                ..Default::default()
            },
            body: BodyKind::Overlay(OverlayKind::TextInput, "value"),
        });

        catalog.register(NodeDefinition {
            type_name: "DiscordOutput",
            title: "Discord",
            category: "IO",
            spec: NodeSpec {
                inputs: typed(&[("message", json!("string,message"))]),
                params: vec![
                    ParamSpec::new("channel_id", "text"),
                    ParamSpec::new("message", "textarea"),
                ],
                ..Default::default()
            },
            body: BodyKind::Overlay(OverlayKind::DiscordOutput, "message"),
        });

        catalog
    }

    /// Adds or replaces a definition.
    pub fn register(&mut self, definition: NodeDefinition) {
        match self.definitions.iter_mut().find(|d| d.type_name == definition.type_name) {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
    }

    /// Definition for `type_name`.
    pub fn get(&self, type_name: &str) -> Option<&NodeDefinition> {
        self.definitions.iter().find(|d| d.type_name == type_name)
    }

    /// All definitions in registration order.
    pub fn definitions(&self) -> &[NodeDefinition] {
        &self.definitions
    }

    /// Distinct categories in registration order.
    pub fn categories(&self) -> Vec<&'static str> {
        let mut categories = Vec::new();
        for definition in &self.definitions {
            if !categories.contains(&definition.category) {
                categories.push(definition.category);
            }
        }
        categories
    }

    /// Instantiates a node of `type_name`.
    pub fn create(&self, type_name: &str, services: &ServiceRegistry) -> Result<FlowNode, FlowError> {
        let definition = self
            .get(type_name)
            .ok_or_else(|| FlowError::UnknownNodeType(type_name.to_string()))?;
        Ok(FlowNode::new(
            definition.type_name,
            definition.title,
            &definition.spec,
            definition.body,
            services,
        ))
    }
}
