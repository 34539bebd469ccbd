//! Mapping from slot data types to display colours.

use crate::types::{SlotType, TypeDescriptor};
use eframe::egui::Color32;
use std::collections::HashMap;

/// Colour used for `any` slots and unknown types.
pub const ANY_COLOR: Color32 = Color32::from_rgb(160, 160, 160);

/// Registry of colours per base type name.
#[derive(Debug, Clone)]
pub struct TypeColorRegistry {
    colors: HashMap<String, Color32>,
}

impl Default for TypeColorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            colors: HashMap::new(),
        };
        registry.register("number", Color32::from_rgb(120, 190, 255));
        registry.register("integer", Color32::from_rgb(90, 150, 240));
        registry.register("string", Color32::from_rgb(240, 190, 90));
        registry.register("boolean", Color32::from_rgb(230, 110, 110));
        registry.register("list", Color32::from_rgb(170, 130, 230));
        registry.register("dict", Color32::from_rgb(110, 210, 170));
        registry.register("image", Color32::from_rgb(240, 130, 200));
        registry.register("message", Color32::from_rgb(140, 220, 110));
        registry.register("symbols", Color32::from_rgb(250, 150, 60));
        registry.register("ohlcv", Color32::from_rgb(80, 200, 200));
        registry
    }
}

impl TypeColorRegistry {
    /// Registers or replaces the colour of a base type (case-insensitive).
    pub fn register(&mut self, type_name: &str, color: Color32) {
        self.colors.insert(type_name.to_ascii_lowercase(), color);
    }

    /// Colour of a slot type; unions use their first member.
    pub fn color_for(&self, slot_type: &SlotType) -> Color32 {
        slot_type
            .members()
            .first()
            .and_then(|name| self.colors.get(name))
            .copied()
            .unwrap_or(ANY_COLOR)
    }

    /// Colour of a declared type descriptor.
    pub fn color_for_descriptor(&self, descriptor: &TypeDescriptor) -> Color32 {
        self.color_for(&descriptor.slot_type())
    }

    /// Display string of a declared type descriptor.
    pub fn display_string(&self, descriptor: &TypeDescriptor) -> String {
        descriptor.display_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_types() {
        let registry = TypeColorRegistry::default();
        assert_ne!(registry.color_for(&SlotType::parse("Number")), ANY_COLOR);
        assert_eq!(registry.color_for(&SlotType::parse("mystery")), ANY_COLOR);
        assert_eq!(registry.color_for(&SlotType::Any), ANY_COLOR);
    }

    #[test]
    fn union_uses_first_member() {
        let registry = TypeColorRegistry::default();
        assert_eq!(
            registry.color_for(&SlotType::parse("string,number")),
            registry.color_for(&SlotType::parse("string"))
        );
    }
}
