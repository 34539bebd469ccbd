//! # Flow Canvas
//!
//! A node-graph editor for data, indicator and LLM pipelines. Nodes declare typed
//! input and output slots and editable parameters; a remote engine executes the
//! graph upstream of a chosen node and streams results back over a WebSocket.
//!
//! ## Features
//! - Typed slots with validated links and per-type colours
//! - Parameter widgets (numbers, text, combos with remote option lists)
//! - Result display: wrapped text, image and chart galleries, streaming logs
//! - Inline text editors for input/output nodes
//! - Canvas panning and zooming with wheel routing into node content
//! - Graph save/load as JSON and PNG export of gallery images

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod display;
pub mod error;
pub mod execution;
pub mod graph;
pub mod node;
pub mod profiler;
pub mod scheduler;
pub mod services;
pub mod theme;
pub mod transform;
pub mod type_colors;
pub mod types;
pub mod ui;
pub mod widgets;

pub use error::FlowError;
pub use types::*;
pub use ui::FlowCanvasApp;

/// Runs the editor in a native window.
///
/// Must be called from within a tokio runtime, which file dialogs and the
/// execution socket run on.
///
/// # Example
///
/// ```no_run
/// #[tokio::main]
/// async fn main() -> Result<(), eframe::Error> {
///     flow_canvas::run_app()
/// }
/// ```
#[cfg(not(target_arch = "wasm32"))]
pub fn run_app() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Flow Canvas",
        options,
        Box::new(|cc| Ok(Box::new(FlowCanvasApp::new(cc)))),
    )
}

/// Starts the editor on a canvas element of the hosting page.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub async fn start(canvas: web_sys::HtmlCanvasElement) -> Result<(), wasm_bindgen::JsValue> {
    eframe::WebRunner::new()
        .start(
            canvas,
            eframe::WebOptions::default(),
            Box::new(|cc| Ok(Box::new(FlowCanvasApp::new(cc)))),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_app_starts_empty() {
        let app = FlowCanvasApp::default();
        assert!(app.graph.is_empty());
        assert!(!app.file.has_unsaved_changes);
        assert!(app.execution.is_none());
    }

    #[test]
    fn every_catalog_entry_is_offered() {
        let app = FlowCanvasApp::default();
        let categories = app.catalog.categories();
        for definition in app.catalog.definitions() {
            assert!(categories.contains(&definition.category));
        }
    }
}
