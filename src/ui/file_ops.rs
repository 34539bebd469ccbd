//! File operations for saving and loading graphs and exporting images.
//!
//! Native builds use `rfd` dialogs on the tokio runtime; browser builds use a
//! temporary anchor for downloads and a hidden file input for uploads. Results
//! come back to the app through the [`FileOperationResult`] channel.

use super::state::{FileOperationResult, FlowCanvasApp, PendingLoadOperation, PendingSaveOperation};
use crate::error::FlowError;
use crate::graph::Graph;
use crate::types::SerializedGraph;
use eframe::egui;

/// Default file name offered by "Save As".
const DEFAULT_FILE_NAME: &str = "graph.json";

impl FlowCanvasApp {
    /// Processes finished file operations and starts requested ones.
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.file.file_operation_receiver.try_recv() {
            match result {
                FileOperationResult::SaveCompleted(path) => {
                    self.set_status(format!("Saved {path}"));
                    self.file.current_path = Some(path);
                    self.file.has_unsaved_changes = false;
                }
                FileOperationResult::LoadCompleted(path, content) => match self.load_graph_json(&content) {
                    Ok(()) => {
                        self.set_status(format!("Opened {path}"));
                        self.file.current_path = Some(path);
                        self.file.has_unsaved_changes = false;
                    }
                    Err(err) => {
                        log::error!("Failed to parse {path}: {err}");
                        self.status = err.to_string();
                    }
                },
                FileOperationResult::ExportCompleted(path) => {
                    self.set_status(format!("Exported {path}"));
                }
                FileOperationResult::OperationFailed(err) => {
                    log::error!("{err}");
                    self.status = err.to_string();
                }
            }
        }

        if let Some(save_op) = self.file.pending_save_operation.take() {
            self.start_save(save_op, ctx);
        }

        if let Some(PendingLoadOperation::Load) = self.file.pending_load_operation.take() {
            self.start_load(ctx);
        }

        if let Some(export) = self.file.pending_export.take() {
            let sender = self.file.file_operation_sender.clone();

            #[cfg(target_arch = "wasm32")]
            {
                let result = match trigger_download(&export.file_name, &export.bytes, "image/png") {
                    Ok(()) => FileOperationResult::ExportCompleted(export.file_name),
                    Err(err) => FileOperationResult::OperationFailed(err),
                };
                let _ = sender.send(result);
                ctx.request_repaint();
            }

            #[cfg(not(target_arch = "wasm32"))]
            {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Some(handle) = rfd::AsyncFileDialog::new()
                        .add_filter("PNG", &["png"])
                        .set_file_name(&export.file_name)
                        .save_file()
                        .await
                    {
                        let path = handle.path().display().to_string();
                        let result = match std::fs::write(handle.path(), &export.bytes) {
                            Ok(()) => FileOperationResult::ExportCompleted(path),
                            Err(e) => FileOperationResult::OperationFailed(FlowError::File(format!(
                                "Failed to write {path}: {e}"
                            ))),
                        };
                        let _ = sender.send(result);
                    }
                    ctx.request_repaint();
                });
            }
        }
    }

    fn start_save(&mut self, save_op: PendingSaveOperation, ctx: &egui::Context) {
        let graph_json = match self.graph.serialize().to_json() {
            Ok(json) => json,
            Err(err) => {
                log::error!("Failed to serialize graph: {err}");
                self.status = format!("Save failed: {err}");
                return;
            }
        };
        let sender = self.file.file_operation_sender.clone();

        #[cfg(target_arch = "wasm32")]
        {
            // The browser cannot write back to a previous path; every save downloads.
            let _ = save_op;
            let file_name = self
                .file
                .current_path
                .clone()
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
            let result = match trigger_download(&file_name, graph_json.as_bytes(), "application/json") {
                Ok(()) => FileOperationResult::SaveCompleted(file_name),
                Err(err) => FileOperationResult::OperationFailed(err),
            };
            let _ = sender.send(result);
            ctx.request_repaint();
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let ctx = ctx.clone();
            let existing = match save_op {
                PendingSaveOperation::Save => self.file.current_path.clone(),
                PendingSaveOperation::SaveAs => None,
            };
            tokio::spawn(async move {
                let path = match existing {
                    Some(path) => Some(std::path::PathBuf::from(path)),
                    None => rfd::AsyncFileDialog::new()
                        .add_filter("JSON", &["json"])
                        .set_file_name(DEFAULT_FILE_NAME)
                        .save_file()
                        .await
                        .map(|handle| handle.path().to_path_buf()),
                };
                if let Some(path) = path {
                    let display = path.display().to_string();
                    let result = match std::fs::write(&path, graph_json) {
                        Ok(()) => FileOperationResult::SaveCompleted(display),
                        Err(e) => FileOperationResult::OperationFailed(FlowError::File(format!(
                            "Failed to save {display}: {e}"
                        ))),
                    };
                    let _ = sender.send(result);
                }
                ctx.request_repaint();
            });
        }
    }

    fn start_load(&mut self, ctx: &egui::Context) {
        let ctx = ctx.clone();
        let sender = self.file.file_operation_sender.clone();

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(async move {
                match show_open_file_picker().await {
                    Some(file) => {
                        let file_name = file.name();
                        let result = match read_file(file).await {
                            Ok(content) => FileOperationResult::LoadCompleted(file_name, content),
                            Err(err) => FileOperationResult::OperationFailed(err),
                        };
                        let _ = sender.send(result);
                    }
                    None => log::debug!("Open dialog cancelled"),
                }
                ctx.request_repaint();
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::spawn(async move {
                if let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter("JSON", &["json"])
                    .pick_file()
                    .await
                {
                    let path = handle.path().display().to_string();
                    let result = match std::fs::read_to_string(handle.path()) {
                        Ok(json) => FileOperationResult::LoadCompleted(path, json),
                        Err(e) => FileOperationResult::OperationFailed(FlowError::File(format!(
                            "Failed to read {path}: {e}"
                        ))),
                    };
                    let _ = sender.send(result);
                }
                ctx.request_repaint();
            });
        }
    }

    /// Replaces the current graph with a serialized one.
    ///
    /// Nodes of unknown types are skipped; a malformed document leaves the current
    /// graph untouched.
    pub fn load_graph_json(&mut self, json: &str) -> Result<(), FlowError> {
        let data = SerializedGraph::from_json(json)?;
        let graph = Graph::from_serialized(&data, &self.catalog, &self.services);
        if graph.len() < data.nodes.len() {
            log::warn!("Loaded {} of {} nodes", graph.len(), data.nodes.len());
        }
        self.replace_graph(graph);
        Ok(())
    }

    /// Asks for a destination and saves the graph there.
    pub fn save_as_graph(&mut self) {
        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
    }

    /// Saves to the current path, or behaves like "Save As" when there is none.
    pub fn save_graph(&mut self) {
        if self.file.current_path.is_some() {
            self.file.pending_save_operation = Some(PendingSaveOperation::Save);
        } else {
            self.save_as_graph();
        }
    }

    /// Opens a file picker and loads the chosen graph.
    pub fn load_graph(&mut self) {
        self.file.pending_load_operation = Some(PendingLoadOperation::Load);
    }

    /// Starts over with an empty graph.
    pub fn new_graph(&mut self) {
        self.replace_graph(Graph::new());
        self.file.current_path = None;
        self.file.has_unsaved_changes = false;
        self.canvas.offset = (0.0, 0.0);
        self.canvas.zoom_factor = 1.0;
        self.canvas.centered = false;
        self.status.clear();
    }
}

/// Triggers a browser download of `bytes`.
#[cfg(target_arch = "wasm32")]
fn trigger_download(file_name: &str, bytes: &[u8], mime: &str) -> Result<(), FlowError> {
    use wasm_bindgen::JsCast;

    let fail = |what: &str| FlowError::File(what.to_string());
    let window = web_sys::window().ok_or_else(|| fail("no window"))?;
    let document = window.document().ok_or_else(|| fail("no document"))?;

    let parts = js_sys::Array::new();
    parts.push(&js_sys::Uint8Array::from(bytes));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(mime);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|_| fail("failed to create blob"))?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(|_| fail("failed to create object URL"))?;

    let anchor = document
        .create_element("a")
        .map_err(|_| fail("failed to create anchor"))?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|_| fail("failed to cast anchor"))?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    anchor.style().set_property("display", "none").ok();

    let body = document.body().ok_or_else(|| fail("no body"))?;
    body.append_child(&anchor).map_err(|_| fail("failed to append anchor"))?;
    anchor.click();
    body.remove_child(&anchor).map_err(|_| fail("failed to remove anchor"))?;
    web_sys::Url::revoke_object_url(&url).map_err(|_| fail("failed to revoke object URL"))?;
    Ok(())
}

/// Shows a hidden file input and waits for the user's choice.
#[cfg(target_arch = "wasm32")]
async fn show_open_file_picker() -> Option<web_sys::File> {
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;

    let document = web_sys::window()?.document()?;
    let input = document
        .create_element("input")
        .ok()?
        .dyn_into::<web_sys::HtmlInputElement>()
        .ok()?;
    input.set_type("file");
    input.set_accept(".json,application/json");
    input.style().set_property("display", "none").ok()?;

    let (sender, receiver) = futures::channel::oneshot::channel::<Option<web_sys::File>>();
    let sender = std::rc::Rc::new(std::cell::RefCell::new(Some(sender)));
    let onchange = Closure::wrap(Box::new(move |event: web_sys::Event| {
        let file = event
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
            .and_then(|input| input.files())
            .and_then(|files| files.get(0));
        if let Some(sender) = sender.borrow_mut().take() {
            let _ = sender.send(file);
        }
    }) as Box<dyn FnMut(_)>);
    input.set_onchange(Some(onchange.as_ref().unchecked_ref()));
    onchange.forget();

    document.body()?.append_child(&input).ok()?;
    input.click();
    let file = receiver.await.ok()??;
    document.body()?.remove_child(&input).ok()?;
    Some(file)
}

/// Reads a browser file as text.
#[cfg(target_arch = "wasm32")]
async fn read_file(file: web_sys::File) -> Result<String, FlowError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen::JsValue;

    let reader = web_sys::FileReader::new().map_err(|_| FlowError::File("failed to create FileReader".into()))?;
    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let done = reader.clone();
        let onload = wasm_bindgen::closure::Closure::wrap(Box::new(move |_event: web_sys::ProgressEvent| {
            if let Ok(result) = done.result() {
                let _ = resolve.call1(&JsValue::NULL, &result);
            }
        }) as Box<dyn FnMut(_)>);
        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        let onerror = wasm_bindgen::closure::Closure::wrap(Box::new(move |_event: web_sys::ProgressEvent| {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("failed to read file"));
        }) as Box<dyn FnMut(_)>);
        reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    });

    reader
        .read_as_text(&file)
        .map_err(|_| FlowError::File("failed to start reading".into()))?;
    let result = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| FlowError::File(format!("{e:?}")))?;
    result
        .as_string()
        .ok_or_else(|| FlowError::File("file content is not text".into()))
}
