//! Application state management structures.
//!
//! This module contains the state structures tracking canvas navigation, user
//! interactions, the context menu and file operations, plus the main
//! [`FlowCanvasApp`] that owns the graph and the background workers.

use crate::config::Settings;
use crate::constants::REDRAW_DEBOUNCE;
use crate::error::FlowError;
use crate::execution::ExecutionHandle;
use crate::graph::Graph;
use crate::node::catalog::NodeCatalog;
use crate::node::image_decode::ImageDecoder;
use crate::profiler::PerfMonitor;
use crate::scheduler::RedrawScheduler;
use crate::services::{ErrorDialogQueue, ServiceRegistry};
use crate::theme::Theme;
use crate::transform::CanvasTransform;
use crate::types::*;
use crate::widgets::combo::DataSourceCache;
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, Sender};

/// State related to canvas navigation and display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasState {
    /// Pan offset in screen pixels, relative to the canvas origin
    pub offset: (f32, f32),
    /// Current zoom level (1.0 = 100%)
    pub zoom_factor: f32,
    /// Whether the grid should be displayed on the canvas
    pub show_grid: bool,
    /// Whether the offset was initialised to centre the world origin
    pub centered: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            offset: (0.0, 0.0),
            zoom_factor: 1.0,
            show_grid: true,
            centered: false,
        }
    }
}

impl CanvasState {
    /// World to absolute screen transform for a canvas whose top-left is `origin`.
    pub fn transform(&self, origin: egui::Pos2) -> CanvasTransform {
        CanvasTransform::new(
            origin.to_vec2() + egui::vec2(self.offset.0, self.offset.1),
            self.zoom_factor,
        )
    }

    /// Stores the pan/zoom of a transform produced by [`Self::transform`].
    pub fn store(&mut self, transform: &CanvasTransform, origin: egui::Pos2) {
        let offset = transform.offset - origin.to_vec2();
        self.offset = (offset.x, offset.y);
        self.zoom_factor = transform.zoom;
    }
}

/// State related to user interactions with nodes and canvas.
#[derive(Debug, Default)]
pub struct InteractionState {
    /// Currently selected node, if any
    pub selected_node: Option<NodeId>,
    /// Currently selected link, if any
    pub selected_link: Option<LinkId>,
    /// Node currently being dragged by the user
    pub dragging_node: Option<NodeId>,
    /// Offset from the node origin to the pointer, in world units
    pub node_drag_offset: egui::Vec2,
    /// Node whose resize handle is being dragged
    pub resizing_node: Option<NodeId>,
    /// Whether the user is currently panning the canvas
    pub is_panning: bool,
    /// Last pointer position during panning
    pub last_pan_pos: Option<egui::Pos2>,
    /// Output slot a link is being dragged from
    pub connecting_from: Option<(NodeId, usize)>,
    /// Current pointer position while dragging a link
    pub connection_draw_pos: Option<egui::Pos2>,
    /// Set by a press on empty background; the canvas then keeps wheel events
    /// until a node is pressed
    pub canvas_owns_wheel: bool,
    /// Node whose title is being edited
    pub editing_title: Option<NodeId>,
    /// Whether the title editor already grabbed keyboard focus
    pub title_focus_requested: bool,
}

/// State related to the node catalog context menu.
#[derive(Debug, Default)]
pub struct ContextMenuState {
    /// Whether the context menu is currently visible
    pub show: bool,
    /// Screen position where the context menu should appear
    pub screen_pos: (f32, f32),
    /// World position where nodes are created
    pub world_pos: (f32, f32),
    /// Flag to prevent the menu from closing in the frame it opened
    pub just_opened: bool,
    /// Text typed into the menu's search field
    pub filter: String,
}

/// State related to file operations and persistence.
pub struct FileState {
    /// Current file path for save/load operations
    pub current_path: Option<String>,
    /// Flag indicating if the graph has unsaved changes
    pub has_unsaved_changes: bool,
    /// Save requested this frame
    pub pending_save_operation: Option<PendingSaveOperation>,
    /// Load requested this frame
    pub pending_load_operation: Option<PendingLoadOperation>,
    /// Image export requested this frame
    pub pending_export: Option<PendingExport>,
    /// Channel for receiving file operation results from async contexts
    pub file_operation_sender: Sender<FileOperationResult>,
    /// Receiving end of `file_operation_sender`
    pub file_operation_receiver: Receiver<FileOperationResult>,
    /// Whether to show the unsaved-changes confirmation dialog
    pub show_unsaved_dialog: bool,
    /// The action waiting for confirmation
    pub pending_confirm_action: Option<PendingConfirmAction>,
    /// Lets the next close request through after the user confirmed (native only)
    pub allow_close_on_next_request: bool,
    /// Whether the page's unload guard is currently installed (web only)
    pub unload_guard_installed: bool,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            current_path: None,
            has_unsaved_changes: false,
            pending_save_operation: None,
            pending_load_operation: None,
            pending_export: None,
            file_operation_sender: sender,
            file_operation_receiver: receiver,
            show_unsaved_dialog: false,
            pending_confirm_action: None,
            allow_close_on_next_request: false,
            unload_guard_installed: false,
        }
    }
}

impl FileState {
    /// Records the wanted unload guard state. Returns the new state when it changed.
    pub fn sync_unload_guard(&mut self, wanted: bool) -> Option<bool> {
        if self.unload_guard_installed == wanted {
            return None;
        }
        self.unload_guard_installed = wanted;
        Some(wanted)
    }
}

/// Represents a pending save operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingSaveOperation {
    /// Save with a new file path (show file picker)
    SaveAs,
    /// Save to the existing file path
    Save,
}

/// Represents a pending load operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingLoadOperation {
    /// Load from a file (show file picker)
    Load,
}

/// An encoded image waiting for a destination.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExport {
    /// Suggested file name
    pub file_name: String,
    /// PNG bytes
    pub bytes: Vec<u8>,
}

/// Messages sent from async file operations back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// Graph saved to the given path
    SaveCompleted(String),
    /// Graph file read: path and content
    LoadCompleted(String, String),
    /// Image written to the given path
    ExportCompleted(String),
    /// Operation failed
    OperationFailed(FlowError),
}

/// Actions that need confirmation when there are unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirmAction {
    /// Create a new graph
    New,
    /// Open a file
    Open,
    /// Quit the application
    Quit,
}

/// The part of the application persisted in eframe storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Graph being edited
    pub graph: SerializedGraph,
    /// Pan, zoom and grid
    pub canvas: CanvasState,
    /// User settings
    pub settings: Settings,
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
    /// Remembered width of the properties panel
    pub properties_panel_width: f32,
    /// Last known window inner size in logical points (desktop only)
    pub window_inner_size: Option<(f32, f32)>,
}

/// The main application structure.
///
/// Owns the graph, the node catalog and the background workers (image decoding,
/// remote option lists, execution socket) and implements `eframe::App`.
pub struct FlowCanvasApp {
    /// Nodes and links being edited
    pub graph: Graph,
    /// Node types offered by the context menu
    pub catalog: NodeCatalog,
    /// Services handed to new nodes
    pub services: ServiceRegistry,
    /// Errors raised by nodes, waiting to be shown
    pub dialogs: Rc<ErrorDialogQueue>,
    /// `(title, message)` of error windows currently open
    pub open_errors: Vec<(String, String)>,
    /// Debounced redraw requests
    pub scheduler: RedrawScheduler,
    /// Background image decoding
    pub decoder: ImageDecoder,
    /// Remote combo option lists
    pub data_sources: DataSourceCache,
    /// Running execution request, if any
    pub execution: Option<ExecutionHandle>,
    /// Frame statistics
    pub perf: PerfMonitor,
    /// User settings
    pub settings: Settings,
    /// Canvas navigation and display state
    pub canvas: CanvasState,
    /// User interaction state
    pub interaction: InteractionState,
    /// Context menu state
    pub context_menu: ContextMenuState,
    /// File operations state
    pub file: FileState,
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
    /// Palette last pushed to the nodes
    pub applied_dark_mode: Option<bool>,
    /// Remembered width of the properties panel across sessions
    pub properties_panel_width: f32,
    /// Persisted window inner size (desktop only)
    pub window_inner_size: Option<(f32, f32)>,
    /// Whether the stored window size was applied this session
    pub applied_viewport_restore: bool,
    /// Frame counter, used to schedule overlay repositioning
    pub frame_counter: u64,
    /// Latest status line shown in the canvas footer
    pub status: String,
    /// Screen rect of the canvas during the last frame
    pub canvas_rect: egui::Rect,
    /// Counter for default node titles
    pub node_counter: u32,
}

impl Default for FlowCanvasApp {
    fn default() -> Self {
        let dialogs = Rc::new(ErrorDialogQueue::default());
        let services = ServiceRegistry::with_dialogs(dialogs.clone());
        Self {
            graph: Graph::new(),
            catalog: NodeCatalog::builtin(),
            services,
            dialogs,
            open_errors: Vec::new(),
            scheduler: RedrawScheduler::new(REDRAW_DEBOUNCE),
            decoder: ImageDecoder::new(),
            data_sources: DataSourceCache::default(),
            execution: None,
            perf: PerfMonitor::new(),
            settings: Settings::default(),
            canvas: CanvasState::default(),
            interaction: InteractionState::default(),
            context_menu: ContextMenuState::default(),
            file: FileState::default(),
            dark_mode: true,
            applied_dark_mode: None,
            properties_panel_width: 300.0,
            window_inner_size: None,
            applied_viewport_restore: false,
            frame_counter: 0,
            status: String::new(),
            canvas_rect: egui::Rect::NOTHING,
            node_counter: 0,
        }
    }
}

impl FlowCanvasApp {
    /// Creates the application, restoring persisted state when available.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let restored = cc
            .storage
            .and_then(|storage| storage.get_string("app_state"))
            .and_then(|json| match Self::from_json(&json) {
                Ok(app) => Some(app),
                Err(err) => {
                    log::warn!("Ignoring stored app state: {err}");
                    None
                }
            });
        let mut app = restored.unwrap_or_default();
        app.settings = app.settings.clone().with_env_overrides();
        app
    }

    /// Snapshot of everything that is persisted.
    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            graph: self.graph.serialize(),
            canvas: self.canvas.clone(),
            settings: self.settings.clone(),
            dark_mode: self.dark_mode,
            properties_panel_width: self.properties_panel_width,
            window_inner_size: self.window_inner_size,
        }
    }

    /// Serializes the persisted part of the application to JSON.
    pub fn to_json(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(&self.persisted_state())?)
    }

    /// Rebuilds an application from [`Self::to_json`] output.
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        let state: PersistedState = serde_json::from_str(json)?;
        let mut app = Self::default();
        app.graph = Graph::from_serialized(&state.graph, &app.catalog, &app.services);
        app.canvas = state.canvas;
        app.settings = state.settings;
        app.dark_mode = state.dark_mode;
        if state.properties_panel_width > 0.0 {
            app.properties_panel_width = state.properties_panel_width;
        }
        app.window_inner_size = state.window_inner_size;
        app.node_counter = app.graph.len() as u32;
        Ok(app)
    }

    /// Theme matching the dark mode toggle.
    pub fn theme(&self) -> Theme {
        Theme::new(self.dark_mode)
    }

    /// Marks the graph as modified.
    pub fn mark_dirty(&mut self) {
        self.file.has_unsaved_changes = true;
    }

    /// Sets the status line and logs it.
    pub fn set_status(&mut self, status: impl Into<String>) {
        let status = status.into();
        log::info!("{status}");
        self.status = status;
    }

    /// Clears selection and in-flight gestures.
    pub fn clear_interaction(&mut self) {
        self.interaction = InteractionState::default();
        self.context_menu.show = false;
    }

    /// Replaces the graph, dropping per-node caches of the old one.
    pub fn replace_graph(&mut self, graph: Graph) {
        self.graph.clear();
        self.graph = graph;
        self.data_sources = DataSourceCache::default();
        self.execution = None;
        self.applied_dark_mode = None;
        self.node_counter = self.graph.len() as u32;
        self.clear_interaction();
    }
}
