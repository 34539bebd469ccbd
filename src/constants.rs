//! Shared application-wide constants.
//! Centralizes tweakable values used across node rendering, display derivation and interactions.

// Node dimensions
/// Default node width in world units.
pub const NODE_WIDTH: f32 = 220.0;
/// Default node height in world units.
pub const NODE_HEIGHT: f32 = 90.0;
/// Height of the node title bar in world units.
pub const TITLE_HEIGHT: f32 = 24.0;
/// Vertical spacing between input/output slots in world units.
pub const SLOT_SPACING: f32 = 18.0;
/// Radius of a slot circle in world units.
pub const SLOT_RADIUS: f32 = 5.0;
/// Inner padding used when laying out node content.
pub const CONTENT_PADDING: f32 = 8.0;
/// Height of one line of node body text in world units.
pub const LINE_HEIGHT: f32 = 14.0;
/// Body text font size in world units.
pub const BODY_FONT_SIZE: f32 = 11.0;
/// Height reserved for the progress bar.
pub const PROGRESS_BAR_HEIGHT: f32 = 14.0;

// Grid/drawing
/// Grid cell size in world units.
pub const GRID_SIZE: f32 = 20.0;

// Canvas interactions
/// Distance in screen pixels within which a click hits a link.
pub const CLICK_THRESHOLD: f32 = 10.0;
/// Canvas zoom range.
pub const CANVAS_MIN_ZOOM: f32 = 0.25;
/// Canvas zoom range.
pub const CANVAS_MAX_ZOOM: f32 = 5.0;
/// Zoom change per wheel notch over empty canvas.
pub const CANVAS_ZOOM_STEP: f32 = 0.025;
/// Smallest size a node can be resized to.
pub const MIN_NODE_SIZE: (f32, f32) = (120.0, 60.0);
/// Height of the fixed footer strip that overlays must not cover (screen pixels).
pub const FOOTER_HEIGHT: f32 = 24.0;

// Display text
/// Maximum characters kept from a plain string result.
pub const MAX_STRING_DISPLAY: usize = 1000;
/// Maximum characters for chat message summaries and generic objects.
pub const MAX_OBJECT_DISPLAY: usize = 1500;
/// Maximum characters for small arrays printed in full.
pub const MAX_SMALL_ARRAY_DISPLAY: usize = 2000;
/// Arrays up to this length are printed in full.
pub const SMALL_ARRAY_LEN: usize = 3;
/// Nesting depth beyond which a result is considered unprintable.
pub const MAX_DISPLAY_DEPTH: usize = 64;
/// Suffix appended to truncated string results.
pub const TRUNCATION_SUFFIX: &str = "... (truncated, connect to LoggingNode for full output)";
/// Shown when a result cannot be turned into text.
pub const UNPRINTABLE_PLACEHOLDER: &str = "[Complex data - connect to LoggingNode to inspect]";

// Redraw scheduling
/// Window (seconds) within which display updates coalesce into a single redraw.
pub const REDRAW_DEBOUNCE: f64 = 0.016;

// Highlight animation
/// Period of the execution pulse in seconds.
pub const PULSE_PERIOD: f64 = 1.2;
/// Duration of the one-shot highlight decay in seconds.
pub const HIGHLIGHT_DECAY: f64 = 0.8;

// Image nodes
/// Default zoom range for image nodes.
pub const IMAGE_MIN_ZOOM: f32 = 1.0;
/// Default zoom range for image nodes.
pub const IMAGE_MAX_ZOOM: f32 = 5.0;
/// Lower zoom bound for variants that allow zooming out.
pub const IMAGE_WIDE_MIN_ZOOM: f32 = 0.1;
/// Zoom change per normalized wheel pixel.
pub const ZOOM_SENSITIVITY: f32 = 0.002;
/// Extra hit-test margin around a node for Shift-wheel zoom.
pub const NEAR_NODE_MARGIN: f32 = 40.0;
/// Pixels per wheel "line" unit.
pub const WHEEL_LINE_HEIGHT: f32 = 16.0;
/// Seconds to wait for all images of one update before laying out anyway.
pub const IMAGE_LOAD_TIMEOUT: f64 = 5.0;
/// Default target cell width for target-cell grid layouts.
pub const GRID_TARGET_CELL: f32 = 160.0;
/// Gap between grid cells.
pub const GRID_GAP: f32 = 4.0;
/// Extra scroll region added after the content in infinite-scroll layouts.
pub const INFINITE_SCROLL_BUFFER: f32 = 40.0;

// Log nodes
/// Maximum retained lines in a log node.
pub const LOG_MAX_LINES: usize = 2000;

/// Bytes an unterminated log line may hold before it is broken into a line.
pub const LOG_MAX_PARTIAL_BYTES: usize = 4096;

// Widgets
/// Maximum number of options rendered by a searchable combo.
pub const COMBO_RENDER_CAP: usize = 200;

// Execution
/// Default execution server endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8000/execute";

// Profiling
/// Number of frame samples kept by the performance monitor.
pub const PERF_WINDOW: usize = 120;
/// Frames slower than this (seconds) are logged.
pub const SLOW_FRAME_BUDGET: f32 = 0.050;
