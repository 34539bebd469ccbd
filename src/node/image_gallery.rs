//! Zoomable, scrollable image display used by image and chart nodes.
//!
//! A gallery receives a label → data URL map per update, tracks the decode state
//! of every label, and lays the images out either as a single fitted image or as
//! a grid. Mouse-wheel gestures over the node zoom (Shift) or pan the content.

use super::image_decode::{DecodeJob, DecodedImage};
use crate::constants::*;
use crate::error::FlowError;
use eframe::egui::{self, Color32, Pos2, Rect, Vec2};

/// How grid cells are sized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridStrategy {
    /// Split the available area evenly between rows and columns
    EqualDivision,
    /// Fixed cell width, height derived from the images' average aspect ratio
    TargetCell {
        /// Cell width in world units at zoom 1.0
        size: f32,
    },
}

/// How scroll offsets are constrained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollMode {
    /// Offsets clamped to `[0, content - viewport]`
    Finite,
    /// Offsets wrap around with an extra gap after the content
    Infinite {
        /// Gap in world units between the end of the content and its repetition
        buffer: f32,
    },
}

/// Variant-specific behaviour of a gallery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageGalleryConfig {
    /// Lowest zoom level
    pub min_zoom: f32,
    /// Highest zoom level
    pub max_zoom: f32,
    /// Grid cell sizing
    pub grid: GridStrategy,
    /// Scroll constraint
    pub scroll: ScrollMode,
    /// Merge updates by label instead of replacing the whole set
    pub merge_incremental: bool,
    /// Smallest node size the layout pass may request
    pub min_size: Vec2,
    /// Largest node size the layout pass may request
    pub max_size: Vec2,
}

impl Default for ImageGalleryConfig {
    fn default() -> Self {
        Self {
            min_zoom: IMAGE_MIN_ZOOM,
            max_zoom: IMAGE_MAX_ZOOM,
            grid: GridStrategy::EqualDivision,
            scroll: ScrollMode::Finite,
            merge_incremental: false,
            min_size: Vec2::new(160.0, 120.0),
            max_size: Vec2::new(800.0, 800.0),
        }
    }
}

/// Unit of a wheel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDeltaMode {
    /// Pixel-precise (trackpads)
    Pixel,
    /// Lines (classic mouse wheels)
    Line,
    /// Whole pages
    Page,
}

/// A wheel event expressed in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    /// Raw delta; positive y scrolls up
    pub delta: Vec2,
    /// Unit of `delta`
    pub mode: WheelDeltaMode,
    /// Whether Shift was held
    pub shift: bool,
    /// Pointer position in world units
    pub pointer: Pos2,
}

impl WheelInput {
    /// Delta converted to world pixels.
    pub fn normalized_delta(&self, page_size: Vec2) -> Vec2 {
        match self.mode {
            WheelDeltaMode::Pixel => self.delta,
            WheelDeltaMode::Line => self.delta * WHEEL_LINE_HEIGHT,
            WheelDeltaMode::Page => Vec2::new(self.delta.x * page_size.x, self.delta.y * page_size.y),
        }
    }

    /// The larger-magnitude component of the normalized delta and whether it is horizontal.
    pub fn dominant(&self, page_size: Vec2) -> (f32, bool) {
        let d = self.normalized_delta(page_size);
        if d.x.abs() > d.y.abs() {
            (d.x, true)
        } else {
            (d.y, false)
        }
    }
}

/// Capability of node content that reacts to wheel gestures.
pub trait WheelHandler {
    /// Handles a wheel event. `node_rect` and `content_rect` are in world units.
    /// Returns `true` when the event was consumed.
    fn on_mouse_wheel(&mut self, input: &WheelInput, node_rect: Rect, content_rect: Rect) -> bool;
}

/// Grid dimensions for `n` images: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`.
pub fn grid_dimensions(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    (cols, rows)
}

/// Computed grid geometry in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Number of columns
    pub cols: usize,
    /// Number of rows
    pub rows: usize,
    /// Size of one cell including its gap
    pub cell: Vec2,
    /// Total content size
    pub content: Vec2,
}

/// Lays out `n` images in `viewport` according to `strategy` and `zoom`.
pub fn grid_layout(
    n: usize,
    viewport: Vec2,
    average_aspect: f32,
    strategy: GridStrategy,
    zoom: f32,
) -> GridLayout {
    let (cols, rows) = grid_dimensions(n);
    if n == 0 {
        return GridLayout {
            cols,
            rows,
            cell: Vec2::ZERO,
            content: Vec2::ZERO,
        };
    }
    let cell = match strategy {
        GridStrategy::EqualDivision => {
            Vec2::new(viewport.x / cols as f32, viewport.y / rows as f32) * zoom
        }
        GridStrategy::TargetCell { size } => {
            let aspect = if average_aspect > 0.0 { average_aspect } else { 1.0 };
            let width = size * zoom;
            Vec2::new(width, width / aspect)
        }
    };
    GridLayout {
        cols,
        rows,
        cell,
        content: Vec2::new(cell.x * cols as f32, cell.y * rows as f32),
    }
}

/// Size of a single image fitted into `viewport` (aspect preserved), times `zoom`.
pub fn fit_single(image: Vec2, viewport: Vec2, zoom: f32) -> Vec2 {
    if image.x <= 0.0 || image.y <= 0.0 {
        return Vec2::ZERO;
    }
    let scale = (viewport.x / image.x).min(viewport.y / image.y);
    image * scale * zoom
}

/// Clamps a scroll offset to `[0, content - viewport]`.
pub fn clamp_offset(offset: f32, content: f32, viewport: f32) -> f32 {
    offset.clamp(0.0, (content - viewport).max(0.0))
}

/// Wraps a scroll offset into `[0, period)`.
pub fn wrap_offset(offset: f32, period: f32) -> f32 {
    if period <= 0.0 {
        0.0
    } else {
        offset.rem_euclid(period)
    }
}

/// Decode state of one label.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageState {
    /// Waiting for the decoder
    Pending,
    /// Decoded successfully
    Loaded {
        /// Pixel size
        size: Vec2,
    },
    /// Decoding failed or timed out
    Failed(String),
}

/// One labelled image of the current set.
pub struct ImageEntry {
    /// Label shown under the image
    pub label: String,
    /// Encoded source
    pub data_url: String,
    /// Decode state
    pub state: ImageState,
    pixels: Option<DecodedImage>,
    texture: Option<egui::TextureHandle>,
}

impl ImageEntry {
    fn new(label: String, data_url: String) -> Self {
        Self {
            label,
            data_url,
            state: ImageState::Pending,
            pixels: None,
            texture: None,
        }
    }

    /// Decoded pixels, kept for export.
    pub fn pixels(&self) -> Option<&DecodedImage> {
        self.pixels.as_ref()
    }

    fn aspect(&self) -> Option<f32> {
        match self.state {
            ImageState::Loaded { size } if size.y > 0.0 => Some(size.x / size.y),
            _ => None,
        }
    }
}

/// Image set plus viewport state of an image node.
pub struct ImageGallery {
    /// Behaviour of this variant
    pub config: ImageGalleryConfig,
    entries: Vec<ImageEntry>,
    generation: u64,
    batch_started_at: Option<f64>,
    settled: bool,
    jobs: Vec<DecodeJob>,
    /// Scroll offsets in world units
    pub scroll: Vec2,
    /// Zoom multiplier
    pub zoom: f32,
    /// Index of the image chosen for export
    pub selected: Option<usize>,
}

impl ImageGallery {
    /// Creates an empty gallery.
    pub fn new(config: ImageGalleryConfig) -> Self {
        Self {
            zoom: config.min_zoom.max(1.0).min(config.max_zoom),
            config,
            entries: Vec::new(),
            generation: 0,
            batch_started_at: None,
            settled: true,
            jobs: Vec::new(),
            scroll: Vec2::ZERO,
            selected: None,
        }
    }

    /// Current entries in display order.
    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    /// Current decode batch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether every image of the current batch has settled.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Accepts a new label → data URL set at time `now`.
    ///
    /// Full updates replace the cache wholesale; variants configured with
    /// `merge_incremental` merge by label instead.
    pub fn set_images(&mut self, images: Vec<(String, String)>, now: f64) {
        self.generation += 1;
        if !self.config.merge_incremental {
            self.entries.clear();
            self.scroll = Vec2::ZERO;
            self.selected = None;
        }
        // Older jobs still pending in the queue belong to a superseded batch.
        self.jobs.clear();
        for (label, data_url) in images {
            let job = DecodeJob {
                generation: self.generation,
                label: label.clone(),
                data_url: data_url.clone(),
            };
            match self.entries.iter_mut().find(|e| e.label == label) {
                Some(existing) if existing.data_url == data_url && existing.state != ImageState::Pending => {
                    continue;
                }
                Some(existing) => *existing = ImageEntry::new(label, data_url),
                None => self.entries.push(ImageEntry::new(label, data_url)),
            }
            self.jobs.push(job);
        }
        // Entries of a merged set that are still pending from an older batch
        // would never settle under the new generation.
        let pending_labels: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.state == ImageState::Pending)
            .map(|e| e.label.clone())
            .collect();
        for label in pending_labels {
            if !self.jobs.iter().any(|j| j.label == label) {
                if let Some(entry) = self.entries.iter().find(|e| e.label == label) {
                    self.jobs.push(DecodeJob {
                        generation: self.generation,
                        label,
                        data_url: entry.data_url.clone(),
                    });
                }
            }
        }
        self.batch_started_at = Some(now);
        self.settled = self.jobs.is_empty();
    }

    /// Removes and returns decode jobs waiting to be dispatched.
    pub fn take_jobs(&mut self) -> Vec<DecodeJob> {
        std::mem::take(&mut self.jobs)
    }

    /// Records a decode outcome. Outcomes from superseded batches are ignored.
    pub fn on_decoded(&mut self, generation: u64, label: &str, result: Result<DecodedImage, FlowError>) {
        if generation != self.generation {
            log::debug!("Ignoring stale decode of '{label}' (batch {generation})");
            return;
        }
        let Some(entry) = self.entries.iter_mut().find(|e| e.label == label) else {
            return;
        };
        match result {
            Ok(image) => {
                entry.state = ImageState::Loaded {
                    size: Vec2::new(image.width as f32, image.height as f32),
                };
                entry.pixels = Some(image);
                entry.texture = None;
            }
            Err(err) => {
                entry.state = ImageState::Failed(err.to_string());
            }
        }
    }

    /// Checks whether the current batch has settled, either because every image
    /// finished or because the wait timed out. On the transition to settled,
    /// returns the node size the layout pass wants.
    ///
    /// `node_size` is the current node size and `chrome` the vertical space used by
    /// title, slots and padding.
    pub fn poll_settled(&mut self, now: f64, node_size: Vec2, chrome: Vec2) -> Option<Vec2> {
        if self.settled {
            return None;
        }
        let pending = self
            .entries
            .iter()
            .filter(|e| e.state == ImageState::Pending)
            .count();
        let timed_out = self
            .batch_started_at
            .is_some_and(|start| now - start >= IMAGE_LOAD_TIMEOUT);
        if pending > 0 && !timed_out {
            return None;
        }
        if pending > 0 {
            log::warn!("{pending} image(s) did not load within {IMAGE_LOAD_TIMEOUT}s");
            for entry in &mut self.entries {
                if entry.state == ImageState::Pending {
                    entry.state = ImageState::Failed("timed out".to_string());
                }
            }
        }
        self.settled = true;
        self.preferred_size(node_size, chrome)
    }

    /// Node size that shows the loaded images at their aspect ratio, within the
    /// configured bounds.
    pub fn preferred_size(&self, node_size: Vec2, chrome: Vec2) -> Option<Vec2> {
        let aspects: Vec<f32> = self.entries.iter().filter_map(ImageEntry::aspect).collect();
        if aspects.is_empty() {
            return None;
        }
        let (min, max) = (self.config.min_size, self.config.max_size);
        let content_width = (node_size.x - chrome.x).max(1.0);
        let content_height = if aspects.len() == 1 {
            content_width / aspects[0]
        } else {
            let (cols, rows) = grid_dimensions(aspects.len());
            let average = aspects.iter().sum::<f32>() / aspects.len() as f32;
            (content_width / cols as f32) / average * rows as f32
        };
        let mut width = node_size.x.clamp(min.x, max.x);
        let mut height = (content_height + chrome.y).clamp(min.y, max.y);
        if aspects.len() == 1 {
            // Height hit a bound: derive the width back from the clamped height.
            let fitted = (height - chrome.y) * aspects[0] + chrome.x;
            if (fitted - width).abs() > 1.0 {
                width = fitted.clamp(min.x, max.x);
                height = ((width - chrome.x) / aspects[0] + chrome.y).clamp(min.y, max.y);
            }
        }
        Some(Vec2::new(width, height))
    }

    /// Average width/height ratio of the loaded images.
    pub fn average_aspect(&self) -> f32 {
        let aspects: Vec<f32> = self.entries.iter().filter_map(ImageEntry::aspect).collect();
        if aspects.is_empty() {
            1.0
        } else {
            aspects.iter().sum::<f32>() / aspects.len() as f32
        }
    }

    /// Total content size for a viewport, in world units.
    pub fn content_size(&self, viewport: Vec2) -> Vec2 {
        match self.entries.len() {
            0 => Vec2::ZERO,
            1 => match self.entries[0].state {
                ImageState::Loaded { size } => fit_single(size, viewport, self.zoom),
                _ => viewport,
            },
            n => grid_layout(n, viewport, self.average_aspect(), self.config.grid, self.zoom).content,
        }
    }

    /// Re-applies zoom and scroll constraints for the given viewport.
    pub fn constrain(&mut self, viewport: Vec2) {
        self.zoom = self.zoom.clamp(self.config.min_zoom, self.config.max_zoom);
        let content = self.content_size(viewport);
        // A single image is drawn once, so only grids can wrap.
        let scroll = if self.entries.len() > 1 {
            self.config.scroll
        } else {
            ScrollMode::Finite
        };
        match scroll {
            ScrollMode::Finite => {
                self.scroll.x = clamp_offset(self.scroll.x, content.x, viewport.x);
                self.scroll.y = clamp_offset(self.scroll.y, content.y, viewport.y);
            }
            ScrollMode::Infinite { buffer } => {
                if content.x > viewport.x {
                    self.scroll.x = wrap_offset(self.scroll.x, content.x + buffer);
                } else {
                    self.scroll.x = 0.0;
                }
                if content.y > viewport.y {
                    self.scroll.y = wrap_offset(self.scroll.y, content.y + buffer);
                } else {
                    self.scroll.y = 0.0;
                }
            }
        }
    }

    /// Uploads decoded pixels to textures. Needs an egui context, so it runs at draw time.
    pub fn upload_textures(&mut self, ctx: &egui::Context, texture_prefix: &str) {
        for entry in &mut self.entries {
            if entry.texture.is_none() {
                if let Some(pixels) = &entry.pixels {
                    entry.texture = Some(ctx.load_texture(
                        format!("{texture_prefix}-{}", entry.label),
                        pixels.to_color_image(),
                        egui::TextureOptions::LINEAR,
                    ));
                }
            }
        }
    }

    /// World-space rectangles of every image for a content rect, before clipping.
    pub fn image_rects(&self, content_rect: Rect) -> Vec<(usize, Rect)> {
        let viewport = content_rect.size();
        match self.entries.len() {
            0 => Vec::new(),
            1 => {
                let size = match self.entries[0].state {
                    ImageState::Loaded { size } => fit_single(size, viewport, self.zoom),
                    _ => viewport,
                };
                // Centre when smaller than the viewport, otherwise scroll.
                let offset = Vec2::new(
                    if size.x < viewport.x { (viewport.x - size.x) / 2.0 } else { -self.scroll.x },
                    if size.y < viewport.y { (viewport.y - size.y) / 2.0 } else { -self.scroll.y },
                );
                vec![(0, Rect::from_min_size(content_rect.min + offset, size))]
            }
            n => {
                let layout = grid_layout(n, viewport, self.average_aspect(), self.config.grid, self.zoom);
                let mut rects = Vec::with_capacity(n);
                let origin = content_rect.min - self.scroll;
                let period = match self.config.scroll {
                    ScrollMode::Infinite { buffer } => Some(layout.content + Vec2::splat(buffer)),
                    ScrollMode::Finite => None,
                };
                for i in 0..n {
                    let (col, row) = (i % layout.cols, i / layout.cols);
                    let min = origin + Vec2::new(col as f32 * layout.cell.x, row as f32 * layout.cell.y);
                    let cell = Rect::from_min_size(min, layout.cell).shrink(GRID_GAP / 2.0);
                    rects.push((i, cell));
                    if let Some(period) = period {
                        // Repeat once past the wrap point so the seam is filled.
                        let wrap_x = layout.content.x > viewport.x;
                        let wrap_y = layout.content.y > viewport.y;
                        if wrap_x {
                            rects.push((i, cell.translate(Vec2::new(period.x, 0.0))));
                        }
                        if wrap_y {
                            rects.push((i, cell.translate(Vec2::new(0.0, period.y))));
                        }
                        if wrap_x && wrap_y {
                            rects.push((i, cell.translate(period)));
                        }
                    }
                }
                rects
            }
        }
    }

    /// Index of the image under a world-space point.
    pub fn image_at(&self, content_rect: Rect, point: Pos2) -> Option<usize> {
        if !content_rect.contains(point) {
            return None;
        }
        self.image_rects(content_rect)
            .into_iter()
            .find(|(_, r)| r.contains(point))
            .map(|(i, _)| i)
    }

    /// Paints the images. `to_screen` maps world rects to screen rects.
    pub fn draw(
        &self,
        painter: &egui::Painter,
        content_rect: Rect,
        to_screen: impl Fn(Rect) -> Rect,
        zoom: f32,
        text_color: Color32,
    ) {
        let clip = to_screen(content_rect);
        let painter = painter.with_clip_rect(clip.intersect(painter.clip_rect()));
        let multi = self.entries.len() > 1;
        for (i, rect) in self.image_rects(content_rect) {
            let entry = &self.entries[i];
            let screen = to_screen(rect);
            if !screen.intersects(clip) {
                continue;
            }
            match (&entry.state, &entry.texture) {
                (ImageState::Loaded { size }, Some(texture)) => {
                    // Letterbox inside grid cells.
                    let target = if multi {
                        let fitted = fit_single(*size, screen.size(), 1.0);
                        Rect::from_center_size(screen.center(), fitted)
                    } else {
                        screen
                    };
                    painter.image(
                        texture.id(),
                        target,
                        Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }
                (ImageState::Failed(reason), _) => {
                    painter.text(
                        screen.center(),
                        egui::Align2::CENTER_CENTER,
                        format!("{}: {}", entry.label, reason),
                        crate::transform::scaled_font(BODY_FONT_SIZE, zoom),
                        Color32::from_rgb(230, 60, 60),
                    );
                }
                _ => {
                    painter.text(
                        screen.center(),
                        egui::Align2::CENTER_CENTER,
                        "loading…",
                        crate::transform::scaled_font(BODY_FONT_SIZE, zoom),
                        text_color,
                    );
                }
            }
            if multi {
                painter.text(
                    screen.left_bottom() + egui::vec2(3.0, -2.0),
                    egui::Align2::LEFT_BOTTOM,
                    &entry.label,
                    crate::transform::scaled_font(BODY_FONT_SIZE - 2.0, zoom),
                    text_color,
                );
            }
            if self.selected == Some(i) {
                painter.rect_stroke(
                    screen,
                    0.0,
                    egui::Stroke::new(2.0, Color32::from_rgb(255, 210, 80)),
                    eframe::epaint::StrokeKind::Inside,
                );
            }
        }
    }

    /// Drops textures and pending work when the node goes away.
    pub fn release(&mut self) {
        self.jobs.clear();
        for entry in &mut self.entries {
            entry.texture = None;
        }
    }
}

impl WheelHandler for ImageGallery {
    fn on_mouse_wheel(&mut self, input: &WheelInput, node_rect: Rect, content_rect: Rect) -> bool {
        let viewport = content_rect.size();
        if input.shift {
            // Trackpads are imprecise; accept zoom gestures slightly outside the node.
            if !node_rect.expand(NEAR_NODE_MARGIN).contains(input.pointer) {
                return false;
            }
            let (amount, _) = input.dominant(viewport);
            let factor = (amount * ZOOM_SENSITIVITY).exp();
            self.zoom = (self.zoom * factor).clamp(self.config.min_zoom, self.config.max_zoom);
            self.constrain(viewport);
            return true;
        }

        if !content_rect.contains(input.pointer) || self.entries.is_empty() {
            return false;
        }
        let content = self.content_size(viewport);
        let (amount, horizontal) = input.dominant(viewport);
        let scrollable = if horizontal {
            content.x > viewport.x
        } else {
            content.y > viewport.y
        };
        if !scrollable {
            return false;
        }
        if horizontal {
            self.scroll.x -= amount;
        } else {
            self.scroll.y -= amount;
        }
        self.constrain(viewport);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::image_decode::{decode_image, encode_png_data_url};
    use eframe::egui::{pos2, vec2};

    fn decoded(w: u32, h: u32) -> DecodedImage {
        DecodedImage {
            width: w,
            height: h,
            rgba: vec![0; (w * h * 4) as usize],
        }
    }

    fn loaded_gallery(config: ImageGalleryConfig, sizes: &[(u32, u32)]) -> ImageGallery {
        let mut gallery = ImageGallery::new(config);
        let images = sizes
            .iter()
            .enumerate()
            .map(|(i, _)| (format!("img{i}"), format!("data:{i}")))
            .collect();
        gallery.set_images(images, 0.0);
        let generation = gallery.generation();
        for (i, (w, h)) in sizes.iter().enumerate() {
            gallery.on_decoded(generation, &format!("img{i}"), Ok(decoded(*w, *h)));
        }
        gallery
    }

    #[test]
    fn grid_dimensions_follow_square_root() {
        assert_eq!(grid_dimensions(0), (0, 0));
        assert_eq!(grid_dimensions(1), (1, 1));
        assert_eq!(grid_dimensions(2), (2, 1));
        assert_eq!(grid_dimensions(5), (3, 2));
        assert_eq!(grid_dimensions(9), (3, 3));
        assert_eq!(grid_dimensions(10), (4, 3));
    }

    #[test]
    fn grid_strategies_differ() {
        let viewport = vec2(300.0, 200.0);
        let equal = grid_layout(4, viewport, 2.0, GridStrategy::EqualDivision, 1.0);
        assert_eq!(equal.cell, vec2(150.0, 100.0));
        assert_eq!(equal.content, viewport);

        let target = grid_layout(4, viewport, 2.0, GridStrategy::TargetCell { size: 160.0 }, 1.0);
        assert_eq!(target.cell, vec2(160.0, 80.0));
        assert_eq!(target.content, vec2(320.0, 160.0));
    }

    #[test]
    fn fit_single_preserves_aspect() {
        let size = fit_single(vec2(400.0, 100.0), vec2(200.0, 200.0), 1.0);
        assert_eq!(size, vec2(200.0, 50.0));
        assert_eq!(fit_single(vec2(400.0, 100.0), vec2(200.0, 200.0), 2.0), vec2(400.0, 100.0));
    }

    #[test]
    fn offsets_clamp_and_wrap() {
        assert_eq!(clamp_offset(-5.0, 300.0, 100.0), 0.0);
        assert_eq!(clamp_offset(500.0, 300.0, 100.0), 200.0);
        assert_eq!(clamp_offset(50.0, 80.0, 100.0), 0.0);
        assert_eq!(wrap_offset(-10.0, 100.0), 90.0);
        assert_eq!(wrap_offset(250.0, 100.0), 50.0);
    }

    #[test]
    fn shift_wheel_zoom_stays_in_bounds() {
        let mut gallery = loaded_gallery(ImageGalleryConfig::default(), &[(100, 100)]);
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(200.0, 200.0));
        let content = node.shrink(10.0);
        let deltas = [500.0, 900.0, -3000.0, 40.0, 12000.0, -7.0, -50000.0, 3.0];
        for (i, dy) in deltas.iter().cycle().take(64).enumerate() {
            let mode = match i % 3 {
                0 => WheelDeltaMode::Pixel,
                1 => WheelDeltaMode::Line,
                _ => WheelDeltaMode::Page,
            };
            let input = WheelInput {
                delta: vec2(0.0, *dy),
                mode,
                shift: true,
                pointer: pos2(100.0, 100.0),
            };
            assert!(gallery.on_mouse_wheel(&input, node, content));
            assert!((1.0..=5.0).contains(&gallery.zoom), "zoom {}", gallery.zoom);
        }
    }

    #[test]
    fn shift_wheel_accepts_near_node_but_not_far() {
        let mut gallery = loaded_gallery(ImageGalleryConfig::default(), &[(100, 100)]);
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(200.0, 200.0));
        let mut input = WheelInput {
            delta: vec2(0.0, 100.0),
            mode: WheelDeltaMode::Pixel,
            shift: true,
            pointer: pos2(220.0, 100.0),
        };
        assert!(gallery.on_mouse_wheel(&input, node, node));
        input.pointer = pos2(400.0, 100.0);
        assert!(!gallery.on_mouse_wheel(&input, node, node));
    }

    #[test]
    fn wide_zoom_variant_allows_zooming_out() {
        let config = ImageGalleryConfig {
            min_zoom: IMAGE_WIDE_MIN_ZOOM,
            ..Default::default()
        };
        let mut gallery = loaded_gallery(config, &[(100, 100)]);
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(200.0, 200.0));
        let input = WheelInput {
            delta: vec2(0.0, -100000.0),
            mode: WheelDeltaMode::Pixel,
            shift: true,
            pointer: node.center(),
        };
        gallery.on_mouse_wheel(&input, node, node);
        assert_eq!(gallery.zoom, IMAGE_WIDE_MIN_ZOOM);
    }

    #[test]
    fn finite_pan_never_leaves_content_bounds() {
        let config = ImageGalleryConfig {
            grid: GridStrategy::TargetCell { size: 150.0 },
            ..Default::default()
        };
        let mut gallery = loaded_gallery(config, &[(100, 100); 7]);
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(300.0, 200.0));
        let viewport = node.size();
        let content = gallery.content_size(viewport);
        assert!(content.x > viewport.x && content.y > viewport.y);

        let deltas = [
            vec2(0.0, -120.0),
            vec2(-300.0, 10.0),
            vec2(0.0, 900.0),
            vec2(5000.0, 0.0),
            vec2(0.0, -3.0),
            vec2(-40.0, -39.0),
        ];
        for (i, delta) in deltas.iter().cycle().take(60).enumerate() {
            let input = WheelInput {
                delta: *delta,
                mode: if i % 2 == 0 { WheelDeltaMode::Pixel } else { WheelDeltaMode::Line },
                shift: false,
                pointer: node.center(),
            };
            gallery.on_mouse_wheel(&input, node, node);
            assert!(gallery.scroll.x >= 0.0 && gallery.scroll.x <= content.x - viewport.x);
            assert!(gallery.scroll.y >= 0.0 && gallery.scroll.y <= content.y - viewport.y);
        }
    }

    #[test]
    fn infinite_pan_wraps() {
        let config = ImageGalleryConfig {
            grid: GridStrategy::TargetCell { size: 150.0 },
            scroll: ScrollMode::Infinite { buffer: 40.0 },
            ..Default::default()
        };
        let mut gallery = loaded_gallery(config, &[(100, 100); 9]);
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(300.0, 200.0));
        let content = gallery.content_size(node.size());
        let input = WheelInput {
            delta: vec2(0.0, 100.0),
            mode: WheelDeltaMode::Pixel,
            shift: false,
            pointer: node.center(),
        };
        assert!(gallery.on_mouse_wheel(&input, node, node));
        // Scrolling up from zero wraps to the end of the period.
        assert!((gallery.scroll.y - (content.y + 40.0 - 100.0)).abs() < 1e-3);
    }

    #[test]
    fn single_image_stays_clamped_in_infinite_mode() {
        let config = ImageGalleryConfig {
            scroll: ScrollMode::Infinite { buffer: 40.0 },
            ..Default::default()
        };
        let mut gallery = loaded_gallery(config, &[(100, 100)]);
        gallery.zoom = 3.0;
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(200.0, 200.0));
        let input = WheelInput {
            delta: vec2(0.0, 50.0),
            mode: WheelDeltaMode::Pixel,
            shift: false,
            pointer: node.center(),
        };
        assert!(gallery.on_mouse_wheel(&input, node, node));
        let content = gallery.content_size(node.size());
        assert!(gallery.scroll.y >= 0.0);
        assert!(gallery.scroll.y <= content.y - node.height());
        let rects = gallery.image_rects(node);
        assert_eq!(rects.len(), 1);
        assert!(rects[0].1.contains_rect(node));
    }

    #[test]
    fn infinite_grid_fills_far_corner_after_two_axis_wrap() {
        let config = ImageGalleryConfig {
            grid: GridStrategy::TargetCell { size: 150.0 },
            scroll: ScrollMode::Infinite { buffer: 40.0 },
            ..Default::default()
        };
        let mut gallery = loaded_gallery(config, &[(100, 100); 9]);
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(300.0, 200.0));
        gallery.scroll = vec2(400.0, 400.0);
        gallery.constrain(node.size());
        assert_eq!(gallery.scroll, vec2(400.0, 400.0));
        let corner = pos2(280.0, 180.0);
        assert!(gallery.image_rects(node).iter().any(|(_, r)| r.contains(corner)));
    }

    #[test]
    fn plain_wheel_is_not_consumed_when_nothing_overflows() {
        let mut gallery = loaded_gallery(ImageGalleryConfig::default(), &[(100, 50)]);
        let node = Rect::from_min_size(pos2(0.0, 0.0), vec2(200.0, 200.0));
        let input = WheelInput {
            delta: vec2(0.0, -50.0),
            mode: WheelDeltaMode::Pixel,
            shift: false,
            pointer: node.center(),
        };
        assert!(!gallery.on_mouse_wheel(&input, node, node));
    }

    #[test]
    fn full_update_evicts_and_merge_update_keeps() {
        let mut replace = loaded_gallery(ImageGalleryConfig::default(), &[(10, 10), (10, 10)]);
        replace.set_images(vec![("new".into(), "data:x".into())], 1.0);
        assert_eq!(replace.entries().len(), 1);

        let config = ImageGalleryConfig {
            merge_incremental: true,
            ..Default::default()
        };
        let mut merge = loaded_gallery(config, &[(10, 10), (10, 10)]);
        merge.set_images(vec![("img1".into(), "data:changed".into()), ("img9".into(), "data:y".into())], 1.0);
        let labels: Vec<&str> = merge.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["img0", "img1", "img9"]);
        assert!(matches!(merge.entries()[0].state, ImageState::Loaded { .. }));
        assert_eq!(merge.entries()[1].state, ImageState::Pending);
        assert_eq!(merge.take_jobs().len(), 2);
    }

    #[test]
    fn stale_outcomes_are_ignored() {
        let mut gallery = ImageGallery::new(ImageGalleryConfig::default());
        gallery.set_images(vec![("a".into(), "data:1".into())], 0.0);
        let old = gallery.generation();
        gallery.set_images(vec![("a".into(), "data:2".into())], 0.1);
        gallery.on_decoded(old, "a", Ok(decoded(10, 10)));
        assert_eq!(gallery.entries()[0].state, ImageState::Pending);
    }

    #[test]
    fn broken_image_does_not_block_layout() {
        let mut gallery = ImageGallery::new(ImageGalleryConfig::default());
        gallery.set_images(
            vec![("ok".into(), "data:1".into()), ("never".into(), "data:2".into())],
            0.0,
        );
        let generation = gallery.generation();
        gallery.on_decoded(generation, "ok", Ok(decoded(200, 100)));
        let size = vec2(300.0, 200.0);
        let chrome = vec2(16.0, 40.0);
        assert_eq!(gallery.poll_settled(1.0, size, chrome), None);
        let resized = gallery.poll_settled(IMAGE_LOAD_TIMEOUT + 0.1, size, chrome);
        assert!(resized.is_some());
        assert!(gallery.is_settled());
        assert!(matches!(gallery.entries()[1].state, ImageState::Failed(_)));
    }

    #[test]
    fn single_image_resize_matches_aspect_within_bounds() {
        let url = encode_png_data_url(200, 100, vec![128; 200 * 100 * 4]).unwrap();
        let mut gallery = ImageGallery::new(ImageGalleryConfig::default());
        gallery.set_images(vec![("AAPL".into(), url.clone())], 0.0);
        let jobs = gallery.take_jobs();
        assert_eq!(jobs.len(), 1);
        let image = decode_image(&jobs[0].label, &jobs[0].data_url);
        gallery.on_decoded(jobs[0].generation, "AAPL", image);

        let chrome = vec2(16.0, 40.0);
        let size = gallery.poll_settled(0.5, vec2(316.0, 90.0), chrome).unwrap();
        let aspect = (size.x - chrome.x) / (size.y - chrome.y);
        assert!((aspect - 2.0).abs() < 0.01, "aspect {aspect}");
        let config = ImageGalleryConfig::default();
        assert!(size.x >= config.min_size.x && size.x <= config.max_size.x);
        assert!(size.y >= config.min_size.y && size.y <= config.max_size.y);
    }

    #[test]
    fn tall_image_is_bounded() {
        let mut gallery = loaded_gallery(ImageGalleryConfig::default(), &[(100, 1000)]);
        gallery.settled = false;
        let size = gallery.poll_settled(0.0, vec2(400.0, 100.0), vec2(16.0, 40.0)).unwrap();
        let config = ImageGalleryConfig::default();
        assert!(size.y <= config.max_size.y);
        assert!(size.x >= config.min_size.x);
    }
}
