//! Decoding of `data:` URL images off the UI thread.

use crate::error::FlowError;
use crate::types::NodeId;
use base64::Engine;
use eframe::egui;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Request to decode one labelled image.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeJob {
    /// Batch the job belongs to; stale batches are ignored on arrival
    pub generation: u64,
    /// Image label
    pub label: String,
    /// Encoded image
    pub data_url: String,
}

/// Decoded RGBA pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Unpremultiplied RGBA bytes
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// Width / height.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Converts into an egui image for texture upload.
    pub fn to_color_image(&self) -> egui::ColorImage {
        egui::ColorImage::from_rgba_unmultiplied(
            [self.width as usize, self.height as usize],
            &self.rgba,
        )
    }
}

/// Result of a decode job, tagged with its destination.
#[derive(Debug)]
pub struct DecodeOutcome {
    /// Node that requested the decode
    pub node_id: NodeId,
    /// Batch generation
    pub generation: u64,
    /// Image label
    pub label: String,
    /// Decoded pixels or the failure
    pub result: Result<DecodedImage, FlowError>,
}

/// Extracts the raw bytes from a base64 `data:` URL. Bare base64 is accepted too.
pub fn parse_data_url(url: &str) -> Result<Vec<u8>, FlowError> {
    let payload = match url.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| FlowError::DataUrl("missing ',' separator".to_string()))?;
            if !meta.ends_with(";base64") {
                return Err(FlowError::DataUrl(format!(
                    "unsupported encoding '{meta}'"
                )));
            }
            data
        }
        None => url,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| FlowError::DataUrl(e.to_string()))
}

/// Decodes a labelled data URL into RGBA pixels.
pub fn decode_image(label: &str, data_url: &str) -> Result<DecodedImage, FlowError> {
    let bytes = parse_data_url(data_url)?;
    let image = image::load_from_memory(&bytes).map_err(|e| FlowError::ImageDecode {
        label: label.to_string(),
        message: e.to_string(),
    })?;
    let rgba = image.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Runs blocking work on the tokio blocking pool, or on a plain thread when no
/// runtime is current.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn spawn_blocking_job<F>(work: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(work);
        }
        Err(_) => {
            std::thread::spawn(work);
        }
    }
}

/// Runs decode jobs in the background and collects their outcomes.
pub struct ImageDecoder {
    sender: Sender<DecodeOutcome>,
    receiver: Receiver<DecodeOutcome>,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self { sender, receiver }
    }
}

impl ImageDecoder {
    /// Creates a decoder with an empty outcome queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts decoding `job` for `node_id`. A repaint is requested on completion.
    pub fn submit(&self, node_id: NodeId, job: DecodeJob, ctx: Option<egui::Context>) {
        let sender = self.sender.clone();
        let work = move || {
            let result = decode_image(&job.label, &job.data_url);
            if let Err(err) = &result {
                log::warn!("{err}");
            }
            let _ = sender.send(DecodeOutcome {
                node_id,
                generation: job.generation,
                label: job.label,
                result,
            });
            if let Some(ctx) = ctx {
                ctx.request_repaint();
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        spawn_blocking_job(work);

        #[cfg(target_arch = "wasm32")]
        work();
    }

    /// Drains all outcomes that have arrived so far.
    pub fn drain(&self) -> Vec<DecodeOutcome> {
        self.receiver.try_iter().collect()
    }
}

/// Encodes RGBA pixels as a PNG `data:` URL. Used for exports and tests.
pub fn encode_png_data_url(width: u32, height: u32, rgba: Vec<u8>) -> Result<String, FlowError> {
    let bytes = encode_png(width, height, rgba)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

/// Encodes RGBA pixels as PNG bytes.
pub fn encode_png(width: u32, height: u32, rgba: Vec<u8>) -> Result<Vec<u8>, FlowError> {
    let buffer = image::RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        FlowError::ImageDecode {
            label: "export".to_string(),
            message: "pixel buffer does not match dimensions".to_string(),
        }
    })?;
    let mut out = std::io::Cursor::new(Vec::new());
    buffer
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| FlowError::ImageDecode {
            label: "export".to_string(),
            message: e.to_string(),
        })?;
    Ok(out.into_inner())
}
