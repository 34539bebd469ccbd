//! Export of decoded gallery images as PNG files.

use super::state::{FlowCanvasApp, PendingExport};
use crate::error::FlowError;
use crate::node::image_decode::encode_png;
use crate::node::image_gallery::ImageGallery;
use crate::node::NodeBody;

/// File name for an exported image, derived from its label.
pub fn export_file_name(label: &str) -> String {
    let stem: String = label
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "image.png".to_string()
    } else {
        format!("{stem}.png")
    }
}

/// Encodes the chosen image of a gallery (the first one when none is chosen).
pub fn encode_gallery_image(gallery: &ImageGallery) -> Result<PendingExport, FlowError> {
    let index = gallery.selected.unwrap_or(0);
    let entry = gallery
        .entries()
        .get(index)
        .ok_or_else(|| FlowError::File("no image to export".to_string()))?;
    let pixels = entry.pixels().ok_or_else(|| FlowError::ImageDecode {
        label: entry.label.clone(),
        message: "image is not decoded".to_string(),
    })?;
    let bytes = encode_png(pixels.width, pixels.height, pixels.rgba.clone())?;
    Ok(PendingExport {
        file_name: export_file_name(&entry.label),
        bytes,
    })
}

impl FlowCanvasApp {
    /// Queues the chosen image of the selected image node for export.
    pub fn export_selected_image(&mut self) -> Result<(), FlowError> {
        let id = self
            .interaction
            .selected_node
            .ok_or_else(|| FlowError::File("no node selected".to_string()))?;
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| FlowError::NodeNotFound(id.to_string()))?;
        let NodeBody::Image(gallery) = &node.body else {
            return Err(FlowError::File(format!("'{}' does not show images", node.title)));
        };
        let export = encode_gallery_image(gallery)?;
        log::debug!("Exporting {} ({} bytes)", export.file_name, export.bytes.len());
        self.file.pending_export = Some(export);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::image_decode::decode_image;
    use crate::node::image_gallery::ImageGalleryConfig;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(export_file_name("RSI (14) / AAPL"), "RSI__14____AAPL.png");
        assert_eq!(export_file_name("  "), "image.png");
        assert_eq!(export_file_name("heatmap-1"), "heatmap-1.png");
    }

    #[test]
    fn decoded_image_exports_as_png() {
        let url = crate::node::image_decode::encode_png_data_url(3, 2, vec![200; 3 * 2 * 4]).unwrap();
        let mut gallery = ImageGallery::new(ImageGalleryConfig::default());
        gallery.set_images(vec![("chart".into(), url.clone())], 0.0);
        let generation = gallery.generation();
        gallery.on_decoded(generation, "chart", decode_image("chart", &url));

        let export = encode_gallery_image(&gallery).unwrap();
        assert_eq!(export.file_name, "chart.png");
        assert_eq!(&export.bytes[1..4], b"PNG");

        gallery.selected = Some(5);
        assert!(encode_gallery_image(&gallery).is_err());
    }
}
