//! JSON colouring for the result viewer of the properties panel.

use crate::display::truncate_with_suffix;
use eframe::egui::{self, Color32};
use eframe::epaint::text::{LayoutJob, TextFormat};
use serde_json::Value;

/// Longest string shown verbatim in the viewer.
const PREVIEW_STRING_CHARS: usize = 120;

/// Colours for each JSON token class.
struct JsonPalette {
    string: Color32,
    number: Color32,
    literal: Color32,
    key: Color32,
    punctuation: Color32,
}

impl JsonPalette {
    fn new(dark_mode: bool) -> Self {
        if dark_mode {
            Self {
                string: Color32::from_rgb(206, 145, 120),
                number: Color32::from_rgb(181, 206, 168),
                literal: Color32::from_rgb(86, 156, 214),
                key: Color32::from_rgb(156, 220, 254),
                punctuation: Color32::from_rgb(212, 212, 212),
            }
        } else {
            Self {
                string: Color32::from_rgb(163, 21, 21),
                number: Color32::from_rgb(100, 0, 150),
                literal: Color32::from_rgb(0, 0, 170),
                key: Color32::from_rgb(0, 102, 204),
                punctuation: Color32::BLACK,
            }
        }
    }
}

/// Replaces long strings (typically base64 image payloads) with a short preview so
/// the viewer stays responsive.
pub fn abbreviate_payload(value: &Value) -> Value {
    match value {
        Value::String(s) if s.starts_with("data:") && s.len() > PREVIEW_STRING_CHARS => {
            let header = s.split(',').next().unwrap_or("data:");
            Value::String(format!("{header},… ({} kB)", s.len() / 1024))
        }
        Value::String(s) => Value::String(truncate_with_suffix(s, PREVIEW_STRING_CHARS, "…")),
        Value::Array(items) => Value::Array(items.iter().map(abbreviate_payload).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), abbreviate_payload(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Pretty-printed, abbreviated JSON for display.
pub fn preview_text(value: &Value) -> String {
    serde_json::to_string_pretty(&abbreviate_payload(value)).unwrap_or_else(|_| value.to_string())
}

/// Colours pretty-printed JSON.
///
/// A string token is treated as an object key when the next non-blank character
/// is a colon.
pub fn highlight_json(text: &str, font_id: egui::FontId, dark_mode: bool) -> LayoutJob {
    let palette = JsonPalette::new(dark_mode);
    let mut job = LayoutJob::default();
    let bytes = text.as_bytes();
    let append = |job: &mut LayoutJob, range: std::ops::Range<usize>, color: Color32| {
        job.append(&text[range], 0.0, TextFormat::simple(font_id.clone(), color));
    };

    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += text[i..].chars().next().map_or(1, char::len_utf8);
                }
                i = (i + 1).min(bytes.len());
                let is_key = text[i..].trim_start().starts_with(':');
                append(&mut job, start..i, if is_key { palette.key } else { palette.string });
            }
            b'-' | b'0'..=b'9' => {
                i += 1;
                while i < bytes.len() && matches!(bytes[i], b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-') {
                    i += 1;
                }
                append(&mut job, start..i, palette.number);
            }
            b'a'..=b'z' => {
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                append(&mut job, start..i, palette.literal);
            }
            _ => {
                // Advance by a whole character so multi-byte text stays on a boundary.
                let width = text[i..].chars().next().map_or(1, char::len_utf8);
                i += width;
                append(&mut job, start..i, palette.punctuation);
            }
        }
    }
    job
}
