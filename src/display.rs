//! Derivation of the short display text shown on a node's face.
//!
//! Results can be arbitrarily large, so the text is always a bounded summary of the
//! payload rather than the payload itself.

use crate::constants::*;
use serde_json::Value;

/// Returns the value to summarize: the only entry of a single-key result object,
/// otherwise the result itself.
pub fn single_output_value(result: &Value) -> &Value {
    match result.as_object() {
        Some(map) if map.len() == 1 => map.values().next().unwrap_or(result),
        _ => result,
    }
}

/// Builds the display text for a result. Never panics; unprintable values produce
/// [`UNPRINTABLE_PLACEHOLDER`].
pub fn format_display_text(result: &Value) -> String {
    let value = single_output_value(result);
    if exceeds_depth(value, MAX_DISPLAY_DEPTH) {
        log::debug!("Result nested deeper than {MAX_DISPLAY_DEPTH}, using placeholder");
        return UNPRINTABLE_PLACEHOLDER.to_string();
    }

    match value {
        Value::String(s) => truncate_with_suffix(s, MAX_STRING_DISPLAY, TRUNCATION_SUFFIX),
        Value::Object(map) if map.contains_key("content") => format_chat_message(map),
        Value::Array(items) if items.len() <= SMALL_ARRAY_LEN => {
            pretty(value).map_or_else(placeholder, |s| truncate_with_suffix(&s, MAX_SMALL_ARRAY_DISPLAY, "..."))
        }
        Value::Array(items) => {
            let head = Value::Array(items.iter().take(2).cloned().collect());
            match pretty(&head) {
                Ok(head) => truncate_with_suffix(
                    &format!("{} items\n{}", items.len(), head),
                    MAX_OBJECT_DISPLAY,
                    "...",
                ),
                Err(_) => placeholder(()),
            }
        }
        Value::Object(_) => {
            pretty(value).map_or_else(placeholder, |s| truncate_with_suffix(&s, MAX_OBJECT_DISPLAY, "..."))
        }
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
    }
}

fn format_chat_message(map: &serde_json::Map<String, Value>) -> String {
    let content = match map.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => pretty(other).unwrap_or_else(|_| UNPRINTABLE_PLACEHOLDER.to_string()),
    };
    let mut text = match map.get("role").and_then(Value::as_str) {
        Some(role) => format!("[{role}]\n{content}"),
        None => content,
    };
    let tool_calls = map
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    if tool_calls > 0 {
        let plural = if tool_calls == 1 { "" } else { "s" };
        text.push_str(&format!("\n[{tool_calls} tool call{plural}]"));
    }
    truncate_with_suffix(&text, MAX_OBJECT_DISPLAY, "...")
}

fn pretty(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn placeholder<E>(_: E) -> String {
    UNPRINTABLE_PLACEHOLDER.to_string()
}

/// Keeps at most `max_chars` characters of `text`, appending `suffix` when cut.
pub fn truncate_with_suffix(text: &str, max_chars: usize, suffix: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], suffix),
        None => text.to_string(),
    }
}

/// Iteratively checks whether a value nests deeper than `limit`.
fn exceeds_depth(value: &Value, limit: usize) -> bool {
    let mut stack = vec![(value, 0usize)];
    while let Some((v, depth)) = stack.pop() {
        if depth > limit {
            return true;
        }
        match v {
            Value::Array(items) => stack.extend(items.iter().map(|i| (i, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|i| (i, depth + 1))),
            _ => {}
        }
    }
    false
}
