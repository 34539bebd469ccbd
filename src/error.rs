//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised by node, widget, image and execution plumbing.
///
/// None of these escape the UI boundary: callers log them and fall back to a
/// degraded rendering.
#[derive(Error, Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum FlowError {
    #[error("Failed to fetch data source '{endpoint}': {message}")]
    DataSource { endpoint: String, message: String },

    #[error("Invalid data URL: {0}")]
    DataUrl(String),

    #[error("Failed to decode image '{label}': {message}")]
    ImageDecode { label: String, message: String },

    #[error("Cannot connect {output_type} to input {input_index} of type {input_type}")]
    IncompatibleTypes {
        input_index: usize,
        input_type: String,
        output_type: String,
    },

    #[error("Slot {index} does not exist on node '{node}'")]
    MissingSlot { node: String, index: usize },

    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    #[error("Unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("Execution channel error: {0}")]
    Channel(String),

    #[error("Failed to parse message: {0}")]
    Protocol(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Dialog service failed: {0}")]
    Dialog(String),

    #[error("File operation failed: {0}")]
    File(String),
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}
