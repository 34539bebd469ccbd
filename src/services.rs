//! Services injected into nodes at construction time.

use crate::error::FlowError;
use crate::theme::Theme;
use crate::type_colors::TypeColorRegistry;
use std::cell::RefCell;
use std::rc::Rc;

/// A globally registered sink for user-facing error dialogs.
pub trait DialogService {
    /// Shows an error raised by a node.
    fn show_error(&self, title: &str, message: &str) -> Result<(), FlowError>;
}

/// Dialog service that queues messages for the application to show as a window.
#[derive(Debug, Default)]
pub struct ErrorDialogQueue {
    pending: RefCell<Vec<(String, String)>>,
}

impl ErrorDialogQueue {
    /// Takes all queued `(title, message)` pairs.
    pub fn drain(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

impl DialogService for ErrorDialogQueue {
    fn show_error(&self, title: &str, message: &str) -> Result<(), FlowError> {
        let mut pending = self
            .pending
            .try_borrow_mut()
            .map_err(|e| FlowError::Dialog(e.to_string()))?;
        pending.push((title.to_string(), message.to_string()));
        Ok(())
    }
}

/// Services shared by every node of an editor.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    /// Colour palette
    pub theme: Theme,
    /// Slot type colours
    pub type_colors: Rc<TypeColorRegistry>,
    /// Optional error dialog sink
    pub dialogs: Option<Rc<dyn DialogService>>,
}

impl ServiceRegistry {
    /// Registry with default theme and colours and the given dialog sink.
    pub fn with_dialogs(dialogs: Rc<dyn DialogService>) -> Self {
        Self {
            dialogs: Some(dialogs),
            ..Default::default()
        }
    }
}
