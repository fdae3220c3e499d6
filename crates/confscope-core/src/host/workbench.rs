//! Active editor lookup.

/// The document focused in the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    /// Identifier the host uses for the document (an output channel's file
    /// name for log documents).
    pub id: String,
    /// Currently selected text, empty when nothing is selected.
    pub selected_text: String,
}

impl ActiveDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            selected_text: String::new(),
        }
    }

    pub fn with_selection(mut self, text: impl Into<String>) -> Self {
        self.selected_text = text.into();
        self
    }

    pub fn has_selection(&self) -> bool {
        !self.selected_text.is_empty()
    }
}

pub trait Workbench: Send + Sync {
    fn active_document(&self) -> Option<ActiveDocument>;
}
