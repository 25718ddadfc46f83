use std::collections::HashMap;

use smol_str::SmolStr;

use crate::engine::EditorHandle;

/// Engine handle per widget id, owned by the host page.
#[derive(Debug, Default)]
pub struct EditorRegistry {
    editors: HashMap<SmolStr, EditorHandle>,
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle previously registered for `widget_id`, if any.
    pub fn register(&mut self, widget_id: impl Into<SmolStr>, handle: EditorHandle) -> Option<EditorHandle> {
        self.editors.insert(widget_id.into(), handle)
    }

    pub fn unregister(&mut self, widget_id: &str) -> Option<EditorHandle> {
        self.editors.remove(widget_id)
    }

    pub fn get(&self, widget_id: &str) -> Option<&EditorHandle> {
        self.editors.get(widget_id)
    }

    /// Widget id owning `handle`.
    pub fn widget_for(&self, handle: &EditorHandle) -> Option<&str> {
        self.editors
            .iter()
            .find(|(_, h)| *h == handle)
            .map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }
}
