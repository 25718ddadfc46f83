//! Interface to the rich-text editing engine.
//!
//! The engine is the only thing that mutates the live document. The widget
//! core reads its surface, asks it about formats and commands, and wraps every
//! correction it makes in an undo transaction.

use std::fmt;

use inline_text_dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::EngineError;

/// Identity of one engine instance. Host commands carry it to pick their target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorHandle(SmolStr);

impl EditorHandle {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A DOM boundary point. For text nodes `offset` counts chars, for elements
/// it counts children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Live selection range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomSelection {
    pub start: DomPoint,
    pub end: DomPoint,
}

impl DomSelection {
    pub fn collapsed(point: DomPoint) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// The subset of computed style the widget reads. Values are raw CSS strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<String>,
}

/// Payload of the engine's node-change notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeChangeEvent {
    /// Element the engine considers current, if any.
    pub element: Option<NodeId>,
}

/// Rich-text editing engine primitives.
///
/// Fallible queries return [`EngineError`]; callers in this crate treat any
/// error as "not available" and carry on.
pub trait EditingEngine {
    fn handle(&self) -> &EditorHandle;

    /// The live editable document.
    fn surface(&self) -> &Document;

    /// Root of the editable content. Ancestor walks stop here.
    fn body(&self) -> NodeId {
        self.surface().root()
    }

    fn selection(&self) -> Option<DomSelection>;

    /// Collapse the selection to `point`.
    fn set_cursor(&mut self, point: DomPoint);

    fn computed_style(&self, node: NodeId) -> Option<ComputedStyle>;

    /// Whether a named format applies at the selection.
    fn format_matches(&self, format: &str) -> Result<bool, EngineError>;

    fn query_command_state(&self, command: &str) -> Result<bool, EngineError>;

    /// Command value. Engines may report the last used value even when the
    /// format is no longer active.
    fn query_command_value(&self, command: &str) -> Result<Option<String>, EngineError>;

    fn apply_format(&mut self, format: &str, value: Option<&str>) -> Result<(), EngineError>;

    fn remove_format(&mut self, format: &str) -> Result<(), EngineError>;

    fn exec_command(
        &mut self,
        command: &str,
        ui: bool,
        value: Option<&str>,
    ) -> Result<(), EngineError>;

    /// Start grouping mutations into one undo step. Calls nest.
    fn begin_transaction(&mut self);

    fn end_transaction(&mut self);

    /// Serialized content, or `None` when the engine cannot produce any.
    fn content(&self) -> Option<String>;

    fn set_content(&mut self, html: &str);

    fn focus(&mut self);

    fn show(&mut self);

    fn hide(&mut self);

    /// Ask the engine to re-evaluate its state. Must not call back into the
    /// session synchronously.
    fn node_changed(&mut self);

    /// An object (image, embed) is selected rather than text.
    fn has_selected_object(&self) -> bool {
        false
    }

    /// Element at the selection start.
    ///
    /// Text containers map to their parent. Element containers map to the
    /// child at the offset (clamped to the last child) when that child is an
    /// element, and to the container otherwise.
    fn caret_element(&self) -> Option<NodeId> {
        let start = self.selection()?.start;
        let doc = self.surface();
        if !doc.is_valid(start.node) {
            return None;
        }
        if doc.is_text(start.node) {
            return doc.parent(start.node);
        }
        let children = doc.children(start.node);
        if let Some(last) = children.len().checked_sub(1) {
            let child = children[start.offset.min(last)];
            if doc.is_element(child) {
                return Some(child);
            }
        }
        Some(start.node)
    }
}

/// Run `f` inside one undo transaction.
pub fn transact<E, R>(engine: &mut E, f: impl FnOnce(&mut E) -> R) -> R
where
    E: EditingEngine + ?Sized,
{
    engine.begin_transaction();
    let result = f(engine);
    engine.end_transaction();
    result
}
