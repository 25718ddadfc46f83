//! In-memory collaborators for tests and demos.
//!
//! [`MemoryEngine`] is a small editing engine over an [`inline_text_dom::Document`].
//! It behaves like a browser editor where the core cares: formats applied at
//! a collapsed caret go into a zero-width helper span, computed style inherits
//! through ancestors, and every mutation is recorded for undo.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use inline_text_dom::{Document, NodeId, ZERO_WIDTH_NO_BREAK_SPACE, ZERO_WIDTH_SPACE, legacy_font_size};
use smol_str::SmolStr;

use crate::engine::{ComputedStyle, DomPoint, DomSelection, EditingEngine, EditorHandle};
use crate::error::{BoxError, EngineError};
use crate::host::{HostBridge, HostEvent};
use crate::save::{ContentHook, HookOutput, Transport, WidgetUpdate};

const ENTER_BLOCK_TAGS: &[&str] = &[
    "p", "li", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "div",
];

#[derive(Debug, Clone, Copy)]
enum FormatKind {
    /// Inline style property on a span.
    Style(&'static str),
    /// Wrapping element. The first tag is the one created.
    Tag(&'static [&'static str]),
}

fn format_kind(name: &str) -> Option<FormatKind> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "forecolor" => FormatKind::Style("color"),
        "hilitecolor" => FormatKind::Style("background-color"),
        "fontname" => FormatKind::Style("font-family"),
        "fontsize" => FormatKind::Style("font-size"),
        "subscript" => FormatKind::Tag(&["sub"]),
        "superscript" => FormatKind::Tag(&["sup"]),
        "bold" => FormatKind::Tag(&["strong", "b"]),
        "italic" => FormatKind::Tag(&["em", "i"]),
        "underline" => FormatKind::Tag(&["u"]),
        _ => return None,
    };
    Some(kind)
}

fn is_zero_width_only(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c == ZERO_WIDTH_SPACE || c == ZERO_WIDTH_NO_BREAK_SPACE)
}

fn failed(command: &str, reason: &str) -> EngineError {
    EngineError::CommandFailed {
        command: SmolStr::new(command),
        reason: reason.to_owned(),
    }
}

/// Editing engine backed by an in-memory document.
#[derive(Debug)]
pub struct MemoryEngine {
    handle: EditorHandle,
    doc: Document,
    selection: Option<DomSelection>,
    base: ComputedStyle,
    class_styles: HashMap<String, ComputedStyle>,
    last_fore: Option<String>,
    last_back: Option<String>,
    undo_stack: Vec<(Document, Option<DomSelection>)>,
    depth: usize,
    checkpointed: bool,
    failing_formats: HashSet<String>,
    failing_commands: HashSet<String>,
    commands: Vec<String>,
    content_unavailable: bool,
    visible: bool,
    focused: bool,
    node_changes: usize,
    selected_object: bool,
}

impl MemoryEngine {
    /// New engine over `html`, with no selection.
    pub fn new(handle: &str, html: &str) -> Self {
        Self {
            handle: EditorHandle::new(handle),
            doc: Document::parse_fragment(html),
            selection: None,
            base: ComputedStyle {
                color: Some("rgb(0, 0, 0)".into()),
                background_color: Some("rgb(255, 255, 255)".into()),
                font_family: Some("Arial".into()),
                font_size: Some("16px".into()),
            },
            class_styles: HashMap::new(),
            last_fore: None,
            last_back: None,
            undo_stack: Vec::new(),
            depth: 0,
            checkpointed: false,
            failing_formats: HashSet::new(),
            failing_commands: HashSet::new(),
            commands: Vec::new(),
            content_unavailable: false,
            visible: true,
            focused: false,
            node_changes: 0,
            selected_object: false,
        }
    }

    /// First attached text node equal to `needle`, else the first containing it.
    pub fn find_text(&self, needle: &str) -> Option<NodeId> {
        let texts: Vec<NodeId> = self
            .doc
            .descendants(self.doc.root())
            .into_iter()
            .filter(|n| self.doc.is_text(*n))
            .collect();
        texts
            .iter()
            .copied()
            .find(|n| self.doc.text(*n) == Some(needle))
            .or_else(|| {
                texts
                    .iter()
                    .copied()
                    .find(|n| self.doc.text(*n).is_some_and(|t| t.contains(needle)))
            })
    }

    /// Style sheet rule for `.class`.
    pub fn add_class_style(&mut self, class: &str, style: ComputedStyle) {
        self.class_styles.insert(class.to_owned(), style);
    }

    /// Values `query_command_value` reports for the color commands, whether
    /// or not the format is active.
    pub fn set_last_command_colors(&mut self, fore: Option<&str>, back: Option<&str>) {
        self.last_fore = fore.map(str::to_owned);
        self.last_back = back.map(str::to_owned);
    }

    pub fn set_selection(&mut self, start: DomPoint, end: DomPoint) {
        self.selection = Some(DomSelection { start, end });
    }

    pub fn fail_format(&mut self, format: &str) {
        self.failing_formats.insert(format.to_ascii_lowercase());
    }

    pub fn fail_command(&mut self, command: &str) {
        self.failing_commands.insert(command.to_ascii_lowercase());
    }

    /// Every command passed to `exec_command`, failed ones included.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn set_content_unavailable(&mut self, unavailable: bool) {
        self.content_unavailable = unavailable;
    }

    pub fn set_selected_object(&mut self, selected: bool) {
        self.selected_object = selected;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// How many times `node_changed` was called.
    pub fn node_change_count(&self) -> usize {
        self.node_changes
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Revert the last undo step. Returns `false` when there is none.
    pub fn undo(&mut self) -> bool {
        let Some((doc, selection)) = self.undo_stack.pop() else {
            return false;
        };
        self.doc = doc;
        self.selection = selection;
        true
    }

    /// Block containing the caret.
    pub fn caret_block(&self) -> Option<NodeId> {
        let start = self.caret_element()?;
        self.doc
            .closest(start, ENTER_BLOCK_TAGS, Some(self.doc.root()))
    }

    /// Split off a new empty block after the caret block, the way a browser
    /// editor handles Enter at the end of a line. Inline formatting is not
    /// carried over.
    pub fn press_enter(&mut self) {
        let Some(block) = self.caret_block() else {
            return;
        };
        self.checkpoint();
        let tag = if self.doc.is_tag(block, &["li"]) { "li" } else { "p" };
        let fresh = self.doc.create_element(tag);
        let br = self.doc.create_element("br");
        self.doc.append_child(fresh, br);
        if let (Some(parent), Some(index)) = (self.doc.parent(block), self.doc.child_index(block)) {
            self.doc.insert_child(parent, index + 1, fresh);
        }
        self.selection = Some(DomSelection::collapsed(DomPoint::new(fresh, 0)));
    }

    /// Insert `text` at the caret and move the caret after it.
    pub fn type_text(&mut self, text: &str) {
        let Some(point) = self.selection.map(|s| s.start) else {
            return;
        };
        self.checkpoint();
        let typed = text.chars().count();
        if let Some(current) = self.doc.text(point.node).map(str::to_owned) {
            let offset = point.offset.min(current.chars().count());
            let byte = current
                .char_indices()
                .nth(offset)
                .map_or(current.len(), |(i, _)| i);
            let mut updated = current;
            updated.insert_str(byte, text);
            self.doc.set_text(point.node, updated);
            self.selection = Some(DomSelection::collapsed(DomPoint::new(
                point.node,
                offset + typed,
            )));
        } else {
            let node = self.doc.create_text(text);
            self.doc.insert_child(point.node, point.offset, node);
            self.selection = Some(DomSelection::collapsed(DomPoint::new(node, typed)));
        }
    }

    fn checkpoint(&mut self) {
        if self.depth > 0 {
            if self.checkpointed {
                return;
            }
            self.checkpointed = true;
        }
        self.undo_stack.push((self.doc.clone(), self.selection));
    }

    /// Elements from the caret up to the root, innermost first.
    fn caret_ancestry(&self) -> Vec<NodeId> {
        let Some(start) = self.caret_element() else {
            return Vec::new();
        };
        let root = self.doc.root();
        self.doc
            .ancestors(start)
            .take_while(|n| *n != root)
            .filter(|n| self.doc.is_element(*n))
            .collect()
    }

    fn has_format(&self, id: NodeId, kind: FormatKind) -> bool {
        match kind {
            FormatKind::Style(property) => self.doc.style_property(id, property).is_some(),
            FormatKind::Tag(tags) => self.doc.is_tag(id, tags),
        }
    }

    /// Value an element sets itself, from inline style, a class rule or a
    /// legacy attribute.
    fn own_value(&self, id: NodeId, property: &str) -> Option<String> {
        if let Some(value) = self.doc.style_property(id, property) {
            return Some(value);
        }
        let from_class = self.doc.element(id).and_then(|el| {
            el.classes().find_map(|class| {
                let style = self.class_styles.get(class)?;
                match property {
                    "color" => style.color.clone(),
                    "background-color" => style.background_color.clone(),
                    "font-family" => style.font_family.clone(),
                    "font-size" => style.font_size.clone(),
                    _ => None,
                }
            })
        });
        if from_class.is_some() {
            return from_class;
        }
        let font = self.doc.is_tag(id, &["font"]);
        match property {
            "color" if font => self.doc.attr(id, "color").map(str::to_owned),
            "font-family" if font => self.doc.attr(id, "face").map(str::to_owned),
            "font-size" if font => self
                .doc
                .attr(id, "size")
                .and_then(legacy_font_size)
                .map(str::to_owned),
            "background-color" => self
                .doc
                .style_property(id, "background")
                .or_else(|| self.doc.attr(id, "bgcolor").map(str::to_owned)),
            _ => None,
        }
    }

    fn apply_at_caret(&mut self, format: &str, value: Option<&str>) -> Result<(), EngineError> {
        let kind = format_kind(format).ok_or_else(|| EngineError::UnknownFormat(format.into()))?;
        let point = self
            .selection
            .map(|s| s.start)
            .ok_or_else(|| failed(format, "no selection"))?;

        match kind {
            FormatKind::Style(property) => {
                let value = value.ok_or_else(|| failed(format, "value required"))?;
                self.checkpoint();
                let target = self.format_target(point, "span");
                self.doc.set_style_property(target, property, value);
                match property {
                    "color" => self.last_fore = Some(value.to_owned()),
                    "background-color" => self.last_back = Some(value.to_owned()),
                    _ => {}
                }
            }
            FormatKind::Tag(tags) => {
                self.checkpoint();
                self.format_target(point, tags[0]);
            }
        }
        Ok(())
    }

    /// Element that receives a format at `point`: the zero-width helper
    /// already there, the wrapped text node, or a new helper at the caret.
    fn format_target(&mut self, point: DomPoint, tag: &str) -> NodeId {
        if let Some(text) = self.doc.text(point.node) {
            let parent = self.doc.parent(point.node);
            if is_zero_width_only(text) {
                if let Some(parent) = parent.filter(|p| self.doc.is_tag(*p, &[tag])) {
                    return parent;
                }
            }
            let wrapper = self.doc.create_element(tag);
            if self.doc.insert_before(point.node, wrapper) {
                self.doc.append_child(wrapper, point.node);
            }
            return wrapper;
        }

        let helper = self.doc.create_element(tag);
        let zw = self.doc.create_text(ZERO_WIDTH_SPACE.to_string());
        self.doc.append_child(helper, zw);
        self.doc.insert_child(point.node, point.offset, helper);
        self.selection = Some(DomSelection::collapsed(DomPoint::new(zw, 1)));
        helper
    }

    fn remove_at_caret(&mut self, format: &str) -> Result<(), EngineError> {
        let kind = format_kind(format).ok_or_else(|| EngineError::UnknownFormat(format.into()))?;
        let targets: Vec<NodeId> = self
            .caret_ancestry()
            .into_iter()
            .filter(|n| self.has_format(*n, kind))
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        self.checkpoint();
        for id in targets {
            match kind {
                FormatKind::Tag(_) => self.unwrap_keeping_caret(id),
                FormatKind::Style(property) => {
                    self.doc.remove_style_property(id, property);
                    let bare = self
                        .doc
                        .element(id)
                        .is_some_and(|el| el.tag() == "span" && el.attrs().is_empty());
                    if bare {
                        self.unwrap_keeping_caret(id);
                    }
                }
            }
        }
        Ok(())
    }

    fn unwrap_keeping_caret(&mut self, id: NodeId) {
        if let (Some(parent), Some(index)) = (self.doc.parent(id), self.doc.child_index(id)) {
            if let Some(selection) = self.selection.as_mut() {
                for point in [&mut selection.start, &mut selection.end] {
                    if point.node == id {
                        *point = DomPoint::new(parent, index + point.offset);
                    }
                }
            }
        }
        self.doc.unwrap(id);
    }

    fn toggle_at_caret(&mut self, format: &str) -> Result<(), EngineError> {
        if self.format_matches(format)? {
            self.remove_at_caret(format)
        } else {
            self.apply_at_caret(format, None)
        }
    }

    fn computed_value(&self, chain: &[NodeId], property: &str) -> Option<String> {
        chain.iter().find_map(|id| self.own_value(*id, property))
    }
}

impl EditingEngine for MemoryEngine {
    fn handle(&self) -> &EditorHandle {
        &self.handle
    }

    fn surface(&self) -> &Document {
        &self.doc
    }

    fn selection(&self) -> Option<DomSelection> {
        self.selection
    }

    fn set_cursor(&mut self, point: DomPoint) {
        self.selection = Some(DomSelection::collapsed(point));
    }

    fn computed_style(&self, node: NodeId) -> Option<ComputedStyle> {
        if !self.doc.is_valid(node) {
            return None;
        }
        let root = self.doc.root();
        let start = if node == root || self.doc.is_element(node) {
            node
        } else {
            self.doc.parent(node)?
        };
        let chain: Vec<NodeId> = self.doc.ancestors(start).collect();
        let background = self.own_value(start, "background-color").or_else(|| {
            if start == root {
                self.base.background_color.clone()
            } else {
                Some("rgba(0, 0, 0, 0)".to_owned())
            }
        });
        Some(ComputedStyle {
            color: self
                .computed_value(&chain, "color")
                .or_else(|| self.base.color.clone()),
            background_color: background,
            font_family: self
                .computed_value(&chain, "font-family")
                .or_else(|| self.base.font_family.clone()),
            font_size: self
                .computed_value(&chain, "font-size")
                .or_else(|| self.base.font_size.clone()),
        })
    }

    fn format_matches(&self, format: &str) -> Result<bool, EngineError> {
        let kind = format_kind(format).ok_or_else(|| EngineError::UnknownFormat(format.into()))?;
        Ok(self
            .caret_ancestry()
            .into_iter()
            .any(|n| self.has_format(n, kind)))
    }

    fn query_command_state(&self, command: &str) -> Result<bool, EngineError> {
        match command.to_ascii_lowercase().as_str() {
            format @ ("subscript" | "superscript" | "bold" | "italic" | "underline") => {
                self.format_matches(format)
            }
            _ => Err(EngineError::UnknownCommand(command.into())),
        }
    }

    fn query_command_value(&self, command: &str) -> Result<Option<String>, EngineError> {
        let computed = || {
            self.caret_element()
                .and_then(|n| self.computed_style(n))
                .unwrap_or_default()
        };
        match command.to_ascii_lowercase().as_str() {
            "forecolor" => Ok(self.last_fore.clone()),
            "hilitecolor" | "backcolor" => Ok(self.last_back.clone()),
            "fontname" => Ok(computed().font_family),
            "fontsize" => Ok(computed().font_size),
            _ => Err(EngineError::UnknownCommand(command.into())),
        }
    }

    fn apply_format(&mut self, format: &str, value: Option<&str>) -> Result<(), EngineError> {
        if self.failing_formats.contains(&format.to_ascii_lowercase()) {
            return Err(failed(format, "format rejected"));
        }
        self.apply_at_caret(format, value)
    }

    fn remove_format(&mut self, format: &str) -> Result<(), EngineError> {
        self.remove_at_caret(format)
    }

    fn exec_command(
        &mut self,
        command: &str,
        _ui: bool,
        value: Option<&str>,
    ) -> Result<(), EngineError> {
        self.commands.push(command.to_owned());
        let lower = command.to_ascii_lowercase();
        if self.failing_commands.contains(&lower) {
            return Err(failed(command, "command rejected"));
        }
        match lower.as_str() {
            "forecolor" => self.apply_at_caret("forecolor", value),
            "hilitecolor" | "backcolor" => self.apply_at_caret("hilitecolor", value),
            "fontname" => self.apply_at_caret("fontname", value),
            "fontsize" => self.apply_at_caret("fontsize", value),
            "subscript" | "superscript" | "bold" | "italic" | "underline" => {
                self.toggle_at_caret(&lower)
            }
            "mcetoggleformat" => {
                let format = value.ok_or_else(|| failed(command, "format name required"))?;
                self.toggle_at_caret(format)
            }
            "inserttext" => {
                self.type_text(value.unwrap_or_default());
                Ok(())
            }
            _ => Err(EngineError::UnknownCommand(command.into())),
        }
    }

    fn begin_transaction(&mut self) {
        if self.depth == 0 {
            self.checkpointed = false;
        }
        self.depth += 1;
    }

    fn end_transaction(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn content(&self) -> Option<String> {
        if self.content_unavailable {
            return None;
        }
        Some(self.doc.inner_html(self.doc.root()))
    }

    fn set_content(&mut self, html: &str) {
        self.checkpoint();
        let root = self.doc.root();
        self.doc
            .replace_children_from(root, &Document::parse_fragment(html));
        self.selection = None;
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn node_changed(&mut self) {
        self.node_changes += 1;
    }

    fn has_selected_object(&self) -> bool {
        self.selected_object
    }
}

/// Host bridge that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingHost {
    events: RefCell<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<HostEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl HostBridge for RecordingHost {
    fn emit(&self, event: HostEvent) {
        tracing::trace!(?event, "host event");
        self.events.borrow_mut().push(event);
    }
}

/// Transport that records calls and can be switched to failing.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    calls: RefCell<Vec<(String, WidgetUpdate)>>,
    failing: Cell<bool>,
}

impl MemoryTransport {
    pub fn calls(&self) -> Vec<(String, WidgetUpdate)> {
        self.calls.borrow().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

impl Transport for MemoryTransport {
    async fn update_widget(&self, widget_id: &str, update: WidgetUpdate) -> Result<(), BoxError> {
        if self.failing.get() {
            return Err("transport offline".into());
        }
        self.calls.borrow_mut().push((widget_id.to_owned(), update));
        Ok(())
    }
}

/// Hook with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticHook {
    output: Option<HookOutput>,
}

impl StaticHook {
    pub fn new(output: HookOutput) -> Self {
        Self {
            output: Some(output),
        }
    }

    pub fn failing() -> Self {
        Self { output: None }
    }
}

impl ContentHook for StaticHook {
    async fn before_save(&self, _html: &str) -> Result<HookOutput, BoxError> {
        self.output.clone().ok_or_else(|| "hook rejected".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_at_empty_line_uses_helper_span() {
        let mut engine = MemoryEngine::new("ed-1", "<p><br></p>");
        let p = engine.surface().children(engine.body())[0];
        engine.set_cursor(DomPoint::new(p, 0));
        engine.apply_format("forecolor", Some("red")).unwrap();
        engine.apply_format("fontsize", Some("20px")).unwrap();
        assert_eq!(
            engine.content().unwrap(),
            "<p><span style=\"color: red; font-size: 20px;\">\u{200B}</span><br></p>"
        );
        assert!(engine.format_matches("forecolor").unwrap());
        assert_eq!(engine.query_command_value("ForeColor").unwrap().as_deref(), Some("red"));
    }

    #[test]
    fn test_computed_style_inherits() {
        let engine = MemoryEngine::new(
            "ed-1",
            "<p style=\"background-color: blue\"><font color=\"green\" face=\"Times\"><em>x</em></font></p>",
        );
        let x = engine.find_text("x").unwrap();
        let style = engine.computed_style(x).unwrap();
        assert_eq!(style.color.as_deref(), Some("green"));
        assert_eq!(style.font_family.as_deref(), Some("Times"));
        assert_eq!(style.font_size.as_deref(), Some("16px"));
        // Backgrounds do not inherit.
        assert_eq!(style.background_color.as_deref(), Some("rgba(0, 0, 0, 0)"));
    }

    #[test]
    fn test_transaction_is_one_undo_step() {
        let mut engine = MemoryEngine::new("ed-1", "<p>ab</p>");
        let ab = engine.find_text("ab").unwrap();
        engine.set_cursor(DomPoint::new(ab, 1));
        engine.begin_transaction();
        engine.exec_command("Bold", false, None).unwrap();
        engine.begin_transaction();
        engine.exec_command("Subscript", false, None).unwrap();
        engine.end_transaction();
        engine.end_transaction();
        assert_eq!(engine.undo_depth(), 1);
        assert_eq!(engine.content().unwrap(), "<p><strong><sub>ab</sub></strong></p>");
        assert!(engine.undo());
        assert_eq!(engine.content().unwrap(), "<p>ab</p>");
    }

    #[test]
    fn test_remove_unwraps_and_keeps_caret() {
        let mut engine = MemoryEngine::new("ed-1", "<p><sup>x</sup>y</p>");
        let p = engine.surface().children(engine.body())[0];
        engine.set_cursor(DomPoint::new(p, 0));
        assert!(engine.query_command_state("Superscript").unwrap());
        engine.remove_format("superscript").unwrap();
        assert_eq!(engine.content().unwrap(), "<p>xy</p>");
        assert!(!engine.query_command_state("superscript").unwrap());
    }

    #[test]
    fn test_unknown_names() {
        let mut engine = MemoryEngine::new("ed-1", "<p>x</p>");
        assert_eq!(
            engine.format_matches("sparkle"),
            Err(EngineError::UnknownFormat("sparkle".into()))
        );
        assert!(matches!(
            engine.exec_command("Sparkle", false, None),
            Err(EngineError::UnknownCommand(_))
        ));
        assert_eq!(engine.commands(), ["Sparkle"]);
    }

    #[test]
    fn test_type_text_in_helper() {
        let mut engine = MemoryEngine::new("ed-1", "<p><br></p>");
        let p = engine.surface().children(engine.body())[0];
        engine.set_cursor(DomPoint::new(p, 0));
        engine.exec_command("mceToggleFormat", false, Some("italic")).unwrap();
        engine.type_text("Hi");
        assert_eq!(engine.content().unwrap(), "<p><em>\u{200B}Hi</em><br></p>");
    }
}
