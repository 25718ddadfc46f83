//! Arena-backed DOM tree.
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Detached
//! nodes stay in the arena (no parent) and can be re-inserted; nothing is ever
//! freed until the document is dropped. Every document owns one synthetic
//! fragment root, which plays the role of `body` for parsed markup.

use crate::node::{ElementData, NodeId, NodeKind};
use crate::style::StyleDeclarations;

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the fragment root.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                kind: NodeKind::Fragment,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    /// Whether `id` belongs to this document's arena.
    pub fn is_valid(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    // === Creation ===

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData::new(tag)))
    }

    pub(crate) fn create_element_from(&mut self, data: ElementData) -> NodeId {
        self.push(NodeKind::Element(data))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    // === Inspection ===

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.data(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.data_mut(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Text(_))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Replace the value of a text node. No-op for other node kinds.
    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeKind::Text(t) = &mut self.data_mut(id).kind {
            *t = value.into();
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::tag)
    }

    /// Element whose tag is one of `tags`.
    pub fn is_tag(&self, id: NodeId, tags: &[&str]) -> bool {
        self.tag_name(id).is_some_and(|t| tags.contains(&t))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// Parent if it is an element (the fragment root is not an element).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Iterate from `id` (inclusive) up to the top of its tree.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Nearest inclusive ancestor whose tag is one of `tags`, not crossing
    /// (and not returning) `boundary`.
    pub fn closest(&self, id: NodeId, tags: &[&str], boundary: Option<NodeId>) -> Option<NodeId> {
        self.ancestors(id)
            .take_while(|n| Some(*n) != boundary)
            .find(|n| self.is_tag(*n, tags))
    }

    /// Inclusive containment.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == ancestor)
    }

    /// All descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Descendant elements matching `pred`, in document order.
    pub fn select(&self, id: NodeId, pred: impl Fn(&ElementData) -> bool) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.element(*n).is_some_and(&pred))
            .collect()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_owned();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    // === Attributes ===

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(id) {
            el.set_attr(name, value);
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)?.remove_attr(name)
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            el.add_class(class);
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        self.element_mut(id)
            .is_some_and(|el| el.remove_class(class))
    }

    /// Parsed `style` attribute; empty when absent.
    pub fn style(&self, id: NodeId) -> StyleDeclarations {
        self.attr(id, "style")
            .map(StyleDeclarations::parse)
            .unwrap_or_default()
    }

    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        self.style(id).get(name).map(str::to_owned)
    }

    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) {
        if !self.is_element(id) {
            return;
        }
        let mut style = self.style(id);
        style.set(name, value);
        self.set_attr(id, "style", style.to_string());
    }

    /// Remove one declaration; the attribute goes away once it is empty.
    pub fn remove_style_property(&mut self, id: NodeId, name: &str) -> bool {
        let mut style = self.style(id);
        if !style.remove(name) {
            return false;
        }
        if style.is_empty() {
            self.remove_attr(id, "style");
        } else {
            self.set_attr(id, "style", style.to_string());
        }
        true
    }

    // === Mutation ===

    /// Remove `id` from its parent. The node keeps its own subtree.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.data(id).parent {
            self.data_mut(parent).children.retain(|c| *c != id);
            self.data_mut(id).parent = None;
        }
    }

    /// Insert `child` at `index` (clamped) under `parent`, detaching it first.
    ///
    /// Inserting a node under itself or one of its descendants is ignored.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if self.contains(child, parent) {
            tracing::trace!(?parent, ?child, "insert_child: refusing to create a cycle");
            return;
        }
        self.detach(child);
        let children = &mut self.data_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.data_mut(child).parent = Some(parent);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child);
    }

    /// Insert `node` right before `reference`. Returns false if `reference`
    /// has no parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        self.detach(node);
        let Some(index) = self.child_index(reference) else {
            return false;
        };
        self.insert_child(parent, index, node);
        true
    }

    /// Put `replacements` where `old` was and detach `old`.
    pub fn replace_with(&mut self, old: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        let Some(mut index) = self.child_index(old) else {
            return;
        };
        self.detach(old);
        for node in replacements {
            self.insert_child(parent, index, *node);
            index += 1;
        }
    }

    /// Replace an element by its children.
    pub fn unwrap(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        self.replace_with(id, &children);
    }

    /// Split a text node at `char_offset` (clamped). Returns the new node that
    /// holds the tail, inserted right after the original.
    pub fn split_text(&mut self, id: NodeId, char_offset: usize) -> Option<NodeId> {
        let text = self.text(id)?.to_owned();
        let byte = byte_offset(&text, char_offset);
        let (head, tail) = text.split_at(byte);
        let tail_node = self.create_text(tail);
        self.set_text(id, head);
        let parent = self.parent(id);
        if let (Some(parent), Some(index)) = (parent, self.child_index(id)) {
            self.insert_child(parent, index + 1, tail_node);
        }
        Some(tail_node)
    }

    /// Merge adjacent text nodes and drop empty ones below `id`.
    pub fn normalize(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        let mut prev_text: Option<NodeId> = None;
        for child in children {
            match self.text(child).map(str::to_owned) {
                Some(t) if t.is_empty() => self.detach(child),
                Some(t) => match prev_text {
                    Some(prev) => {
                        let merged = format!("{}{}", self.text(prev).unwrap_or_default(), t);
                        self.set_text(prev, merged);
                        self.detach(child);
                    }
                    None => prev_text = Some(child),
                },
                None => {
                    prev_text = None;
                    self.normalize(child);
                }
            }
        }
    }

    // === Paths and cloning ===

    /// Child-index path from `root` down to `node`, or `None` if `node` is not
    /// inside `root`.
    pub fn path_from(&self, root: NodeId, node: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut cur = node;
        while cur != root {
            let parent = self.parent(cur)?;
            path.push(self.children(parent).iter().position(|c| *c == cur)?);
            cur = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Follow a child-index path from `root`.
    pub fn resolve_path(&self, root: NodeId, path: &[usize]) -> Option<NodeId> {
        path.iter()
            .try_fold(root, |cur, idx| self.children(cur).get(*idx).copied())
    }

    /// Deep-clone `id` into a fresh document. The clone is the only child of
    /// the new document's root; its id is returned alongside.
    pub fn clone_subtree(&self, id: NodeId) -> (Document, NodeId) {
        let mut out = Document::new();
        let root = out.root();
        let cloned = match self.kind(id) {
            NodeKind::Fragment => {
                for child in self.children(id) {
                    self.clone_into(*child, &mut out, root);
                }
                root
            }
            _ => self.clone_into(id, &mut out, root),
        };
        (out, cloned)
    }

    fn clone_into(&self, src: NodeId, dst: &mut Document, dst_parent: NodeId) -> NodeId {
        let node = dst.push(self.kind(src).clone());
        dst.append_child(dst_parent, node);
        for child in self.children(src) {
            self.clone_into(*child, dst, node);
        }
        node
    }

    /// Replace all children of `parent` with a deep copy of `other`'s
    /// top-level nodes.
    pub fn replace_children_from(&mut self, parent: NodeId, other: &Document) {
        for child in self.children(parent).to_vec() {
            self.detach(child);
        }
        for child in other.children(other.root()) {
            other.clone_into(*child, self, parent);
        }
    }
}

/// Iterator returned by [`Document::ancestors`].
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.doc.parent(cur);
        Some(cur)
    }
}

/// Byte index of the `char_offset`-th char, clamped to the string length.
pub(crate) fn byte_offset(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}
