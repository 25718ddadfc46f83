//! Node identifiers and per-node payloads.

use smol_str::SmolStr;

/// Elements that never have children or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is raw text (no markup, no character references).
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Index of a node inside its owning [`Document`](crate::Document).
///
/// Ids are only meaningful for the document that created them. Cloning a
/// document preserves ids; [`Document::clone_subtree`](crate::Document::clone_subtree)
/// does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The synthetic root every document carries.
    Fragment,
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// A single `name="value"` pair. Names are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: SmolStr,
    pub value: String,
}

/// Tag name plus attributes, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: SmolStr,
    attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: SmolStr::new(tag.to_ascii_lowercase()),
            attrs: Vec::new(),
        }
    }

    /// Lowercase tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    pub fn is_raw_text(&self) -> bool {
        RAW_TEXT_ELEMENTS.contains(&self.tag.as_str())
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value,
            None => self.attrs.push(Attribute {
                name: SmolStr::new(name.to_ascii_lowercase()),
                value,
            }),
        }
    }

    /// Push an attribute parsed from markup. Duplicates keep the first value,
    /// the same way browsers treat repeated attributes.
    pub(crate) fn push_parsed_attr(&mut self, name: &str, value: String) {
        if !self.has_attr(name) {
            self.attrs.push(Attribute {
                name: SmolStr::new(name.to_ascii_lowercase()),
                value,
            });
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self
            .attrs
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(idx).value)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Add a class token. The attribute is rewritten as single-space-joined tokens.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut tokens: Vec<String> = self.classes().map(str::to_owned).collect();
        tokens.push(class.to_owned());
        self.set_attr("class", tokens.join(" "));
    }

    /// Remove a class token. Returns whether the token was present.
    ///
    /// The attribute itself stays, possibly as `class=""`.
    pub fn remove_class(&mut self, class: &str) -> bool {
        if !self.has_class(class) {
            return false;
        }
        let tokens: Vec<&str> = self.classes().filter(|c| *c != class).collect();
        let joined = tokens.join(" ");
        self.set_attr("class", joined);
        true
    }
}
