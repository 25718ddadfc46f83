//! Caret mirror for the host toolbar.
//!
//! The host cannot see the live editing surface, so on every caret change it
//! receives a detached clone of the block around the caret. The clone carries
//! a zero-width caret marker at the caret position and inline color hints,
//! plus a style rule for the marker classes. Only the clone is modified.

use inline_text_dom::{Document, NodeId, ZERO_WIDTH_SPACE, normalize_color};
use serde::Serialize;

use crate::engine::{EditingEngine, NodeChangeEvent};
use crate::format::{
    ColorPair, DefaultStyle, is_empty_block_at_caret, read_active_colors, read_command_colors,
};
use crate::sanitize::{MIRROR_CARET_ATTR, MIRROR_ELEMENT_CLASS, MIRROR_ROOT_CLASS};

/// Preferred mirror roots.
const BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "li"];
/// Fallback mirror roots.
const CONTAINER_TAGS: &[&str] = &["td", "th", "div"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSnapshot {
    pub html: String,
    pub style_block: String,
}

/// Colors reported for the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CaretColors {
    /// For the style block; never empty.
    color: String,
    background: String,
    /// For inline hints; empty when no color is known at all.
    color_inline: String,
}

fn caret_colors<E: EditingEngine + ?Sized>(
    engine: &E,
    defaults: &DefaultStyle,
    computed_color: Option<String>,
) -> CaretColors {
    let inline = read_active_colors(engine, defaults);
    let command = if is_empty_block_at_caret(engine) {
        read_command_colors(engine)
    } else {
        ColorPair::default()
    };
    let mut active = ColorPair {
        fore: inline.fore.clone().or(command.fore),
        back: inline.back.or(command.back),
    };

    // A stale "last used" engine color must not paint default text.
    let default_caret = defaults.fore_color.is_some() && computed_color == defaults.fore_color;
    if default_caret && inline.fore.is_none() {
        active.fore = None;
    }

    let default_fore = defaults
        .fore_color
        .clone()
        .or(computed_color)
        .unwrap_or_default();
    let color_inline = active.fore.unwrap_or(default_fore);
    let color = if color_inline.is_empty() {
        "inherit".to_owned()
    } else {
        color_inline.clone()
    };
    CaretColors {
        color,
        background: active.back.unwrap_or_else(|| "transparent".to_owned()),
        color_inline,
    }
}

fn stamp_colors(doc: &mut Document, id: NodeId, colors: &CaretColors) {
    if !colors.color_inline.is_empty() {
        doc.set_style_property(id, "color", &colors.color_inline);
    }
    doc.set_style_property(id, "background-color", &colors.background);
}

/// Widen a block root to the context the host needs for toolbar state: a
/// cell to its table, a list item to its list (or its table when the list
/// sits in a cell).
fn widen_root(doc: &Document, block: NodeId, body: NodeId) -> NodeId {
    let boundary = Some(body);
    match doc.tag_name(block) {
        Some("td" | "th") => doc.closest(block, &["table"], boundary).unwrap_or(block),
        Some("li") => {
            let list = doc.closest(block, &["ol", "ul"], boundary);
            match doc.closest(block, &["td", "th"], boundary) {
                Some(cell) => doc
                    .closest(cell, &["table"], boundary)
                    .or(list)
                    .unwrap_or(block),
                None => list.unwrap_or(block),
            }
        }
        _ => block,
    }
}

/// Insert the caret marker into the clone at the position matching the live
/// selection. Returns `false` when the position cannot be mapped.
fn insert_caret_marker<E: EditingEngine + ?Sized>(
    engine: &E,
    live_root: NodeId,
    start: NodeId,
    clone: &mut Document,
    clone_root: NodeId,
    colors: &CaretColors,
) -> bool {
    let doc = engine.surface();
    let (mut target, mut offset) = match engine.selection() {
        Some(sel) if doc.is_valid(sel.start.node) => (sel.start.node, sel.start.offset),
        _ => (start, 0),
    };
    if !doc.is_text(target) && !doc.is_element(target) {
        if let Some(parent) = doc.parent(target) {
            target = parent;
            offset = 0;
        }
    }

    // Detached selections and ranges that start outside the mirrored root
    // have no path into the clone.
    let Some(clone_target) = doc
        .path_from(live_root, target)
        .and_then(|path| clone.resolve_path(clone_root, &path))
    else {
        return false;
    };

    let marker = clone.create_element("span");
    clone.add_class(marker, MIRROR_ELEMENT_CLASS);
    clone.set_attr(marker, MIRROR_CARET_ATTR, "1");
    stamp_colors(clone, marker, colors);
    let zw = clone.create_text(ZERO_WIDTH_SPACE.to_string());
    clone.append_child(marker, zw);

    if clone.is_text(clone_target) {
        let Some(tail) = clone.split_text(clone_target, offset) else {
            return false;
        };
        if !clone.insert_before(tail, marker) {
            return false;
        }
        for piece in [clone_target, tail] {
            if clone.text(piece).is_some_and(str::is_empty) {
                clone.detach(piece);
            }
        }
        return true;
    }
    if clone.is_element(clone_target) {
        clone.insert_child(clone_target, offset, marker);
        return true;
    }
    false
}

/// Build the caret mirror. Returns `None` when there is no caret to mirror.
pub fn build_mirror<E: EditingEngine + ?Sized>(
    engine: &E,
    defaults: &DefaultStyle,
    event: &NodeChangeEvent,
) -> Option<MirrorSnapshot> {
    let doc = engine.surface();
    let body = engine.body();
    let start = engine
        .caret_element()
        .filter(|n| *n != body)
        .or(event.element)?;

    let computed = engine.computed_style(start).unwrap_or_default();
    let font_family = computed
        .font_family
        .clone()
        .or_else(|| defaults.font_family.clone())
        .unwrap_or_default();
    let font_size = computed
        .font_size
        .clone()
        .or_else(|| defaults.font_size.clone())
        .unwrap_or_default();
    let colors = caret_colors(engine, defaults, normalize_color(computed.color.as_deref()));

    let boundary = Some(body);
    let block = doc
        .closest(start, BLOCK_TAGS, boundary)
        .or_else(|| doc.closest(start, CONTAINER_TAGS, boundary));

    let html = match block {
        Some(block) => {
            let live_root = widen_root(doc, block, body);
            let (mut clone, clone_root) = doc.clone_subtree(live_root);
            clone.add_class(clone_root, MIRROR_ROOT_CLASS);
            clone.add_class(clone_root, MIRROR_ELEMENT_CLASS);
            stamp_colors(&mut clone, clone_root, &colors);

            // Without a marker the root's own mirror classes cover it.
            if !insert_caret_marker(engine, live_root, start, &mut clone, clone_root, &colors) {
                tracing::trace!("caret path not resolvable, mirroring whole root");
            }
            clone.outer_html(clone_root)
        }
        None => {
            let element = event.element.unwrap_or(start);
            let top = doc
                .ancestors(element)
                .take_while(|n| *n != body)
                .last()
                .unwrap_or(element);
            doc.outer_html(top)
        }
    };

    tracing::trace!(html_len = html.len(), color = %colors.color, "mirror built");

    let style_block = format!(
        ".{MIRROR_ELEMENT_CLASS},\n.{MIRROR_ROOT_CLASS} {{\n  font-family: {font_family};\n  font-size: {font_size};\n  color: {};\n  background-color: {};\n}}",
        colors.color, colors.background
    );
    Some(MirrorSnapshot { html, style_block })
}
