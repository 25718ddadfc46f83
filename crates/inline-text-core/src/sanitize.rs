//! Canonical persistable HTML.
//!
//! [`sanitize`] strips everything the widget adds to the live document for its
//! own bookkeeping. It is pure, total and idempotent: malformed input still
//! produces markup, and running it twice yields the same string.

use inline_text_dom::{Document, NodeId, ZERO_WIDTH_NO_BREAK_SPACE, ZERO_WIDTH_SPACE};

/// Marks every element of a mirror clone.
pub const MIRROR_ELEMENT_CLASS: &str = "fl-mirror-element";
/// Marks the root of a mirror clone.
pub const MIRROR_ROOT_CLASS: &str = "fl-mirror-root";
/// Outer content wrapper of the widget.
pub const WYSIWYG_TEXT_CLASS: &str = "fl-wysiwyg-text";
/// Class the editing engine adds to its editable root.
pub const CONTENT_BODY_CLASS: &str = "mce-content-body";
/// Marks a caret-helper element.
pub const CARET_HOLDER_ATTR: &str = "data-fl-caret-holder";
/// Marks an embedded sub-widget.
pub const WIDGET_INSTANCE_ATTR: &str = "data-fl-widget-instance";
/// Marks the synthetic caret inside a mirror.
pub const MIRROR_CARET_ATTR: &str = "data-fl-mirror-caret";

fn is_zero_width(c: char) -> bool {
    c == ZERO_WIDTH_SPACE || c == ZERO_WIDTH_NO_BREAK_SPACE
}

/// Remove U+200B and U+FEFF.
pub fn strip_zero_width(text: &str) -> String {
    text.chars().filter(|c| !is_zero_width(*c)).collect()
}

/// Normalize raw editor HTML into its persisted form.
pub fn sanitize(raw_html: &str) -> String {
    let mut doc = Document::parse_fragment(raw_html);
    let root = doc.root();

    for id in doc.descendants(root) {
        doc.remove_class(id, MIRROR_ELEMENT_CLASS);
        doc.remove_class(id, MIRROR_ROOT_CLASS);
    }

    // A second editable body pasted inside the wrapper.
    let nested: Vec<NodeId> = doc
        .select(root, |el| {
            el.has_class(WYSIWYG_TEXT_CLASS) && el.has_class(CONTENT_BODY_CLASS)
        })
        .into_iter()
        .filter(|id| {
            doc.ancestors(*id)
                .skip(1)
                .any(|a| doc.has_class(a, WYSIWYG_TEXT_CLASS))
        })
        .collect();
    for id in nested {
        doc.unwrap(id);
    }

    for id in doc.select(root, |el| el.attr("class") == Some("")) {
        doc.remove_attr(id, "class");
    }

    for id in doc.select(root, |el| el.has_attr(CARET_HOLDER_ATTR)) {
        let styled = doc
            .element(id)
            .is_some_and(|el| el.attrs().iter().any(|a| a.name != CARET_HOLDER_ATTR));
        if styled {
            // Formatting landed on the helper before any text was typed.
            doc.remove_attr(id, CARET_HOLDER_ATTR);
        } else {
            doc.unwrap(id);
        }
    }

    doc.normalize(root);

    for id in doc.descendants(root) {
        let Some(text) = doc.text(id) else {
            continue;
        };
        if !text.chars().any(is_zero_width) {
            continue;
        }
        let stripped = strip_zero_width(text);
        let parent_styled = doc
            .parent_element(id)
            .is_some_and(|p| doc.has_attr(p, "style"));
        if stripped.is_empty() && parent_styled {
            // Only thing keeping a pending inline style attached.
            continue;
        }
        doc.set_text(id, stripped);
    }

    doc.inner_html(root).trim().to_owned()
}

/// Replace embedded widget elements with `{{{widget <id>}}}` tokens.
///
/// Elements without a `data-id` are kept as they are.
pub fn replace_widget_instances(html: &str) -> String {
    let mut doc = Document::parse_fragment(html);
    let root = doc.root();
    let instances = doc.select(root, |el| el.has_attr(WIDGET_INSTANCE_ATTR));
    let mut replaced = 0usize;
    for id in instances {
        // Already gone with a replaced ancestor.
        if !doc.contains(root, id) {
            continue;
        }
        let Some(widget_id) = doc.attr(id, "data-id").map(str::to_owned) else {
            tracing::debug!("widget instance without data-id left in place");
            continue;
        };
        let token = doc.create_text(format!("{{{{{{widget {}}}}}}}", widget_id));
        doc.replace_with(id, &[token]);
        replaced += 1;
    }
    if replaced == 0 {
        return html.to_owned();
    }
    doc.inner_html(root)
}
