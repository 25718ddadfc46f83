//! HTML serialization.

use crate::document::Document;
use crate::node::{NodeId, NodeKind};

impl Document {
    /// Markup of the node's children.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self.element(id).is_some_and(|el| el.is_raw_text());
        for child in self.children(id) {
            self.write_node(*child, raw, &mut out);
        }
        out
    }

    /// Markup of the node itself. For the fragment root this is the same as
    /// [`Document::inner_html`].
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .parent(id)
            .and_then(|p| self.element(p))
            .is_some_and(|el| el.is_raw_text());
        self.write_node(id, raw, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_parent: bool, out: &mut String) {
        match self.kind(id) {
            NodeKind::Fragment => {
                for child in self.children(id) {
                    self.write_node(*child, false, out);
                }
            }
            NodeKind::Text(text) if raw_parent => out.push_str(text),
            NodeKind::Text(text) => escape_text(text, out),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(el.tag());
                for attr in el.attrs() {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_attr(&attr.value, out);
                    out.push('"');
                }
                out.push('>');
                if el.is_void() {
                    return;
                }
                let raw = el.is_raw_text();
                for child in self.children(id) {
                    self.write_node(*child, raw, out);
                }
                out.push_str("</");
                out.push_str(el.tag());
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaping() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        doc.set_attr(p, "title", "a \"b\" & c");
        let text = doc.create_text("1 < 2 & 3\u{A0}4");
        doc.append_child(p, text);
        let root = doc.root();
        doc.append_child(root, p);
        assert_eq!(
            doc.outer_html(p),
            "<p title=\"a &quot;b&quot; &amp; c\">1 &lt; 2 &amp; 3&nbsp;4</p>"
        );
        assert_eq!(doc.outer_html(root), doc.inner_html(root));
    }

    #[test]
    fn test_boolean_attribute_written_with_value() {
        let doc = Document::parse_fragment("<input disabled>");
        assert_eq!(doc.inner_html(doc.root()), "<input disabled=\"\">");
    }

    #[test]
    fn test_nested_markup() {
        let html = "<div class=\"x\"><p>a<br><b>b</b></p><!--c--></div>";
        let doc = Document::parse_fragment(html);
        assert_eq!(doc.inner_html(doc.root()), html);
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.inner_html(div), "<p>a<br><b>b</b></p><!--c-->");
    }
}
