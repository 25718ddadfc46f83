//! Tolerant HTML fragment parser.
//!
//! This is not a full HTML5 tree builder. It covers what editor content
//! actually contains: nested inline and block markup, tables, lists, void
//! elements, comments, raw-text elements and character references. Broken
//! input never fails; unknown end tags are dropped and unclosed elements are
//! closed at the end of input.

use crate::document::Document;
use crate::node::{ElementData, NodeId};

/// Start tags that close an open `<p>` (when no table cell or button sits in between).
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "menu", "nav",
    "ol", "p", "pre", "section", "table", "ul",
];

/// Elements that stop the search for an implicitly closed element.
const SCOPE_BOUNDARY: &[&str] = &["td", "th", "table", "caption", "button", "template"];

impl Document {
    /// Parse an HTML fragment. The top-level nodes become children of
    /// [`Document::root`].
    pub fn parse_fragment(html: &str) -> Self {
        let mut builder = TreeBuilder::new();
        let mut pos = 0;
        let bytes = html.as_bytes();

        while pos < html.len() {
            let rest = &html[pos..];
            if rest.starts_with("<!--") {
                let body_start = pos + 4;
                let (body, next) = match html[body_start..].find("-->") {
                    Some(end) => (&html[body_start..body_start + end], body_start + end + 3),
                    None => (&html[body_start..], html.len()),
                };
                builder.comment(body);
                pos = next;
            } else if rest.starts_with("</") && bytes.get(pos + 2).is_some_and(u8::is_ascii_alphabetic)
            {
                let (name, next) = read_end_tag(html, pos + 2);
                builder.end_tag(&name);
                pos = next;
            } else if rest.starts_with('<') && bytes.get(pos + 1).is_some_and(u8::is_ascii_alphabetic) {
                let (data, next) = read_start_tag(html, pos + 1);
                pos = next;
                if data.is_raw_text() {
                    let (raw, after) = read_raw_text(html, pos, data.tag());
                    builder.start_raw(data, raw);
                    pos = after;
                } else {
                    builder.start_tag(data);
                }
            } else if rest.starts_with("<!") || rest.starts_with("<?") || rest.starts_with("</") {
                // Doctype, processing instruction or a bogus end tag: skip to `>`.
                pos = match html[pos..].find('>') {
                    Some(end) => pos + end + 1,
                    None => html.len(),
                };
            } else {
                // Literal text up to the next `<` that can start markup.
                let mut end = pos + 1;
                while end < html.len() && bytes[end] != b'<' {
                    end += 1;
                }
                builder.text(&decode_entities(&html[pos..end]));
                pos = end;
            }
        }

        builder.finish()
    }
}

struct TreeBuilder {
    doc: Document,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let doc = Document::new();
        let root = doc.root();
        Self {
            doc,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn start_tag(&mut self, data: ElementData) -> NodeId {
        let tag = data.tag().to_owned();
        match tag.as_str() {
            t if CLOSES_P.contains(&t) => self.close_implied(&["p"], SCOPE_BOUNDARY),
            "li" => self.close_implied(&["li"], &["ul", "ol", "td", "th", "table"]),
            "td" | "th" => self.close_implied(&["td", "th"], &["tr", "table"]),
            "tr" => self.close_implied(&["tr"], &["table", "tbody", "thead", "tfoot"]),
            "tbody" | "thead" | "tfoot" => {
                self.close_implied(&["tbody", "thead", "tfoot"], &["table"])
            }
            _ => {}
        }
        let is_void = data.is_void();
        let el = self.doc.create_element_from(data);
        let parent = self.current();
        self.doc.append_child(parent, el);
        // `<span/>` still opens a span; only void elements never take children.
        if !is_void {
            self.open.push(el);
        }
        el
    }

    /// Pop through the nearest open element named in `targets`, unless one of
    /// `boundary` is found first.
    fn close_implied(&mut self, targets: &[&str], boundary: &[&str]) {
        let found = self.open.iter().rposition(|n| {
            self.doc.is_tag(*n, targets) || self.doc.is_tag(*n, boundary)
        });
        if let Some(idx) = found {
            if self.doc.is_tag(self.open[idx], targets) {
                self.open.truncate(idx);
            }
        }
    }

    fn end_tag(&mut self, name: &str) {
        // Skip the fragment root at index 0.
        let found = self
            .open
            .iter()
            .skip(1)
            .rposition(|n| self.doc.tag_name(*n) == Some(name));
        match found {
            Some(idx) => self.open.truncate(idx + 1),
            None => tracing::trace!(name, "parse_fragment: dropping unmatched end tag"),
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        // Adjacent character data merges into one text node.
        if let Some(last) = self.doc.children(parent).last().copied() {
            if let Some(existing) = self.doc.text(last) {
                let merged = format!("{}{}", existing, text);
                self.doc.set_text(last, merged);
                return;
            }
        }
        let node = self.doc.create_text(text);
        self.doc.append_child(parent, node);
    }

    /// Append a raw-text element whose end tag has already been consumed.
    /// It never stays open, so following markup lands beside it.
    fn start_raw(&mut self, data: ElementData, raw: &str) {
        let el = self.doc.create_element_from(data);
        let parent = self.current();
        self.doc.append_child(parent, el);
        if !raw.is_empty() {
            let node = self.doc.create_text(raw);
            self.doc.append_child(el, node);
        }
    }

    fn comment(&mut self, body: &str) {
        let node = self.doc.create_comment(body);
        let parent = self.current();
        self.doc.append_child(parent, node);
    }

    fn finish(self) -> Document {
        self.doc
    }
}

/// Read a start tag beginning at `pos` (just after `<`). Returns the element
/// and the position after `>`.
fn read_start_tag(html: &str, mut pos: usize) -> (ElementData, usize) {
    let bytes = html.as_bytes();
    let name_start = pos;
    while pos < html.len() && !is_tag_name_end(bytes[pos]) {
        pos += 1;
    }
    let mut data = ElementData::new(&html[name_start..pos]);

    loop {
        while pos < html.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b'/') {
            pos += 1;
        }
        if pos >= html.len() {
            break;
        }
        if bytes[pos] == b'>' {
            pos += 1;
            break;
        }

        let attr_start = pos;
        pos += 1;
        while pos < html.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        let name = &html[attr_start..pos];

        let mut after_name = pos;
        while after_name < html.len() && bytes[after_name].is_ascii_whitespace() {
            after_name += 1;
        }
        if after_name < html.len() && bytes[after_name] == b'=' {
            pos = after_name + 1;
            while pos < html.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let value = match bytes.get(pos) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let value_start = pos + 1;
                    match html[value_start..].find(q as char) {
                        Some(end) => {
                            pos = value_start + end + 1;
                            &html[value_start..value_start + end]
                        }
                        None => {
                            pos = html.len();
                            &html[value_start..]
                        }
                    }
                }
                _ => {
                    let value_start = pos;
                    while pos < html.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>'
                    {
                        pos += 1;
                    }
                    &html[value_start..pos]
                }
            };
            data.push_parsed_attr(name, decode_entities(value));
        } else {
            data.push_parsed_attr(name, String::new());
        }
    }

    (data, pos)
}

/// Read an end tag name starting just after `</`. Returns the lowercase name
/// and the position after `>`.
fn read_end_tag(html: &str, mut pos: usize) -> (String, usize) {
    let bytes = html.as_bytes();
    let name_start = pos;
    while pos < html.len() && !is_tag_name_end(bytes[pos]) {
        pos += 1;
    }
    let name = html[name_start..pos].to_ascii_lowercase();
    let next = match html[pos..].find('>') {
        Some(end) => pos + end + 1,
        None => html.len(),
    };
    (name, next)
}

/// Raw text runs until `</tag` (any case). Returns the text and the position
/// after the end tag.
fn read_raw_text<'a>(html: &'a str, pos: usize, tag: &str) -> (&'a str, usize) {
    let needle = format!("</{}", tag);
    let haystack = html[pos..].to_ascii_lowercase();
    match haystack.find(&needle) {
        Some(rel) => {
            let end_tag_start = pos + rel;
            let after = match html[end_tag_start..].find('>') {
                Some(gt) => end_tag_start + gt + 1,
                None => html.len(),
            };
            (&html[pos..end_tag_start], after)
        }
        None => (&html[pos..], html.len()),
    }
}

fn is_tag_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'/' || b == b'>'
}

/// Decode character references. Unknown or malformed references are kept
/// literally.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_owned();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match decode_one(after) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode the reference at the start of `s` (after `&`). Returns the char and
/// how many bytes were consumed.
fn decode_one(s: &str) -> Option<(char, usize)> {
    if let Some(num) = s.strip_prefix('#') {
        let (digits, radix, prefix_len) = match num.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 2),
            None => (num, 10, 1),
        };
        let len = digits
            .bytes()
            .take_while(|b| (*b as char).is_digit(radix))
            .count();
        if len == 0 {
            return None;
        }
        let code = u32::from_str_radix(&digits[..len], radix).ok()?;
        let c = char::from_u32(code).filter(|c| *c != '\0').unwrap_or('\u{FFFD}');
        let semicolon = usize::from(digits[len..].starts_with(';'));
        return Some((c, prefix_len + len + semicolon));
    }

    let end = s.find(';')?;
    let name = &s[..end];
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{A0}',
        "zwsp" => '\u{200B}',
        "shy" => '\u{AD}',
        "copy" => '\u{A9}',
        "reg" => '\u{AE}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "laquo" => '\u{AB}',
        "raquo" => '\u{BB}',
        "bull" => '\u{2022}',
        "middot" => '\u{B7}',
        "times" => '\u{D7}',
        "divide" => '\u{F7}',
        "deg" => '\u{B0}',
        "euro" => '\u{20AC}',
        "pound" => '\u{A3}',
        "yen" => '\u{A5}',
        "cent" => '\u{A2}',
        "sect" => '\u{A7}',
        "para" => '\u{B6}',
        _ => return None,
    };
    Some((c, end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(html: &str) -> String {
        let doc = Document::parse_fragment(html);
        doc.inner_html(doc.root())
    }

    #[test]
    fn test_basic_structure() {
        let doc = Document::parse_fragment("<p class=\"a\">Hello <b>world</b></p>");
        let root = doc.root();
        let p = doc.children(root)[0];
        assert_eq!(doc.tag_name(p), Some("p"));
        assert_eq!(doc.attr(p, "class"), Some("a"));
        assert_eq!(doc.text_content(p), "Hello world");
    }

    #[test]
    fn test_attribute_forms() {
        let doc = Document::parse_fragment("<input disabled value=abc data-x='1 2'>");
        let input = doc.children(doc.root())[0];
        assert_eq!(doc.attr(input, "disabled"), Some(""));
        assert_eq!(doc.attr(input, "value"), Some("abc"));
        assert_eq!(doc.attr(input, "data-x"), Some("1 2"));
        assert!(doc.children(input).is_empty());
    }

    #[test]
    fn test_void_and_self_closing() {
        assert_eq!(round_trip("<p>a<br/>b<br>c</p>"), "<p>a<br>b<br>c</p>");
        // Self-closing syntax on a non-void element is ignored.
        assert_eq!(round_trip("<span/>x"), "<span>x</span>");
    }

    #[test]
    fn test_implied_end_tags() {
        assert_eq!(round_trip("<p>one<p>two"), "<p>one</p><p>two</p>");
        assert_eq!(
            round_trip("<ul><li>a<li>b</ul>"),
            "<ul><li>a</li><li>b</li></ul>"
        );
        assert_eq!(
            round_trip("<table><tr><td>1<td>2<tr><td>3</table>"),
            "<table><tr><td>1</td><td>2</td></tr><tr><td>3</td></tr></table>"
        );
        assert_eq!(round_trip("<p>a<div>b</div></p>"), "<p>a</p><div>b</div>");
    }

    #[test]
    fn test_nested_list_in_cell_keeps_cell_open() {
        let html = "<table><tr><td><ul><li>x</li></ul></td></tr></table>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn test_stray_end_tags_dropped() {
        assert_eq!(round_trip("a</div>b</span>"), "ab");
        assert_eq!(round_trip("<b><i>x</b>y"), "<b><i>x</i></b>y");
    }

    #[test]
    fn test_comments_and_doctype() {
        assert_eq!(round_trip("<!DOCTYPE html><!-- hi -->x"), "<!-- hi -->x");
        assert_eq!(round_trip("<!-- open"), "<!-- open-->");
    }

    #[test]
    fn test_raw_text() {
        assert_eq!(
            round_trip("<style>p > a { color: red }</style>"),
            "<style>p > a { color: red }</style>"
        );
    }

    #[test]
    fn test_raw_text_closes_before_following_markup() {
        assert_eq!(
            round_trip("<style>p { color: red }</style><p>Hello</p>"),
            "<style>p { color: red }</style><p>Hello</p>"
        );
        assert_eq!(
            round_trip("<p>a<script>if (a < b) {}</script>b</p>"),
            "<p>a<script>if (a < b) {}</script>b</p>"
        );
        // A nested start tag is text; the first end tag closes the element.
        assert_eq!(
            round_trip("<style><style><font color=\"red\"></style></style>x"),
            "<style><style><font color=\"red\"></style>x"
        );
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#8203;&#x200b;"), "\u{200B}\u{200B}");
        assert_eq!(decode_entities("&nbsp;"), "\u{A0}");
        assert_eq!(decode_entities("AT&T &bogus;"), "AT&T &bogus;");
        assert_eq!(decode_entities("&#65"), "A");
    }

    #[test]
    fn test_editor_markup_snapshot() {
        let html = "<P Class=mce-content-body>Hi&nbsp;<SPAN style='color: red'>there</SPAN><BR></P><ol><li>one<li>two</ol>";
        insta::assert_snapshot!(
            round_trip(html),
            @r#"<p class="mce-content-body">Hi&nbsp;<span style="color: red">there</span><br></p><ol><li>one</li><li>two</li></ol>"#
        );
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(round_trip("1 < 2"), "1 &lt; 2");
    }
}
