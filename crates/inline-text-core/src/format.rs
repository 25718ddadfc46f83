//! Sticky formatting: what the next typed character should look like.
//!
//! The tracker captures explicit color and font formatting near the caret on
//! every caret move, and re-applies it when the caret lands in a fresh empty
//! block where the engine would otherwise fall back to the default style.

use inline_text_dom::{NodeId, legacy_font_size, normalize_color, normalize_font};

use crate::engine::{EditingEngine, transact};
use crate::guard::ReentrancyFlag;
use crate::sanitize::{CARET_HOLDER_ATTR, strip_zero_width};

/// Block and table-structural elements. Computed style on these is never
/// taken as explicit formatting.
pub const BLOCK_LIKE_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "li", "ol", "ul", "table",
    "tbody", "thead", "tfoot", "tr", "td", "th",
];

/// Blocks considered when deciding whether the caret sits in an empty block.
pub const EMPTY_BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "li", "td", "th", "div",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorPair {
    pub fore: Option<String>,
    pub back: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontPair {
    pub family: Option<String>,
    pub size: Option<String>,
}

/// Computed style of the editing surface root, captured once at attach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultStyle {
    pub fore_color: Option<String>,
    pub back_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<String>,
}

impl DefaultStyle {
    pub fn capture<E: EditingEngine + ?Sized>(engine: &E) -> Self {
        let Some(style) = engine.computed_style(engine.body()) else {
            tracing::debug!("no computed style for surface root, defaults left empty");
            return Self::default();
        };
        Self {
            fore_color: normalize_color(style.color.as_deref()),
            back_color: normalize_color(style.background_color.as_deref()),
            font_family: normalize_font(style.font_family.as_deref()),
            font_size: normalize_font(style.font_size.as_deref()),
        }
    }
}

/// Last known explicit formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StickyFormat {
    pub fore_color: Option<String>,
    pub back_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<String>,
}

impl StickyFormat {
    pub fn is_empty(&self) -> bool {
        self.fore_color.is_none()
            && self.back_color.is_none()
            && self.font_family.is_none()
            && self.font_size.is_none()
    }
}

fn is_block_like<E: EditingEngine + ?Sized>(engine: &E, id: NodeId) -> bool {
    engine.surface().is_tag(id, BLOCK_LIKE_TAGS)
}

/// Elements from the caret up to (not including) the surface root.
fn caret_ancestry<E: EditingEngine + ?Sized>(engine: &E) -> Vec<NodeId> {
    let Some(start) = engine.caret_element() else {
        return Vec::new();
    };
    let doc = engine.surface();
    let body = engine.body();
    doc.ancestors(start)
        .take_while(|n| *n != body)
        .filter(|n| doc.is_element(*n))
        .collect()
}

/// Whether the caret sits in a block with no visible content: empty, a lone
/// `<br>`, or a caret helper.
pub fn is_empty_block_at_caret<E: EditingEngine + ?Sized>(engine: &E) -> bool {
    let Some(start) = engine.caret_element() else {
        return false;
    };
    let doc = engine.surface();
    let Some(block) = doc.closest(start, EMPTY_BLOCK_TAGS, Some(engine.body())) else {
        return false;
    };
    if !strip_zero_width(&doc.text_content(block)).trim().is_empty() {
        return false;
    }
    let html = doc.inner_html(block).trim().to_ascii_lowercase();
    html.is_empty() || html == "<br>" || html.contains(CARET_HOLDER_ATTR)
}

/// Explicit colors near the caret.
///
/// Per element: inline style, then legacy attribute, then (inline-level
/// elements only) computed style that differs from the default.
pub fn read_active_colors<E: EditingEngine + ?Sized>(
    engine: &E,
    defaults: &DefaultStyle,
) -> ColorPair {
    let doc = engine.surface();
    let mut colors = ColorPair::default();

    for id in caret_ancestry(engine) {
        let inline_level = !is_block_like(engine, id);
        let computed = || {
            if inline_level {
                engine.computed_style(id)
            } else {
                None
            }
        };

        if colors.fore.is_none() {
            colors.fore = normalize_color(doc.style_property(id, "color").as_deref())
                .or_else(|| normalize_color(doc.attr(id, "color")))
                .or_else(|| {
                    normalize_color(computed()?.color.as_deref())
                        .filter(|c| defaults.fore_color.as_ref() != Some(c))
                });
        }

        if colors.back.is_none() {
            colors.back = normalize_color(doc.style_property(id, "background-color").as_deref())
                .or_else(|| normalize_color(doc.style_property(id, "background").as_deref()))
                .or_else(|| normalize_color(doc.attr(id, "bgcolor")))
                .or_else(|| {
                    normalize_color(computed()?.background_color.as_deref())
                        .filter(|c| defaults.back_color.as_ref() != Some(c))
                });
        }

        if colors.fore.is_some() && colors.back.is_some() {
            break;
        }
    }
    colors
}

/// Explicit fonts near the caret. Same precedence as [`read_active_colors`],
/// with `face` and `size` as the legacy attributes.
pub fn read_active_fonts<E: EditingEngine + ?Sized>(
    engine: &E,
    defaults: &DefaultStyle,
) -> FontPair {
    let doc = engine.surface();
    let mut fonts = FontPair::default();

    for id in caret_ancestry(engine) {
        let inline_level = !is_block_like(engine, id);
        let computed = || {
            if inline_level {
                engine.computed_style(id)
            } else {
                None
            }
        };

        if fonts.family.is_none() {
            fonts.family = normalize_font(doc.style_property(id, "font-family").as_deref())
                .or_else(|| normalize_font(doc.attr(id, "face")))
                .or_else(|| {
                    normalize_font(computed()?.font_family.as_deref())
                        .filter(|f| defaults.font_family.as_ref() != Some(f))
                });
        }

        if fonts.size.is_none() {
            fonts.size = normalize_font(doc.style_property(id, "font-size").as_deref())
                .or_else(|| {
                    doc.attr(id, "size")
                        .filter(|_| doc.is_tag(id, &["font"]))
                        .and_then(legacy_font_size)
                        .map(str::to_owned)
                })
                .or_else(|| {
                    normalize_font(computed()?.font_size.as_deref())
                        .filter(|s| defaults.font_size.as_ref() != Some(s))
                });
        }

        if fonts.family.is_some() && fonts.size.is_some() {
            break;
        }
    }
    fonts
}

/// Colors the engine is about to type with.
///
/// Engines report the last used value even when nothing is pending, so a
/// value only counts while its format is active.
pub fn read_command_colors<E: EditingEngine + ?Sized>(engine: &E) -> ColorPair {
    let active = |format: &str| engine.format_matches(format).unwrap_or(false);
    let value = |command: &str| {
        engine
            .query_command_value(command)
            .ok()
            .flatten()
            .and_then(|v| normalize_color(Some(&v)))
    };

    let mut colors = ColorPair::default();
    if active("forecolor") {
        colors.fore = value("ForeColor");
    }
    if active("hilitecolor") {
        colors.back = value("HiliteColor").or_else(|| value("BackColor"));
    }
    colors
}

/// Owner of [`StickyFormat`] for one session.
#[derive(Debug, Default)]
pub struct FormatTracker {
    sticky: StickyFormat,
    defaults: DefaultStyle,
    applying: ReentrancyFlag,
}

impl FormatTracker {
    pub fn new(defaults: DefaultStyle) -> Self {
        Self {
            sticky: StickyFormat::default(),
            defaults,
            applying: ReentrancyFlag::new(),
        }
    }

    pub fn sticky(&self) -> &StickyFormat {
        &self.sticky
    }

    pub fn defaults(&self) -> &DefaultStyle {
        &self.defaults
    }

    /// True while sticky formatting is being applied.
    pub fn is_applying(&self) -> bool {
        self.applying.is_held()
    }

    /// Capture explicit formatting at the caret.
    ///
    /// In an empty block only found values are stored, so intent survives a
    /// move onto a blank line. Elsewhere the read replaces the sticky state,
    /// absences included.
    pub fn sync_from_caret<E: EditingEngine + ?Sized>(&mut self, engine: &E) {
        if self.applying.is_held() {
            return;
        }
        let colors = read_active_colors(engine, &self.defaults);
        let fonts = read_active_fonts(engine, &self.defaults);

        if is_empty_block_at_caret(engine) {
            let sticky = &mut self.sticky;
            for (slot, value) in [
                (&mut sticky.fore_color, colors.fore),
                (&mut sticky.back_color, colors.back),
                (&mut sticky.font_family, fonts.family),
                (&mut sticky.font_size, fonts.size),
            ] {
                if value.is_some() {
                    *slot = value;
                }
            }
            tracing::debug!(sticky = ?self.sticky, "sticky format kept on empty block");
            return;
        }

        self.sticky = StickyFormat {
            fore_color: colors.fore,
            back_color: colors.back,
            font_family: fonts.family,
            font_size: fonts.size,
        };
        tracing::trace!(sticky = ?self.sticky, "sticky format captured");
    }

    /// Re-apply sticky formatting when the caret is collapsed in an empty
    /// block. Everything lands in one undo step. Returns whether anything was
    /// attempted.
    pub fn apply_if_needed<E: EditingEngine + ?Sized>(&mut self, engine: &mut E) -> bool {
        if self.sticky.is_empty() {
            return false;
        }
        if !engine.selection().is_some_and(|s| s.is_collapsed()) {
            return false;
        }
        if !is_empty_block_at_caret(engine) {
            return false;
        }
        let Some(_guard) = self.applying.try_enter() else {
            return false;
        };

        let sticky = self.sticky.clone();
        let defaults = &self.defaults;
        tracing::debug!(?sticky, "re-applying sticky format in empty block");

        transact(engine, |engine| {
            if let Some(color) = sticky.fore_color.as_deref() {
                let applied = engine
                    .apply_format("forecolor", Some(color))
                    .or_else(|_| engine.exec_command("ForeColor", false, Some(color)));
                if let Err(err) = applied {
                    tracing::debug!(%err, "could not re-apply fore color");
                }
            }

            if let Some(color) = sticky.back_color.as_deref() {
                let applied = engine
                    .apply_format("hilitecolor", Some(color))
                    .or_else(|_| engine.exec_command("HiliteColor", false, Some(color)))
                    .or_else(|_| engine.exec_command("BackColor", false, Some(color)));
                if let Err(err) = applied {
                    tracing::debug!(%err, "could not re-apply background color");
                }
            }

            if let Some(family) = sticky
                .font_family
                .as_deref()
                .filter(|f| defaults.font_family.as_deref() != Some(*f))
            {
                let applied = engine
                    .exec_command("FontName", false, Some(family))
                    .or_else(|_| engine.apply_format("fontname", Some(family)));
                if let Err(err) = applied {
                    tracing::debug!(%err, "could not re-apply font family");
                }
            }

            if let Some(size) = sticky
                .font_size
                .as_deref()
                .filter(|s| defaults.font_size.as_deref() != Some(*s))
            {
                let applied = engine
                    .exec_command("FontSize", false, Some(size))
                    .or_else(|_| engine.apply_format("fontsize", Some(size)));
                if let Err(err) = applied {
                    tracing::debug!(%err, "could not re-apply font size");
                }
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DomPoint;
    use crate::testing::MemoryEngine;

    fn engine_at(html: &str, needle: &str, offset: usize) -> MemoryEngine {
        let mut engine = MemoryEngine::new("ed-1", html);
        let text = engine.find_text(needle).unwrap();
        engine.set_cursor(DomPoint::new(text, offset));
        engine
    }

    fn tracker(engine: &MemoryEngine) -> FormatTracker {
        FormatTracker::new(DefaultStyle::capture(engine))
    }

    #[test]
    fn test_default_style_capture() {
        let engine = MemoryEngine::new("ed-1", "<p>x</p>");
        let defaults = DefaultStyle::capture(&engine);
        assert_eq!(defaults.fore_color.as_deref(), Some("rgb(0, 0, 0)"));
        assert_eq!(defaults.back_color.as_deref(), Some("rgb(255, 255, 255)"));
        assert_eq!(defaults.font_family.as_deref(), Some("Arial"));
        assert_eq!(defaults.font_size.as_deref(), Some("16px"));
    }

    #[test]
    fn test_inline_style_wins() {
        let engine = engine_at(
            "<p><span style=\"color: red; background: #ff0\">Hello</span></p>",
            "Hello",
            2,
        );
        let colors = read_active_colors(&engine, &DefaultStyle::capture(&engine));
        assert_eq!(colors.fore.as_deref(), Some("red"));
        assert_eq!(colors.back.as_deref(), Some("#ff0"));
    }

    #[test]
    fn test_legacy_attributes() {
        let engine = engine_at(
            "<p><font color=\"blue\" face=\"Georgia\" size=\"5\">Hi</font></p>",
            "Hi",
            1,
        );
        let defaults = DefaultStyle::capture(&engine);
        assert_eq!(read_active_colors(&engine, &defaults).fore.as_deref(), Some("blue"));
        let fonts = read_active_fonts(&engine, &defaults);
        assert_eq!(fonts.family.as_deref(), Some("Georgia"));
        assert_eq!(fonts.size.as_deref(), Some("x-large"));
    }

    #[test]
    fn test_cell_background_is_not_a_highlight() {
        // Computed background of a table cell comes from the cell, not from
        // text highlighting.
        let mut engine = MemoryEngine::new(
            "ed-1",
            "<table><tr><td class=\"shaded\">cell</td></tr></table>",
        );
        engine.add_class_style(
            "shaded",
            crate::engine::ComputedStyle {
                background_color: Some("rgb(200, 200, 200)".into()),
                ..Default::default()
            },
        );
        let text = engine.find_text("cell").unwrap();
        engine.set_cursor(DomPoint::new(text, 1));
        let colors = read_active_colors(&engine, &DefaultStyle::capture(&engine));
        assert_eq!(colors.back, None);
    }

    #[test]
    fn test_class_styling_on_inline_element() {
        let mut engine = MemoryEngine::new("ed-1", "<p><span class=\"brand\">x</span></p>");
        engine.add_class_style(
            "brand",
            crate::engine::ComputedStyle {
                color: Some("rgb(0, 128, 0)".into()),
                ..Default::default()
            },
        );
        let text = engine.find_text("x").unwrap();
        engine.set_cursor(DomPoint::new(text, 0));
        let colors = read_active_colors(&engine, &DefaultStyle::capture(&engine));
        assert_eq!(colors.fore.as_deref(), Some("rgb(0, 128, 0)"));
    }

    #[test]
    fn test_default_computed_color_filtered() {
        let engine = engine_at("<p><em>plain</em></p>", "plain", 1);
        let colors = read_active_colors(&engine, &DefaultStyle::capture(&engine));
        assert_eq!(colors, ColorPair::default());
    }

    #[test]
    fn test_empty_block_detection() {
        let mut engine = MemoryEngine::new("ed-1", "<p><br></p><p>text</p><p>\u{200B} </p>");
        let root = engine.body();
        let first = engine.surface().children(root)[0];
        engine.set_cursor(DomPoint::new(first, 0));
        assert!(is_empty_block_at_caret(&engine));

        let text = engine.find_text("text").unwrap();
        engine.set_cursor(DomPoint::new(text, 1));
        assert!(!is_empty_block_at_caret(&engine));

        // Only whitespace and zero-width text, but the markup is not a bare <br>.
        let third = engine.surface().children(root)[2];
        engine.set_cursor(DomPoint::new(third, 0));
        assert!(!is_empty_block_at_caret(&engine));

        engine.set_content("<p><span data-fl-caret-holder=\"1\">\u{200B}</span></p>");
        let zw = engine.find_text("\u{200B}").unwrap();
        engine.set_cursor(DomPoint::new(zw, 0));
        assert!(is_empty_block_at_caret(&engine));
    }

    #[test]
    fn test_command_colors_only_trusted_when_active() {
        let mut engine = engine_at("<p>abc</p>", "abc", 1);
        engine.set_last_command_colors(Some("red"), Some("yellow"));
        assert_eq!(read_command_colors(&engine), ColorPair::default());

        engine.set_content("<p><br></p>");
        let p = engine.surface().children(engine.body())[0];
        engine.set_cursor(DomPoint::new(p, 0));
        engine.apply_format("forecolor", Some("green")).unwrap();
        let colors = read_command_colors(&engine);
        assert_eq!(colors.fore.as_deref(), Some("green"));
        assert_eq!(colors.back, None);
    }

    #[test]
    fn test_sync_overwrites_with_none_on_content() {
        let mut engine = engine_at(
            "<p><span style=\"color: red\">red</span> plain</p>",
            "red",
            1,
        );
        let mut formats = tracker(&engine);
        formats.sync_from_caret(&engine);
        assert_eq!(formats.sticky().fore_color.as_deref(), Some("red"));

        let plain = engine.find_text(" plain").unwrap();
        engine.set_cursor(DomPoint::new(plain, 2));
        formats.sync_from_caret(&engine);
        assert_eq!(formats.sticky().fore_color, None);
    }

    #[test]
    fn test_sync_keeps_sticky_on_empty_block() {
        let mut engine = engine_at("<p><span style=\"color: red\">Hello</span></p>", "Hello", 5);
        let mut formats = tracker(&engine);
        formats.sync_from_caret(&engine);
        assert_eq!(formats.sticky().fore_color.as_deref(), Some("red"));

        engine.press_enter();
        formats.sync_from_caret(&engine);
        assert_eq!(formats.sticky().fore_color.as_deref(), Some("red"));
    }

    #[test]
    fn test_apply_if_needed_single_undo_step() {
        let mut engine = engine_at(
            "<p><span style=\"color: red; background-color: yellow; font-family: Georgia\">Hello</span></p>",
            "Hello",
            5,
        );
        let mut formats = tracker(&engine);
        formats.sync_from_caret(&engine);
        engine.press_enter();
        let steps = engine.undo_depth();

        assert!(formats.apply_if_needed(&mut engine));
        assert_eq!(engine.undo_depth(), steps + 1);
        assert!(!formats.is_applying());

        let caret = engine.caret_element().unwrap();
        let doc = engine.surface();
        assert_eq!(doc.style_property(caret, "color").as_deref(), Some("red"));
        assert_eq!(
            doc.style_property(caret, "background-color").as_deref(),
            Some("yellow")
        );
        assert_eq!(doc.style_property(caret, "font-family").as_deref(), Some("Georgia"));

        engine.undo();
        assert_eq!(engine.undo_depth(), steps);
    }

    #[test]
    fn test_background_falls_back_to_back_color_command() {
        let mut engine = engine_at("<p><span style=\"background-color: yellow\">Hi</span></p>", "Hi", 2);
        let mut formats = tracker(&engine);
        formats.sync_from_caret(&engine);
        engine.press_enter();
        engine.fail_format("hilitecolor");
        engine.fail_command("HiliteColor");

        assert!(formats.apply_if_needed(&mut engine));
        assert!(engine.commands().iter().any(|c| c == "BackColor"));
        let caret = engine.caret_element().unwrap();
        assert_eq!(
            engine.surface().style_property(caret, "background-color").as_deref(),
            Some("yellow")
        );
    }

    #[test]
    fn test_apply_skipped_off_empty_block_or_expanded_selection() {
        let mut engine = engine_at("<p><span style=\"color: red\">Hello</span></p>", "Hello", 1);
        let mut formats = tracker(&engine);
        formats.sync_from_caret(&engine);
        assert!(!formats.apply_if_needed(&mut engine));

        engine.press_enter();
        let p = engine.caret_block().unwrap();
        engine.set_selection(DomPoint::new(p, 0), DomPoint::new(p, 1));
        assert!(!formats.apply_if_needed(&mut engine));
    }

    #[test]
    fn test_default_fonts_not_reapplied() {
        let mut engine = engine_at("<p><span style=\"font-family: Arial\">Hi</span></p>", "Hi", 2);
        let mut formats = tracker(&engine);
        formats.sync_from_caret(&engine);
        assert_eq!(formats.sticky().font_family.as_deref(), Some("Arial"));
        engine.press_enter();
        let before = engine.commands().len();
        assert!(formats.apply_if_needed(&mut engine));
        assert_eq!(engine.commands().len(), before);
    }
}
