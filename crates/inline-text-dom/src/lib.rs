//! Detached DOM model for the inline text widget.
//!
//! The widget reads and rewrites editor markup outside of any browser: it
//! sanitizes content before saving, clones the block under the caret for the
//! host mirror, and inspects inline styles to recover toolbar state. This
//! crate provides the small tree model those operations need.
//!
//! - `document`: arena tree with traversal and editing helpers
//! - `parser` / `serialize`: tolerant fragment parsing and HTML output
//! - `style`: inline `style` attribute declarations
//! - `css`: color and font value normalization

pub mod css;
pub mod document;
pub mod node;
mod parser;
mod serialize;
pub mod style;

pub use css::{legacy_font_size, normalize_color, normalize_font};
pub use document::{Ancestors, Document};
pub use node::{Attribute, ElementData, NodeId, NodeKind};
pub use parser::decode_entities;
pub use style::StyleDeclarations;

/// Zero-width space, used by editors as a caret placeholder.
pub const ZERO_WIDTH_SPACE: char = '\u{200B}';
/// Byte order mark / zero-width no-break space.
pub const ZERO_WIDTH_NO_BREAK_SPACE: char = '\u{FEFF}';
