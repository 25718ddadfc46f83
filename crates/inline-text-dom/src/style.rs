//! Inline `style` attribute declarations.
//!
//! Parses `name: value; name: value` into an ordered list and writes it back
//! the way browsers serialize `element.style.cssText` (`name: value;` joined
//! by single spaces).

use std::fmt;

use smol_str::SmolStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclarations {
    entries: Vec<(SmolStr, String)>,
}

impl StyleDeclarations {
    /// Parse a style attribute value. Malformed declarations are skipped.
    pub fn parse(source: &str) -> Self {
        let mut entries: Vec<(SmolStr, String)> = Vec::new();
        for decl in split_declarations(source) {
            let Some((name, value)) = decl.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }
            // Later declarations win, like the cascade inside one block.
            match entries.iter_mut().find(|(n, _)| n == name.as_str()) {
                Some(entry) => entry.1 = value.to_owned(),
                None => entries.push((SmolStr::new(name), value.to_owned())),
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self
                .entries
                .push((SmolStr::new(name.to_ascii_lowercase()), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Display for StyleDeclarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {};", name, value)?;
        }
        Ok(())
    }
}

/// Split on `;` outside of parentheses and quotes (`url(data:...;base64,...)`).
fn split_declarations(source: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                out.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&source[start..]);
    out
}
