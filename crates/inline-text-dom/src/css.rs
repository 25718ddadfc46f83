//! CSS value normalization for toolbar state.

use regex_lite::Regex;
use std::sync::LazyLock;

/// Normalize a CSS color value.
///
/// Empty values, `transparent`, `inherit` and fully transparent `rgba()`
/// all mean "no color" and map to `None`.
pub fn normalize_color(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty()
        || v.eq_ignore_ascii_case("transparent")
        || v.eq_ignore_ascii_case("inherit")
        || is_transparent_rgba(v)
    {
        return None;
    }
    Some(v.to_owned())
}

/// Normalize a font family or font size value: trimmed, `None` when empty.
pub fn normalize_font(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    (!v.is_empty()).then(|| v.to_owned())
}

/// Map a legacy `<font size="N">` value (1-7) to its CSS keyword.
pub fn legacy_font_size(value: &str) -> Option<&'static str> {
    match value.trim() {
        "1" => Some("x-small"),
        "2" => Some("small"),
        "3" => Some("medium"),
        "4" => Some("large"),
        "5" => Some("x-large"),
        "6" => Some("xx-large"),
        "7" => Some("xxx-large"),
        _ => None,
    }
}

/// `rgba(r, g, b, 0)` with any amount of whitespace and `0`, `0.0`, `0.00`...
static TRANSPARENT_RGBA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^rgba\(\s*\d+\s*,\s*\d+\s*,\s*\d+\s*,\s*0(\.0+)?\s*\)$").unwrap()
});

fn is_transparent_rgba(v: &str) -> bool {
    TRANSPARENT_RGBA_RE.is_match(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color(Some(" red ")), Some("red".to_string()));
        assert_eq!(normalize_color(Some("")), None);
        assert_eq!(normalize_color(None), None);
        assert_eq!(normalize_color(Some("Transparent")), None);
        assert_eq!(normalize_color(Some("inherit")), None);
        assert_eq!(normalize_color(Some("rgba(0, 0, 0, 0)")), None);
        assert_eq!(normalize_color(Some("rgba(255,255,255,0.00)")), None);
        assert_eq!(
            normalize_color(Some("rgba(0, 0, 0, 0.5)")),
            Some("rgba(0, 0, 0, 0.5)".to_string())
        );
        assert_eq!(
            normalize_color(Some("rgb(0, 0, 0)")),
            Some("rgb(0, 0, 0)".to_string())
        );
    }

    #[test]
    fn test_transparent_rgba_forms() {
        assert!(is_transparent_rgba("RGBA( 12 ,3,  4 , 0.000 )"));
        assert!(is_transparent_rgba("rgba(0,0,0,0)"));
        assert!(!is_transparent_rgba("rgba(0, 0, 0, 0.)"));
        assert!(!is_transparent_rgba("rgba(0, 0, 0, 0.01)"));
        assert!(!is_transparent_rgba("rgba(0, 0, 0)"));
        assert!(!is_transparent_rgba("xrgba(0, 0, 0, 0)"));
    }

    #[test]
    fn test_normalize_font() {
        assert_eq!(normalize_font(Some("  Arial ")), Some("Arial".to_string()));
        assert_eq!(normalize_font(Some("   ")), None);
    }

    #[test]
    fn test_legacy_font_size() {
        assert_eq!(legacy_font_size("3"), Some("medium"));
        assert_eq!(legacy_font_size("9"), None);
    }
}
