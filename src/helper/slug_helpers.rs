use deunicode::deunicode;
use regex::Regex;
use std::sync::OnceLock;

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_\s-]").expect("valid slug regex"))
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-\s]+").expect("valid separator regex"))
}

/// URL-safe, ASCII-only identifier derived from a display name.
/// `"Go Lang"` becomes `"go-lang"`. Accented and non-Latin letters are
/// transliterated first, so `"Café"` keeps its `e`.
pub fn slugify(name: &str) -> String {
    let ascii = deunicode(name).to_lowercase();
    let kept = disallowed_chars().replace_all(&ascii, "");
    let joined = separators().replace_all(&kept, "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}
