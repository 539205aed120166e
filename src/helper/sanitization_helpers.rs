use ammonia::Builder;
use std::collections::HashSet;

/// Cleans rich text coming from the editor widget. A safe subset of formatting
/// tags survives; scripts, event handlers and styles are removed.
pub fn sanitize_rich_text(input: &str) -> String {
    let tags_to_allow = [
        "h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "i", "em", "u", "p", "br", "span",
        "a", "ul", "ol", "li", "blockquote", "code", "pre", "hr", "img", "table",
        "thead", "tbody", "tr", "th", "td", "s", "del", "sub", "sup", "figure", "figcaption",
    ];
    let safe_tags = tags_to_allow.iter().cloned().collect::<HashSet<_>>();

    let safe_attributes = ["src", "href", "alt", "title", "width", "height"];
    let generic_attributes = safe_attributes.iter().cloned().collect::<HashSet<_>>();

    Builder::new()
        .tags(safe_tags)
        .generic_attributes(generic_attributes)
        .link_rel(Some("nofollow ugc"))
        .clean(input)
        .to_string()
}

/// Strips all HTML tags, for plain text fields such as titles.
pub fn strip_all_html(input: &str) -> String {
    Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

/// Plain-text preview of rich text, cut at a character boundary.
pub fn excerpt(rich_text: &str, max_chars: usize) -> String {
    let stripped = strip_all_html(rich_text);
    let text = html_escape::decode_html_entities(&stripped);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
