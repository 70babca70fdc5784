//! HTML directory listings

use crate::storage::ObjectInfo;

/// Render a listing of `objects` relative to `full_path`.
///
/// One anchor per entry, in the order given. Each entry is shown with the
/// listed prefix removed, so `a/b/c.txt` under `a/` renders as `b/c.txt`.
/// Keys are HTML-escaped since the store accepts arbitrary key contents.
pub fn format_listing(objects: &[ObjectInfo], full_path: &str) -> String {
    let mut html = String::from("<pre>\n");

    for object in objects {
        let name = escape_html(relative_key(&object.key, full_path));
        html.push_str(&format!("<a href=\"{}\">{}</a>\n", name, name));
    }

    html.push_str("</pre>");
    html
}

fn relative_key<'a>(key: &'a str, full_path: &str) -> &'a str {
    key.strip_prefix(full_path).unwrap_or(key)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
