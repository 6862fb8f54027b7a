use std::fmt::Write as _;

use super::Citation;

/// Render `content` as an HTML page with a `<pre>` body and a linked
/// citation list.
#[must_use]
pub fn export_html(content: &str, citations: &[Citation]) -> String {
    let mut output = format!("<html><body><pre>{}</pre>", escape(content));

    if !citations.is_empty() {
        output.push_str("<h2>Citations</h2><ul>");
        for citation in citations {
            let _ = write!(
                output,
                "<li><a href='{}'>{}</a></li>",
                escape(citation.display_url()),
                escape(citation.display_title())
            );
        }
        output.push_str("</ul>");
    }

    output.push_str("</body></html>");
    output
}

/// Escape the five HTML-significant characters, quotes included.
fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}
