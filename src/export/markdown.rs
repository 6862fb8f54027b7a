use std::fmt::Write as _;

use super::Citation;

/// Append a numbered `## Citations` list to `content`.
///
/// `content` is returned unchanged when there are no citations.
#[must_use]
pub fn export_markdown(content: &str, citations: &[Citation]) -> String {
    let mut output = content.to_owned();
    if citations.is_empty() {
        return output;
    }

    output.push_str("\n\n## Citations\n");
    for (index, citation) in citations.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = writeln!(
            output,
            "{}. {} - {}",
            index + 1,
            citation.display_title(),
            citation.display_url()
        );
    }
    output
}
