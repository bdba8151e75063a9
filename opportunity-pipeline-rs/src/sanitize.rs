//! Completion sanitization
//!
//! Models wrap JSON in markdown fences or surround it with prose. These
//! helpers isolate the candidate object without attempting to repair it.

/// Strip a leading fence opener (```` ``` ```` or ```` ```json ````) and a
/// trailing fence closer until neither remains. Fences elsewhere in the text
/// are content and are left alone.
pub fn strip_fences(raw: &str) -> String {
    let mut current = raw.trim();

    loop {
        let next = strip_outer_fence(current);
        if next == current {
            return current.to_string();
        }
        current = next;
    }
}

fn strip_outer_fence(text: &str) -> &str {
    let mut inner = text;

    if let Some(after_open) = inner.strip_prefix("```") {
        // drop the language tag on the opening fence line, if any
        inner = match after_open.split_once('\n') {
            Some((tag, body)) if is_language_tag(tag) => body,
            _ => after_open,
        };
    }

    if let Some(before_close) = inner.strip_suffix("```") {
        inner = before_close;
    }

    inner.trim()
}

fn is_language_tag(tag: &str) -> bool {
    tag.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Isolate the candidate JSON object in a raw completion.
///
/// Fences are stripped, then the span from the first `{` to the last `}` is
/// returned. Without such a span the fence-stripped text is returned as-is,
/// so the parser reports the failure. Applying this twice gives the same
/// result as applying it once.
pub fn sanitize(raw: &str) -> String {
    let stripped = strip_fences(raw);

    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => stripped[start..=end].to_string(),
        _ => stripped,
    }
}

/// Clean a free-text completion (marketing copy, image prompt)
pub fn clean_text(raw: &str) -> String {
    strip_fences(raw).trim().to_string()
}
