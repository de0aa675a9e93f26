//! String utilities for the domain layer.

/// Truncate a string to a maximum byte length with ellipsis (UTF-8 safe)
///
/// Used for log previews of raw frames and backend responses, where the
/// full payload may be arbitrarily large.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let mut end = target.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Single-line preview: newlines escaped, then truncated.
pub fn preview(s: &str, max_len: usize) -> String {
    truncate(&s.replace('\n', "\\n"), max_len)
}
