//! String helpers for trace previews.

/// Truncate a string to at most `max_len` bytes, appending an ellipsis when
/// shortened. Cuts only on UTF-8 character boundaries.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3).min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Collapse all whitespace runs into single spaces and truncate.
///
/// Used when a multi-line persona output has to fit on one console line.
pub fn preview_line(s: &str, max_len: usize) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&collapsed, max_len)
}
