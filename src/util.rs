//! Small helpers shared by the stream parser and the process supervisor.

/// Truncate `text` to at most `max_len` bytes, breaking at the nearest
/// preceding char boundary so the result is always valid UTF-8.
/// Appends `"..."` when truncation occurs and `max_len >= 3`.
#[must_use]
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_owned();
    }

    if max_len < 3 {
        return text[..floor_char_boundary(text, max_len)].to_owned();
    }

    let boundary = floor_char_boundary(text, max_len - 3);
    format!("{}...", &text[..boundary])
}

/// Largest char boundary of `text` that is `<= index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    text.char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= index)
        .last()
        .unwrap_or(0)
}
