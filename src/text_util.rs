/// Split raw search input into keywords.
///
/// Separators are any whitespace, which covers the full-width space (U+3000)
/// that Japanese input methods insert.
pub fn split_keywords(input: &str) -> Vec<String> {
    input
        .split(char::is_whitespace)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep at most `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Collapse line breaks and runs of whitespace into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
