//! Text cleanup before posting.

/// Strip non-printable characters, truncate to `max_chars` characters and
/// trim surrounding whitespace.
///
/// Truncation counts characters, so multi-byte text is never split inside
/// a code point.
///
/// # Examples
///
/// ```
/// use herald_core::sanitize_text;
///
/// assert_eq!(sanitize_text("  hello\u{0007} world  ", 280), "hello world");
/// assert_eq!(sanitize_text("héllo wörld", 5), "héllo");
/// ```
pub fn sanitize_text(text: &str, max_chars: usize) -> String {
    let printable: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .take(max_chars)
        .collect();
    printable.trim().to_string()
}

/// Split generated thread text into posts, one per non-empty line.
///
/// Each part is sanitized to `max_chars` and cut back to its last complete
/// sentence, or closed with a period when it has none. At most `max_parts`
/// parts are kept.
///
/// # Examples
///
/// ```
/// use herald_core::split_thread;
///
/// let parts = split_thread("Octopuses have three hearts.\n\nTwo pump blood to the gills", 4, 140);
/// assert_eq!(parts, vec!["Octopuses have three hearts.", "Two pump blood to the gills."]);
/// ```
pub fn split_thread(text: &str, max_parts: usize, max_chars: usize) -> Vec<String> {
    text.lines()
        .map(|line| sanitize_text(line, max_chars))
        .filter(|part| !part.is_empty())
        .take(max_parts)
        .map(|part| end_sentence(part, max_chars))
        .filter(|part| !part.is_empty())
        .collect()
}

fn end_sentence(mut part: String, max_chars: usize) -> String {
    const TERMINATORS: [char; 3] = ['.', '!', '?'];
    if part.ends_with(TERMINATORS) {
        return part;
    }
    if let Some(end) = part.rfind(TERMINATORS) {
        part.truncate(end + 1);
        return part;
    }
    if part.chars().count() >= max_chars {
        part.pop();
    }
    let trimmed = part.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}.")
}

