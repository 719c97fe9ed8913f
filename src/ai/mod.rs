pub mod extract;
pub mod report;
pub mod reviewer;
pub mod validate;

/// Truncates prompt material so requests stay inside the model's context
/// window.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!(
        "{}...\n[truncated, {} more chars]",
        truncated,
        text.chars().count() - max_chars
    )
}
