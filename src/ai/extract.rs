use crate::error::ValidationError;
use serde_json::Value;

/// Locates the first JSON object in free-form model output. Content inside a
/// fenced code block wins over anything in the surrounding prose.
pub fn extract_json(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();

    if let Some(block) = fenced_block(trimmed) {
        if let Some(object) = balanced_object(block) {
            return Ok(object.to_string());
        }
    }

    balanced_object(trimmed)
        .map(|s| s.to_string())
        .ok_or(ValidationError::Extraction)
}

/// Extracts and parses in one step.
pub fn parse_value(raw: &str) -> Result<Value, ValidationError> {
    let json = extract_json(raw)?;
    serde_json::from_str(&json).map_err(|e| ValidationError::Parse(e.to_string()))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```")?;
    Some(after[..end].trim())
}

/// Scans for the first balanced `{...}`, ignoring braces inside string
/// literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
