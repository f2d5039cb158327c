use crate::error::AgentError;

/// Extract the first JSON object from engine output that may wrap it in
/// prose or a markdown fence.
pub fn extract_json(text: &str) -> Result<serde_json::Value, AgentError> {
    for candidate in candidates(text) {
        if let Some(object) = first_balanced_object(candidate) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(object) {
                return Ok(value);
            }
        }
    }
    Err(AgentError::Parse(format!(
        "no valid JSON object in response (length={})",
        text.len()
    )))
}

/// Fenced code blocks first (most specific), then the raw text.
fn candidates(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        // Skip the info string ("json", etc.) up to the first newline.
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        match body.find("```") {
            Some(close) => {
                found.push(body[..close].trim());
                rest = &body[close + 3..];
            }
            None => break,
        }
    }
    found.push(text.trim());
    found
}

/// Slice of the first balanced `{ ... }`, honoring strings and escapes.
fn first_balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return start.map(|s| &text[s..i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
