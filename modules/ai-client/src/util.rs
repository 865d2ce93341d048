/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code fences from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Locate the JSON value embedded in a model reply.
///
/// Models wrap JSON in fences or chatty prose ("Here is the result [JSON]: [...]
/// Note: item [1] ..."). Each `{` or `[` is tried in order and the first one that
/// starts a complete value wins; whatever follows that value is ignored. A value
/// cut off by the end of the reply is returned as-is so the caller sees the parse
/// error. `None` means the reply holds no bracketed payload.
pub fn embedded_json(response: &str) -> Option<&str> {
    let text = strip_code_blocks(response);
    for (start, _) in text.match_indices(['{', '[']) {
        let tail = &text[start..];
        let mut values = serde_json::Deserializer::from_str(tail).into_iter::<serde_json::Value>();
        match values.next() {
            Some(Ok(_)) => return Some(&tail[..values.byte_offset()]),
            Some(Err(e)) if e.is_eof() => return Some(tail),
            _ => continue,
        }
    }
    None
}
