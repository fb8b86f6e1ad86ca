//! Shared helpers for HTTP providers

/// Keys up to this length are fully masked
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Characters shown at each end of a masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Longest provider error message passed through verbatim
const MAX_ERROR_LEN: usize = 300;

/// Mask an API key for logs and `Debug` output.
///
/// # Examples
/// ```
/// use switchboard_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY || !key.is_ascii() {
        return "****".to_string();
    }
    format!(
        "{}...{}",
        &key[..KEY_MASK_VISIBLE_CHARS],
        &key[key.len() - KEY_MASK_VISIBLE_CHARS..]
    )
}

/// Map a raw provider error body to a message that is safe to surface.
///
/// Authentication and quota failures collapse to fixed messages so that
/// request headers echoed by a provider never reach events or logs.
#[must_use]
pub fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("api_key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("bearer")
    {
        return "API authentication error. Please check the configured API key.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "API rate limit exceeded. Please try again later.".to_string();
    }

    if error.len() > MAX_ERROR_LEN {
        format!("{}...(truncated)", truncate_safe(error, MAX_ERROR_LEN))
    } else {
        error.to_string()
    }
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 character.
#[must_use]
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        let masked = mask_api_key("sk-1234567890abcdefghij");
        assert_eq!(masked, "sk-1...ghij");
        assert_eq!(mask_api_key("12345678"), "****");
        assert_eq!(mask_api_key(""), "****");
    }

    #[test]
    fn test_sanitize_api_error() {
        let sanitized = sanitize_api_error("Incorrect API key provided: sk-abc");
        assert!(!sanitized.contains("sk-abc"));

        let sanitized = sanitize_api_error("Rate limit reached for requests");
        assert!(sanitized.contains("rate limit"));

        assert_eq!(sanitize_api_error("model not found"), "model not found");
    }

    #[test]
    fn test_truncate_safe_respects_char_boundary() {
        let s = "héllo";
        assert_eq!(truncate_safe(s, 2), "h");
        assert_eq!(truncate_safe(s, 10), s);
    }
}
