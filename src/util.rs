/// Mask a secret (API key, OAuth token) for log output
///
/// Only the first and last four characters are shown; secrets of eight
/// characters or fewer are masked completely.
///
/// # Examples
/// ```
/// use stryker::util::mask_secret;
///
/// assert_eq!(mask_secret("AIzaSyABC123def456GHI789"), "AIza***I789");
/// ```
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();
    if len <= 8 {
        return "***".to_string();
    }

    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[len - 4..].iter().collect();
    format!("{}***{}", prefix, suffix)
}

/// Shorten an opaque id (chat id, channel id) for log lines
pub fn short_id(id: &str, max_chars: usize) -> String {
    if id.chars().count() <= max_chars {
        return id.to_string();
    }
    let head: String = id.chars().take(max_chars).collect();
    format!("{}...", head)
}
