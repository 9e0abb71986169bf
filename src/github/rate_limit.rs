//! Rate-limit detection for GitHub API errors.
//!
//! GitHub signals rate limits through:
//! - HTTP 403 with "API rate limit exceeded" in the body
//! - HTTP 429 (secondary rate limit)

/// Check whether an error chain indicates a GitHub rate limit.
pub fn is_rate_limited(error: &anyhow::Error) -> bool {
    let msg = format!("{error:#}").to_lowercase();
    msg.contains("rate limit")
        || msg.contains("status code: 429")
        || msg.contains("status code: 403")
}

/// User-facing message for a rate-limit error.
pub fn format_rate_limit_message(error: &anyhow::Error) -> String {
    let msg = format!("{error:#}");
    if msg.to_lowercase().contains("secondary rate limit") {
        "GitHub secondary rate limit hit; wait a minute and try again".to_owned()
    } else {
        "GitHub API rate limit exceeded; try again after the limit resets".to_owned()
    }
}

/// Render an error for the terminal, replacing rate-limit noise with a
/// friendly line.
pub fn describe(error: &anyhow::Error) -> String {
    if is_rate_limited(error) {
        format_rate_limit_message(error)
    } else {
        format!("{error:#}")
    }
}
