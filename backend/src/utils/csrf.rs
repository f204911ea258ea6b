use axum::http::HeaderMap;

pub const CSRF_HEADER: &str = "x-csrf-token";

pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Constant-time comparison of the submitted token against the session token.
pub fn tokens_match(submitted: &str, expected: &str) -> bool {
    if expected.is_empty() || submitted.len() != expected.len() {
        return false;
    }
    submitted
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
