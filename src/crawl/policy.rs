//! HTTP status -> crawl action mapping.

/// What the per-entry loop does in response to a HEAD or GET status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusAction {
    /// 200/404/410: proceed (HEAD) or write to disk (GET).
    Archive,
    /// 301/302/303: follow `Location`.
    Redirect { location: String, upgrade_tls: bool },
    /// 400/403/405/500/502/503/504: reconnect, skip this entry.
    ReconnectSkip,
    /// Anything else: abort the whole crawl.
    Fatal,
}

/// Classify `status`. `location` is the response's `Location` header
/// (only consulted for 3xx); `current_scheme` is `"http"` or
/// `"https"` for the connection the request was issued on, used to
/// detect an HTTP -> HTTPS upgrade redirect.
#[must_use]
pub fn classify(status: u16, location: Option<&str>, current_scheme: &str) -> StatusAction {
    match status {
        200 | 404 | 410 => StatusAction::Archive,
        301 | 302 | 303 => {
            let location = location.unwrap_or_default().to_string();
            let upgrade_tls = current_scheme == "http" && location.starts_with("https://");
            StatusAction::Redirect {
                location,
                upgrade_tls,
            }
        }
        400 | 403 | 405 | 500 | 502 | 503 | 504 => StatusAction::ReconnectSkip,
        _ => StatusAction::Fatal,
    }
}
