//! URL parsing, absolute-URL construction, and local-path mapping.
//!
//! Host/page parsing is done by direct string slicing rather than
//! through `url::Url`, because the crawler needs the exact substring
//! semantics the rest of the system (and the archive's directory
//! layout) was specified against - `url::Url` normalizes in ways that
//! would silently change the mirrored path layout. `url::Url` is still
//! used where it doesn't change observable behavior: validating that a
//! string is an absolute `http(s)` URL, and joining a page-relative
//! reference against the current path.

use std::path::{Path, PathBuf};

use url::Url;

/// Strip an `http://`/`https://` prefix, if present.
#[must_use]
fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

/// The host portion of an absolute URL (substring up to the next `/`,
/// or the whole remainder if there is none).
#[must_use]
pub fn parse_host(url: &str) -> &str {
    let rest = strip_scheme(url);
    match rest.find('/') {
        Some(idx) => &rest[..idx],
        None => rest,
    }
}

/// The page path of an absolute URL: the substring from the first `/`
/// after the host to the end, trailing slash stripped. `"/"` if there
/// is no path at all.
#[must_use]
pub fn parse_page(url: &str) -> &str {
    let rest = strip_scheme(url);
    let page = match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => return "/",
    };
    if page.len() > 1 {
        page.trim_end_matches('/')
    } else {
        page
    }
}

#[must_use]
pub fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Resolve `relative` to an absolute URL using `scheme`/`host` and the
/// current page path for context:
///
/// - already absolute -> returned as-is
/// - starts with `/` -> `scheme://host<relative>`
/// - otherwise -> resolved against the current page's directory
#[must_use]
pub fn make_full_url(scheme: &str, host: &str, current_page: &str, relative: &str) -> String {
    if is_absolute(relative) {
        return relative.to_string();
    }
    if let Some(rest) = relative.strip_prefix('/') {
        return format!("{scheme}://{host}/{rest}");
    }

    let base = format!("{scheme}://{host}{current_page}");
    match Url::parse(&base).and_then(|b| b.join(relative)) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!("{scheme}://{host}/{relative}"),
    }
}

/// `<archive-root>/<host>/<page-path>`, with the directory/file suffix
/// policy above. Returns the filesystem path (not a `file://` URL -
/// callers that need the URL form wrap this themselves, since most
/// call sites want a `Path` to pass to `std::fs`).
#[must_use]
pub fn make_local_path(archive_root: &Path, host: &str, page: &str) -> PathBuf {
    let trimmed = page.trim_start_matches('/');
    if trimmed.is_empty() {
        return archive_root.join(host).join("index.html");
    }

    let last_component = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if last_component.contains('.') {
        archive_root.join(host).join(trimmed)
    } else {
        archive_root.join(host).join(trimmed).join("index.html")
    }
}

/// `file://<path>` form of [`make_local_path`].
#[must_use]
pub fn make_local_url(archive_root: &Path, host: &str, page: &str) -> String {
    format!("file://{}", make_local_path(archive_root, host, page).display())
}

#[must_use]
pub fn is_xdomain(primary_host: &str, url: &str) -> bool {
    parse_host(url) != primary_host
}

#[must_use]
pub fn local_archive_exists(archive_root: &Path, host: &str, page: &str) -> bool {
    make_local_path(archive_root, host, page).exists()
}
