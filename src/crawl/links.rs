//! Link extraction, acceptance policy, and in-place URL rewriting.
//!
//! Extraction is a closed set of byte-level prefix/delimiter scans
//! rather than a DOM parse: the crawler treats HTML as a buffer to
//! pattern-match over, not a tree to walk.

use std::path::Path;

use crate::buffer::ByteBuffer;
use crate::index::UrlIndex;
use crate::urltools;

/// `(prefix, delimiter)` pairs scanned for candidate URLs. Not
/// exhaustive of every attribute that can carry a URL - `href=` and
/// `src=` are the two covered - but both quote styles are scanned so
/// the extraction isn't tripped by a page's attribute-quoting
/// convention.
const URL_PATTERNS: &[(&str, u8)] = &[
    ("href=\"", b'"'),
    ("href='", b'\''),
    ("src=\"", b'"'),
    ("src='", b'\''),
];

const DISALLOWED_SUBSTRINGS: &[&str] = &["javascript:", "data:image", ".exe", ".dll", "cgi-"];

const MAX_CANDIDATE_LEN: usize = 256;
const MAX_REWRITE_LEN: usize = 1024;

/// Scan `body` for every pattern occurrence and return the raw
/// (not-yet-resolved) candidate strings between each prefix and its
/// delimiter.
#[must_use]
pub fn extract_candidates(body: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for (prefix, delim) in URL_PATTERNS {
        let prefix = prefix.as_bytes();
        let mut search_from = 0usize;
        while let Some(rel) = find_from(body, search_from, prefix) {
            let value_start = rel + prefix.len();
            match body[value_start..].iter().position(|&b| b == *delim) {
                Some(len) => {
                    let value = String::from_utf8_lossy(&body[value_start..value_start + len]);
                    out.push(value.into_owned());
                    search_from = value_start + len + 1;
                }
                None => break,
            }
        }
    }
    out
}

/// Everything [`is_acceptable`] needs that isn't the candidate URL
/// itself.
pub struct AcceptanceContext<'a> {
    pub primary_host: &'a str,
    pub allow_xdomain: bool,
    pub archive_root: &'a Path,
    pub draining_index: &'a UrlIndex,
}

/// The six-part acceptance predicate a candidate link must pass
/// before it's queued for the next crawl level. `url` is assumed
/// already resolved to absolute form via [`urltools::make_full_url`].
#[must_use]
pub fn is_acceptable(url: &str, ctx: &AcceptanceContext<'_>) -> bool {
    if url.len() >= MAX_CANDIDATE_LEN {
        return false;
    }
    if let Some(rest) = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://"))
        && rest.is_empty()
    {
        return false;
    }
    let host = urltools::parse_host(url);
    let page = urltools::parse_page(url);
    if urltools::local_archive_exists(ctx.archive_root, host, page) {
        return false;
    }
    if url.contains('#') {
        return false;
    }
    if DISALLOWED_SUBSTRINGS.iter().any(|s| url.contains(s)) {
        return false;
    }
    if urltools::is_xdomain(ctx.primary_host, url) && !ctx.allow_xdomain {
        return false;
    }
    if ctx.draining_index.contains(url) {
        return false;
    }
    true
}

/// `true` for pages whose extension indicates HTML content suitable
/// for link extraction/rewriting: `.html`, `.htm`, or a directory-like
/// path (trailing `/`, mapped to an `index.html` on disk).
#[must_use]
pub fn is_parseable(page: &str) -> bool {
    page.ends_with(".html") || page.ends_with(".htm") || page.ends_with('/')
}

/// Rewrite every relative URL-bearing occurrence in `buf` to point at
/// its local archive path, in place. Occurrences that are already
/// absolute are left untouched: an absolute reference already points
/// at a full URL the rewriter has no mandate to touch.
pub fn rewrite_urls(buf: &mut ByteBuffer, scheme: &str, host: &str, current_page: &str, archive_root: &Path) {
    for (prefix, delim) in URL_PATTERNS {
        let prefix = prefix.as_bytes();
        let mut search_from = 0usize;
        loop {
            let Some(rel) = buf.find_from(search_from, prefix) else {
                break;
            };
            let value_start = rel + prefix.len();
            let slice = buf.as_slice();
            let Some(len) = slice[value_start..].iter().position(|&b| b == *delim) else {
                break;
            };
            let value = String::from_utf8_lossy(&slice[value_start..value_start + len]).into_owned();

            if urltools::is_absolute(&value) || value.len() >= MAX_REWRITE_LEN {
                search_from = value_start + len + 1;
                continue;
            }

            let full = urltools::make_full_url(scheme, host, current_page, &value);
            let local = urltools::make_local_url(
                archive_root,
                urltools::parse_host(&full),
                urltools::parse_page(&full),
            );
            buf.collapse(value_start, len);
            buf.insert(value_start, local.as_bytes());
            search_from = value_start + local.len();
        }
    }
}

fn find_from(haystack: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    if start > haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len().max(1))
        .position(|w| w == needle)
        .map(|pos| pos + start)
}
