//! HTTP/1.1 request framing and response reception over a
//! [`Connection`], including `Content-Length` and chunked
//! transfer-coding.

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};
use crate::net::connection::Connection;

const READ_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Head,
    Get,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
        }
    }
}

/// A received HTTP response: status line, plus header/body bytes
/// still joined (`header\r\n\r\nbody`) until [`strip_headers`] is
/// called by the archiver.
pub struct Response {
    pub status: u16,
    pub connection_close: bool,
    pub set_cookie: Option<String>,
    buf: ByteBuffer,
    header_len: usize,
}

impl Response {
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        self.buf.as_slice()
    }

    #[must_use]
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Look up a header by name within the (still-retained) header
    /// region. `Set-Cookie` is returned under the canonical name
    /// `Cookie`, per [`find_header`].
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        find_header(&self.buf.as_slice()[..self.header_len], name)
    }

    /// Discard the header bytes, leaving only the body, as a
    /// [`ByteBuffer`] so the caller can rewrite URLs in place before
    /// archiving without an extra copy.
    #[must_use]
    pub fn into_body_buffer(mut self) -> ByteBuffer {
        self.buf.advance_head(self.header_len + 4);
        self.buf
    }
}

/// Build a request's `VERB target HTTP/1.1` line plus the mandatory
/// headers, with `Host` set to `host` with any trailing `/` stripped.
#[must_use]
pub fn build_request(
    method: Method,
    target: &str,
    host: &str,
    user_agent: &str,
    accept: &str,
    cookie: Option<&str>,
) -> ByteBuffer {
    let host = host.trim_end_matches('/');
    let mut buf = ByteBuffer::new();
    buf.append(method.as_str().as_bytes());
    buf.append(b" ");
    buf.append(target.as_bytes());
    buf.append(b" HTTP/1.1\r\n");
    buf.append(format!("User-Agent: {user_agent}\r\n").as_bytes());
    buf.append(format!("Accept: {accept}\r\n").as_bytes());
    buf.append(format!("Host: {host}\r\n").as_bytes());
    buf.append(b"Connection: keep-alive\r\n\r\n");
    if let Some(cookie) = cookie {
        append_header(&mut buf, "Cookie", cookie);
    }
    buf
}

/// Insert a `name: value\r\n` header just before the `\r\n\r\n`
/// sentinel.
pub fn append_header(buf: &mut ByteBuffer, name: &str, value: &str) {
    let Some(sentinel) = buf.find(b"\r\n\r\n") else {
        return;
    };
    let line = format!("{name}: {value}\r\n");
    buf.insert(sentinel, line.as_bytes());
}

/// Parse the status code between the first and second space of the
/// start line.
pub fn parse_status(buf: &ByteBuffer) -> Result<u16> {
    let slice = buf.as_slice();
    let first_space = slice
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| malformed("missing space in status line"))?;
    let rest = &slice[first_space + 1..];
    let second_space = rest
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| malformed("missing second space in status line"))?;
    std::str::from_utf8(&rest[..second_space])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed("non-numeric status code"))
}

fn malformed(detail: &str) -> Error {
    Error::ProtocolMalformed {
        detail: detail.to_string(),
    }
}

/// Linear search for `name` within `headers`, case-insensitive,
/// returning the value between the first non-space after `:` and the
/// next `\r`. `Set-Cookie` is returned under the canonical name
/// `Cookie` by the caller (see [`find_header`]).
fn find_header_raw(headers: &[u8], name: &str) -> Option<String> {
    let text = std::str::from_utf8(headers).ok()?;
    for line in text.split("\r\n") {
        let Some((line_name, rest)) = line.split_once(':') else {
            continue;
        };
        if line_name.eq_ignore_ascii_case(name) {
            return Some(rest.trim_start_matches(' ').to_string());
        }
    }
    None
}

#[must_use]
pub fn find_header(headers: &[u8], name: &str) -> Option<String> {
    if name.eq_ignore_ascii_case("cookie") {
        return find_header_raw(headers, "Set-Cookie");
    }
    find_header_raw(headers, name)
}

/// Read into `conn`'s buffer in [`READ_CHUNK`]-byte increments until
/// `buf.len() >= target_len`, bounded by `max_total`.
fn fill_at_least(
    conn: &mut Connection,
    buf: &mut ByteBuffer,
    target_len: usize,
    max_total: usize,
) -> Result<()> {
    let mut scratch = [0u8; READ_CHUNK];
    while buf.len() < target_len {
        if buf.len() >= max_total {
            return Err(malformed("response exceeded max_response_bytes"));
        }
        let n = conn.read(&mut scratch)?;
        if n == 0 {
            return Err(malformed("connection closed before expected bytes"));
        }
        buf.append(&scratch[..n]);
    }
    Ok(())
}

/// Read until `pattern` is found starting the search at
/// `search_from`, returning its offset. Bounded by `max_total`.
fn fill_until_pattern(
    conn: &mut Connection,
    buf: &mut ByteBuffer,
    search_from: usize,
    pattern: &[u8],
    max_total: usize,
) -> Result<usize> {
    let mut scratch = [0u8; READ_CHUNK];
    loop {
        if let Some(pos) = buf.find_from(search_from, pattern) {
            return Ok(pos);
        }
        if buf.len() >= max_total {
            return Err(malformed("response exceeded max_response_bytes without sentinel"));
        }
        let n = conn.read(&mut scratch)?;
        if n == 0 {
            return Err(malformed("connection closed before sentinel"));
        }
        buf.append(&scratch[..n]);
    }
}

/// Issue `method target` against `conn` and receive the full
/// response (headers still joined with the body).
pub fn request(
    conn: &mut Connection,
    method: Method,
    target: &str,
    user_agent: &str,
    accept: &str,
    cookie: Option<&str>,
    max_response_bytes: usize,
) -> Result<Response> {
    let host = conn.host().to_string();
    let request_buf = build_request(method, target, &host, user_agent, accept, cookie);
    conn.write_all(request_buf.as_slice())?;
    receive_response(conn, method, max_response_bytes)
}

fn receive_response(conn: &mut Connection, method: Method, max_response_bytes: usize) -> Result<Response> {
    let mut buf = ByteBuffer::new();
    let sentinel = fill_until_pattern(conn, &mut buf, 0, b"\r\n\r\n", max_response_bytes)?;
    let header_len = sentinel;
    let body_start = sentinel + 4;

    while body_start < buf.len() {
        fill_at_least(conn, &mut buf, body_start + 1, max_response_bytes)?;
        match buf.as_slice()[body_start] {
            b'\r' | b'\n' => buf.collapse(body_start, 1),
            _ => break,
        }
    }

    let status = parse_status(&buf)?;
    let headers = buf.as_slice()[..header_len].to_vec();
    let connection_close = find_header_raw(&headers, "Connection")
        .is_some_and(|v| v.eq_ignore_ascii_case("close"));
    let set_cookie = find_header(&headers, "Cookie");

    // A response to HEAD never carries a body, whatever `Content-Length`
    // or `Transfer-Encoding` claims (RFC 7230 3.3.3) - reading one would
    // block forever waiting for bytes the server never sends.
    if method == Method::Head {
        // fallthrough, body-less
    } else if find_header_raw(&headers, "Transfer-Encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        receive_chunked(conn, &mut buf, body_start, max_response_bytes)?;
    } else if let Some(len) = find_header_raw(&headers, "Content-Length")
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        let target_len = body_start + len;
        fill_at_least(conn, &mut buf, target_len, max_response_bytes)?;
        buf.snip(buf.len() - target_len);
    } else {
        fill_until_pattern(conn, &mut buf, body_start, b"</body", max_response_bytes)?;
    }

    Ok(Response {
        status,
        connection_close,
        set_cookie,
        buf,
        header_len,
    })
}

/// Decode `Transfer-Encoding: chunked` in place starting at
/// `body_start`: parse a hex length line, collapse it, ensure that
/// many body bytes are present (reading more if needed), collapse the
/// trailing CRLF, and repeat until a zero-length chunk terminates the
/// stream.
fn receive_chunked(
    conn: &mut Connection,
    buf: &mut ByteBuffer,
    mut offset: usize,
    max_total: usize,
) -> Result<()> {
    loop {
        let line_end = loop {
            if let Some(pos) = buf.find_from(offset, b"\r\n") {
                break pos;
            }
            fill_at_least(conn, buf, buf.len() + 1, max_total)?;
        };
        let size_line = std::str::from_utf8(&buf.as_slice()[offset..line_end])
            .map_err(|_| malformed("non-UTF8 chunk length line"))?;
        let size = usize::from_str_radix(size_line.trim(), 16)
            .map_err(|_| malformed("invalid chunk length"))?;
        buf.collapse(offset, line_end - offset + 2);

        if size == 0 {
            fill_at_least(conn, buf, offset + 2, max_total).ok();
            if buf.as_slice()[offset..].starts_with(b"\r\n") {
                buf.collapse(offset, 2);
            }
            return Ok(());
        }

        fill_at_least(conn, buf, offset + size, max_total)?;
        offset += size;

        fill_at_least(conn, buf, offset + 2, max_total)?;
        if buf.as_slice()[offset..].starts_with(b"\r\n") {
            buf.collapse(offset, 2);
        } else {
            return Err(malformed("missing CRLF after chunk data"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_strips_trailing_slash_from_host() {
        let buf = build_request(Method::Get, "/", "example.test/", "ua", "*/*", None);
        let text = String::from_utf8(buf.as_slice().to_vec()).unwrap();
        assert!(text.starts_with("GET / HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.test\r\n"));
        assert!(text.ends_with("Connection: keep-alive\r\n\r\n"));
    }

    #[test]
    fn append_header_inserts_before_sentinel() {
        let mut buf = build_request(Method::Get, "/", "example.test", "ua", "*/*", None);
        append_header(&mut buf, "Cookie", "k=v");
        let text = String::from_utf8(buf.as_slice().to_vec()).unwrap();
        assert!(text.contains("Cookie: k=v\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn parse_status_reads_code() {
        let mut buf = ByteBuffer::new();
        buf.append(b"HTTP/1.1 404 Not Found\r\n\r\n");
        assert_eq!(parse_status(&buf).unwrap(), 404);
    }

    #[test]
    fn find_header_maps_set_cookie_to_cookie() {
        let headers = b"Set-Cookie: k=v\r\nContent-Length: 5\r\n";
        assert_eq!(find_header(headers, "cookie").as_deref(), Some("k=v"));
        assert_eq!(find_header(headers, "Content-Length").as_deref(), Some("5"));
    }

    #[test]
    fn head_response_never_waits_for_a_body() {
        use crate::net::connection::Connection;
        use std::io::{Read, Write};
        use std::net::TcpListener;
        use std::time::Duration;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut scratch = [0u8; 1024];
            stream.read(&mut scratch).unwrap();
            // Content-Length claims 9999 bytes that are never sent - a
            // client that tried to read them would hang.
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 9999\r\n\r\n")
                .unwrap();
        });

        let host = format!("127.0.0.1:{}", addr.port());
        let mut conn = Connection::new(&host, false, Duration::from_secs(5), None);
        conn.open(&host, false).unwrap();
        let response = request(&mut conn, Method::Head, "/", "ua", "*/*", None, 1 << 20).unwrap();
        assert_eq!(response.status, 200);
        handle.join().unwrap();
    }
}
