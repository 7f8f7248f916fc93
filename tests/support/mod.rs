//! Hand-rolled HTTP/1.1 responder used as a server stand-in for the
//! crawler's end-to-end tests (the crate is the client under test, so
//! there's nothing in its dependency stack - like `mockito` - that
//! mocks a server we call; we have to be our own tiny server).

pub mod tls;

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread;

/// A request the fixture parsed off the wire, handed to the routing
/// closure.
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

/// A background thread serving one `127.0.0.1:0` listener for the
/// lifetime of the test. Dropped (and its thread left to die with the
/// test process) at the end of the test function.
pub struct TestServer {
    pub addr: SocketAddr,
}

impl TestServer {
    /// Start serving `handler` (request in, raw response bytes out -
    /// callers build the full `status line + headers + body` so the
    /// test controls framing precisely: `Content-Length`, chunked,
    /// redirects, and `Set-Cookie`).
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Vec<u8> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("local_addr");
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let mut writer = match stream.try_clone() {
                    Ok(w) => w,
                    Err(_) => continue,
                };
                let mut reader = BufReader::new(stream);
                loop {
                    let Some(request) = read_request(&mut reader) else {
                        break;
                    };
                    let response = handler(&request);
                    if writer.write_all(&response).is_err() {
                        break;
                    }
                }
            }
        });
        TestServer { addr }
    }

    #[must_use]
    pub fn host(&self) -> String {
        self.addr.to_string()
    }
}

pub(crate) fn read_request<R: BufRead>(reader: &mut R) -> Option<Request> {
    let mut start_line = String::new();
    if reader.read_line(&mut start_line).ok()? == 0 {
        return None;
    }
    let mut parts = start_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.insert(
                name.trim().to_ascii_lowercase(),
                value.trim().to_string(),
            );
        }
    }
    Some(Request {
        method,
        path,
        headers,
    })
}

/// Build `HTTP/1.1 <status> <reason>\r\n` plus `Content-Length`,
/// any `extra_headers`, and `body` - omitting the body (but keeping
/// the same `Content-Length`) for a `HEAD` request, matching how a
/// real server answers `HEAD`.
#[must_use]
pub fn fixed_response(status: u16, body: &[u8], is_head: bool, extra_headers: &[(&str, &str)]) -> Vec<u8> {
    let reason = reason_phrase(status);
    let mut out = format!("HTTP/1.1 {status} {reason}\r\n").into_bytes();
    out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    for (name, value) in extra_headers {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    if !is_head {
        out.extend_from_slice(body);
    }
    out
}

/// As [`fixed_response`], but `Transfer-Encoding: chunked` framing for
/// `chunks` instead of `Content-Length`.
#[must_use]
pub fn chunked_response(status: u16, chunks: &[&[u8]], is_head: bool) -> Vec<u8> {
    let reason = reason_phrase(status);
    let mut out = format!("HTTP/1.1 {status} {reason}\r\n").into_bytes();
    out.extend_from_slice(b"Transfer-Encoding: chunked\r\n\r\n");
    if !is_head {
        for chunk in chunks {
            out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
    }
    out
}

/// A `301` with `Location: <location>` and no body.
#[must_use]
pub fn redirect_response(location: &str, is_head: bool) -> Vec<u8> {
    let mut out = b"HTTP/1.1 301 Moved Permanently\r\n".to_vec();
    out.extend_from_slice(format!("Location: {location}\r\n").as_bytes());
    out.extend_from_slice(b"Content-Length: 0\r\n\r\n");
    let _ = is_head;
    out
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
