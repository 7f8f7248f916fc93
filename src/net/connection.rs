//! TCP + optional TLS connection to a single host, with reconnect and
//! mid-crawl TLS upgrade.
//!
//! Modeled as a sum type over the connection phase so the type itself
//! rules out invalid combinations: a `Plain` connection has no TLS
//! session to forget to tear down, a `Disconnected` one has no socket
//! to read from.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::error::{Error, Result};

static TLS_PROVIDER: OnceLock<()> = OnceLock::new();

fn install_tls_provider() {
    TLS_PROVIDER.get_or_init(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

static TLS_CONFIG: Lazy<Arc<ClientConfig>> = Lazy::new(|| build_tls_config(None));

/// Build a client TLS config trusting the public `webpki_roots` set plus,
/// if given, one extra root certificate. The extra root lets a
/// programmatic embedder (or a test) have this client trust a private or
/// self-signed CA without weakening the default trust store for everyone
/// else, who gets the cached `TLS_CONFIG` instead of paying to rebuild
/// this on every connection.
fn build_tls_config(extra_root_der: Option<&[u8]>) -> Arc<ClientConfig> {
    install_tls_provider();
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    if let Some(der) = extra_root_der {
        let _ = roots.add(rustls::pki_types::CertificateDer::from(der.to_vec()));
    }
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Split a `host` or `host:port` string into a hostname and a port,
/// falling back to `default_port` when no `:port` suffix is present
/// (or the suffix isn't a valid port number, e.g. an IPv6 literal's
/// colons).
fn split_host_port(host: &str, default_port: u16) -> (&str, u16) {
    match host.rsplit_once(':') {
        Some((name, port_str)) => match port_str.parse() {
            Ok(port) => (name, port),
            Err(_) => (host, default_port),
        },
        None => (host, default_port),
    }
}

enum Transport {
    Disconnected,
    Plain(TcpStream),
    Secure(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// A connection to one host, reused across requests until a redirect
/// or failure forces it to be torn down and reopened.
pub struct Connection {
    /// The host currently in use; may differ from `primary_host` after
    /// a cross-domain redirect.
    host: String,
    /// The seed host, sticky across redirects.
    primary_host: String,
    secure: bool,
    read_timeout: Duration,
    transport: Transport,
    tls_config: Arc<ClientConfig>,
}

impl Connection {
    /// `extra_root_cert_der` lets a caller trust one additional
    /// certificate authority (in DER form) beyond the public roots,
    /// for talking to a private or self-signed HTTPS endpoint.
    #[must_use]
    pub fn new(
        primary_host: &str,
        secure: bool,
        read_timeout: Duration,
        extra_root_cert_der: Option<&[u8]>,
    ) -> Self {
        let tls_config = match extra_root_cert_der {
            Some(der) => build_tls_config(Some(der)),
            None => TLS_CONFIG.clone(),
        };
        Self {
            host: primary_host.to_string(),
            primary_host: primary_host.to_string(),
            secure,
            read_timeout,
            transport: Transport::Disconnected,
            tls_config,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn primary_host(&self) -> &str {
        &self.primary_host
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !matches!(self.transport, Transport::Disconnected)
    }

    /// Resolve `host` to an IPv4 address, open a TCP socket, connect,
    /// and if `secure` layer a TLS client session on top. `host` may
    /// carry an explicit `:port` suffix (as produced by
    /// [`crate::urltools::parse_host`] for a non-default-port URL); it
    /// connects to that port, otherwise to 80 or 443.
    pub fn open(&mut self, host: &str, secure: bool) -> Result<()> {
        let default_port = if secure { 443 } else { 80 };
        let (hostname, port) = split_host_port(host, default_port);

        let addr = (hostname, port)
            .to_socket_addrs()
            .map_err(|source| Error::Resolve {
                host: host.to_string(),
                source,
            })?
            .find(std::net::SocketAddr::is_ipv4)
            .ok_or_else(|| Error::Resolve {
                host: host.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no A record for host",
                ),
            })?;

        let stream = TcpStream::connect(addr).map_err(|source| Error::Connect {
            host: host.to_string(),
            source,
        })?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .map_err(|source| Error::Connect {
                host: host.to_string(),
                source,
            })?;
        stream.set_nodelay(true).ok();

        self.transport = if secure {
            let server_name = ServerName::try_from(hostname.to_string()).map_err(|e| Error::Tls {
                host: host.to_string(),
                source: Box::new(e),
            })?;
            let conn = ClientConnection::new(self.tls_config.clone(), server_name).map_err(|e| {
                Error::Tls {
                    host: host.to_string(),
                    source: Box::new(e),
                }
            })?;
            Transport::Secure(Box::new(StreamOwned::new(conn, stream)))
        } else {
            Transport::Plain(stream)
        };

        self.host = host.to_string();
        self.secure = secure;
        Ok(())
    }

    pub fn close(&mut self) {
        self.transport = Transport::Disconnected;
    }

    /// Close then reopen against the *primary* host, never the
    /// current (possibly redirected-to) host, preserving `secure`.
    pub fn reconnect(&mut self) -> Result<()> {
        self.close();
        let primary = self.primary_host.clone();
        self.open(&primary, self.secure)
    }

    /// Close, switch to TLS, and reopen against the current host.
    /// Used to follow an HTTP -> HTTPS redirect without leaking the
    /// cleartext session.
    pub fn upgrade_to_tls(&mut self) -> Result<()> {
        self.close();
        let host = self.host.clone();
        self.open(&host, true)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.transport {
            Transport::Disconnected => Err(Error::IoWrite(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection not open",
            ))),
            Transport::Plain(stream) => stream.write_all(bytes).map_err(Error::IoWrite),
            Transport::Secure(stream) => stream.write_all(bytes).map_err(Error::IoWrite),
        }
    }

    /// Read up to `buf.len()` bytes, returning the number read (`0` on
    /// EOF), mapping a timed-out read to `Error::OperationTimeout`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = match &mut self.transport {
            Transport::Disconnected => {
                return Err(Error::IoRead(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "connection not open",
                )));
            }
            Transport::Plain(stream) => stream.read(buf),
            Transport::Secure(stream) => stream.read(buf),
        };
        match result {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                Err(Error::OperationTimeout)
            }
            Err(e) => Err(Error::IoRead(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn plain_roundtrip_against_local_listener() {
        // exercise write_all/read via a Plain transport built by hand,
        // rather than through `open`, to keep this test independent of
        // host:port parsing.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = stream;
            stream.write_all(b"echo: ").unwrap();
            stream.write_all(line.as_bytes()).unwrap();
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut conn = Connection {
            host: addr.ip().to_string(),
            primary_host: addr.ip().to_string(),
            secure: false,
            read_timeout: Duration::from_secs(5),
            transport: Transport::Plain(stream),
            tls_config: TLS_CONFIG.clone(),
        };
        conn.write_all(b"hello\n").unwrap();
        let mut buf = [0u8; 64];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"echo: hello\n");
        handle.join().unwrap();
    }

    #[test]
    fn open_connects_to_an_explicit_port_in_the_host_string() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = stream;
            stream.write_all(line.as_bytes()).unwrap();
        });

        let host = format!("127.0.0.1:{}", addr.port());
        let mut conn = Connection::new(&host, false, Duration::from_secs(5), None);
        conn.open(&host, false).unwrap();
        conn.write_all(b"ping\n").unwrap();
        let mut buf = [0u8; 64];
        let n = conn.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping\n");
        handle.join().unwrap();
    }

    #[test]
    fn split_host_port_parses_suffix_or_falls_back() {
        assert_eq!(split_host_port("example.test", 80), ("example.test", 80));
        assert_eq!(split_host_port("example.test:8080", 80), ("example.test", 8080));
        assert_eq!(split_host_port("example.test:not-a-port", 80), ("example.test:not-a-port", 80));
    }
}
