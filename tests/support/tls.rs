//! TLS-capable counterpart to [`super::TestServer`], for exercising the
//! HTTP -> HTTPS upgrade path end to end. Presents a self-signed
//! certificate (generated fresh per server) whose DER bytes the caller
//! hands back to the crawler via `CrawlConfig::trust_root_cert_der`, so
//! the handshake is a genuine one rather than a skip-verification stub.

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};

use super::{read_request, Request};

/// A background thread serving TLS connections on `127.0.0.1:0` behind
/// a freshly generated self-signed certificate.
pub struct TlsTestServer {
    pub addr: SocketAddr,
    pub root_cert_der: Vec<u8>,
}

impl TlsTestServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Vec<u8> + Send + Sync + 'static,
    {
        let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed certificate");
        let cert_der = certified.cert.der().clone();
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            certified.key_pair.serialize_der(),
        ));

        let server_config = Arc::new(
            ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(vec![cert_der.clone()], key_der)
                .expect("build server tls config"),
        );

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind tls test listener");
        let addr = listener.local_addr().expect("local_addr");
        let handler = Arc::new(handler);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let server_config = server_config.clone();
                let handler = handler.clone();
                thread::spawn(move || {
                    let Ok(conn) = ServerConnection::new(server_config) else {
                        return;
                    };
                    let tls = StreamOwned::new(conn, stream);
                    let mut reader = BufReader::new(tls);
                    loop {
                        let Some(request) = read_request(&mut reader) else {
                            break;
                        };
                        let response = handler(&request);
                        if reader.get_mut().write_all(&response).is_err() {
                            break;
                        }
                    }
                });
            }
        });

        TlsTestServer {
            addr,
            root_cert_der: cert_der.as_ref().to_vec(),
        }
    }

    #[must_use]
    pub fn host(&self) -> String {
        self.addr.to_string()
    }
}
