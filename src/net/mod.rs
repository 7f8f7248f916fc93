//! Transport and wire-format layer: TCP/TLS connection management
//! ([`connection`]) and HTTP/1.1 request/response framing ([`http`]).

pub mod connection;
pub mod http;

pub use connection::Connection;
pub use http::{Method, Response};
