//! Crate-wide error taxonomy.
//!
//! Every fallible boundary in the crawler (connection, codec, archival,
//! configuration) returns this error type so that the crawl engine's
//! propagation policy (reconnect-and-skip vs. fatal) can match on a
//! closed set of variants instead of string-sniffing.

use std::io;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to resolve host {host}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {host}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake with {host} failed")]
    Tls {
        host: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("malformed HTTP: {detail}")]
    ProtocolMalformed { detail: String },

    #[error("socket read failed")]
    IoRead(#[source] io::Error),

    #[error("socket write failed")]
    IoWrite(#[source] io::Error),

    #[error("unexpected status {status} for {url}")]
    StatusUnexpected { status: u16, url: String },

    #[error("failed to archive page to {path}")]
    ArchiveIo {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("socket operation timed out")]
    OperationTimeout,

    #[error("crawl interrupted")]
    Interrupted,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// True for the connection-level failures the crawl engine retries
    /// once (via reconnect) before skipping the current URL.
    #[must_use]
    pub fn is_reconnectable(&self) -> bool {
        matches!(
            self,
            Error::Resolve { .. }
                | Error::Connect { .. }
                | Error::Tls { .. }
                | Error::IoRead(_)
                | Error::IoWrite(_)
                | Error::ProtocolMalformed { .. }
                | Error::OperationTimeout
        )
    }
}
