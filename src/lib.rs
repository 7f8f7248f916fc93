//! `reaper`: a recursive web-archiving crawler.
//!
//! Given a seed URL, downloads HTML pages over HTTP/1.1 (with
//! optional TLS), extracts referenced URLs, rewrites intra-site URLs
//! to local filesystem paths, writes each page to a mirrored local
//! directory tree, and continues crawling newly discovered URLs up to
//! a configured depth.
//!
//! Modules are laid out leaves-first: [`buffer`] and [`pool`] are the
//! primitives everything else is built on; [`net`], [`urltools`], and
//! [`index`] build on those; [`crawl`] ties them together into the
//! fetch/extract/archive loop; [`config`] and [`status`] are the
//! ambient configuration and reporting seams the `reaper` binary
//! wires up.

pub mod buffer;
pub mod config;
pub mod crawl;
pub mod error;
pub mod index;
pub mod net;
pub mod pool;
pub mod status;
pub mod urltools;

pub use config::CrawlConfig;
pub use crawl::{CrawlEngine, CrawlOutcome};
pub use error::{Error, Result};
