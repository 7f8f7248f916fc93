//! Two-cache alternating crawl engine: per-level fetch loop, status
//! policy, link extraction/acceptance, and archival.

pub mod archive;
pub mod engine;
pub mod links;
pub mod policy;

pub use engine::{CrawlEngine, CrawlOutcome};
