//! Two-cache alternating crawl loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::CrawlConfig;
use crate::crawl::archive;
use crate::crawl::links::{self, AcceptanceContext};
use crate::crawl::policy::{self, StatusAction};
use crate::error::{Error, Result};
use crate::index::UrlIndex;
use crate::net::connection::Connection;
use crate::net::http::{self, Method, Response};
use crate::status::{StatusEvent, StatusSink};
use crate::urltools;

/// A redirect chain longer than this is treated as a loop and the
/// entry is skipped rather than followed forever.
const MAX_REDIRECTS: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed { pages_archived: usize },
    Interrupted { pages_archived: usize },
}

enum EntryOutcome {
    Archived(usize),
    Skipped(String),
}

/// Drives the crawl to completion against one [`CrawlConfig`],
/// reporting progress through a [`StatusSink`].
pub struct CrawlEngine<S: StatusSink> {
    config: CrawlConfig,
    sink: S,
    cancelled: Arc<AtomicBool>,
}

impl<S: StatusSink> CrawlEngine<S> {
    #[must_use]
    pub fn new(config: CrawlConfig, sink: S, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            config,
            sink,
            cancelled,
        }
    }

    pub fn run(&mut self) -> Result<CrawlOutcome> {
        let primary_host = urltools::parse_host(self.config.seed.as_str()).to_string();
        let primary_secure = self.config.seed.scheme() == "https" || self.config.tls;
        let mut conn = Connection::new(
            &primary_host,
            primary_secure,
            self.config.read_timeout,
            self.config.extra_root_cert_der.as_deref(),
        );

        let caches = [UrlIndex::new(), UrlIndex::new()];
        let mut draining_role = 0usize;
        caches[draining_role].insert(self.config.seed.as_str());

        let mut depth: u8 = 0;
        let mut pages_archived = 0usize;
        let mut cookie: Option<String> = None;

        loop {
            let filling_role = 1 - draining_role;
            caches[filling_role].clear();

            let urls = caches[draining_role].urls_in_insertion_order();
            if urls.is_empty() {
                break;
            }

            let mut fill_threshold_reached = false;

            for url in urls {
                if self.cancelled.load(Ordering::Relaxed) {
                    self.sink.on_event(StatusEvent::Finished { pages_archived });
                    return Ok(CrawlOutcome::Interrupted { pages_archived });
                }

                std::thread::sleep(self.config.delay);

                let outcome = self.process_entry(
                    &mut conn,
                    &caches[filling_role],
                    &caches[draining_role],
                    &primary_host,
                    &mut cookie,
                    &url,
                    &mut fill_threshold_reached,
                );

                match outcome {
                    Ok(EntryOutcome::Archived(bytes)) => {
                        pages_archived += 1;
                        self.sink.on_event(StatusEvent::Archived {
                            url: url.clone(),
                            bytes,
                        });
                    }
                    Ok(EntryOutcome::Skipped(reason)) => {
                        self.sink.on_event(StatusEvent::Skipped {
                            url: url.clone(),
                            reason,
                        });
                    }
                    Err(e @ Error::ArchiveIo { .. }) => {
                        self.sink.on_event(StatusEvent::Error {
                            message: e.to_string(),
                        });
                    }
                    Err(e) if e.is_reconnectable() => {
                        self.sink.on_event(StatusEvent::Error {
                            message: e.to_string(),
                        });
                        self.sink.on_event(StatusEvent::Skipped {
                            url: url.clone(),
                            reason: "connection error".to_string(),
                        });
                    }
                    Err(e) => {
                        self.sink.on_event(StatusEvent::Error {
                            message: e.to_string(),
                        });
                        return Err(e);
                    }
                }
            }

            draining_role = filling_role;
            depth += 1;
            self.sink.on_event(StatusEvent::DepthAdvanced {
                depth,
                frontier_len: caches[draining_role].len(),
            });
            if depth >= self.config.max_depth {
                break;
            }
        }

        self.sink.on_event(StatusEvent::Finished { pages_archived });
        Ok(CrawlOutcome::Completed { pages_archived })
    }

    /// Process one draining-cache entry through HEAD, the status
    /// table, GET, link extraction, and archival, following redirects
    /// inline.
    #[allow(clippy::too_many_arguments)]
    fn process_entry(
        &mut self,
        conn: &mut Connection,
        filling: &UrlIndex,
        draining: &UrlIndex,
        primary_host: &str,
        cookie: &mut Option<String>,
        seed_url: &str,
        fill_threshold_reached: &mut bool,
    ) -> Result<EntryOutcome> {
        let mut current_url = seed_url.to_string();

        for _ in 0..MAX_REDIRECTS {
            let host = urltools::parse_host(&current_url).to_string();
            let page = urltools::parse_page(&current_url).to_string();
            let secure = current_url.starts_with("https://");
            let scheme = if secure { "https" } else { "http" };

            if urltools::is_xdomain(primary_host, &current_url) && !self.config.allow_xdomain {
                return Ok(EntryOutcome::Skipped("cross-domain".to_string()));
            }

            if host != conn.host() || !conn.is_connected() {
                self.sink.on_event(StatusEvent::Connecting { host: host.clone() });
                conn.open(&host, secure)?;
            }

            self.sink.on_event(StatusEvent::Fetching {
                url: current_url.clone(),
            });

            let head = self.fetch_retrying(conn, Method::Head, &page, cookie.as_deref())?;
            match policy::classify(head.status, head.header("Location").as_deref(), scheme) {
                StatusAction::Archive => {}
                StatusAction::Redirect {
                    location,
                    upgrade_tls,
                } => {
                    current_url = self.resolve_redirect(conn, scheme, &host, &location, upgrade_tls)?;
                    continue;
                }
                StatusAction::ReconnectSkip => {
                    conn.reconnect().ok();
                    return Ok(EntryOutcome::Skipped(format!("status {}", head.status)));
                }
                StatusAction::Fatal => {
                    return Err(Error::StatusUnexpected {
                        status: head.status,
                        url: current_url,
                    });
                }
            }

            if urltools::local_archive_exists(&self.config.archive_root, &host, &page) {
                return Ok(EntryOutcome::Skipped("already archived".to_string()));
            }

            if head.connection_close {
                conn.reconnect()?;
            }

            let get = self.fetch_retrying(conn, Method::Get, &page, cookie.as_deref())?;
            if let Some(set_cookie) = get.set_cookie.clone() {
                *cookie = Some(set_cookie);
            }

            match policy::classify(get.status, get.header("Location").as_deref(), scheme) {
                StatusAction::Archive => {}
                StatusAction::Redirect {
                    location,
                    upgrade_tls,
                } => {
                    current_url = self.resolve_redirect(conn, scheme, &host, &location, upgrade_tls)?;
                    continue;
                }
                StatusAction::ReconnectSkip => {
                    conn.reconnect().ok();
                    return Ok(EntryOutcome::Skipped(format!("status {}", get.status)));
                }
                StatusAction::Fatal => {
                    return Err(Error::StatusUnexpected {
                        status: get.status,
                        url: current_url,
                    });
                }
            }

            let mut body = get.into_body_buffer();

            if !*fill_threshold_reached {
                let ctx = AcceptanceContext {
                    primary_host,
                    allow_xdomain: self.config.allow_xdomain,
                    archive_root: &self.config.archive_root,
                    draining_index: draining,
                };
                for candidate in links::extract_candidates(body.as_slice()) {
                    let full = urltools::make_full_url(scheme, &host, &page, &candidate);
                    if links::is_acceptable(&full, &ctx) {
                        filling.insert(&full);
                    }
                }
                if filling.len() >= self.config.fill_threshold {
                    *fill_threshold_reached = true;
                }
            }

            if links::is_parseable(&page) {
                links::rewrite_urls(&mut body, scheme, &host, &page, &self.config.archive_root);
            }

            let written = archive::archive_page(body.as_slice(), &self.config.archive_root, &host, &page)?;
            return Ok(match written {
                Some(bytes) => EntryOutcome::Archived(bytes),
                None => EntryOutcome::Skipped("already archived".to_string()),
            });
        }

        Ok(EntryOutcome::Skipped("too many redirects".to_string()))
    }

    fn fetch_retrying(
        &mut self,
        conn: &mut Connection,
        method: Method,
        page: &str,
        cookie: Option<&str>,
    ) -> Result<Response> {
        match self.fetch(conn, method, page, cookie) {
            Ok(response) => Ok(response),
            Err(e) if e.is_reconnectable() => {
                conn.reconnect()?;
                self.fetch(conn, method, page, cookie)
            }
            Err(e) => Err(e),
        }
    }

    fn fetch(
        &mut self,
        conn: &mut Connection,
        method: Method,
        page: &str,
        cookie: Option<&str>,
    ) -> Result<Response> {
        http::request(
            conn,
            method,
            page,
            &self.config.user_agent,
            &self.config.accept,
            cookie,
            self.config.max_response_bytes,
        )
    }

    /// Resolve a `Location` header to an absolute URL and put `conn`
    /// into the right state to issue the next request against it, per
    /// the status-policy table's redirect row.
    fn resolve_redirect(
        &mut self,
        conn: &mut Connection,
        scheme: &str,
        host: &str,
        location: &str,
        upgrade_tls: bool,
    ) -> Result<String> {
        let full = if urltools::is_absolute(location) {
            location.to_string()
        } else {
            urltools::make_full_url(scheme, host, "/", location)
        };
        let new_host = urltools::parse_host(&full).to_string();

        if upgrade_tls {
            conn.upgrade_to_tls()?;
        } else if new_host != conn.host() {
            conn.close();
        }

        Ok(full)
    }
}
