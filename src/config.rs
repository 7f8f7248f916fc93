//! Typed, validated crawl configuration built via a typestate builder.
//!
//! Mirrors the builder-validates-before-construction shape used for
//! crawl configuration elsewhere in this codebase's lineage: the
//! required fields (`seed`, `max_depth`) are tracked in the type
//! parameter, so `.build()` is only callable once both have been set.

use std::env;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

const DEFAULT_DELAY_MS: u64 = 200;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_FILL_THRESHOLD: usize = 64;
const DEFAULT_ACCEPT: &str = "text/html,*/*;q=0.8";

/// Validated crawl configuration. Constructed only via
/// [`ConfigBuilder`]; every field here has already passed the checks
/// in [`ConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seed: Url,
    pub max_depth: u8,
    pub delay: Duration,
    pub allow_xdomain: bool,
    pub tls: bool,
    pub archive_root: PathBuf,
    pub user_agent: String,
    pub accept: String,
    pub read_timeout: Duration,
    pub max_response_bytes: usize,
    pub fill_threshold: usize,
    pub extra_root_cert_der: Option<Vec<u8>>,
}

impl CrawlConfig {
    #[must_use]
    pub fn builder() -> ConfigBuilder<Empty> {
        ConfigBuilder::default()
    }
}

pub struct Empty;
pub struct WithSeed;
pub struct Complete;

pub struct ConfigBuilder<State> {
    seed: Option<Url>,
    max_depth: Option<u8>,
    delay: Duration,
    allow_xdomain: bool,
    tls: bool,
    archive_root: PathBuf,
    user_agent: String,
    accept: String,
    read_timeout: Duration,
    max_response_bytes: usize,
    fill_threshold: usize,
    extra_root_cert_der: Option<Vec<u8>>,
    _state: PhantomData<State>,
}

impl Default for ConfigBuilder<Empty> {
    fn default() -> Self {
        Self {
            seed: None,
            max_depth: None,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            allow_xdomain: false,
            tls: false,
            archive_root: PathBuf::from("."),
            user_agent: format!("reaper/{} (+archival crawler)", env!("CARGO_PKG_VERSION")),
            accept: DEFAULT_ACCEPT.to_string(),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            fill_threshold: DEFAULT_FILL_THRESHOLD,
            extra_root_cert_der: None,
            _state: PhantomData,
        }
    }
}

impl ConfigBuilder<Empty> {
    pub fn seed(self, seed: Url) -> ConfigBuilder<WithSeed> {
        ConfigBuilder {
            seed: Some(seed),
            max_depth: self.max_depth,
            delay: self.delay,
            allow_xdomain: self.allow_xdomain,
            tls: self.tls,
            archive_root: self.archive_root,
            user_agent: self.user_agent,
            accept: self.accept,
            read_timeout: self.read_timeout,
            max_response_bytes: self.max_response_bytes,
            fill_threshold: self.fill_threshold,
            extra_root_cert_der: self.extra_root_cert_der,
            _state: PhantomData,
        }
    }
}

impl ConfigBuilder<WithSeed> {
    pub fn max_depth(self, max_depth: u8) -> ConfigBuilder<Complete> {
        ConfigBuilder {
            seed: self.seed,
            max_depth: Some(max_depth),
            delay: self.delay,
            allow_xdomain: self.allow_xdomain,
            tls: self.tls,
            archive_root: self.archive_root,
            user_agent: self.user_agent,
            accept: self.accept,
            read_timeout: self.read_timeout,
            max_response_bytes: self.max_response_bytes,
            fill_threshold: self.fill_threshold,
            extra_root_cert_der: self.extra_root_cert_der,
            _state: PhantomData,
        }
    }
}

/// Setters available at any builder stage (ambient fields with
/// defaults, never required for `.build()`).
impl<State> ConfigBuilder<State> {
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn allow_xdomain(mut self, allow: bool) -> Self {
        self.allow_xdomain = allow;
        self
    }

    #[must_use]
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    #[must_use]
    pub fn archive_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.archive_root = root.into();
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_response_bytes(mut self, bytes: usize) -> Self {
        self.max_response_bytes = bytes;
        self
    }

    #[must_use]
    pub fn fill_threshold(mut self, threshold: usize) -> Self {
        self.fill_threshold = threshold;
        self
    }

    /// Trust one extra certificate authority (DER-encoded), beyond the
    /// public roots, when connecting over TLS. For embedding against a
    /// private or self-signed HTTPS endpoint.
    #[must_use]
    pub fn trust_root_cert_der(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.extra_root_cert_der = Some(der.into());
        self
    }
}

impl ConfigBuilder<Complete> {
    pub fn build(self) -> Result<CrawlConfig> {
        let seed = self.seed.expect("Complete state guarantees seed is set");
        let max_depth = self
            .max_depth
            .expect("Complete state guarantees max_depth is set");

        if seed.scheme() != "http" && seed.scheme() != "https" {
            return Err(Error::Config(format!(
                "seed url must be http or https, got scheme {:?}",
                seed.scheme()
            )));
        }
        if max_depth < 1 {
            return Err(Error::Config("max_depth must be at least 1".to_string()));
        }

        let archive_root = if self.archive_root.is_absolute() {
            self.archive_root
        } else {
            env::current_dir()
                .map_err(|e| Error::Config(format!("cannot resolve current directory: {e}")))?
                .join(self.archive_root)
        };

        Ok(CrawlConfig {
            seed,
            max_depth,
            delay: self.delay,
            allow_xdomain: self.allow_xdomain,
            tls: self.tls,
            archive_root,
            user_agent: self.user_agent,
            accept: self.accept,
            read_timeout: self.read_timeout,
            max_response_bytes: self.max_response_bytes,
            fill_threshold: self.fill_threshold,
            extra_root_cert_der: self.extra_root_cert_der,
        })
    }
}
