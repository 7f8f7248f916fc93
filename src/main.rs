use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use reaper::config::CrawlConfig;
use reaper::crawl::{CrawlEngine, CrawlOutcome};
use reaper::error::Error;
use reaper::status::LineSink;
use url::Url;

/// Recursive web-archiving crawler: mirrors a site to disk, rewriting
/// links to local paths as it goes.
#[derive(Parser, Debug)]
#[command(name = "reaper", version, about, wrap_help = true)]
struct Args {
    /// Seed URL to start crawling from.
    #[arg(long)]
    url: Url,

    /// Maximum crawl depth (BFS levels).
    #[arg(long, default_value_t = 3)]
    depth: u8,

    /// Delay between requests, in seconds.
    #[arg(long, default_value_t = 0.2)]
    delay: f64,

    /// Allow following links to other hosts.
    #[arg(long)]
    xdomain: bool,

    /// Start the seed connection over TLS even if the seed scheme is http.
    #[arg(long)]
    tls: bool,

    /// Directory to mirror archived pages into.
    #[arg(long, default_value = ".")]
    archive_root: PathBuf,

    /// Socket read timeout, in seconds.
    #[arg(long, default_value_t = 30)]
    read_timeout_secs: u64,

    /// Upper bound on a single response body, in megabytes.
    #[arg(long, default_value_t = 16)]
    max_response_mb: usize,

    /// Entries per crawl level after which link extraction stops.
    #[arg(long, default_value_t = 64)]
    fill_threshold: usize,

    /// Raise the log level (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("reaper={default_level}")),
    )
    .init();
}

fn build_config(args: &Args) -> Result<CrawlConfig, Error> {
    CrawlConfig::builder()
        .seed(args.url.clone())
        .max_depth(args.depth)
        .delay(Duration::from_secs_f64(args.delay))
        .allow_xdomain(args.xdomain)
        .tls(args.tls)
        .archive_root(args.archive_root.clone())
        .read_timeout(Duration::from_secs(args.read_timeout_secs))
        .max_response_bytes(args.max_response_mb * 1024 * 1024)
        .fill_threshold(args.fill_threshold)
        .build()
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{:#}", anyhow::Error::new(e));
            return ExitCode::from(1);
        }
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let handler_flag = cancelled.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("failed to install SIGINT handler: {e}");
    }

    let mut engine = CrawlEngine::new(config, LineSink::new(), cancelled);
    match engine.run() {
        Ok(CrawlOutcome::Completed { pages_archived }) => {
            log::info!("crawl complete: {pages_archived} pages archived");
            ExitCode::from(0)
        }
        Ok(CrawlOutcome::Interrupted { pages_archived }) => {
            log::info!("crawl interrupted: {pages_archived} pages archived");
            ExitCode::from(130)
        }
        Err(e) => {
            log::error!("{:#}", anyhow::Error::new(e));
            ExitCode::from(2)
        }
    }
}
