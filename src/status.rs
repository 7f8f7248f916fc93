//! Status reporting seam between the crawl loop and a terminal UI.
//!
//! Only the interface the crawl loop drives a UI through lives here,
//! so a richer UI can be dropped in later without touching `crawl`.

use parking_lot::Mutex;

/// One observation the crawl loop reports as it runs. Every variant
/// renders to a single terminal line and overwrites the previous one -
/// no stack traces reach the terminal.
#[derive(Debug, Clone)]
pub enum StatusEvent {
    Connecting { host: String },
    Fetching { url: String },
    Archived { url: String, bytes: usize },
    Skipped { url: String, reason: String },
    Error { message: String },
    DepthAdvanced { depth: u8, frontier_len: usize },
    Finished { pages_archived: usize },
}

/// Receives [`StatusEvent`]s from the crawl loop. Implementations must
/// not mutate crawl state — the loop calls this synchronously between
/// steps, never from a second thread, but the bound keeps the door
/// open for a concurrent UI reader without requiring a rewrite here.
pub trait StatusSink: Send + Sync {
    fn on_event(&self, event: StatusEvent);
}

/// Writes one overwritten status line to stderr. A minimal stand-in
/// for a richer terminal UI.
pub struct LineSink {
    mutex: Mutex<()>,
}

impl LineSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
        }
    }

    fn render(event: &StatusEvent) -> String {
        match event {
            StatusEvent::Connecting { host } => format!("connecting to {host}"),
            StatusEvent::Fetching { url } => format!("fetching {url}"),
            StatusEvent::Archived { url, bytes } => format!("archived {url} ({bytes} bytes)"),
            StatusEvent::Skipped { url, reason } => format!("skipped {url}: {reason}"),
            StatusEvent::Error { message } => format!("error: {message}"),
            StatusEvent::DepthAdvanced { depth, frontier_len } => {
                format!("depth {depth}, frontier {frontier_len}")
            }
            StatusEvent::Finished { pages_archived } => {
                format!("finished: {pages_archived} pages archived")
            }
        }
    }
}

impl Default for LineSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for LineSink {
    fn on_event(&self, event: StatusEvent) {
        let _guard = self.mutex.lock();
        eprint!("\r\x1b[2K{}", Self::render(&event));
        if matches!(event, StatusEvent::Finished { .. }) {
            eprintln!();
        }
    }
}

/// Discards every event. Used in tests where the crawl loop needs a
/// sink but no output is asserted on.
#[derive(Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn on_event(&self, _event: StatusEvent) {}
}
