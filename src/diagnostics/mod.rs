//! # Diagnostics Bus
//!
//! Structured event log. Every record goes to three places:
//!
//! ```text
//!                  ┌──► tracing (host console)
//! record(..) ──────┼──► transient feed (newest first, 5 entries, 1 s each)
//!                  └──► broadcast subscribers
//! ```

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Entries kept in the on-screen feed.
pub const FEED_CAPACITY: usize = 5;
/// How long an entry stays visible.
pub const FEED_LIFETIME: Duration = Duration::from_secs(1);
/// Feed lines longer than this are cut and suffixed with `...`.
pub const FEED_LINE_LIMIT: usize = 80;

const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Input,
    Calibration,
    Profile,
    Storage,
    Config,
    Engine,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Input => "input",
            Category::Calibration => "calibration",
            Category::Profile => "profile",
            Category::Storage => "storage",
            Category::Config => "config",
            Category::Engine => "engine",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
}

impl Diagnostic {
    /// Feed rendering: `[HH:MM:SS.mmm] message`, truncated.
    pub fn feed_line(&self) -> String {
        let line = format!("[{}] {}", self.timestamp.format("%H:%M:%S%.3f"), self.message);
        truncate(&line, FEED_LINE_LIMIT)
    }
}

#[derive(Debug, Clone)]
struct FeedEntry {
    diagnostic: Diagnostic,
    expires: Instant,
}

pub struct Diagnostics {
    feed: VecDeque<FeedEntry>,
    feed_enabled: bool,
    tx: broadcast::Sender<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            feed: VecDeque::with_capacity(FEED_CAPACITY),
            feed_enabled: true,
            tx,
        }
    }

    /// New receiver for every record from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }

    pub fn set_feed_enabled(&mut self, enabled: bool) {
        self.feed_enabled = enabled;
        if !enabled {
            self.feed.clear();
        }
    }

    pub fn record(
        &mut self,
        now: Instant,
        severity: Severity,
        category: Category,
        message: impl Into<String>,
    ) {
        let message = message.into();
        match severity {
            Severity::Debug => debug!("[{}] {}", category, message),
            Severity::Info => info!("[{}] {}", category, message),
            Severity::Warn => warn!("[{}] {}", category, message),
        }

        let diagnostic = Diagnostic {
            timestamp: Local::now(),
            severity,
            category,
            message,
        };

        // no receivers is fine
        let _ = self.tx.send(diagnostic.clone());

        if self.feed_enabled {
            self.feed.push_front(FeedEntry {
                diagnostic,
                expires: now + FEED_LIFETIME,
            });
            self.feed.truncate(FEED_CAPACITY);
        }
    }

    pub fn debug(&mut self, now: Instant, category: Category, message: impl Into<String>) {
        self.record(now, Severity::Debug, category, message);
    }

    pub fn info(&mut self, now: Instant, category: Category, message: impl Into<String>) {
        self.record(now, Severity::Info, category, message);
    }

    pub fn warn(&mut self, now: Instant, category: Category, message: impl Into<String>) {
        self.record(now, Severity::Warn, category, message);
    }

    /// Drops expired entries and returns the remaining ones, newest first.
    pub fn visible_feed(&mut self, now: Instant) -> Vec<String> {
        self.feed.retain(|entry| entry.expires > now);
        self.feed
            .iter()
            .map(|entry| entry.diagnostic.feed_line())
            .collect()
    }
}

fn truncate(line: &str, limit: usize) -> String {
    if line.chars().count() <= limit {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_is_newest_first_and_bounded() {
        let now = Instant::now();
        let mut diag = Diagnostics::new();
        for i in 0..7 {
            diag.info(now, Category::Input, format!("event {i}"));
        }
        let feed = diag.visible_feed(now);
        assert_eq!(feed.len(), FEED_CAPACITY);
        assert!(feed[0].ends_with("event 6"));
        assert!(feed[4].ends_with("event 2"));
    }

    #[test]
    fn entries_expire() {
        let now = Instant::now();
        let mut diag = Diagnostics::new();
        diag.info(now, Category::Input, "first");
        diag.info(now + Duration::from_millis(500), Category::Input, "second");
        let feed = diag.visible_feed(now + Duration::from_millis(1200));
        assert_eq!(feed.len(), 1);
        assert!(feed[0].ends_with("second"));
    }

    #[test]
    fn long_lines_are_truncated() {
        let now = Instant::now();
        let mut diag = Diagnostics::new();
        diag.warn(now, Category::Storage, "x".repeat(200));
        let line = &diag.visible_feed(now)[0];
        assert_eq!(line.chars().count(), FEED_LINE_LIMIT + 3);
        assert!(line.ends_with("..."));
    }

    #[test]
    fn subscribers_receive_records_even_with_feed_off() {
        let now = Instant::now();
        let mut diag = Diagnostics::new();
        let mut rx = diag.subscribe();
        diag.set_feed_enabled(false);
        diag.info(now, Category::Profile, "switched");
        assert!(diag.visible_feed(now).is_empty());
        let got = rx.try_recv().unwrap();
        assert_eq!(got.category, Category::Profile);
        assert_eq!(got.message, "switched");
    }
}
