use std::collections::HashMap;
use std::time::{Duration, Instant};

/// URLs that were accepted for interception and are still inside their
/// deduplication window.
///
/// Entries expire `window` after they were claimed. Expired entries are
/// pruned on every access, so a URL is never reported live past its deadline.
#[derive(Debug, Clone)]
pub struct HandledUrlSet {
    window: Duration,
    entries: HashMap<String, Instant>,
}

impl HandledUrlSet {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Claims `url` for handling. Returns `false` if it is already live.
    pub fn claim(&mut self, url: &str, now: Instant) -> bool {
        self.prune(now);
        if self.entries.contains_key(url) {
            return false;
        }
        self.entries.insert(url.to_owned(), now + self.window);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        self.entries.retain(|_, expires_at| *expires_at > now);
    }
}
