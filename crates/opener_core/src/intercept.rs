use std::time::{Duration, Instant};

use crate::{is_pdf_mime, DownloadEvent, HandledUrlSet};

/// Result of screening a download-start event before any host call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    /// The event should be intercepted; its URL is now claimed.
    Accepted,
    Disabled,
    NotPdf,
    /// The URL belongs to the page-level handler.
    Excluded,
    /// The URL was claimed within the deduplication window.
    Duplicate,
}

/// How the download-start listener must change after a flag update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerChange {
    Attach,
    Detach,
    Unchanged,
}

/// The interception engine's local state: its mirror of the feature flag, the
/// URLs inside their deduplication window and the excluded URL prefixes.
///
/// Lives for the lifetime of the controller process; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct InterceptionState {
    enabled: bool,
    handled: HandledUrlSet,
    excluded_prefixes: Vec<String>,
}

impl InterceptionState {
    pub fn new(dedupe_window: Duration, excluded_prefixes: Vec<String>) -> Self {
        Self {
            enabled: false,
            handled: HandledUrlSet::new(dedupe_window),
            excluded_prefixes,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Updates the flag mirror. The listener follows flag transitions exactly.
    pub fn set_enabled(&mut self, enabled: bool) -> ListenerChange {
        if self.enabled == enabled {
            return ListenerChange::Unchanged;
        }
        self.enabled = enabled;
        if enabled {
            ListenerChange::Attach
        } else {
            ListenerChange::Detach
        }
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
    }

    /// Screens an event in order: flag, mime type, exclusion, deduplication.
    /// Only an accepted event claims its URL.
    pub fn screen(&mut self, event: &DownloadEvent, now: Instant) -> Screening {
        if !self.enabled {
            return Screening::Disabled;
        }
        if !is_pdf_mime(&event.mime_type) {
            return Screening::NotPdf;
        }
        if self.is_excluded(&event.url) {
            return Screening::Excluded;
        }
        if !self.handled.claim(&event.url, now) {
            return Screening::Duplicate;
        }
        Screening::Accepted
    }
}
