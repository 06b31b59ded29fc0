use std::collections::HashMap;

use crate::PageId;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRecord {
    pub page_id: PageId,
    pub attempt_count: u32,
    pub last_error: String,
}

/// What the synchronizer should do after a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Inject the bridge script and retry once.
    InjectAndRetry { attempt: u32 },
    /// The bound is reached; the page is skipped until the record is dropped.
    GiveUp { attempt: u32 },
}

/// Failed-delivery bookkeeping per page.
///
/// `attempt_count` never exceeds `max_attempts`. A record at the bound stays
/// as a marker so later passes skip the page; it is dropped when a delivery
/// succeeds or the page closes.
#[derive(Debug, Clone)]
pub struct RetryLedger {
    max_attempts: u32,
    records: HashMap<PageId, RetryRecord>,
}

impl Default for RetryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryLedger {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            records: HashMap::new(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn record(&self, page_id: PageId) -> Option<&RetryRecord> {
        self.records.get(&page_id)
    }

    pub fn attempts(&self, page_id: PageId) -> u32 {
        self.records
            .get(&page_id)
            .map_or(0, |record| record.attempt_count)
    }

    pub fn is_exhausted(&self, page_id: PageId) -> bool {
        self.attempts(page_id) >= self.max_attempts
    }

    pub fn record_failure(&mut self, page_id: PageId, error: impl Into<String>) -> RetryDecision {
        let max_attempts = self.max_attempts;
        let record = self.records.entry(page_id).or_insert_with(|| RetryRecord {
            page_id,
            attempt_count: 0,
            last_error: String::new(),
        });
        record.last_error = error.into();
        if record.attempt_count < max_attempts {
            record.attempt_count += 1;
        }
        let attempt = record.attempt_count;
        if attempt < max_attempts {
            RetryDecision::InjectAndRetry { attempt }
        } else {
            RetryDecision::GiveUp { attempt }
        }
    }

    pub fn record_success(&mut self, page_id: PageId) {
        self.records.remove(&page_id);
    }

    /// Drops the record of a page that closed.
    pub fn forget(&mut self, page_id: PageId) {
        self.records.remove(&page_id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
