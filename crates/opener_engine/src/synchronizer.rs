use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use opener_core::{
    ControlMessage, HostPattern, PageId, RetryDecision, RetryLedger, TransitionTracker,
};
use opener_logging::{opener_debug, opener_info, opener_warn};
use tokio::task::JoinHandle;

use crate::{HostError, HostServices, OpenerSettings, PageInfo};

/// Synchronizer state shared between a pass and its detached retry chains.
#[derive(Debug)]
struct SyncState {
    mirror: bool,
    ledger: RetryLedger,
    tracker: TransitionTracker,
}

/// Per-page result of the first delivery attempt of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Delivered { reloaded: bool },
    /// Delivery failed; an injection and one retry were started.
    Retrying { attempt: u32 },
    /// Delivery failed and the attempt bound is reached.
    GaveUp { attempt: u32 },
}

/// Result of one detached retry chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Delivered { page: PageId, reloaded: bool },
    /// The page closed or left the target host during the delay.
    PageGone { page: PageId },
    InjectionFailed { page: PageId, attempt: u32 },
    Failed { page: PageId, attempt: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub enabled: bool,
    pub outcomes: Vec<(PageId, PageOutcome)>,
    pub skipped_unmatched: Vec<PageId>,
    /// Still loading; their bridge reads the stored flag once it loads.
    pub skipped_loading: Vec<PageId>,
    pub skipped_exhausted: Vec<PageId>,
}

impl SyncReport {
    pub fn reloaded(&self) -> Vec<PageId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, PageOutcome::Delivered { reloaded: true }))
            .map(|(page, _)| *page)
            .collect()
    }
}

/// A finished synchronization pass plus the retry chains it left running.
#[derive(Debug)]
pub struct SyncPass {
    pub report: SyncReport,
    retries: Vec<JoinHandle<RetryOutcome>>,
}

impl SyncPass {
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    /// Waits for every retry chain of this pass.
    pub async fn settle(self) -> (SyncReport, Vec<RetryOutcome>) {
        let mut outcomes = Vec::with_capacity(self.retries.len());
        for handle in self.retries {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => opener_warn!("Retry task ended abnormally: {}", err),
            }
        }
        (self.report, outcomes)
    }
}

/// Pushes the feature flag to every open page on the target host.
///
/// A page is reloaded only when the delivered value differs from the value
/// recorded at the end of the previous pass. Pages whose bridge is missing get
/// the bridge script injected and one more delivery after `retry_delay`;
/// after `max_delivery_attempts` failures a page is skipped until it closes.
#[derive(Clone)]
pub struct TabStateSynchronizer {
    host: HostServices,
    pattern: HostPattern,
    bridge_script: String,
    retry_delay: Duration,
    state: Arc<Mutex<SyncState>>,
    // Held from the page query until the transition value is recorded.
    pass_gate: Arc<tokio::sync::Mutex<()>>,
}

impl TabStateSynchronizer {
    pub fn new(host: HostServices, settings: &OpenerSettings) -> Self {
        Self {
            host,
            pattern: settings.host_pattern(),
            bridge_script: settings.bridge_script.clone(),
            retry_delay: settings.retry_delay(),
            state: Arc::new(Mutex::new(SyncState {
                mirror: false,
                ledger: RetryLedger::new(settings.max_delivery_attempts),
                tracker: TransitionTracker::new(),
            })),
            pass_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Records the flag the pages were loaded with, so the first pass does not
    /// reload them for a value they already have.
    pub fn seed(&self, enabled: bool) {
        let mut state = self.lock_state();
        state.mirror = enabled;
        state.tracker = TransitionTracker::seeded(enabled);
    }

    pub fn set_mirror(&self, enabled: bool) {
        self.lock_state().mirror = enabled;
    }

    pub fn mirror(&self) -> bool {
        self.lock_state().mirror
    }

    pub fn previous(&self) -> Option<bool> {
        self.lock_state().tracker.previous()
    }

    pub fn attempts(&self, page: PageId) -> u32 {
        self.lock_state().ledger.attempts(page)
    }

    pub fn forget_page(&self, page: PageId) {
        self.lock_state().ledger.forget(page);
    }

    /// Runs one synchronization pass for `enabled`.
    ///
    /// Passes run one at a time: a second caller waits until the first has
    /// recorded its transition value, so one toggle reloads a page at most
    /// once. First deliveries to all pages run concurrently; the transition
    /// value is recorded once they are done, without waiting for retry
    /// chains. A retry that succeeds later compares against whatever value is
    /// recorded then.
    pub async fn run_pass(&self, enabled: bool) -> SyncPass {
        let _gate = self.pass_gate.lock().await;
        self.set_mirror(enabled);
        let mut report = SyncReport {
            enabled,
            ..SyncReport::default()
        };

        // Queried fresh on every pass.
        let pages = match self.host.tabs.query_pages().await {
            Ok(pages) => pages,
            Err(err) => {
                opener_warn!("Page query failed, nothing synchronized: {}", err);
                self.lock_state().tracker.finish_pass(enabled);
                return SyncPass {
                    report,
                    retries: Vec::new(),
                };
            }
        };

        let mut candidates = Vec::new();
        {
            let state = self.lock_state();
            for page in pages {
                if !self.pattern.matches(&page.url) {
                    report.skipped_unmatched.push(page.id);
                } else if !page.complete {
                    opener_debug!("Skipping page {} until it finishes loading", page.id);
                    report.skipped_loading.push(page.id);
                } else if state.ledger.is_exhausted(page.id) {
                    opener_debug!("Skipping unreachable page {}", page.id);
                    report.skipped_exhausted.push(page.id);
                } else {
                    candidates.push(page);
                }
            }
        }

        let outcomes = join_all(
            candidates
                .iter()
                .map(|page| self.first_delivery(page, enabled)),
        )
        .await;

        self.lock_state().tracker.finish_pass(enabled);

        let mut retries = Vec::new();
        for (page, outcome) in candidates.iter().zip(outcomes) {
            if let PageOutcome::Retrying { attempt } = outcome {
                let chain = self.clone();
                let page_id = page.id;
                retries.push(tokio::spawn(async move {
                    chain.retry_chain(page_id, enabled, attempt).await
                }));
            }
            report.outcomes.push((page.id, outcome));
        }

        opener_info!(
            "Synchronized enabled={} to {} page(s), {} retrying",
            enabled,
            report.outcomes.len(),
            retries.len()
        );
        SyncPass { report, retries }
    }

    async fn first_delivery(&self, page: &PageInfo, enabled: bool) -> PageOutcome {
        match self.deliver(page.id, enabled).await {
            Ok(reloaded) => PageOutcome::Delivered { reloaded },
            Err(err) => {
                opener_debug!("Delivery to page {} failed: {}", page.id, err);
                let decision = self.lock_state().ledger.record_failure(page.id, err.to_string());
                match decision {
                    RetryDecision::InjectAndRetry { attempt } => PageOutcome::Retrying { attempt },
                    RetryDecision::GiveUp { attempt } => {
                        opener_warn!(
                            "Page {} unreachable after {} attempt(s)",
                            page.id,
                            attempt
                        );
                        PageOutcome::GaveUp { attempt }
                    }
                }
            }
        }
    }

    async fn retry_chain(&self, page: PageId, enabled: bool, attempt: u32) -> RetryOutcome {
        if let Err(err) = self.host.scripts.inject(page, &self.bridge_script).await {
            opener_warn!("Injecting bridge into page {} failed: {}", page, err);
            let attempt = self.record_retry_failure(page, err);
            return RetryOutcome::InjectionFailed { page, attempt };
        }

        tokio::time::sleep(self.retry_delay).await;

        // The page may have closed or navigated away during the delay.
        let still_there = match self.host.tabs.page(page).await {
            Ok(Some(info)) => self.pattern.matches(&info.url),
            Ok(None) => false,
            Err(err) => {
                opener_debug!("Page {} lookup failed: {}", page, err);
                false
            }
        };
        if !still_there {
            self.forget_page(page);
            return RetryOutcome::PageGone { page };
        }

        match self.deliver(page, enabled).await {
            Ok(reloaded) => RetryOutcome::Delivered { page, reloaded },
            Err(err) => {
                let count = self.record_retry_failure(page, err);
                opener_debug!(
                    "Retry {} to page {} failed, waiting for the next pass",
                    attempt,
                    page
                );
                RetryOutcome::Failed {
                    page,
                    attempt: count,
                }
            }
        }
    }

    /// Sends the flag; on success clears the page's record and reloads it if
    /// the value is a transition. Returns whether a reload was issued.
    async fn deliver(&self, page: PageId, enabled: bool) -> Result<bool, HostError> {
        let reply = self
            .host
            .messenger
            .send(page, ControlMessage::UpdateState { enabled })
            .await?;
        if !reply.success {
            return Err(HostError::Rejected(
                reply.error.unwrap_or_else(|| "bridge refused update".into()),
            ));
        }

        let reload = {
            let mut state = self.lock_state();
            state.ledger.record_success(page);
            state.tracker.is_transition(enabled)
        };
        if reload {
            if let Err(err) = self.host.tabs.reload(page).await {
                opener_warn!("Reloading page {} failed: {}", page, err);
                return Ok(false);
            }
            opener_debug!("Reloaded page {} for enabled={}", page, enabled);
        }
        Ok(reload)
    }

    fn record_retry_failure(&self, page: PageId, err: HostError) -> u32 {
        let decision = self.lock_state().ledger.record_failure(page, err.to_string());
        match decision {
            RetryDecision::InjectAndRetry { attempt } | RetryDecision::GiveUp { attempt } => {
                attempt
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
