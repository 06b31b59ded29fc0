use std::sync::{Arc, Mutex, MutexGuard};

use opener_core::{
    DownloadEvent, DownloadState, InterceptionState, ListenerChange, Screening,
};
use opener_logging::{opener_debug, opener_error, opener_info, opener_warn};

use crate::navigate::{open_resource, OpenedIn};
use crate::{DownloadHost, OpenerSettings, TabHost};

/// What happened to one download-start event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptOutcome {
    /// Screened out before any host call; the download proceeds normally.
    Ignored(Screening),
    /// The download was no longer in progress; nothing was cancelled.
    NotInProgress(DownloadState),
    /// Status lookup or cancellation failed; the download was left alone.
    CancelFailed(String),
    Opened(OpenedIn),
    /// Cancelled, but no page could be opened.
    OpenFailed(String),
}

/// Turns PDF download starts into page navigations.
///
/// Steps run strictly in order: screen (flag, mime, exclusion, dedupe), check
/// status, cancel, then open. Nothing past a failed step is attempted.
#[derive(Clone)]
pub struct DownloadInterceptor {
    state: Arc<Mutex<InterceptionState>>,
    downloads: Arc<dyn DownloadHost>,
    tabs: Arc<dyn TabHost>,
}

impl DownloadInterceptor {
    pub fn new(
        settings: &OpenerSettings,
        downloads: Arc<dyn DownloadHost>,
        tabs: Arc<dyn TabHost>,
    ) -> Self {
        let state = InterceptionState::new(
            settings.dedupe_window(),
            settings.excluded_url_prefixes.clone(),
        );
        Self {
            state: Arc::new(Mutex::new(state)),
            downloads,
            tabs,
        }
    }

    pub fn enabled(&self) -> bool {
        self.lock_state().enabled()
    }

    /// Refreshes the flag mirror and attaches/detaches the listener on a
    /// transition.
    pub fn apply_flag(&self, enabled: bool) -> ListenerChange {
        let change = self.lock_state().set_enabled(enabled);
        match change {
            ListenerChange::Attach => {
                opener_info!("Download listener attached");
                self.downloads.set_listening(true);
            }
            ListenerChange::Detach => {
                opener_info!("Download listener detached");
                self.downloads.set_listening(false);
            }
            ListenerChange::Unchanged => {}
        }
        change
    }

    pub async fn on_download_created(&self, event: DownloadEvent) -> InterceptOutcome {
        let now = tokio::time::Instant::now().into_std();
        let screening = self.lock_state().screen(&event, now);
        if screening != Screening::Accepted {
            opener_debug!("Download {} not intercepted: {:?}", event.id, screening);
            return InterceptOutcome::Ignored(screening);
        }
        opener_info!("Detected PDF download {}: {}", event.id, event.url);

        // Another listener may already have finished or cancelled it.
        match self.downloads.status(event.id).await {
            Ok(DownloadState::InProgress) => {}
            Ok(state) => {
                opener_debug!("Download {} is {:?}, leaving it alone", event.id, state);
                return InterceptOutcome::NotInProgress(state);
            }
            Err(err) => {
                opener_warn!("Status lookup for download {} failed: {}", event.id, err);
                return InterceptOutcome::CancelFailed(err.to_string());
            }
        }

        if let Err(err) = self.downloads.cancel(event.id).await {
            opener_warn!("Error cancelling download {}: {}", event.id, err);
            return InterceptOutcome::CancelFailed(err.to_string());
        }

        match open_resource(self.tabs.as_ref(), &event.url).await {
            Ok(opened) => {
                opener_info!("Opened {} in {:?}", event.url, opened);
                InterceptOutcome::Opened(opened)
            }
            Err(err) => {
                opener_error!("Error opening {}: {}", event.url, err);
                InterceptOutcome::OpenFailed(err.to_string())
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, InterceptionState> {
        // The state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
