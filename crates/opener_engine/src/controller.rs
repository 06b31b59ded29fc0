use async_trait::async_trait;
use opener_core::{
    enabled_or_default, flag_from_stored, BridgeReply, BridgeRequest, ControlMessage,
    DownloadEvent, PageId, DEFAULT_ENABLED, FLAG_KEY,
};
use opener_logging::{opener_debug, opener_info, opener_warn, ExecutionContext};
use serde_json::Value;

use crate::navigate::open_resource;
use crate::synchronizer::{SyncPass, TabStateSynchronizer};
use crate::{
    ControllerLink, DownloadInterceptor, HostError, HostServices, InterceptOutcome,
    OpenerSettings, SettingsChange,
};

const CTX: ExecutionContext = ExecutionContext::Background;

/// The persistent background context.
///
/// Owns the interception engine and the tab state synchronizer and keeps
/// their flag mirrors converged on the stored value. Every entry point
/// absorbs host failures; nothing here returns an error to the host.
pub struct BackgroundController {
    host: HostServices,
    interceptor: DownloadInterceptor,
    synchronizer: TabStateSynchronizer,
}

impl BackgroundController {
    pub fn new(host: HostServices, settings: &OpenerSettings) -> Self {
        let interceptor =
            DownloadInterceptor::new(settings, host.downloads.clone(), host.tabs.clone());
        let synchronizer = TabStateSynchronizer::new(host.clone(), settings);
        Self {
            host,
            interceptor,
            synchronizer,
        }
    }

    pub fn interceptor(&self) -> &DownloadInterceptor {
        &self.interceptor
    }

    pub fn synchronizer(&self) -> &TabStateSynchronizer {
        &self.synchronizer
    }

    /// Reads the stored flag, persisting the default when it is absent, and
    /// seeds every mirror with it. Returns the flag in effect.
    pub async fn start(&self) -> bool {
        let stored = match self.host.settings.get(FLAG_KEY).await {
            Ok(value) => flag_from_stored(value.as_ref()),
            Err(err) => {
                opener_warn!("[{}] Reading {} failed: {}", CTX.tag(), FLAG_KEY, err);
                None
            }
        };
        if stored.is_none() {
            match self
                .host
                .settings
                .set(FLAG_KEY, Value::Bool(DEFAULT_ENABLED))
                .await
            {
                Ok(()) => opener_info!(
                    "[{}] Initialized {} to {}",
                    CTX.tag(),
                    FLAG_KEY,
                    DEFAULT_ENABLED
                ),
                Err(err) => opener_warn!("[{}] Persisting default flag failed: {}", CTX.tag(), err),
            }
        }
        let enabled = enabled_or_default(stored);
        self.synchronizer.seed(enabled);
        self.interceptor.apply_flag(enabled);
        opener_info!("[{}] Started with enabled={}", CTX.tag(), enabled);
        enabled
    }

    pub fn enabled(&self) -> bool {
        self.interceptor.enabled()
    }

    /// Reacts to a settings notification. Unrelated keys and malformed values
    /// are ignored.
    pub async fn on_settings_changed(&self, change: SettingsChange) -> Option<SyncPass> {
        if change.key != FLAG_KEY {
            return None;
        }
        let Some(enabled) = flag_from_stored(Some(&change.value)) else {
            opener_warn!("[{}] Ignoring non-boolean {}: {}", CTX.tag(), FLAG_KEY, change.value);
            return None;
        };
        Some(self.apply_flag(enabled).await)
    }

    /// Handles a message pushed by the control panel. `initState` only
    /// refreshes the mirrors; `updateState` also synchronizes open pages.
    pub async fn on_port_message(&self, message: ControlMessage) -> Option<SyncPass> {
        match message {
            ControlMessage::InitState { enabled } => {
                opener_debug!("[{}] Panel connected with enabled={}", CTX.tag(), enabled);
                self.refresh_mirrors(enabled);
                None
            }
            ControlMessage::UpdateState { enabled } => Some(self.apply_flag(enabled).await),
        }
    }

    pub async fn on_runtime_message(&self, request: BridgeRequest) -> BridgeReply {
        match request {
            BridgeRequest::OpenPdfInNewTab { url } => {
                opener_info!("[{}] Page asked to open {}", CTX.tag(), url);
                match open_resource(self.host.tabs.as_ref(), &url).await {
                    Ok(opened) => {
                        opener_debug!("[{}] Opened {} in {:?}", CTX.tag(), url, opened);
                        BridgeReply::ok()
                    }
                    Err(err) => {
                        opener_warn!("[{}] Opening {} failed: {}", CTX.tag(), url, err);
                        BridgeReply::failed(err.to_string())
                    }
                }
            }
            BridgeRequest::WakeUp => BridgeReply::ok(),
        }
    }

    pub async fn on_download_created(&self, event: DownloadEvent) -> InterceptOutcome {
        self.interceptor.on_download_created(event).await
    }

    pub fn on_page_closed(&self, page: PageId) {
        self.synchronizer.forget_page(page);
    }

    async fn apply_flag(&self, enabled: bool) -> SyncPass {
        self.refresh_mirrors(enabled);
        self.synchronizer.run_pass(enabled).await
    }

    fn refresh_mirrors(&self, enabled: bool) {
        self.interceptor.apply_flag(enabled);
        self.synchronizer.set_mirror(enabled);
    }
}

#[async_trait]
impl ControllerLink for BackgroundController {
    async fn request(&self, request: BridgeRequest) -> Result<BridgeReply, HostError> {
        Ok(self.on_runtime_message(request).await)
    }
}

